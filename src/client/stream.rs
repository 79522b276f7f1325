//! Streaming chat: typed events, observer dispatch, and the stream session
//! controller.
//!
//! `stream_chat` opens one long-lived POST to `/ai/chat/stream` and feeds
//! decoded frames through [`parse_frame`] to the caller's
//! [`ChatStreamObserver`], in arrival order, one at a time. The returned
//! [`ChatStreamHandle`] cancels the in-flight request cooperatively; a
//! cancelled stream never invokes `on_error`.

use std::fmt::Display;
use std::sync::Arc;

use futures::{Stream, StreamExt};
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;

use crate::api::sse;
use crate::api::{
    DataPayload, ErrorPayload, SqlChatRequest, SqlPayload, StagePayload, SummaryPayload,
};
use crate::sse_parser::{SseFrame, SseFrameStream};

// ============================================================================
// Events
// ============================================================================

/// A typed event decoded from one stream frame.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatStreamEvent {
    /// Human-readable progress message.
    Stage { message: String },
    /// The generated query; `corrected` when the server auto-repaired it.
    Sql { sql: String, corrected: bool },
    /// Result rows plus the session they belong to.
    Data {
        rows: Vec<Map<String, Value>>,
        total: u64,
        session_id: i64,
    },
    /// One fragment of the incrementally generated summary.
    SummaryToken { token: String },
    /// Protocol-level completion. The transport may still deliver more
    /// frames before end-of-stream.
    Done,
    /// Server-reported failure.
    Error { message: String },
}

/// Consumer of stream events, one method per event kind.
///
/// Every method defaults to a no-op, so implementors only override the
/// kinds they care about. Methods are invoked in frame-arrival order and
/// never concurrently.
pub trait ChatStreamObserver: Send + Sync {
    fn on_stage(&self, _message: &str) {}
    fn on_sql(&self, _sql: &str, _corrected: bool) {}
    fn on_data(&self, _rows: &[Map<String, Value>], _total: u64, _session_id: i64) {}
    fn on_summary_token(&self, _token: &str) {}
    fn on_done(&self) {}
    fn on_error(&self, _message: &str) {}
}

// ============================================================================
// Frame Parsing
// ============================================================================

/// Parse one frame into a typed event.
///
/// Returns `None` — dropping the frame without touching the stream — when
/// the payload is missing, the JSON is malformed, or the kind is unknown.
/// A single bad frame must not terminate an otherwise healthy session.
pub fn parse_frame(frame: &SseFrame) -> Option<ChatStreamEvent> {
    let kind = frame.event.as_deref().unwrap_or(sse::DEFAULT);

    let Some(data) = frame.data.as_deref() else {
        tracing::debug!(kind, "dropping frame without data field");
        return None;
    };

    match kind {
        sse::STAGE => decode::<StagePayload>(data).map(|p| ChatStreamEvent::Stage {
            message: p.message,
        }),
        sse::SQL => decode::<SqlPayload>(data).map(|p| ChatStreamEvent::Sql {
            sql: p.sql,
            corrected: p.corrected,
        }),
        sse::DATA => decode::<DataPayload>(data).map(|p| ChatStreamEvent::Data {
            rows: p.rows,
            total: p.total,
            session_id: p.session_id,
        }),
        sse::SUMMARY => {
            decode::<SummaryPayload>(data).map(|p| ChatStreamEvent::SummaryToken { token: p.token })
        }
        sse::DONE => Some(ChatStreamEvent::Done),
        sse::ERROR => decode::<ErrorPayload>(data).map(|p| ChatStreamEvent::Error {
            message: p.message,
        }),
        other => {
            tracing::debug!(kind = other, "dropping frame with unknown event kind");
            None
        }
    }
}

fn decode<T: serde::de::DeserializeOwned>(data: &str) -> Option<T> {
    match serde_json::from_str(data) {
        Ok(payload) => Some(payload),
        Err(e) => {
            tracing::debug!(error = %e, "dropping frame with malformed payload");
            None
        }
    }
}

/// Route one event to the observer method for its kind.
pub fn dispatch(observer: &dyn ChatStreamObserver, event: ChatStreamEvent) {
    match event {
        ChatStreamEvent::Stage { message } => observer.on_stage(&message),
        ChatStreamEvent::Sql { sql, corrected } => observer.on_sql(&sql, corrected),
        ChatStreamEvent::Data {
            rows,
            total,
            session_id,
        } => observer.on_data(&rows, total, session_id),
        ChatStreamEvent::SummaryToken { token } => observer.on_summary_token(&token),
        ChatStreamEvent::Done => observer.on_done(),
        ChatStreamEvent::Error { message } => observer.on_error(&message),
    }
}

// ============================================================================
// Stream Session Controller
// ============================================================================

/// Transport-level outcome of one stream session.
///
/// Distinct from the protocol's `done`/`error` events: `on_done` may fire
/// and the outcome still be `Completed` (or, on a broken connection,
/// `Failed`) — the two termination signals are independent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamOutcome {
    /// Transport reached end-of-stream without error.
    Completed,
    /// Connect or read failed; `on_error` was invoked exactly once.
    Failed,
    /// The caller cancelled; no handler was invoked for the termination.
    Cancelled,
}

/// Handle to one in-flight stream session.
///
/// Returned immediately by `stream_chat`; all observer invocations happen
/// asynchronously on a spawned task.
pub struct ChatStreamHandle {
    cancel: CancellationToken,
    task: tokio::task::JoinHandle<StreamOutcome>,
}

impl ChatStreamHandle {
    /// Request cancellation of the in-flight stream.
    ///
    /// Cooperative: the read loop aborts at its next suspension point, so
    /// at most one more chunk may be processed after this returns.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Clone of the cancellation token, for wiring into signal handlers.
    #[must_use]
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Whether the stream task has finished.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the stream to terminate and report its outcome.
    pub async fn join(self) -> StreamOutcome {
        self.task.await.unwrap_or(StreamOutcome::Failed)
    }
}

/// Spawn the stream task and return its handle.
pub(super) fn spawn_stream(
    http: reqwest::Client,
    url: String,
    token: String,
    request: SqlChatRequest,
    observer: Arc<dyn ChatStreamObserver>,
) -> ChatStreamHandle {
    let cancel = CancellationToken::new();
    let task = tokio::spawn(run_stream(
        http,
        url,
        token,
        request,
        observer,
        cancel.clone(),
    ));
    ChatStreamHandle { cancel, task }
}

async fn run_stream(
    http: reqwest::Client,
    url: String,
    token: String,
    request: SqlChatRequest,
    observer: Arc<dyn ChatStreamObserver>,
    cancel: CancellationToken,
) -> StreamOutcome {
    let send = http
        .post(&url)
        .bearer_auth(&token)
        .json(&request)
        .send();

    let response = tokio::select! {
        biased;
        _ = cancel.cancelled() => return StreamOutcome::Cancelled,
        result = send => match result {
            Ok(response) => response,
            Err(e) => {
                observer.on_error(&e.to_string());
                return StreamOutcome::Failed;
            }
        },
    };

    let status = response.status();
    if !status.is_success() {
        observer.on_error(&format!("HTTP {}", status.as_u16()));
        return StreamOutcome::Failed;
    }

    tracing::debug!(url = %url, "chat stream connected");
    pump_frames(response.bytes_stream().boxed(), observer.as_ref(), &cancel).await
}

/// Drive the frame decoder over a byte stream, dispatching each event.
///
/// One frame is fully dispatched before the next is decoded; cancellation
/// is observed at every chunk boundary.
async fn pump_frames<S, E>(
    stream: S,
    observer: &dyn ChatStreamObserver,
    cancel: &CancellationToken,
) -> StreamOutcome
where
    S: Stream<Item = Result<bytes::Bytes, E>> + Unpin,
    E: Display,
{
    let mut frames = SseFrameStream::new(stream);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return StreamOutcome::Cancelled,
            next = frames.next() => match next {
                Some(Ok(frame)) => {
                    if let Some(event) = parse_frame(&frame) {
                        dispatch(observer, event);
                    }
                }
                Some(Err(e)) => {
                    observer.on_error(&e.to_string());
                    return StreamOutcome::Failed;
                }
                None => return StreamOutcome::Completed,
            },
        }
    }
}
