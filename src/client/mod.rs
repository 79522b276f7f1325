//! HTTP client library for the sql-insight backend.
//!
//! Provides [`InsightClient`] for the REST surface (auth, sessions,
//! history, data sources, blocking chat) and the streaming chat entry
//! point. Every call injects the bearer token from the [`AuthContext`]
//! passed at construction; there is no ambient credential state.

mod error;
mod stream;

pub use error::{ClientError, Result};
pub use stream::{
    ChatStreamEvent, ChatStreamHandle, ChatStreamObserver, StreamOutcome, dispatch, parse_frame,
};

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::api::{
    ApiResponse, ChatRecord, DataSource, LoginRequest, SqlChatRequest, SqlChatResponse, UserInfo,
};
use crate::auth::AuthContext;

/// Timeout for ordinary REST calls. The chat stream is exempt: it is a
/// deliberately long-lived response.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Default page size when fetching the full session list.
const SESSION_PAGE_SIZE: u32 = 50;

/// HTTP client for the sql-insight backend.
#[derive(Debug, Clone)]
pub struct InsightClient {
    base_url: String,
    http: reqwest::Client,
    auth: AuthContext,
}

impl InsightClient {
    /// Create a new client pointing at the given base URL.
    ///
    /// Example: `InsightClient::new("http://localhost:8080", auth)`
    #[must_use]
    pub fn new(base_url: &str, auth: AuthContext) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
            auth,
        }
    }

    /// The authenticated user this client acts as.
    #[must_use]
    pub fn user(&self) -> &UserInfo {
        &self.auth.user
    }

    // ----------------------------------------------------------------------------
    // Auth
    // ----------------------------------------------------------------------------

    /// Log in and build the auth context for a new client.
    ///
    /// Calls `/auth/login` for the bearer token, then `/auth/me` for the
    /// user it belongs to.
    pub async fn login(base_url: &str, username: &str, password: &str) -> Result<AuthContext> {
        let base_url = base_url.trim_end_matches('/');
        let http = reqwest::Client::new();

        let response = http
            .post(format!("{base_url}/api/auth/login"))
            .timeout(REQUEST_TIMEOUT)
            .json(&LoginRequest {
                username: username.to_string(),
                password: password.to_string(),
            })
            .send()
            .await?;
        let token: String = unwrap_envelope(response).await?;

        let response = http
            .get(format!("{base_url}/api/auth/me"))
            .timeout(REQUEST_TIMEOUT)
            .bearer_auth(&token)
            .send()
            .await?;
        let user: UserInfo = unwrap_envelope(response).await?;

        Ok(AuthContext { token, user })
    }

    /// Invalidate the bearer token server-side.
    pub async fn logout(&self) -> Result<()> {
        let response = self
            .request(reqwest::Method::POST, "/api/auth/logout")
            .send()
            .await?;
        unwrap_empty(response).await
    }

    // ----------------------------------------------------------------------------
    // Sessions
    // ----------------------------------------------------------------------------

    /// Fetch one page of the session list, as raw JSON.
    ///
    /// The payload is returned undecoded because the server may answer with
    /// either a bare array or a pagination envelope; the session registry
    /// normalizes both (and degrades anything else to an empty list).
    pub async fn list_sessions(&self, current: u32, size: u32) -> Result<Value> {
        let response = self
            .request(reqwest::Method::GET, "/api/ai/sessions")
            .query(&[("current", current), ("size", size)])
            .send()
            .await?;

        let envelope: ApiResponse<Value> = decode_envelope(response).await?;
        check_code(envelope.code, envelope.message)?;
        Ok(envelope.data.unwrap_or(Value::Null))
    }

    /// Delete one session.
    pub async fn delete_session(&self, session_id: i64) -> Result<()> {
        let response = self
            .request(
                reqwest::Method::DELETE,
                &format!("/api/ai/sessions/{session_id}"),
            )
            .send()
            .await?;
        unwrap_empty(response).await
    }

    /// Rename a session.
    pub async fn rename_session(&self, session_id: i64, title: &str) -> Result<()> {
        let response = self
            .request(
                reqwest::Method::PUT,
                &format!("/api/ai/sessions/{session_id}/title"),
            )
            .query(&[("title", title)])
            .send()
            .await?;
        unwrap_empty(response).await
    }

    /// Delete several sessions in one call.
    pub async fn batch_delete_sessions(&self, session_ids: &[i64]) -> Result<()> {
        let response = self
            .request(reqwest::Method::DELETE, "/api/ai/sessions/batch")
            .json(&session_ids)
            .send()
            .await?;
        unwrap_empty(response).await
    }

    // ----------------------------------------------------------------------------
    // History
    // ----------------------------------------------------------------------------

    /// Full question/answer history of a session.
    pub async fn session_records(&self, session_id: i64) -> Result<Vec<ChatRecord>> {
        let response = self
            .request(
                reqwest::Method::GET,
                &format!("/api/ai/sessions/{session_id}/records"),
            )
            .send()
            .await?;
        unwrap_envelope(response).await
    }

    /// Re-execute the SQL of a history record whose cached result expired.
    pub async fn rerun_record(
        &self,
        record_id: i64,
    ) -> Result<Vec<serde_json::Map<String, Value>>> {
        let response = self
            .request(
                reqwest::Method::POST,
                &format!("/api/ai/records/{record_id}/rerun"),
            )
            .send()
            .await?;
        unwrap_envelope(response).await
    }

    // ----------------------------------------------------------------------------
    // Chat
    // ----------------------------------------------------------------------------

    /// Ask a question in blocking mode: the full answer in one response.
    pub async fn chat(&self, request: &SqlChatRequest) -> Result<SqlChatResponse> {
        let response = self
            .request(reqwest::Method::POST, "/api/ai/chat")
            .json(request)
            .send()
            .await?;
        unwrap_envelope(response).await
    }

    /// Ask a question in streaming mode.
    ///
    /// Returns immediately; the observer's methods are invoked on a spawned
    /// task as frames arrive, in arrival order. Use the returned handle to
    /// cancel mid-stream (which never invokes `on_error`) and to await the
    /// transport-level outcome. One request is in flight per handle.
    pub fn stream_chat(
        &self,
        request: SqlChatRequest,
        observer: Arc<dyn ChatStreamObserver>,
    ) -> ChatStreamHandle {
        stream::spawn_stream(
            self.http.clone(),
            format!("{}/api/ai/chat/stream", self.base_url),
            self.auth.token.clone(),
            request,
            observer,
        )
    }

    // ----------------------------------------------------------------------------
    // Data Sources
    // ----------------------------------------------------------------------------

    /// Data sources the current user may query.
    pub async fn my_data_sources(&self) -> Result<Vec<DataSource>> {
        let response = self
            .request(reqwest::Method::GET, "/api/data-sources/my")
            .send()
            .await?;
        unwrap_envelope(response).await
    }

    // ----------------------------------------------------------------------------
    // Helpers
    // ----------------------------------------------------------------------------

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        self.http
            .request(method, format!("{}{path}", self.base_url))
            .timeout(REQUEST_TIMEOUT)
            .bearer_auth(&self.auth.token)
    }
}

/// Decode the response envelope, mapping non-2xx statuses to an error.
async fn decode_envelope<T: DeserializeOwned>(
    response: reqwest::Response,
) -> Result<ApiResponse<T>> {
    let status = response.status();
    if !status.is_success() {
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(ClientError::Unauthorized(format!(
                "HTTP {}",
                status.as_u16()
            )));
        }
        return Err(ClientError::Api {
            code: i64::from(status.as_u16()),
            message: format!("HTTP {}", status.as_u16()),
        });
    }
    Ok(response.json().await?)
}

fn check_code(code: i64, message: String) -> Result<()> {
    match code {
        200 => Ok(()),
        401 => Err(ClientError::Unauthorized(message)),
        _ => Err(ClientError::Api { code, message }),
    }
}

/// Unwrap an envelope whose `data` field is required.
async fn unwrap_envelope<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    let envelope: ApiResponse<T> = decode_envelope(response).await?;
    check_code(envelope.code, envelope.message)?;
    envelope
        .data
        .ok_or_else(|| ClientError::UnexpectedResponse("missing data field".to_string()))
}

/// Unwrap an envelope whose `data` field is irrelevant (usually null).
async fn unwrap_empty(response: reqwest::Response) -> Result<()> {
    let envelope: ApiResponse<Value> = decode_envelope(response).await?;
    check_code(envelope.code, envelope.message)
}

// ============================================================================
// Session Directory
// ============================================================================

/// The two operations the session registry needs from the backend.
///
/// Seam for testing the registry against an in-memory fake.
#[async_trait]
pub trait SessionDirectory: Send + Sync {
    /// Fetch the session list as raw JSON (bare array or pagination
    /// envelope, depending on the server).
    async fn fetch_sessions(&self) -> Result<Value>;

    /// Delete one session.
    async fn delete_session(&self, session_id: i64) -> Result<()>;
}

#[async_trait]
impl SessionDirectory for InsightClient {
    async fn fetch_sessions(&self) -> Result<Value> {
        self.list_sessions(1, SESSION_PAGE_SIZE).await
    }

    async fn delete_session(&self, session_id: i64) -> Result<()> {
        InsightClient::delete_session(self, session_id).await
    }
}
