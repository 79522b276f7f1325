//! SSE (Server-Sent Events) frame decoder for the chat stream.
//!
//! Adapts a raw byte-chunk stream into complete protocol frames:
//! - Byte buffering and incremental UTF-8 decoding (a chunk may end in the
//!   middle of a multi-byte character; those bytes are held until the rest
//!   arrives)
//! - Line splitting (handles both `\n` and `\r\n`)
//! - Field parsing (`event:`, `data:`, `:` comments)
//! - Frame assembly (fields accumulate until a blank line)
//!
//! The protocol terminates every complete frame with a blank line, so a
//! partially accumulated frame at end-of-stream is incomplete and is
//! discarded rather than emitted.

use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures::Stream;

/// A protocol line extracted from the stream.
#[derive(Debug, Clone, PartialEq)]
pub enum SseLine {
    /// A `data:` line with the payload (prefix stripped).
    Data(String),
    /// An `event:` line with the event kind.
    Event(String),
    /// An empty line (frame boundary).
    Empty,
    /// A comment (`:`-prefixed) or unrecognized field line.
    Comment(String),
}

/// A complete frame assembled from one or more lines.
#[derive(Debug, Clone, PartialEq)]
pub struct SseFrame {
    /// Value of the last `event:` line, if any.
    pub event: Option<String>,
    /// `data:` line values joined with `\n`, or `None` if the frame carried
    /// no data line at all.
    pub data: Option<String>,
}

fn parse_line(line: &str) -> SseLine {
    if line.is_empty() {
        return SseLine::Empty;
    }

    if let Some(data) = line.strip_prefix("data:") {
        let data = data.strip_prefix(' ').unwrap_or(data);
        return SseLine::Data(data.to_string());
    }

    if let Some(event) = line.strip_prefix("event:") {
        let event = event.strip_prefix(' ').unwrap_or(event);
        return SseLine::Event(event.to_string());
    }

    if let Some(comment) = line.strip_prefix(':') {
        let comment = comment.strip_prefix(' ').unwrap_or(comment);
        return SseLine::Comment(comment.to_string());
    }

    // Unknown field, treat as comment
    SseLine::Comment(line.to_string())
}

/// A stream adapter that parses protocol lines from a byte stream.
///
/// Handles buffering, incremental UTF-8 conversion, and line splitting.
/// A final line without a terminating newline is treated as incomplete
/// and never emitted.
pub struct SseLineStream<S> {
    inner: S,
    /// Undecoded bytes: at most one incomplete UTF-8 sequence tail.
    pending: Vec<u8>,
    /// Decoded text not yet split into lines.
    buffer: String,
    done: bool,
}

impl<S> SseLineStream<S> {
    #[must_use]
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            pending: Vec::new(),
            buffer: String::new(),
            done: false,
        }
    }

    /// Append a chunk, decoding every complete UTF-8 sequence into the text
    /// buffer. Malformed sequences become U+FFFD; an incomplete trailing
    /// sequence stays in `pending` until more bytes arrive.
    fn push_chunk(&mut self, chunk: &[u8]) {
        self.pending.extend_from_slice(chunk);

        loop {
            match std::str::from_utf8(&self.pending) {
                Ok(text) => {
                    self.buffer.push_str(text);
                    self.pending.clear();
                    return;
                }
                Err(e) => {
                    let valid_len = e.valid_up_to();
                    if let Ok(text) = std::str::from_utf8(&self.pending[..valid_len]) {
                        self.buffer.push_str(text);
                    }
                    match e.error_len() {
                        Some(bad) => {
                            self.buffer.push(char::REPLACEMENT_CHARACTER);
                            self.pending.drain(..valid_len + bad);
                        }
                        None => {
                            // Incomplete multi-byte sequence at the end of
                            // the chunk; wait for the next chunk.
                            self.pending.drain(..valid_len);
                            return;
                        }
                    }
                }
            }
        }
    }
}

impl<S, E> Stream for SseLineStream<S>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
{
    type Item = Result<SseLine, E>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.done {
            return Poll::Ready(None);
        }

        loop {
            // Try to extract a complete line from the buffer
            if let Some(line_end) = self.buffer.find('\n') {
                let mut line = self.buffer[..line_end].to_string();
                self.buffer = self.buffer[line_end + 1..].to_string();

                // Strip trailing \r if present (for \r\n endings)
                if line.ends_with('\r') {
                    line.pop();
                }

                return Poll::Ready(Some(Ok(parse_line(&line))));
            }

            // Need more data from the underlying stream
            match Pin::new(&mut self.inner).poll_next(cx) {
                Poll::Ready(Some(Ok(bytes))) => {
                    self.push_chunk(&bytes);
                    // Continue loop to try splitting
                }
                Poll::Ready(Some(Err(e))) => {
                    return Poll::Ready(Some(Err(e)));
                }
                Poll::Ready(None) => {
                    self.done = true;
                    // An unterminated final line is incomplete; drop it.
                    return Poll::Ready(None);
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

#[derive(Default)]
struct FrameBuilder {
    event: Option<String>,
    data_lines: Vec<String>,
}

impl FrameBuilder {
    fn push_line(&mut self, line: SseLine) {
        match line {
            SseLine::Data(data) => self.data_lines.push(data),
            SseLine::Event(event) => self.event = Some(event),
            SseLine::Empty | SseLine::Comment(_) => {}
        }
    }

    fn has_content(&self) -> bool {
        self.event.is_some() || !self.data_lines.is_empty()
    }

    fn build(&mut self) -> SseFrame {
        let event = self.event.take();
        let data = if self.data_lines.is_empty() {
            None
        } else {
            Some(self.data_lines.join("\n"))
        };
        self.data_lines.clear();
        SseFrame { event, data }
    }
}

/// A stream adapter that emits assembled frames.
///
/// Frames are delimited by blank lines. The final partial frame at stream
/// end (no trailing blank line) is discarded as incomplete.
pub struct SseFrameStream<S> {
    inner: SseLineStream<S>,
    builder: FrameBuilder,
    done: bool,
}

impl<S> SseFrameStream<S> {
    #[must_use]
    pub fn new(inner: S) -> Self {
        Self {
            inner: SseLineStream::new(inner),
            builder: FrameBuilder::default(),
            done: false,
        }
    }
}

impl<S, E> Stream for SseFrameStream<S>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
{
    type Item = Result<SseFrame, E>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.done {
            return Poll::Ready(None);
        }

        loop {
            match Pin::new(&mut self.inner).poll_next(cx) {
                Poll::Ready(Some(Ok(line))) => match line {
                    SseLine::Empty => {
                        if self.builder.has_content() {
                            return Poll::Ready(Some(Ok(self.builder.build())));
                        }
                    }
                    SseLine::Comment(_) => {}
                    other => self.builder.push_line(other),
                },
                Poll::Ready(Some(Err(e))) => return Poll::Ready(Some(Err(e))),
                Poll::Ready(None) => {
                    self.done = true;
                    return Poll::Ready(None);
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    fn bytes_stream(
        chunks: Vec<&str>,
    ) -> impl Stream<Item = Result<Bytes, std::convert::Infallible>> {
        futures::stream::iter(chunks.into_iter().map(|s| Ok(Bytes::from(s.to_string()))))
    }

    fn byte_chunks(
        chunks: Vec<Vec<u8>>,
    ) -> impl Stream<Item = Result<Bytes, std::convert::Infallible>> {
        futures::stream::iter(chunks.into_iter().map(|b| Ok(Bytes::from(b))))
    }

    async fn collect_frames(
        chunks: Vec<Vec<u8>>,
    ) -> Vec<SseFrame> {
        SseFrameStream::new(byte_chunks(chunks))
            .map(|r| r.unwrap())
            .collect()
            .await
    }

    // ==========================================================================
    // SseLineStream
    // ==========================================================================

    #[tokio::test]
    async fn parses_data_lines() {
        let stream = bytes_stream(vec!["data: hello\n", "data: world\n"]);
        let mut lines = SseLineStream::new(stream);

        assert_eq!(
            lines.next().await.unwrap().unwrap(),
            SseLine::Data("hello".to_string())
        );
        assert_eq!(
            lines.next().await.unwrap().unwrap(),
            SseLine::Data("world".to_string())
        );
        assert!(lines.next().await.is_none());
    }

    #[tokio::test]
    async fn handles_crlf_line_endings() {
        let stream = bytes_stream(vec!["data: test\r\n"]);
        let mut lines = SseLineStream::new(stream);

        assert_eq!(
            lines.next().await.unwrap().unwrap(),
            SseLine::Data("test".to_string())
        );
    }

    #[tokio::test]
    async fn parses_event_lines() {
        let stream = bytes_stream(vec!["event: stage\ndata: content\n"]);
        let mut lines = SseLineStream::new(stream);

        assert_eq!(
            lines.next().await.unwrap().unwrap(),
            SseLine::Event("stage".to_string())
        );
        assert_eq!(
            lines.next().await.unwrap().unwrap(),
            SseLine::Data("content".to_string())
        );
    }

    #[tokio::test]
    async fn handles_chunked_data() {
        // A line split across multiple chunks
        let stream = bytes_stream(vec!["dat", "a: hel", "lo\n"]);
        let mut lines = SseLineStream::new(stream);

        assert_eq!(
            lines.next().await.unwrap().unwrap(),
            SseLine::Data("hello".to_string())
        );
    }

    #[tokio::test]
    async fn handles_chunk_split_inside_multibyte_character() {
        // "好" is three bytes; split after the first one
        let text = "data: 好\n".as_bytes();
        let split = text.iter().position(|&b| b == 0xe5).unwrap() + 1;
        let chunks = vec![text[..split].to_vec(), text[split..].to_vec()];
        let mut lines = SseLineStream::new(byte_chunks(chunks));

        assert_eq!(
            lines.next().await.unwrap().unwrap(),
            SseLine::Data("好".to_string())
        );
    }

    #[tokio::test]
    async fn replaces_malformed_byte_sequences() {
        // 0xff can never start a UTF-8 sequence
        let chunks = vec![b"data: a\xffb\n".to_vec()];
        let mut lines = SseLineStream::new(byte_chunks(chunks));

        assert_eq!(
            lines.next().await.unwrap().unwrap(),
            SseLine::Data("a\u{fffd}b".to_string())
        );
    }

    #[tokio::test]
    async fn data_without_space_after_colon() {
        let stream = bytes_stream(vec!["data:no-space\n"]);
        let mut lines = SseLineStream::new(stream);

        assert_eq!(
            lines.next().await.unwrap().unwrap(),
            SseLine::Data("no-space".to_string())
        );
    }

    #[tokio::test]
    async fn handles_comments() {
        let stream = bytes_stream(vec![": keep-alive\ndata: value\n"]);
        let mut lines = SseLineStream::new(stream);

        assert_eq!(
            lines.next().await.unwrap().unwrap(),
            SseLine::Comment("keep-alive".to_string())
        );
        assert_eq!(
            lines.next().await.unwrap().unwrap(),
            SseLine::Data("value".to_string())
        );
    }

    #[test]
    fn unknown_field_becomes_comment() {
        assert_eq!(
            parse_line("retry: 3000"),
            SseLine::Comment("retry: 3000".to_string())
        );
    }

    #[test]
    fn comment_without_space() {
        assert_eq!(
            parse_line(":keepalive"),
            SseLine::Comment("keepalive".to_string())
        );
    }

    #[tokio::test]
    async fn drops_unterminated_final_line() {
        let stream = bytes_stream(vec!["data: complete\n", "data: partial"]);
        let mut lines = SseLineStream::new(stream);

        assert_eq!(
            lines.next().await.unwrap().unwrap(),
            SseLine::Data("complete".to_string())
        );
        assert!(lines.next().await.is_none());
    }

    #[tokio::test]
    async fn handles_empty_stream() {
        let stream = bytes_stream(vec![]);
        let mut lines = SseLineStream::new(stream);

        assert!(lines.next().await.is_none());
    }

    // ==========================================================================
    // SseFrameStream
    // ==========================================================================

    #[tokio::test]
    async fn assembles_frame_from_event_and_data() {
        let stream = bytes_stream(vec!["event: stage\n", "data: {\"message\":\"x\"}\n", "\n"]);
        let mut frames = SseFrameStream::new(stream);

        let frame = frames.next().await.unwrap().unwrap();
        assert_eq!(frame.event, Some("stage".to_string()));
        assert_eq!(frame.data, Some("{\"message\":\"x\"}".to_string()));
        assert!(frames.next().await.is_none());
    }

    #[tokio::test]
    async fn aggregates_multiline_data() {
        let stream = bytes_stream(vec!["data: hello\n", "data: world\n", "\n"]);
        let mut frames = SseFrameStream::new(stream);

        let frame = frames.next().await.unwrap().unwrap();
        assert_eq!(frame.data, Some("hello\nworld".to_string()));
        assert!(frame.event.is_none());
    }

    #[tokio::test]
    async fn multiple_frames_in_stream() {
        let stream = bytes_stream(vec![
            "data: first\n",
            "\n",
            "data: second\n",
            "\n",
            "data: third\n",
            "\n",
        ]);
        let frames: Vec<_> = SseFrameStream::new(stream)
            .map(|r| r.unwrap())
            .collect()
            .await;

        assert_eq!(frames.len(), 3);
        assert_eq!(frames[0].data.as_deref(), Some("first"));
        assert_eq!(frames[1].data.as_deref(), Some("second"));
        assert_eq!(frames[2].data.as_deref(), Some("third"));
    }

    #[tokio::test]
    async fn frame_without_data_line_has_none_data() {
        let stream = bytes_stream(vec!["event: done\n", "\n"]);
        let mut frames = SseFrameStream::new(stream);

        let frame = frames.next().await.unwrap().unwrap();
        assert_eq!(frame.event, Some("done".to_string()));
        assert!(frame.data.is_none());
    }

    #[tokio::test]
    async fn discards_unterminated_trailing_frame() {
        // The final frame never sees its blank-line delimiter
        let stream = bytes_stream(vec!["data: kept\n", "\n", "event: done\n", "data: {}\n"]);
        let frames: Vec<_> = SseFrameStream::new(stream)
            .map(|r| r.unwrap())
            .collect()
            .await;

        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].data.as_deref(), Some("kept"));
    }

    #[tokio::test]
    async fn comments_ignored_in_frame_assembly() {
        let stream = bytes_stream(vec![
            ": heartbeat\n",
            "data: value\n",
            ": another\n",
            "\n",
        ]);
        let mut frames = SseFrameStream::new(stream);

        let frame = frames.next().await.unwrap().unwrap();
        assert_eq!(frame.data.as_deref(), Some("value"));
    }

    #[tokio::test]
    async fn blank_lines_without_content_skipped() {
        let stream = bytes_stream(vec!["\n", "\n", "data: payload\n", "\n"]);
        let frames: Vec<_> = SseFrameStream::new(stream)
            .map(|r| r.unwrap())
            .collect()
            .await;

        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].data.as_deref(), Some("payload"));
    }

    #[tokio::test]
    async fn last_event_line_wins() {
        let stream = bytes_stream(vec!["event: stage\n", "event: sql\n", "data: {}\n", "\n"]);
        let mut frames = SseFrameStream::new(stream);

        let frame = frames.next().await.unwrap().unwrap();
        assert_eq!(frame.event, Some("sql".to_string()));
    }

    #[tokio::test]
    async fn frame_stream_empty_input() {
        let stream = bytes_stream(vec![]);
        let mut frames = SseFrameStream::new(stream);

        assert!(frames.next().await.is_none());
    }

    // ==========================================================================
    // Split invariance
    // ==========================================================================

    /// Splitting the byte stream at any offset must yield the same frames as
    /// the unsplit stream, including splits inside the delimiter and inside
    /// multi-byte characters.
    #[tokio::test]
    async fn split_point_does_not_change_decoded_frames() {
        let doc = "event: stage\ndata: {\"message\":\"解析中\"}\n\nevent: data\ndata: {\"rows\":[{\"a\":1}],\"total\":1,\"sessionId\":7}\n\nevent: done\ndata: {}\n\n";
        let bytes = doc.as_bytes();

        let reference = collect_frames(vec![bytes.to_vec()]).await;
        assert_eq!(reference.len(), 3);

        for split in 1..bytes.len() {
            let chunks = vec![bytes[..split].to_vec(), bytes[split..].to_vec()];
            let frames = collect_frames(chunks).await;
            assert_eq!(frames, reference, "mismatch at split offset {split}");
        }
    }

    #[tokio::test]
    async fn three_way_splits_preserve_frames() {
        let doc = "event: summary\ndata: {\"token\":\"总\"}\n\nevent: done\ndata: {}\n\n";
        let bytes = doc.as_bytes();
        let reference = collect_frames(vec![bytes.to_vec()]).await;

        for first in 1..bytes.len() - 1 {
            let second = first + (bytes.len() - first) / 2;
            let chunks = vec![
                bytes[..first].to_vec(),
                bytes[first..second].to_vec(),
                bytes[second..].to_vec(),
            ];
            assert_eq!(
                collect_frames(chunks).await,
                reference,
                "mismatch at splits {first}/{second}"
            );
        }
    }
}
