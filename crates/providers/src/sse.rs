//! Server-Sent Events plumbing shared by the HTTP providers.
//!
//! [`SseLineBuffer`] turns arbitrary byte chunks into complete SSE lines.
//! [`spawn_event_stream`] reads a response body on a background task, feeds
//! each line to a provider-specific [`SegmentParser`] and forwards the
//! resulting events through a channel.

use agentloop_core::error::ProviderError;
use agentloop_core::provider::EventStream;
use agentloop_core::stream::StreamEvent;
use futures::StreamExt;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, warn};

/// One meaningful SSE line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseLine {
    /// `data: <payload>`
    Data(String),
    /// `event: <name>`
    Event(String),
}

/// Splits a byte stream into SSE lines.
///
/// Bytes are buffered until a newline arrives, so a multi-byte UTF-8
/// character split across two network chunks is decoded intact. Blank
/// lines, comments (`:`) and fields other than `data`/`event` are skipped.
#[derive(Debug, Default)]
pub struct SseLineBuffer {
    buffer: Vec<u8>,
}

impl SseLineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append bytes and return every line they complete.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<SseLine> {
        self.buffer.extend_from_slice(bytes);

        let mut lines = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.buffer.drain(..=pos).collect();
            if let Some(line) = parse_line(&raw[..raw.len() - 1]) {
                lines.push(line);
            }
        }
        lines
    }

    /// Flush a trailing line that was not newline-terminated.
    pub fn finish(&mut self) -> Option<SseLine> {
        let raw = std::mem::take(&mut self.buffer);
        parse_line(&raw)
    }
}

fn parse_line(raw: &[u8]) -> Option<SseLine> {
    let text = String::from_utf8_lossy(raw);
    let line = text.trim_end_matches('\r');

    if line.is_empty() || line.starts_with(':') {
        return None;
    }

    if let Some(data) = line.strip_prefix("data:") {
        return Some(SseLine::Data(data.trim().to_string()));
    }
    if let Some(event) = line.strip_prefix("event:") {
        return Some(SseLine::Event(event.trim().to_string()));
    }
    None
}

/// Translates one provider's SSE lines into stream events.
pub trait SegmentParser: Send + 'static {
    /// Handle one line. Returning a `Done` event ends the segment.
    fn on_line(&mut self, line: SseLine) -> Vec<StreamEvent>;

    /// The body ended without a terminal event. Must end with `Done`.
    fn finish(&mut self) -> Vec<StreamEvent>;
}

/// The two-event segment reported for any transport failure.
pub fn failed_segment(reason: impl std::fmt::Display) -> Vec<StreamEvent> {
    vec![
        StreamEvent::error(format!("Error during streaming: {reason}")),
        StreamEvent::done(None),
    ]
}

/// The segment reported when a response body fails after streaming began.
pub fn interrupted_segment(reason: impl std::fmt::Display) -> Vec<StreamEvent> {
    failed_segment(ProviderError::StreamInterrupted(reason.to_string()))
}

/// A stream that only reports a failure.
pub fn failed_stream(reason: impl std::fmt::Display) -> EventStream {
    Box::pin(futures::stream::iter(failed_segment(reason)))
}

/// Pump `response` through `parser` on a background task.
pub fn spawn_event_stream<P: SegmentParser>(
    provider: &str,
    response: reqwest::Response,
    mut parser: P,
) -> EventStream {
    let (tx, rx) = tokio::sync::mpsc::channel(64);
    let provider = provider.to_string();

    tokio::spawn(async move {
        let mut byte_stream = response.bytes_stream();
        let mut lines = SseLineBuffer::new();

        while let Some(chunk_result) = byte_stream.next().await {
            let bytes = match chunk_result {
                Ok(b) => b,
                Err(e) => {
                    warn!(provider = %provider, error = %e, "Stream interrupted");
                    for event in interrupted_segment(e) {
                        let _ = tx.send(event).await;
                    }
                    return;
                }
            };

            for line in lines.push(&bytes) {
                for event in parser.on_line(line) {
                    let done = event.is_done();
                    if tx.send(event).await.is_err() {
                        debug!(provider = %provider, "Receiver dropped, stopping stream");
                        return;
                    }
                    if done {
                        return;
                    }
                }
            }
        }

        let mut tail = Vec::new();
        if let Some(line) = lines.finish() {
            tail = parser.on_line(line);
        }
        if !tail.iter().any(StreamEvent::is_done) {
            tail.extend(parser.finish());
        }
        for event in tail {
            let done = event.is_done();
            if tx.send(event).await.is_err() || done {
                return;
            }
        }
    });

    Box::pin(ReceiverStream::new(rx))
}
