//! Streaming reader transport
//!
//! Opens one long-lived GET and splits the body into frames. Handles both
//! SSE framing (`data:` lines accumulated until a blank line) and
//! newline-delimited payloads. Every other non-empty line (comments,
//! `event:`/`id:`/`retry:` fields) is passed through as its own frame so
//! heartbeats stay observable downstream.

use bytes::BytesMut;
use futures::StreamExt;
use livesync_connector_core::{EventSink, Transport, TransportError};
use reqwest::header::{ACCEPT, CACHE_CONTROL, CONTENT_TYPE};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

pub const EVENT_STREAM_MIME: &str = "text/event-stream";

/// Longest line kept; the rest of a longer line is discarded.
pub const MAX_LINE_BYTES: usize = 1024 * 1024;

/// Incremental line decoder for a streamed body.
#[derive(Debug)]
pub struct FrameDecoder {
    pending: BytesMut,
    /// Bytes of `pending` already known to hold no newline.
    scanned: usize,
    /// Dropping an oversized line up to its newline.
    discarding: bool,
    max_line: usize,
    data_lines: Vec<String>,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::with_max_line(MAX_LINE_BYTES)
    }
}

impl FrameDecoder {
    pub fn with_max_line(max_line: usize) -> Self {
        Self {
            pending: BytesMut::new(),
            scanned: 0,
            discarding: false,
            max_line,
            data_lines: Vec::new(),
        }
    }

    /// Feed a chunk; returns every frame completed by it, in order.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);

        let mut frames = Vec::new();
        while let Some(offset) = self.pending[self.scanned..].iter().position(|b| *b == b'\n') {
            let pos = self.scanned + offset;
            let line = self.pending.split_to(pos + 1);
            self.scanned = 0;
            if self.discarding {
                self.discarding = false;
                continue;
            }
            let decoded = String::from_utf8_lossy(&line[..pos]);
            let text = decoded.strip_suffix('\r').unwrap_or(&*decoded);
            self.handle_line(text, &mut frames);
        }

        if self.pending.len() > self.max_line {
            if !self.discarding {
                warn!(
                    component = "sse_transport",
                    event = "sse.line_too_long",
                    max_line = self.max_line,
                    "Discarding oversized line"
                );
            }
            self.pending.clear();
            self.discarding = true;
        }
        self.scanned = self.pending.len();
        frames
    }

    /// Flush a trailing partial line and any accumulated `data:` lines.
    pub fn finish(&mut self) -> Vec<String> {
        let mut frames = Vec::new();
        self.scanned = 0;
        if std::mem::take(&mut self.discarding) {
            self.pending.clear();
        }
        if !self.pending.is_empty() {
            let rest = self.pending.split();
            let decoded = String::from_utf8_lossy(&rest);
            let text = decoded.trim_end_matches('\r');
            if !text.is_empty() {
                self.handle_line(text, &mut frames);
            }
        }
        self.dispatch_data(&mut frames);
        frames
    }

    fn handle_line(&mut self, line: &str, frames: &mut Vec<String>) {
        if line.is_empty() {
            self.dispatch_data(frames);
            return;
        }

        if let Some(rest) = line.strip_prefix("data:") {
            let value = rest.strip_prefix(' ').unwrap_or(rest);
            self.data_lines.push(value.to_string());
            return;
        }

        let trimmed = line.trim();
        if !trimmed.is_empty() {
            frames.push(trimmed.to_string());
        }
    }

    fn dispatch_data(&mut self, frames: &mut Vec<String>) {
        if !self.data_lines.is_empty() {
            frames.push(self.data_lines.join("\n"));
            self.data_lines.clear();
        }
    }
}

/// Server-sent events over a streamed HTTP response
#[derive(Debug, Clone, Default)]
pub struct SseTransport {
    client: reqwest::Client,
}

impl SseTransport {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl Transport for SseTransport {
    fn name(&self) -> &'static str {
        "sse"
    }

    fn spawn(&self, url: &str, sink: EventSink) -> JoinHandle<()> {
        let client = self.client.clone();
        let url = url.to_string();
        tokio::spawn(async move {
            if let Err(err) = read_stream(&client, &url, &sink).await {
                warn!(
                    component = "sse_transport",
                    event = "sse.stream_failed",
                    attempt = sink.attempt(),
                    error = %err,
                    "SSE stream failed"
                );
                sink.error(err);
            }
        })
    }
}

pub(crate) fn is_event_stream(content_type: &str) -> bool {
    content_type
        .split(';')
        .next()
        .map(|mime| mime.trim().eq_ignore_ascii_case(EVENT_STREAM_MIME))
        .unwrap_or(false)
}

/// Returns `Ok` only when the consumer went away; a finished stream is an error.
async fn read_stream(
    client: &reqwest::Client,
    url: &str,
    sink: &EventSink,
) -> Result<(), TransportError> {
    let response = client
        .get(url)
        .header(ACCEPT, EVENT_STREAM_MIME)
        .header(CACHE_CONTROL, "no-cache")
        .send()
        .await
        .map_err(|e| TransportError::Connect(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        return Err(TransportError::Status {
            status: status.as_u16(),
        });
    }

    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string();
    if !is_event_stream(&content_type) {
        debug!(
            component = "sse_transport",
            event = "sse.line_mode",
            content_type = %content_type,
            "Response is not an event stream, reading as line-delimited frames"
        );
    }

    if !sink.open() {
        return Ok(());
    }

    let mut decoder = FrameDecoder::default();
    let mut body = response.bytes_stream();
    while let Some(chunk) = body.next().await {
        let chunk = chunk.map_err(|e| TransportError::Read(e.to_string()))?;
        for frame in decoder.push(&chunk) {
            if !sink.message(frame) {
                return Ok(());
            }
        }
    }

    for frame in decoder.finish() {
        if !sink.message(frame) {
            return Ok(());
        }
    }

    Err(TransportError::Ended)
}
