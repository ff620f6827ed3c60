//! LiveSync Connector Core
//!
//! The stream connection contract shared by every transport.
//! A transport runs as a tokio task and reports `Open`, `Message` and
//! `Error` events through an [`EventSink`] tagged with the attempt that
//! spawned it, so late events from a replaced connection can be ignored.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

/// Monotonic identifier of one connection attempt.
pub type AttemptId = u64;

/// Errors reported by a transport
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("Failed to connect: {0}")]
    Connect(String),

    #[error("Unexpected HTTP status {status}")]
    Status { status: u16 },

    #[error("Stream read error: {0}")]
    Read(String),

    #[error("Stream ended by server")]
    Ended,

    #[error("Request failed: {0}")]
    Request(String),
}

/// Lifecycle and data events emitted by a transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Open,
    Message(String),
    Error(TransportError),
}

/// A transport event together with the attempt it belongs to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaggedEvent {
    pub attempt: AttemptId,
    pub event: TransportEvent,
}

/// Create the channel transports deliver into.
pub fn create_event_channel() -> (
    mpsc::UnboundedSender<TaggedEvent>,
    mpsc::UnboundedReceiver<TaggedEvent>,
) {
    mpsc::unbounded_channel()
}

/// Delivery side handed to a transport for a single attempt.
///
/// Sends never block, so a transport reading frames is never held up by the
/// consumer. Every method returns `false` once the consumer is gone.
#[derive(Debug, Clone)]
pub struct EventSink {
    attempt: AttemptId,
    tx: mpsc::UnboundedSender<TaggedEvent>,
}

impl EventSink {
    pub fn new(attempt: AttemptId, tx: mpsc::UnboundedSender<TaggedEvent>) -> Self {
        Self { attempt, tx }
    }

    pub fn attempt(&self) -> AttemptId {
        self.attempt
    }

    pub fn open(&self) -> bool {
        self.emit(TransportEvent::Open)
    }

    pub fn message(&self, frame: impl Into<String>) -> bool {
        self.emit(TransportEvent::Message(frame.into()))
    }

    pub fn error(&self, error: TransportError) -> bool {
        self.emit(TransportEvent::Error(error))
    }

    fn emit(&self, event: TransportEvent) -> bool {
        self.tx
            .send(TaggedEvent {
                attempt: self.attempt,
                event,
            })
            .is_ok()
    }
}

/// A way of reaching the remote feed.
///
/// Implementations spawn one task per call and report through the sink.
/// The task is aborted when its [`ConnectionHandle`] is closed or dropped.
pub trait Transport: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    fn spawn(&self, url: &str, sink: EventSink) -> JoinHandle<()>;
}

/// Ownership of one live transport task.
#[derive(Debug)]
pub struct ConnectionHandle {
    attempt: AttemptId,
    task: JoinHandle<()>,
}

impl ConnectionHandle {
    pub fn attempt(&self) -> AttemptId {
        self.attempt
    }
}

impl Drop for ConnectionHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Single-owner slot for the live connection.
///
/// `open` while a handle exists and `close` while empty are both no-ops, since
/// several lifecycle hooks may race to trigger the same action.
pub struct StreamConnection {
    transport: Arc<dyn Transport>,
    url: String,
    slot: Option<ConnectionHandle>,
}

impl StreamConnection {
    pub fn new(transport: Arc<dyn Transport>, url: impl Into<String>) -> Self {
        Self {
            transport,
            url: url.into(),
            slot: None,
        }
    }

    pub fn transport_name(&self) -> &'static str {
        self.transport.name()
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Open a connection for `sink`'s attempt. Returns false if one is already open.
    pub fn open(&mut self, sink: EventSink) -> bool {
        if let Some(existing) = &self.slot {
            debug!(
                component = "stream_connection",
                event = "stream_connection.open_skipped",
                attempt = existing.attempt,
                "Connection already open, skipping duplicate"
            );
            return false;
        }

        let attempt = sink.attempt();
        let task = self.transport.spawn(&self.url, sink);
        self.slot = Some(ConnectionHandle { attempt, task });
        debug!(
            component = "stream_connection",
            event = "stream_connection.opened",
            attempt,
            transport = self.transport.name(),
            url = %self.url,
        );
        true
    }

    /// Close and release the handle. Returns false if nothing was open.
    pub fn close(&mut self) -> bool {
        match self.slot.take() {
            Some(handle) => {
                debug!(
                    component = "stream_connection",
                    event = "stream_connection.closed",
                    attempt = handle.attempt,
                );
                drop(handle);
                true
            }
            None => false,
        }
    }

    pub fn is_open(&self) -> bool {
        self.slot.is_some()
    }

    pub fn current_attempt(&self) -> Option<AttemptId> {
        self.slot.as_ref().map(ConnectionHandle::attempt)
    }
}
