//! LiveSync Connectors
//!
//! Concrete transports for the stream connection contract.
//! Each transport reaches the remote feed its own way and reports
//! through the shared `EventSink`.

pub mod polling;
pub mod probe;
pub mod records;
pub mod sse;

use std::sync::Arc;
use std::time::Duration;

use livesync_connector_core::Transport;

pub use polling::PollingTransport;
pub use probe::{probe_transport, TransportKind};
pub use records::{patch_record, RecordWriteError};
pub use sse::{FrameDecoder, SseTransport};

/// Build the transport for a resolved kind.
pub fn build_transport(
    kind: TransportKind,
    client: reqwest::Client,
    poll_interval: Duration,
    poll_url: Option<String>,
) -> Arc<dyn Transport> {
    match kind {
        TransportKind::Sse => Arc::new(SseTransport::new(client)),
        TransportKind::Polling => Arc::new(PollingTransport::new(client, poll_interval, poll_url)),
    }
}
