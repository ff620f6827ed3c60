//! Frame decode pipeline
//!
//! Frame receipt returns immediately; classification runs in a separate task
//! fed by a single FIFO queue, so frames reach the record buffer in arrival
//! order and a slow decode never holds up the transport.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use livesync_protocol::Classified;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use crate::classifier::classify;
use crate::store::Store;

/// Counters for frames that went through the pipeline
#[derive(Debug, Default)]
pub struct PipelineStats {
    structured: AtomicU64,
    noise: AtomicU64,
}

impl PipelineStats {
    pub fn structured(&self) -> u64 {
        self.structured.load(Ordering::Relaxed)
    }

    pub fn noise(&self) -> u64 {
        self.noise.load(Ordering::Relaxed)
    }

    pub fn processed(&self) -> u64 {
        self.structured() + self.noise()
    }
}

/// Submission side of the pipeline (cheap to Clone)
#[derive(Clone)]
pub struct FramePipeline {
    tx: mpsc::UnboundedSender<String>,
    stats: Arc<PipelineStats>,
}

impl FramePipeline {
    /// Spawn the decode task. It exits once every `FramePipeline` clone is
    /// dropped and the queue is drained.
    pub fn spawn(store: Arc<Store>) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let stats = Arc::new(PipelineStats::default());
        let task = tokio::spawn(decode_loop(rx, store, stats.clone()));
        (Self { tx, stats }, task)
    }

    /// Queue a raw frame. Returns false if the decode task is gone.
    pub fn submit(&self, frame: String) -> bool {
        self.tx.send(frame).is_ok()
    }

    pub fn stats(&self) -> Arc<PipelineStats> {
        self.stats.clone()
    }
}

async fn decode_loop(
    mut rx: mpsc::UnboundedReceiver<String>,
    store: Arc<Store>,
    stats: Arc<PipelineStats>,
) {
    while let Some(frame) = rx.recv().await {
        match classify(&frame) {
            Classified::Structured(record) => {
                stats.structured.fetch_add(1, Ordering::Relaxed);
                let len = store.append_record(record);
                trace!(
                    component = "pipeline",
                    event = "pipeline.record_appended",
                    buffered = len,
                );
            }
            Classified::Noise(kind) => {
                stats.noise.fetch_add(1, Ordering::Relaxed);
                debug!(
                    component = "pipeline",
                    event = "pipeline.noise",
                    kind = %kind,
                    sse_control = kind.is_sse_control(),
                    preview = %preview(&frame),
                );
            }
        }
    }
    debug!(component = "pipeline", event = "pipeline.stopped");
}

fn preview(frame: &str) -> &str {
    match frame.char_indices().nth(120) {
        Some((idx, _)) => &frame[..idx],
        None => frame,
    }
}
