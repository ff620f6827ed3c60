//! Snapshot and restore of the persisted UI subset.
//!
//! Saves go through a channel to a background writer that coalesces bursts
//! and writes the latest snapshot with `spawn_blocking`. Nothing here is
//! fatal: failed writes are logged and dropped, failed reads yield defaults.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use livesync_protocol::PersistableState;
use serde_json::{json, Value};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("Snapshot IO failed: {0}")]
    Io(#[from] io::Error),

    #[error("Snapshot encoding failed: {0}")]
    Json(#[from] serde_json::Error),
}

/// Serialize exactly the persisted keys.
pub fn snapshot(state: &PersistableState) -> Vec<u8> {
    json!({
        "count": state.count,
        "input_text": state.input_text,
        "todos": state.todos,
        "completed": state.completed,
    })
    .to_string()
    .into_bytes()
}

/// Decode a snapshot leniently.
///
/// Empty input, invalid JSON or a non-object yields the defaults. Inside an
/// object, a missing key or a key of the wrong type falls back to that key's
/// default; unknown keys are ignored.
pub fn restore(bytes: &[u8]) -> PersistableState {
    let Ok(Value::Object(map)) = serde_json::from_slice::<Value>(bytes) else {
        return PersistableState::default();
    };

    let strings = |key: &str| -> Vec<String> {
        map.get(key)
            .cloned()
            .and_then(|value| serde_json::from_value(value).ok())
            .unwrap_or_default()
    };

    PersistableState {
        count: map.get("count").and_then(Value::as_i64).unwrap_or(0),
        input_text: map
            .get("input_text")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        todos: strings("todos"),
        completed: strings("completed"),
    }
}

/// Where snapshots are stored
pub trait SnapshotSink: Send + Sync + 'static {
    fn save(&self, snapshot: &[u8]) -> Result<(), PersistenceError>;

    /// `Ok(None)` when nothing has been saved yet.
    fn load(&self) -> Result<Option<Vec<u8>>, PersistenceError>;
}

/// JSON file sink, replaced atomically via a temp file and rename
#[derive(Debug, Clone)]
pub struct FileSink {
    path: PathBuf,
}

impl FileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SnapshotSink for FileSink {
    fn save(&self, snapshot: &[u8]) -> Result<(), PersistenceError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let tmp_path = self.path.with_extension("json.tmp");
        fs::write(&tmp_path, snapshot)?;
        fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }

    fn load(&self) -> Result<Option<Vec<u8>>, PersistenceError> {
        match fs::read(&self.path) {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

/// Read the sink once at startup. Any failure falls back to defaults.
pub fn load_initial(sink: &dyn SnapshotSink) -> PersistableState {
    match sink.load() {
        Ok(Some(data)) => {
            let state = restore(&data);
            info!(
                component = "persistence",
                event = "persistence.restored",
                bytes = data.len(),
                todos = state.todos.len(),
                completed = state.completed.len(),
            );
            state
        }
        Ok(None) => {
            info!(
                component = "persistence",
                event = "persistence.no_snapshot",
                "No saved snapshot, using defaults"
            );
            PersistableState::default()
        }
        Err(e) => {
            warn!(
                component = "persistence",
                event = "persistence.load_failed",
                error = %e,
                "Failed to load snapshot, using defaults"
            );
            PersistableState::default()
        }
    }
}

/// Commands accepted by the persistence writer
#[derive(Debug)]
pub enum PersistCommand {
    /// Replace the pending snapshot
    Save { snapshot: Vec<u8> },

    /// Write the pending snapshot now and acknowledge
    Flush { reply: oneshot::Sender<()> },
}

/// Background writer that keeps only the newest pending snapshot
pub struct PersistenceWriter {
    rx: mpsc::Receiver<PersistCommand>,
    sink: Arc<dyn SnapshotSink>,
    pending: Option<Vec<u8>>,
    flush_interval: Duration,
}

impl PersistenceWriter {
    pub fn new(rx: mpsc::Receiver<PersistCommand>, sink: Arc<dyn SnapshotSink>) -> Self {
        Self {
            rx,
            sink,
            pending: None,
            flush_interval: Duration::from_millis(100),
        }
    }

    /// Run until every sender is dropped (call from tokio::spawn)
    pub async fn run(mut self) {
        debug!(component = "persistence", event = "persistence.writer_started");

        let mut interval = tokio::time::interval(self.flush_interval);

        loop {
            tokio::select! {
                cmd = self.rx.recv() => match cmd {
                    Some(PersistCommand::Save { snapshot }) => {
                        self.pending = Some(snapshot);
                    }
                    Some(PersistCommand::Flush { reply }) => {
                        self.flush().await;
                        let _ = reply.send(());
                    }
                    None => {
                        self.flush().await;
                        return;
                    }
                },

                _ = interval.tick() => {
                    if self.pending.is_some() {
                        self.flush().await;
                    }
                }
            }
        }
    }

    async fn flush(&mut self) {
        let Some(snapshot) = self.pending.take() else {
            return;
        };

        let sink = self.sink.clone();
        let bytes = snapshot.len();
        let result = tokio::task::spawn_blocking(move || sink.save(&snapshot)).await;

        match result {
            Ok(Ok(())) => {
                debug!(component = "persistence", event = "persistence.saved", bytes);
            }
            Ok(Err(e)) => {
                error!(
                    component = "persistence",
                    event = "persistence.save_failed",
                    error = %e,
                    "Snapshot save failed"
                );
            }
            Err(e) => {
                error!("spawn_blocking panicked: {}", e);
            }
        }
    }
}

/// Create a sender for the persistence writer
pub fn create_persistence_channel() -> (mpsc::Sender<PersistCommand>, mpsc::Receiver<PersistCommand>)
{
    mpsc::channel(256)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use proptest::prelude::*;

    #[derive(Default)]
    struct MemorySink {
        writes: Mutex<Vec<Vec<u8>>>,
    }

    impl SnapshotSink for MemorySink {
        fn save(&self, snapshot: &[u8]) -> Result<(), PersistenceError> {
            self.writes.lock().unwrap().push(snapshot.to_vec());
            Ok(())
        }

        fn load(&self) -> Result<Option<Vec<u8>>, PersistenceError> {
            Ok(self.writes.lock().unwrap().last().cloned())
        }
    }

    struct BrokenSink;

    impl SnapshotSink for BrokenSink {
        fn save(&self, _snapshot: &[u8]) -> Result<(), PersistenceError> {
            Err(io::Error::new(io::ErrorKind::PermissionDenied, "read-only").into())
        }

        fn load(&self) -> Result<Option<Vec<u8>>, PersistenceError> {
            Err(io::Error::new(io::ErrorKind::PermissionDenied, "read-only").into())
        }
    }

    fn sample() -> PersistableState {
        PersistableState {
            count: -4,
            input_text: "buy ".into(),
            todos: vec!["milk".into(), "eggs".into()],
            completed: vec!["bread".into()],
        }
    }

    #[test]
    fn snapshot_writes_only_persisted_keys() {
        let value: Value = serde_json::from_slice(&snapshot(&sample())).unwrap();
        let mut keys: Vec<&str> = value.as_object().unwrap().keys().map(String::as_str).collect();
        keys.sort_unstable();
        assert_eq!(keys, vec!["completed", "count", "input_text", "todos"]);
    }

    #[test]
    fn restore_garbage_or_empty_yields_defaults() {
        assert_eq!(restore(b""), PersistableState::default());
        assert_eq!(restore(b"not json"), PersistableState::default());
        assert_eq!(restore(b"[1,2,3]"), PersistableState::default());
        assert_eq!(restore(b"{\"count\": 3"), PersistableState::default());
    }

    #[test]
    fn restore_fills_missing_and_ignores_unknown_keys() {
        let state = restore(br#"{"count": 7, "stream_data": [{"a": 1}], "theme": "dark"}"#);
        assert_eq!(
            state,
            PersistableState {
                count: 7,
                ..PersistableState::default()
            }
        );
    }

    #[test]
    fn restore_wrong_typed_keys_fall_back_individually() {
        let state = restore(br#"{"count": "7", "input_text": "x", "todos": [1, "a"], "completed": ["done"]}"#);
        assert_eq!(state.count, 0);
        assert_eq!(state.input_text, "x");
        assert!(state.todos.is_empty());
        assert_eq!(state.completed, vec!["done".to_string()]);
    }

    #[test]
    fn file_sink_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FileSink::new(dir.path().join("nested").join("state.json"));

        assert!(sink.load().unwrap().is_none());
        sink.save(&snapshot(&sample())).unwrap();
        assert_eq!(load_initial(&sink), sample());
        assert!(!dir.path().join("nested").join("state.json.tmp").exists());
    }

    #[test]
    fn load_failure_yields_defaults() {
        assert_eq!(load_initial(&BrokenSink), PersistableState::default());
    }

    #[tokio::test]
    async fn writer_coalesces_to_latest_snapshot() {
        let sink = Arc::new(MemorySink::default());
        let (tx, rx) = create_persistence_channel();
        let writer = tokio::spawn(PersistenceWriter::new(rx, sink.clone()).run());

        for count in 1..=3 {
            let state = PersistableState {
                count,
                ..PersistableState::default()
            };
            tx.send(PersistCommand::Save {
                snapshot: snapshot(&state),
            })
            .await
            .unwrap();
        }
        let (reply, done) = oneshot::channel();
        tx.send(PersistCommand::Flush { reply }).await.unwrap();
        done.await.unwrap();

        let saved = load_initial(sink.as_ref());
        assert_eq!(saved.count, 3);

        drop(tx);
        writer.await.unwrap();
    }

    #[tokio::test]
    async fn writer_survives_sink_failures() {
        let (tx, rx) = create_persistence_channel();
        let writer = tokio::spawn(PersistenceWriter::new(rx, Arc::new(BrokenSink)).run());

        tx.send(PersistCommand::Save {
            snapshot: snapshot(&sample()),
        })
        .await
        .unwrap();
        let (reply, done) = oneshot::channel();
        tx.send(PersistCommand::Flush { reply }).await.unwrap();
        done.await.unwrap();

        drop(tx);
        writer.await.unwrap();
    }

    proptest! {
        #[test]
        fn snapshot_restore_round_trip(
            count in any::<i64>(),
            input_text in ".*",
            todos in proptest::collection::vec(".*", 0..8),
            completed in proptest::collection::vec(".*", 0..8),
        ) {
            let state = PersistableState { count, input_text, todos, completed };
            prop_assert_eq!(restore(&snapshot(&state)), state);
        }
    }
}
