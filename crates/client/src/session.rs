//! Live session lifecycle
//!
//! Wires the store, persistence writer, decode pipeline and supervisor
//! together. Constructed once per view, torn down with `shutdown`.

use std::sync::Arc;

use livesync_connector_core::{StreamConnection, Transport};
use livesync_connectors::probe::DEFAULT_PROBE_TIMEOUT;
use livesync_connectors::{build_transport, probe_transport, TransportKind};
use livesync_protocol::{new_id, UserAction};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::actions;
use crate::config::{SyncConfig, TransportChoice};
use crate::persistence::{
    self, create_persistence_channel, load_initial, PersistCommand, PersistenceWriter,
    SnapshotSink,
};
use crate::pipeline::{FramePipeline, PipelineStats};
use crate::store::Store;
use crate::supervisor::SupervisorHandle;

/// Pick the transport for a feed, probing it when the choice is `auto`.
pub async fn resolve_transport(config: &SyncConfig, client: &reqwest::Client) -> Arc<dyn Transport> {
    let kind = match config.transport {
        TransportChoice::Sse => TransportKind::Sse,
        TransportChoice::Polling => TransportKind::Polling,
        TransportChoice::Auto => {
            probe_transport(client, &config.feed_url, DEFAULT_PROBE_TIMEOUT).await
        }
    };
    build_transport(
        kind,
        client.clone(),
        config.poll_interval,
        config.poll_url.clone(),
    )
}

pub struct LiveSession {
    id: String,
    config: SyncConfig,
    store: Arc<Store>,
    supervisor: SupervisorHandle,
    pipeline: FramePipeline,
    persist_tx: mpsc::Sender<PersistCommand>,
    mount_task: Option<JoinHandle<()>>,
    tasks: Vec<JoinHandle<()>>,
}

impl LiveSession {
    /// Restore the snapshot and spawn the background tasks. Does not connect.
    pub fn start(
        config: SyncConfig,
        sink: Arc<dyn SnapshotSink>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        let id = new_id();
        let initial = load_initial(sink.as_ref());
        let store = Arc::new(Store::new(initial, config.buffer_capacity));

        let (persist_tx, persist_rx) = create_persistence_channel();
        let writer = tokio::spawn(PersistenceWriter::new(persist_rx, sink).run());

        let (pipeline, pipeline_task) = FramePipeline::spawn(store.clone());
        let connection = StreamConnection::new(transport, config.feed_url.clone());
        let (supervisor, supervisor_task) =
            SupervisorHandle::spawn(connection, config.timing, store.clone(), pipeline.clone());

        info!(
            component = "session",
            event = "session.started",
            session_id = %id,
            feed_url = %config.feed_url,
            buffer_capacity = config.buffer_capacity,
        );

        Self {
            id,
            config,
            store,
            supervisor,
            pipeline,
            persist_tx,
            mount_task: None,
            tasks: vec![supervisor_task, pipeline_task, writer],
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn store(&self) -> Arc<Store> {
        self.store.clone()
    }

    pub fn pipeline_stats(&self) -> Arc<PipelineStats> {
        self.pipeline.stats()
    }

    /// Immediate start plus a delayed lifecycle trigger. Both collapse to
    /// one connection.
    pub async fn mount(&mut self) {
        self.supervisor.start_if_not_running().await;

        let supervisor = self.supervisor.clone();
        let delay = self.config.auto_connect_delay;
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            supervisor.start_if_not_running().await;
        });
        if let Some(previous) = self.mount_task.replace(task) {
            previous.abort();
        }
    }

    pub async fn dispatch(&self, action: UserAction) {
        debug!(
            component = "session",
            event = "session.action",
            session_id = %self.id,
            action = ?action,
            stream_control = action.is_stream_control(),
        );

        match action {
            UserAction::Connect => self.supervisor.start_if_not_running().await,
            UserAction::Disconnect => self.supervisor.disconnect().await,
            UserAction::ClearRecords => {
                let cleared = self.store.clear_records();
                info!(
                    component = "session",
                    event = "session.records_cleared",
                    session_id = %self.id,
                    cleared,
                );
            }
            action => {
                let snapshot = self.store.mutate_persisted(|state| {
                    let outcome = actions::apply(state, &action);
                    let snapshot = outcome.persist.then(|| persistence::snapshot(state));
                    (outcome.changed, snapshot)
                });
                if let Some(snapshot) = snapshot {
                    self.save(snapshot).await;
                }
            }
        }
    }

    /// Queue a snapshot for the writer. Failures are logged only.
    pub async fn save(&self, snapshot: Vec<u8>) {
        if self
            .persist_tx
            .send(PersistCommand::Save { snapshot })
            .await
            .is_err()
        {
            warn!(
                component = "session",
                event = "session.persist_closed",
                session_id = %self.id,
                "Persistence writer gone, snapshot dropped"
            );
        }
    }

    /// Wait until every queued snapshot has been written.
    pub async fn flush(&self) {
        let (reply, done) = oneshot::channel();
        if self
            .persist_tx
            .send(PersistCommand::Flush { reply })
            .await
            .is_ok()
        {
            let _ = done.await;
        }
    }

    /// Disconnect, drain the pipeline and write the final snapshot.
    pub async fn shutdown(mut self) {
        if let Some(task) = self.mount_task.take() {
            task.abort();
        }
        self.supervisor.shutdown().await;
        self.flush().await;

        let Self {
            id,
            supervisor,
            pipeline,
            persist_tx,
            tasks,
            ..
        } = self;
        let stats = pipeline.stats();
        drop(pipeline);
        drop(persist_tx);
        for task in tasks {
            let _ = task.await;
        }

        info!(
            component = "session",
            event = "session.stopped",
            session_id = %id,
            attempts = supervisor.snapshot().attempt,
            structured = stats.structured(),
            noise = stats.noise(),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    use livesync_connector_core::EventSink;
    use livesync_protocol::{ConnectionState, PersistableState};

    use crate::persistence::PersistenceError;

    #[derive(Default)]
    struct MemorySink {
        saved: Mutex<Option<Vec<u8>>>,
        loads: AtomicUsize,
        saves: AtomicUsize,
    }

    impl MemorySink {
        fn with(state: &PersistableState) -> Self {
            Self {
                saved: Mutex::new(Some(persistence::snapshot(state))),
                ..Self::default()
            }
        }

        fn restored(&self) -> PersistableState {
            persistence::restore(self.saved.lock().unwrap().as_deref().unwrap_or_default())
        }
    }

    impl SnapshotSink for MemorySink {
        fn save(&self, snapshot: &[u8]) -> Result<(), PersistenceError> {
            self.saves.fetch_add(1, Ordering::SeqCst);
            *self.saved.lock().unwrap() = Some(snapshot.to_vec());
            Ok(())
        }

        fn load(&self) -> Result<Option<Vec<u8>>, PersistenceError> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            Ok(self.saved.lock().unwrap().clone())
        }
    }

    /// Opens immediately, replays fixed frames, then idles.
    #[derive(Default)]
    struct FeedTransport {
        frames: Vec<String>,
        spawned: Arc<AtomicUsize>,
    }

    impl Transport for FeedTransport {
        fn name(&self) -> &'static str {
            "feed"
        }

        fn spawn(&self, _url: &str, sink: EventSink) -> JoinHandle<()> {
            self.spawned.fetch_add(1, Ordering::SeqCst);
            let frames = self.frames.clone();
            tokio::spawn(async move {
                sink.open();
                for frame in frames {
                    sink.message(frame);
                }
                std::future::pending::<()>().await;
            })
        }
    }

    fn config() -> SyncConfig {
        SyncConfig::new("http://127.0.0.1/feed")
    }

    #[tokio::test]
    async fn restores_snapshot_once_before_connecting() {
        let saved = PersistableState {
            count: 9,
            todos: vec!["water plants".into()],
            ..PersistableState::default()
        };
        let sink = Arc::new(MemorySink::with(&saved));
        let session = LiveSession::start(config(), sink.clone(), Arc::new(FeedTransport::default()));

        let state = session.store().get();
        assert_eq!(state.persisted, saved);
        assert_eq!(state.connection, ConnectionState::Disconnected);
        assert_eq!(sink.loads.load(Ordering::SeqCst), 1);

        session.shutdown().await;
        assert_eq!(sink.loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn mutating_actions_are_saved() {
        let sink = Arc::new(MemorySink::default());
        let session = LiveSession::start(config(), sink.clone(), Arc::new(FeedTransport::default()));

        session.dispatch(UserAction::Increment).await;
        session
            .dispatch(UserAction::SetInput {
                text: " milk ".into(),
            })
            .await;
        session.dispatch(UserAction::AddTodo).await;
        session.dispatch(UserAction::CompleteTodo { index: 0 }).await;
        session.flush().await;

        let saved = sink.restored();
        assert_eq!(saved.count, 1);
        assert!(saved.todos.is_empty());
        assert_eq!(saved.completed, vec!["milk".to_string()]);
        assert!(saved.input_text.is_empty());

        session.shutdown().await;
    }

    #[tokio::test]
    async fn input_edits_alone_are_not_saved() {
        let sink = Arc::new(MemorySink::default());
        let session = LiveSession::start(config(), sink.clone(), Arc::new(FeedTransport::default()));

        session
            .dispatch(UserAction::SetInput {
                text: "draft".into(),
            })
            .await;
        session.shutdown().await;

        assert_eq!(sink.saves.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn out_of_range_actions_leave_the_store_untouched() {
        let saved = PersistableState {
            todos: vec!["water plants".into()],
            ..PersistableState::default()
        };
        let sink = Arc::new(MemorySink::with(&saved));
        let session = LiveSession::start(config(), sink.clone(), Arc::new(FeedTransport::default()));
        let store = session.store();
        let mut revisions = store.subscribe();

        session.dispatch(UserAction::CompleteTodo { index: 5 }).await;
        session.dispatch(UserAction::RemoveCompleted { index: 0 }).await;
        session.dispatch(UserAction::AddTodo).await;
        session.flush().await;

        assert!(!revisions.has_changed().unwrap());
        assert_eq!(store.get().revision, 0);
        assert_eq!(sink.saves.load(Ordering::SeqCst), 0);

        session.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn mount_collapses_to_one_connection() {
        let spawned = Arc::new(AtomicUsize::new(0));
        let transport = FeedTransport {
            frames: vec![":".into(), "{\"id\":1}".into(), "{\"id\":2}".into()],
            spawned: spawned.clone(),
        };
        let mut session =
            LiveSession::start(config(), Arc::new(MemorySink::default()), Arc::new(transport));

        session.mount().await;
        tokio::time::sleep(Duration::from_secs(1)).await;

        assert_eq!(spawned.load(Ordering::SeqCst), 1);
        let state = session.store().get();
        assert!(state.is_connected());
        assert_eq!(state.records.len(), 2);
        assert_eq!(session.pipeline_stats().noise(), 1);

        session.dispatch(UserAction::ClearRecords).await;
        assert!(session.store().get().records.is_empty());

        session.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn disconnect_then_connect_reopens() {
        let spawned = Arc::new(AtomicUsize::new(0));
        let transport = FeedTransport {
            spawned: spawned.clone(),
            ..FeedTransport::default()
        };
        let mut session =
            LiveSession::start(config(), Arc::new(MemorySink::default()), Arc::new(transport));

        session.mount().await;
        tokio::time::sleep(Duration::from_secs(1)).await;
        session.dispatch(UserAction::Disconnect).await;
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(
            session.store().get().connection,
            ConnectionState::Disconnected
        );

        session.dispatch(UserAction::Connect).await;
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(spawned.load(Ordering::SeqCst), 2);
        assert!(session.store().get().is_connected());

        session.shutdown().await;
    }
}
