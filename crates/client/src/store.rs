//! Reactive UI state store
//!
//! Writers go through scoped mutations that publish one new snapshot and
//! fire one notification per scope. Readers load the latest snapshot
//! lock-free and may hold it across a render.

use std::sync::{Arc, Mutex, MutexGuard};

use arc_swap::ArcSwap;
use livesync_protocol::{ConnectionState, PersistableState, StreamRecord};
use tokio::sync::watch;
use tracing::debug;

use crate::record_buffer::RecordBuffer;
use crate::transition::STATUS_DISCONNECTED;

/// Everything a view renders, as of one revision
#[derive(Debug, Clone)]
pub struct UiState {
    pub revision: u64,
    pub persisted: PersistableState,
    /// Arrival order; views render newest first.
    pub records: Vec<Arc<StreamRecord>>,
    pub connection: ConnectionState,
    pub status: String,
}

impl UiState {
    pub fn is_connected(&self) -> bool {
        self.connection.is_connected()
    }
}

/// Which part of the state a scoped mutation touches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Persisted,
    Records,
    Connection,
}

struct Inner {
    revision: u64,
    persisted: PersistableState,
    buffer: RecordBuffer,
    connection: ConnectionState,
    status: String,
}

impl Inner {
    fn to_ui_state(&self) -> UiState {
        UiState {
            revision: self.revision,
            persisted: self.persisted.clone(),
            records: self.buffer.snapshot(),
            connection: self.connection,
            status: self.status.clone(),
        }
    }
}

pub struct Store {
    inner: Mutex<Inner>,
    snapshot: ArcSwap<UiState>,
    revision_tx: watch::Sender<u64>,
}

impl Store {
    pub fn new(initial: PersistableState, buffer_capacity: usize) -> Self {
        let inner = Inner {
            revision: 0,
            persisted: initial,
            buffer: RecordBuffer::new(buffer_capacity),
            connection: ConnectionState::Disconnected,
            status: STATUS_DISCONNECTED.to_string(),
        };
        let snapshot = ArcSwap::from_pointee(inner.to_ui_state());
        let (revision_tx, _) = watch::channel(0);
        Self {
            inner: Mutex::new(inner),
            snapshot,
            revision_tx,
        }
    }

    /// Lock-free read of the latest published state.
    pub fn get(&self) -> Arc<UiState> {
        self.snapshot.load_full()
    }

    /// Receiver that observes one change per committed mutation.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision_tx.subscribe()
    }

    /// Scoped mutation of the persisted fields. `f` reports whether it
    /// changed anything; a change notifies exactly once, no change not at all.
    pub fn mutate_persisted<R>(
        &self,
        f: impl FnOnce(&mut PersistableState) -> (bool, R),
    ) -> R {
        let mut inner = self.lock();
        let (changed, result) = f(&mut inner.persisted);
        if changed {
            self.commit(&mut inner, Field::Persisted);
        }
        result
    }

    /// Append a decoded record. Returns the buffer length afterwards.
    pub fn append_record(&self, record: StreamRecord) -> usize {
        let mut inner = self.lock();
        inner.buffer.append(record);
        let len = inner.buffer.len();
        self.commit(&mut inner, Field::Records);
        len
    }

    /// Clear the record buffer, returning the prior count.
    pub fn clear_records(&self) -> usize {
        let mut inner = self.lock();
        let count = inner.buffer.clear();
        self.commit(&mut inner, Field::Records);
        count
    }

    /// Publish connection state and status text. No-op when unchanged.
    pub fn set_connection(&self, connection: ConnectionState, status: &str) -> bool {
        let mut inner = self.lock();
        if inner.connection == connection && inner.status == status {
            return false;
        }
        inner.connection = connection;
        inner.status = status.to_string();
        self.commit(&mut inner, Field::Connection);
        true
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn commit(&self, inner: &mut Inner, field: Field) {
        inner.revision += 1;
        self.snapshot.store(Arc::new(inner.to_ui_state()));
        self.revision_tx.send_replace(inner.revision);
        debug!(
            component = "store",
            event = "store.committed",
            revision = inner.revision,
            field = ?field,
        );
    }
}
