use std::sync::{Arc, Mutex};

use tillsync_core::{EntityId, EntityRow, FieldValue, MutationRecord};
use tillsync_engine::{
    FlushOptions, FlushOutcome, ObserverRegistry, OutboxConfig, OutboxQueue, QueueObserver,
    SyncEngine,
};
use tillsync_storage::{ScopedStore, SqliteStore, StorageError};

use crate::remote::MemoryRemote;
use crate::session::{ScriptedAuth, SharedSession, Toggle};

#[derive(Default)]
struct ObserverLog {
    queue_changes: Vec<(String, usize)>,
    flush_summaries: Vec<FlushOutcome>,
}

/// Observer that records every notification for later assertions.
#[derive(Clone, Default)]
pub struct RecordingObserver {
    log: Arc<Mutex<ObserverLog>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue_changes(&self) -> Vec<(String, usize)> {
        self.log.lock().expect("observer log poisoned").queue_changes.clone()
    }

    pub fn flush_summaries(&self) -> Vec<FlushOutcome> {
        self.log.lock().expect("observer log poisoned").flush_summaries.clone()
    }
}

impl QueueObserver for RecordingObserver {
    fn queue_changed(&self, queue_key: &str, len: usize) {
        self.log
            .lock()
            .expect("observer log poisoned")
            .queue_changes
            .push((queue_key.to_string(), len));
    }

    fn flush_completed(&self, outcome: &FlushOutcome) {
        self.log
            .lock()
            .expect("observer log poisoned")
            .flush_summaries
            .push(*outcome);
    }
}

/// One device running the full stack: switchable session, scripted auth,
/// in-memory remote, togglable connectivity, recording observer, and a sync
/// engine over the inventory outbox.
pub struct TestDevice {
    pub session: SharedSession,
    pub auth: ScriptedAuth,
    pub remote: MemoryRemote,
    pub connectivity: Toggle,
    pub observer: RecordingObserver,
    pub engine: SyncEngine<MutationRecord>,
}

impl TestDevice {
    pub fn new() -> Result<Self, StorageError> {
        Self::with_store(SqliteStore::open_in_memory()?)
    }

    /// Open against an on-disk store; two devices opened on the same path in
    /// sequence model an app restart.
    pub fn open(path: &str) -> Result<Self, StorageError> {
        Self::with_store(SqliteStore::open(path)?)
    }

    pub fn with_store(store: SqliteStore) -> Result<Self, StorageError> {
        let session = SharedSession::new();
        let auth = ScriptedAuth::live("owner@shop.example");
        let remote = MemoryRemote::new();
        let connectivity = Toggle::online();
        let observer = RecordingObserver::new();

        let observers = ObserverRegistry::new();
        observers.subscribe(Arc::new(observer.clone()));

        let outbox = OutboxQueue::new(
            OutboxConfig::inventory(),
            ScopedStore::new(store),
            Arc::new(session.clone()),
            observers.clone(),
        );
        let engine = SyncEngine::new(
            outbox,
            Box::new(auth.clone()),
            Box::new(remote.clone()),
            Box::new(connectivity.clone()),
            observers,
        );

        Ok(Self {
            session,
            auth,
            remote,
            connectivity,
            observer,
            engine,
        })
    }

    pub fn signed_in(business_id: &str, local_user_id: &str) -> Result<Self, StorageError> {
        let device = Self::new()?;
        device.session.sign_in(business_id, local_user_id);
        Ok(device)
    }

    /// Queue an upsert for a fresh product and return its id.
    pub fn queue_upsert(&mut self, name: &str, price_cents: i64) -> EntityId {
        let entity_id = EntityId::new();
        self.queue_upsert_with_id(entity_id, name, price_cents);
        entity_id
    }

    pub fn queue_upsert_with_id(&mut self, entity_id: EntityId, name: &str, price_cents: i64) {
        let row = EntityRow::new(entity_id)
            .with_field("name", FieldValue::Text(name.to_string()))
            .with_field("price_cents", FieldValue::Integer(price_cents));
        self.engine.enqueue(MutationRecord::upsert(row));
    }

    pub fn queue_archive(&mut self, entity_id: EntityId) {
        self.engine.enqueue(MutationRecord::archive(entity_id));
    }

    pub fn queue_set_field(&mut self, entity_id: EntityId, field_key: &str, value: FieldValue) {
        self.engine
            .enqueue(MutationRecord::set_field(entity_id, field_key, value));
    }

    pub fn flush(&mut self) -> FlushOutcome {
        self.engine.flush(FlushOptions::default())
    }

    pub fn flush_silent(&mut self) -> FlushOutcome {
        self.engine.flush(FlushOptions { silent: true })
    }
}
