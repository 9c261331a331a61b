use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use tillsync_core::{QueueEnvelope, QueuedMutation, ScopeResolver, TenantScope};
use tillsync_storage::{ReadOptions, ScopedStore, SqliteStore};

use crate::notify::ObserverRegistry;

pub const INVENTORY_QUEUE_KEY: &str = "outbox.inventory";
pub const FEEDBACK_QUEUE_KEY: &str = "outbox.feedback";

/// Feedback submissions are bursty and expendable; the queue keeps the newest
/// fifty and drops the oldest over that.
pub const FEEDBACK_QUEUE_CAP: usize = 50;

#[derive(Debug, Clone)]
pub struct OutboxConfig {
    /// Key the queue persists under (per scope namespace).
    pub storage_key: String,
    /// `None` for transactional queues that must never lose records.
    pub max_records: Option<usize>,
}

impl OutboxConfig {
    pub fn unbounded(storage_key: impl Into<String>) -> Self {
        Self {
            storage_key: storage_key.into(),
            max_records: None,
        }
    }

    pub fn capped(storage_key: impl Into<String>, max_records: usize) -> Self {
        Self {
            storage_key: storage_key.into(),
            max_records: Some(max_records),
        }
    }

    pub fn inventory() -> Self {
        Self::unbounded(INVENTORY_QUEUE_KEY)
    }

    pub fn feedback() -> Self {
        Self::capped(FEEDBACK_QUEUE_KEY, FEEDBACK_QUEUE_CAP)
    }
}

impl Default for OutboxConfig {
    fn default() -> Self {
        Self::inventory()
    }
}

/// Append-only, per-scope sequence of pending mutations. The in-memory map is
/// the authoritative in-process state; the scoped store mirrors it with
/// best-effort durability, so a persistence failure never loses the mutation
/// the user just made. Producers only ever `enqueue`; `replace_all` belongs to
/// the sync engine.
pub struct OutboxQueue<R> {
    config: OutboxConfig,
    store: ScopedStore<SqliteStore>,
    resolver: Arc<dyn ScopeResolver>,
    observers: ObserverRegistry,
    live: HashMap<String, Vec<QueuedMutation<R>>>,
}

impl<R> OutboxQueue<R>
where
    R: Serialize + DeserializeOwned + Clone,
{
    pub fn new(
        config: OutboxConfig,
        store: ScopedStore<SqliteStore>,
        resolver: Arc<dyn ScopeResolver>,
        observers: ObserverRegistry,
    ) -> Self {
        Self {
            config,
            store,
            resolver,
            observers,
            live: HashMap::new(),
        }
    }

    pub fn storage_key(&self) -> &str {
        &self.config.storage_key
    }

    /// Append a record under the scope active right now, evicting the oldest
    /// entries if the queue is owner-bounded.
    pub fn enqueue(&mut self, record: R) {
        let scope = self.resolver.resolve();
        let max = self.config.max_records;

        let queue = self.loaded_queue(&scope);
        queue.push(QueuedMutation::new(record));

        let mut evicted = 0;
        if let Some(max) = max {
            while queue.len() > max {
                queue.remove(0);
                evicted += 1;
            }
        }
        let len = queue.len();

        if evicted > 0 {
            debug!(
                queue = %self.config.storage_key,
                evicted,
                "queue over cap; dropped oldest records"
            );
        }
        self.persist(&scope);
        self.observers.notify_queue_changed(&self.config.storage_key, len);
    }

    /// Snapshot of the queue for the scope active at call time.
    pub fn current_queue(&mut self) -> Vec<QueuedMutation<R>> {
        let scope = self.resolver.resolve();
        self.loaded_queue(&scope).clone()
    }

    /// Queue length for badge counters. No network, no store round-trip after
    /// the first load per scope.
    pub fn count(&mut self) -> usize {
        let scope = self.resolver.resolve();
        self.loaded_queue(&scope).len()
    }

    /// Records carrying failure metadata, for support tooling.
    pub fn failed_records(&mut self) -> Vec<QueuedMutation<R>> {
        let scope = self.resolver.resolve();
        self.loaded_queue(&scope)
            .iter()
            .filter(|m| m.has_failed())
            .cloned()
            .collect()
    }

    /// Overwrite the full sequence for the currently active scope. Scope is
    /// resolved fresh here, not reused from flush start, per the contract for
    /// identity switches between snapshot and write-back.
    pub fn replace_all(&mut self, records: Vec<QueuedMutation<R>>) {
        let scope = self.resolver.resolve();
        let len = records.len();
        self.live.insert(scope.key().as_str().to_string(), records);
        self.persist(&scope);
        self.observers.notify_queue_changed(&self.config.storage_key, len);
    }

    fn loaded_queue(&mut self, scope: &TenantScope) -> &mut Vec<QueuedMutation<R>> {
        let key = scope.key().as_str().to_string();
        match self.live.entry(key) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                entry.insert(load_from_store(&self.store, &self.config, scope))
            }
        }
    }

    fn persist(&mut self, scope: &TenantScope) {
        let Some(records) = self.live.get(scope.key().as_str()) else {
            return;
        };
        let envelope = match QueueEnvelope::seal(records) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(
                    queue = %self.config.storage_key,
                    error = %e,
                    "failed to encode queue; keeping in-memory state only"
                );
                return;
            }
        };
        if let Err(e) = self.store.write(&self.config.storage_key, &envelope, scope) {
            warn!(
                queue = %self.config.storage_key,
                error = %e,
                "failed to persist queue; keeping in-memory state only"
            );
        }
    }
}

fn load_from_store<R: DeserializeOwned>(
    store: &ScopedStore<SqliteStore>,
    config: &OutboxConfig,
    scope: &TenantScope,
) -> Vec<QueuedMutation<R>> {
    let envelope = store.read(
        &config.storage_key,
        QueueEnvelope::empty(),
        ReadOptions {
            scope,
            migrate_legacy: true,
        },
    );
    match envelope.open() {
        Ok(decoded) => {
            if decoded.quarantined > 0 {
                warn!(
                    queue = %config.storage_key,
                    quarantined = decoded.quarantined,
                    "dropped records of unknown shape while loading queue"
                );
            }
            decoded.records
        }
        Err(e) => {
            warn!(
                queue = %config.storage_key,
                error = %e,
                "stored queue unreadable; starting empty"
            );
            Vec::new()
        }
    }
}
