use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex};

use tillsync_core::{EntityId, EntityRow, FieldValue};
use tillsync_engine::{RemoteError, RemoteStore};

#[derive(Default)]
struct RemoteState {
    tables: BTreeMap<String, BTreeMap<String, BTreeMap<String, FieldValue>>>,
    rejected_ids: HashSet<String>,
    upsert_calls: usize,
    update_calls: usize,
}

/// In-memory remote store with per-entity failure injection. Cloning shares
/// state, so a test can keep one handle for inspection while the engine owns
/// another.
#[derive(Clone, Default)]
pub struct MemoryRemote {
    state: Arc<Mutex<RemoteState>>,
}

impl MemoryRemote {
    pub fn new() -> Self {
        Self::default()
    }

    /// All writes targeting this entity fail until allowed again.
    pub fn reject_writes_to(&self, entity_id: EntityId) {
        self.lock().rejected_ids.insert(entity_id.to_string());
    }

    pub fn allow_writes_to(&self, entity_id: EntityId) {
        self.lock().rejected_ids.remove(&entity_id.to_string());
    }

    pub fn row(&self, table: &str, entity_id: EntityId) -> Option<BTreeMap<String, FieldValue>> {
        self.lock()
            .tables
            .get(table)
            .and_then(|rows| rows.get(&entity_id.to_string()))
            .cloned()
    }

    pub fn row_count(&self, table: &str) -> usize {
        self.lock().tables.get(table).map_or(0, |rows| rows.len())
    }

    pub fn upsert_calls(&self) -> usize {
        self.lock().upsert_calls
    }

    pub fn update_calls(&self) -> usize {
        self.lock().update_calls
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, RemoteState> {
        self.state.lock().expect("remote state poisoned")
    }
}

impl RemoteStore for MemoryRemote {
    fn upsert(
        &mut self,
        table: &str,
        row: &EntityRow,
        conflict_key: EntityId,
    ) -> Result<(), RemoteError> {
        let mut state = self.lock();
        state.upsert_calls += 1;
        let key = conflict_key.to_string();
        if state.rejected_ids.contains(&key) {
            return Err(RemoteError::Rejected(format!("row {key} rejected by policy")));
        }
        // Keyed replace: submitting the same row twice converges to one row.
        state
            .tables
            .entry(table.to_string())
            .or_default()
            .insert(key, row.fields.clone());
        Ok(())
    }

    fn update(
        &mut self,
        table: &str,
        patch: &[(String, FieldValue)],
        match_id: EntityId,
    ) -> Result<(), RemoteError> {
        let mut state = self.lock();
        state.update_calls += 1;
        let key = match_id.to_string();
        if state.rejected_ids.contains(&key) {
            return Err(RemoteError::Rejected(format!("row {key} rejected by policy")));
        }
        let row = state
            .tables
            .entry(table.to_string())
            .or_default()
            .entry(key)
            .or_default();
        for (field, value) in patch {
            row.insert(field.clone(), value.clone());
        }
        Ok(())
    }
}
