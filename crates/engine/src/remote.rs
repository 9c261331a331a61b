use thiserror::Error;

use tillsync_core::{EntityId, EntityRow, FieldValue};

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("remote rejected write: {0}")]
    Rejected(String),

    #[error("remote unreachable: {0}")]
    Unreachable(String),
}

/// The remote relational store the outbox drains into. Implementations must
/// guarantee idempotent effect when the same `conflict_key` and payload are
/// submitted twice; at-least-once replay depends on it.
pub trait RemoteStore {
    /// Insert-or-update a full row, keyed by the entity's stable identifier.
    fn upsert(
        &mut self,
        table: &str,
        row: &EntityRow,
        conflict_key: EntityId,
    ) -> Result<(), RemoteError>;

    /// Field-scoped update of an existing row.
    fn update(
        &mut self,
        table: &str,
        patch: &[(String, FieldValue)],
        match_id: EntityId,
    ) -> Result<(), RemoteError>;
}

/// Advisory online/offline signal. A false positive only makes a flush fail
/// fast instead of hanging; it is never trusted for correctness.
pub trait ConnectivitySignal {
    fn is_online(&self) -> bool;
}
