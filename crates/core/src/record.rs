use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::clock::now_ms;
use crate::error::CoreError;
use crate::field_value::FieldValue;
use crate::ids::{EntityId, MutationId};

/// Full-entity payload of an upsert: the stable id plus every field the row
/// should end up with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityRow {
    pub entity_id: EntityId,
    pub fields: BTreeMap<String, FieldValue>,
}

impl EntityRow {
    pub fn new(entity_id: EntityId) -> Self {
        Self {
            entity_id,
            fields: BTreeMap::new(),
        }
    }

    pub fn with_field(mut self, key: impl Into<String>, value: FieldValue) -> Self {
        self.fields.insert(key.into(), value);
        self
    }

    pub fn field(&self, key: &str) -> Option<&FieldValue> {
        self.fields.get(key)
    }
}

/// One pending inventory mutation. Closed sum type: a variant unknown to this
/// build fails to decode and is quarantined by the queue envelope rather than
/// crashing the reader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MutationRecord {
    UpsertEntity {
        entity: EntityRow,
        queued_at: i64,
    },
    ArchiveEntity {
        entity_id: EntityId,
        queued_at: i64,
    },
    SetField {
        entity_id: EntityId,
        field_key: String,
        value: FieldValue,
        queued_at: i64,
    },
}

impl MutationRecord {
    pub fn upsert(entity: EntityRow) -> Self {
        Self::UpsertEntity {
            entity,
            queued_at: now_ms(),
        }
    }

    pub fn archive(entity_id: EntityId) -> Self {
        Self::ArchiveEntity {
            entity_id,
            queued_at: now_ms(),
        }
    }

    pub fn set_field(entity_id: EntityId, field_key: impl Into<String>, value: FieldValue) -> Self {
        Self::SetField {
            entity_id,
            field_key: field_key.into(),
            value,
            queued_at: now_ms(),
        }
    }

    /// The entity this mutation targets.
    pub fn entity_id(&self) -> EntityId {
        match self {
            Self::UpsertEntity { entity, .. } => entity.entity_id,
            Self::ArchiveEntity { entity_id, .. } | Self::SetField { entity_id, .. } => *entity_id,
        }
    }

    pub fn queued_at(&self) -> i64 {
        match self {
            Self::UpsertEntity { queued_at, .. }
            | Self::ArchiveEntity { queued_at, .. }
            | Self::SetField { queued_at, .. } => *queued_at,
        }
    }

    /// String name of the mutation kind for logging.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::UpsertEntity { .. } => "UpsertEntity",
            Self::ArchiveEntity { .. } => "ArchiveEntity",
            Self::SetField { .. } => "SetField",
        }
    }
}

/// Bursty, low-priority submissions queued alongside the transactional
/// inventory outbox. Its queue is owner-bounded; inventory is not.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeedbackRecord {
    Submit {
        feedback_id: EntityId,
        message: String,
        rating: Option<i64>,
        queued_at: i64,
    },
}

impl FeedbackRecord {
    pub fn submit(message: impl Into<String>, rating: Option<i64>) -> Self {
        Self::Submit {
            feedback_id: EntityId::new(),
            message: message.into(),
            rating,
            queued_at: now_ms(),
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Submit { .. } => "Submit",
        }
    }
}

/// Attached to a record after a failed replay attempt (or an authentication
/// block); absent on records that have never failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureMeta {
    pub last_error: String,
    pub last_attempt_at: i64,
}

impl FailureMeta {
    pub fn now(error: impl Into<String>) -> Self {
        Self {
            last_error: error.into(),
            last_attempt_at: now_ms(),
        }
    }
}

/// A record as it sits in the outbox: the payload plus queue-level metadata.
/// `mutation_id` is stable across retries so support tooling can follow one
/// mutation through repeated flush attempts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueuedMutation<R> {
    pub mutation_id: MutationId,
    pub record: R,
    pub failure: Option<FailureMeta>,
}

impl<R> QueuedMutation<R> {
    pub fn new(record: R) -> Self {
        Self {
            mutation_id: MutationId::new(),
            record,
            failure: None,
        }
    }

    pub fn has_failed(&self) -> bool {
        self.failure.is_some()
    }

    pub fn mark_failed(&mut self, error: impl Into<String>) {
        self.failure = Some(FailureMeta::now(error));
    }
}

impl<R: Serialize> QueuedMutation<R> {
    pub fn to_msgpack(&self) -> Result<Vec<u8>, CoreError> {
        rmp_serde::to_vec(self).map_err(|e| CoreError::Serialization(e.to_string()))
    }
}

impl<R: DeserializeOwned> QueuedMutation<R> {
    pub fn from_msgpack(bytes: &[u8]) -> Result<Self, CoreError> {
        rmp_serde::from_slice(bytes).map_err(|e| CoreError::Serialization(e.to_string()))
    }
}
