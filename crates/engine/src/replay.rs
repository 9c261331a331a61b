use tillsync_core::clock::now_ms;
use tillsync_core::{EntityRow, FeedbackRecord, FieldValue, MutationRecord};

use crate::remote::{RemoteError, RemoteStore};

pub const PRODUCTS_TABLE: &str = "products";
pub const FEEDBACK_TABLE: &str = "feedback";

/// Maps one record variant to its remote write. Implementations must route
/// through idempotent calls only (upsert keyed by stable id, or field-scoped
/// update), so a crashed-and-retried flush cannot duplicate effects.
pub trait ReplayRecord {
    fn replay(&self, remote: &mut dyn RemoteStore) -> Result<(), RemoteError>;

    /// Short human-readable form for logs.
    fn describe(&self) -> String;
}

impl ReplayRecord for MutationRecord {
    fn replay(&self, remote: &mut dyn RemoteStore) -> Result<(), RemoteError> {
        match self {
            Self::UpsertEntity { entity, .. } => {
                remote.upsert(PRODUCTS_TABLE, entity, entity.entity_id)
            }
            Self::ArchiveEntity { entity_id, .. } => remote.update(
                PRODUCTS_TABLE,
                &[
                    ("archived".to_string(), FieldValue::Boolean(true)),
                    ("archived_at".to_string(), FieldValue::Timestamp(now_ms())),
                ],
                *entity_id,
            ),
            Self::SetField {
                entity_id,
                field_key,
                value,
                ..
            } => remote.update(
                PRODUCTS_TABLE,
                &[(field_key.clone(), value.clone())],
                *entity_id,
            ),
        }
    }

    fn describe(&self) -> String {
        format!("{} {}", self.kind_name(), self.entity_id())
    }
}

impl ReplayRecord for FeedbackRecord {
    fn replay(&self, remote: &mut dyn RemoteStore) -> Result<(), RemoteError> {
        match self {
            Self::Submit {
                feedback_id,
                message,
                rating,
                queued_at,
            } => {
                let mut row = EntityRow::new(*feedback_id)
                    .with_field("message", FieldValue::Text(message.clone()))
                    .with_field("submitted_at", FieldValue::Timestamp(*queued_at));
                if let Some(rating) = rating {
                    row = row.with_field("rating", FieldValue::Integer(*rating));
                }
                remote.upsert(FEEDBACK_TABLE, &row, *feedback_id)
            }
        }
    }

    fn describe(&self) -> String {
        match self {
            Self::Submit { feedback_id, .. } => format!("{} {}", self.kind_name(), feedback_id),
        }
    }
}
