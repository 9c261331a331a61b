pub mod clock;
pub mod error;
pub mod field_value;
pub mod ids;
pub mod queue;
pub mod record;
pub mod scope;

pub use error::CoreError;
pub use field_value::FieldValue;
pub use ids::*;
pub use queue::{DecodedQueue, QueueEnvelope, QUEUE_FORMAT_VERSION};
pub use record::{EntityRow, FailureMeta, FeedbackRecord, MutationRecord, QueuedMutation};
pub use scope::{FixedScope, ScopeKey, ScopeResolver, TenantScope};
