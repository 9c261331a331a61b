pub mod error;
pub mod schema;
pub mod scoped;
pub mod sqlite;
pub mod traits;

pub use error::StorageError;
pub use scoped::{ReadOptions, ScopedStore, LEGACY_NAMESPACE};
pub use sqlite::SqliteStore;
pub use traits::KvStore;
