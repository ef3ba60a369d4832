// Port Layer - Interfaces for external dependencies

pub mod credential_provider;
pub mod id_provider; // For deterministic testing
pub mod record_store;
pub mod snapshot_store;
pub mod time_provider;
pub mod work_executor;

// Re-exports
pub use credential_provider::{CredentialProvider, Token};
pub use id_provider::IdProvider;
pub use record_store::{FieldMap, RecordFilter, RecordStore, StoredRecord};
pub use snapshot_store::{SnapshotError, SnapshotStore};
pub use time_provider::TimeProvider;
pub use work_executor::WorkExecutor;
