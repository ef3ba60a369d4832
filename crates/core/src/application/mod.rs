// Application Layer - queue, coordinator, locator and their wiring

pub mod engine;
pub mod executor;
pub mod locator;
pub mod queue;
pub mod retry;
pub mod transaction;

// Re-exports
pub use engine::SyncEngine;
pub use executor::RecordStoreExecutor;
pub use locator::{Located, RecordIdCache, RecordLocator};
pub use queue::{
    ClearOptions, EnqueueOptions, OperationHandle, OperationQueue, QueueSettings, QueueStatus,
    SettingsPatch,
};
pub use transaction::{rollback_action, RollbackAction, TransactionCoordinator};
