// Sync Engine - composition root
//
// Explicitly constructed and dependency-injected; no global state, so
// tests can run several independent engines side by side.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::info;

use crate::application::executor::RecordStoreExecutor;
use crate::application::locator::{RecordIdCache, RecordLocator};
use crate::application::queue::{
    shutdown_channel, OperationQueue, QueueSettings, ShutdownSender,
};
use crate::application::transaction::TransactionCoordinator;
use crate::domain::document::UserIdentity;
use crate::port::id_provider::UuidProvider;
use crate::port::time_provider::SystemTimeProvider;
use crate::port::{CredentialProvider, IdProvider, RecordStore, SnapshotStore, TimeProvider};

/// Wired queue + locator + coordinator for one user's record
pub struct SyncEngine {
    queue: Arc<OperationQueue>,
    locator: Arc<RecordLocator>,
    coordinator: Arc<TransactionCoordinator>,
}

impl SyncEngine {
    /// Wire an engine from its ports, with system time and uuid ids
    pub fn new(
        records: Arc<dyn RecordStore>,
        credentials: Arc<dyn CredentialProvider>,
        snapshots: Arc<dyn SnapshotStore>,
        user: UserIdentity,
        settings: QueueSettings,
    ) -> Self {
        Self::with_providers(
            records,
            credentials,
            snapshots,
            user,
            settings,
            Arc::new(SystemTimeProvider),
            Arc::new(UuidProvider),
        )
    }

    /// Wire an engine with injected time/id providers (deterministic tests)
    pub fn with_providers(
        records: Arc<dyn RecordStore>,
        credentials: Arc<dyn CredentialProvider>,
        snapshots: Arc<dyn SnapshotStore>,
        user: UserIdentity,
        settings: QueueSettings,
        time_provider: Arc<dyn TimeProvider>,
        id_provider: Arc<dyn IdProvider>,
    ) -> Self {
        let record_ids = Arc::new(RecordIdCache::new());
        let executor = Arc::new(RecordStoreExecutor::new(
            Arc::clone(&records),
            credentials,
            Arc::clone(&record_ids),
        ));
        let queue = Arc::new(OperationQueue::new(
            executor,
            time_provider,
            id_provider,
            settings,
        ));
        let locator = Arc::new(RecordLocator::new(Arc::clone(&queue), record_ids));
        let coordinator = Arc::new(TransactionCoordinator::new(
            Arc::clone(&queue),
            Arc::clone(&locator),
            snapshots,
            records,
            user,
        ));

        Self {
            queue,
            locator,
            coordinator,
        }
    }

    pub fn queue(&self) -> Arc<OperationQueue> {
        Arc::clone(&self.queue)
    }

    pub fn locator(&self) -> Arc<RecordLocator> {
        Arc::clone(&self.locator)
    }

    pub fn coordinator(&self) -> Arc<TransactionCoordinator> {
        Arc::clone(&self.coordinator)
    }

    /// Spawn the queue driver; the returned sender stops it gracefully
    pub fn start(&self) -> (ShutdownSender, JoinHandle<()>) {
        let (sender, token) = shutdown_channel();
        let queue = Arc::clone(&self.queue);
        let handle = tokio::spawn(async move {
            queue.run(token).await;
        });
        info!("Sync engine driver started");
        (sender, handle)
    }
}
