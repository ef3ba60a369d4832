// Transaction Coordinator - buffered writes committed as one unit
//
// Groups logical writes against the cached document and translates the
// committed state into consolidated queue operations. Rollback restores
// the document to the snapshot captured at begin; partial rollback is not
// a supported state.

use std::sync::{Arc, Mutex, MutexGuard};

use futures::future::BoxFuture;
use tracing::{debug, error, info, warn};

use crate::application::executor::document_fields;
use crate::application::locator::{Located, RecordLocator};
use crate::application::queue::{EnqueueOptions, OperationHandle, OperationQueue};
use crate::domain::document::{CachedDocument, DocumentWrite, UserIdentity, WriteKind};
use crate::domain::operation::{OperationId, Priority};
use crate::domain::work::WorkItem;
use crate::error::{Result, SyncError};
use crate::port::{RecordStore, SnapshotStore};

/// Compensating action run during rollback, in registration order.
/// Failures are logged, never propagated.
pub type RollbackAction = Box<dyn FnOnce() -> BoxFuture<'static, Result<()>> + Send>;

/// Wrap an async closure as a rollback action
pub fn rollback_action<F, Fut>(f: F) -> RollbackAction
where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: std::future::Future<Output = Result<()>> + Send + 'static,
{
    Box::new(move || -> BoxFuture<'static, Result<()>> { Box::pin(f()) })
}

struct ActiveTransaction {
    /// Deep copy of the document at begin; the rollback point
    start_state: CachedDocument,
    /// Staged write classes, in insertion order (may repeat)
    kinds: Vec<WriteKind>,
    rollbacks: Vec<RollbackAction>,
}

struct CoordinatorState {
    document: CachedDocument,
    tx: Option<ActiveTransaction>,
}

/// Groups multiple logical writes into one committed unit.
///
/// At most one transaction is active at a time; `begin` while active is
/// rejected rather than queued, pushing transaction serialization onto
/// the caller.
pub struct TransactionCoordinator {
    queue: Arc<OperationQueue>,
    locator: Arc<RecordLocator>,
    snapshots: Arc<dyn SnapshotStore>,
    records: Arc<dyn RecordStore>,
    user: UserIdentity,
    state: Mutex<CoordinatorState>,
}

impl TransactionCoordinator {
    pub fn new(
        queue: Arc<OperationQueue>,
        locator: Arc<RecordLocator>,
        snapshots: Arc<dyn SnapshotStore>,
        records: Arc<dyn RecordStore>,
        user: UserIdentity,
    ) -> Self {
        Self {
            queue,
            locator,
            snapshots,
            records,
            user,
            state: Mutex::new(CoordinatorState {
                document: CachedDocument::default(),
                tx: None,
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, CoordinatorState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Current document mirror (cloned)
    pub fn document(&self) -> CachedDocument {
        self.state().document.clone()
    }

    /// Replace the document mirror outside a transaction (startup load)
    pub fn hydrate(&self, document: CachedDocument) -> bool {
        let mut state = self.state();
        if state.tx.is_some() {
            warn!("Refusing to hydrate during an active transaction");
            return false;
        }
        state.document = document;
        true
    }

    /// Load the last committed document from the snapshot store; Ok(false)
    /// when no snapshot exists
    pub fn restore_from_snapshot(&self) -> Result<bool> {
        let blob = self
            .snapshots
            .read(&self.snapshot_key())
            .map_err(|err| SyncError::Snapshot(err.to_string()))?;
        match blob {
            Some(bytes) => {
                let document: CachedDocument = serde_json::from_slice(&bytes)?;
                info!(cards = document.cards.len(), "Document restored from snapshot");
                Ok(self.hydrate(document))
            }
            None => Ok(false),
        }
    }

    /// Open a transaction, capturing the rollback snapshot; false when
    /// one is already active (no state change)
    pub fn begin(&self) -> bool {
        let mut state = self.state();
        if state.tx.is_some() {
            warn!("Transaction already active, begin rejected");
            return false;
        }
        state.tx = Some(ActiveTransaction {
            start_state: state.document.clone(),
            kinds: Vec::new(),
            rollbacks: Vec::new(),
        });
        debug!("Transaction opened");
        true
    }

    /// Stage a write into the active transaction, applying it to the
    /// in-memory document immediately. No-op (false) without an active
    /// transaction.
    pub fn stage(&self, write: DocumentWrite, rollback: Option<RollbackAction>) -> bool {
        let kind = write.kind();
        let mut state = self.state();
        match state.tx.as_mut() {
            Some(tx) => {
                tx.kinds.push(kind);
                if let Some(action) = rollback {
                    tx.rollbacks.push(action);
                }
            }
            None => {
                warn!(kind = %kind, "No active transaction, write ignored");
                return false;
            }
        }
        write.apply(&mut state.document);
        debug!(kind = %kind, "Write staged");
        true
    }

    /// Commit the active transaction.
    ///
    /// Staged writes are classified by kind and each non-empty class
    /// becomes exactly one consolidated queue operation carrying the full
    /// current collection; a staged full save supersedes them all. Any
    /// underlying failure rolls back and re-raises. On success the
    /// document is persisted to the snapshot store (best effort).
    pub async fn commit(&self) -> Result<()> {
        let (document, classes) = {
            let state = self.state();
            let Some(tx) = state.tx.as_ref() else {
                return Err(SyncError::Validation(
                    "commit without an active transaction".to_string(),
                ));
            };
            (state.document.clone(), classify(&tx.kinds))
        };

        if classes.is_empty() {
            debug!("Empty transaction, nothing to persist");
            self.clear_transaction();
            return Ok(());
        }

        // resolve the record id first; when the lookup has to go to the
        // network, every save depends on it
        let (locate_handle, dependencies) = match self.locator.lookup_or_schedule(&self.user) {
            Located::Cached(_) => (None, Vec::new()),
            Located::Scheduled(handle) => {
                let dependencies = vec![handle.id().clone()];
                (Some(handle), dependencies)
            }
        };

        let saves = self.enqueue_saves(&document, &classes, dependencies);

        if let Some(handle) = locate_handle {
            if let Err(err) = handle.wait().await {
                error!(error = %err, "Record lookup failed, rolling back");
                for (_, save) in &saves {
                    save.cancel();
                }
                self.rollback().await;
                return Err(err);
            }
        }

        let mut failure: Option<SyncError> = None;
        let mut remaining = saves.into_iter();
        for (kind, handle) in remaining.by_ref() {
            match handle.wait().await {
                Ok(_) => debug!(kind = %kind, "Save confirmed"),
                Err(err) => {
                    error!(kind = %kind, error = %err, "Save failed, rolling back");
                    failure = Some(err);
                    break;
                }
            }
        }

        if let Some(err) = failure {
            // best effort: keep not-yet-run siblings from widening the
            // local/remote divergence window
            for (_, handle) in remaining {
                handle.cancel();
            }
            self.rollback().await;
            return Err(err);
        }

        self.clear_transaction();
        let committed = self.document();
        self.persist_snapshot(&committed);
        info!(classes = classes.len(), "Transaction committed");
        Ok(())
    }

    /// Restore the document to the begin-time snapshot, run compensating
    /// actions in registration order, and clear transaction state.
    /// Failures here are logged, never propagated, so the transaction
    /// slot is always released.
    pub async fn rollback(&self) {
        let rollbacks = {
            let mut state = self.state();
            match state.tx.take() {
                Some(tx) => {
                    let ActiveTransaction {
                        start_state,
                        rollbacks,
                        ..
                    } = tx;
                    state.document = start_state;
                    rollbacks
                }
                None => {
                    debug!("No active transaction to roll back");
                    return;
                }
            }
        };

        for (index, action) in rollbacks.into_iter().enumerate() {
            if let Err(err) = action().await {
                warn!(index, error = %err, "Rollback action failed");
            }
        }
        info!("Transaction rolled back");
    }

    /// Best-effort final flush on process exit: snapshot write plus one
    /// direct remote save, bypassing the queue. All errors are logged.
    pub async fn final_flush(&self) {
        let (document, record_id) = {
            let state = self.state();
            let record_id = state
                .document
                .record_id
                .clone()
                .or_else(|| self.locator.cached(&self.user));
            (state.document.clone(), record_id)
        };

        self.persist_snapshot(&document);

        let Some(record_id) = record_id else {
            debug!("No record id resolved, final flush kept local");
            return;
        };
        match document_fields(&document) {
            Ok(record_fields) => {
                match self.records.update_record(&record_id, record_fields).await {
                    Ok(()) => info!(record_id = %record_id, "Final flush pushed to remote store"),
                    Err(err) => warn!(error = %err, "Final flush could not reach remote store"),
                }
            }
            Err(err) => warn!(error = %err, "Final flush serialization failed"),
        }
    }

    fn enqueue_saves(
        &self,
        document: &CachedDocument,
        classes: &[WriteKind],
        dependencies: Vec<OperationId>,
    ) -> Vec<(WriteKind, OperationHandle)> {
        classes
            .iter()
            .map(|kind| {
                let work = work_for(*kind, &self.user, document);
                let handle = self.queue.enqueue(
                    work,
                    EnqueueOptions {
                        priority: priority_for(*kind),
                        dependencies: dependencies.clone(),
                        ..Default::default()
                    },
                );
                (*kind, handle)
            })
            .collect()
    }

    fn persist_snapshot(&self, document: &CachedDocument) {
        match serde_json::to_vec(document) {
            Ok(blob) => {
                if let Err(err) = self.snapshots.write(&self.snapshot_key(), &blob) {
                    warn!(error = %err, "Snapshot write failed");
                }
            }
            Err(err) => warn!(error = %err, "Snapshot serialization failed"),
        }
    }

    fn snapshot_key(&self) -> String {
        format!("document.{}", self.user.id)
    }

    fn clear_transaction(&self) {
        let mut state = self.state();
        state.tx = None;
        if state.document.record_id.is_none() {
            state.document.record_id = self.locator.cached(&self.user);
        }
    }
}

/// Consolidate staged kinds: a full save supersedes per-class saves; one
/// operation per class otherwise, in a fixed class order
fn classify(kinds: &[WriteKind]) -> Vec<WriteKind> {
    if kinds.is_empty() {
        return Vec::new();
    }
    if kinds.contains(&WriteKind::FullSave) {
        return vec![WriteKind::FullSave];
    }
    [
        WriteKind::CardWrite,
        WriteKind::TopicWrite,
        WriteKind::MetadataUpdate,
        WriteKind::ColorUpdate,
    ]
    .into_iter()
    .filter(|kind| kinds.contains(kind))
    .collect()
}

fn work_for(kind: WriteKind, user: &UserIdentity, document: &CachedDocument) -> WorkItem {
    match kind {
        WriteKind::CardWrite => WorkItem::SaveCards {
            user: user.clone(),
            cards: document.cards.clone(),
        },
        WriteKind::TopicWrite => WorkItem::SaveTopics {
            user: user.clone(),
            topics: document.topics.clone(),
        },
        WriteKind::MetadataUpdate => WorkItem::SaveMetadata {
            user: user.clone(),
            metadata: document.metadata.clone(),
            buckets: document.buckets.clone(),
        },
        WriteKind::ColorUpdate => WorkItem::SaveColors {
            user: user.clone(),
            colors: document.colors.clone(),
        },
        WriteKind::FullSave => WorkItem::SaveDocument {
            user: user.clone(),
            document: document.clone(),
        },
    }
}

/// Save priorities by class, inside the 5-10 band
fn priority_for(kind: WriteKind) -> Priority {
    match kind {
        WriteKind::FullSave => 8,
        WriteKind::CardWrite => 7,
        WriteKind::TopicWrite => 6,
        WriteKind::MetadataUpdate | WriteKind::ColorUpdate => 5,
    }
}
