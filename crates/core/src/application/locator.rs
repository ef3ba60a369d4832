// Record Locator - memoizing user -> record id resolver
//
// Resolution is itself a network call, so it is scheduled through the
// queue at top priority and subject to the same retry discipline.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing::{debug, info};

use crate::application::queue::{EnqueueOptions, OperationHandle, OperationQueue};
use crate::domain::document::{RecordId, UserIdentity};
use crate::domain::operation::MAX_PRIORITY;
use crate::domain::work::{WorkItem, WorkOutput};
use crate::error::{Result, SyncError};

/// Memo table mapping user ids to resolved record ids.
///
/// Entries are immutable once resolved; only an explicit clear
/// invalidates them. Shared with the executor, which fills it on a
/// successful lookup so dependent saves observe the id without racing
/// the resolver's continuation.
#[derive(Default)]
pub struct RecordIdCache {
    entries: Mutex<HashMap<String, RecordId>>,
}

impl RecordIdCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, HashMap<String, RecordId>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn get(&self, user: &UserIdentity) -> Option<RecordId> {
        self.entries().get(&user.id).cloned()
    }

    pub fn insert(&self, user: &UserIdentity, record_id: RecordId) {
        self.entries().entry(user.id.clone()).or_insert(record_id);
    }

    pub fn clear(&self) {
        self.entries().clear();
    }
}

/// Outcome of a lookup that schedules a search on miss
pub enum Located {
    /// Already resolved
    Cached(RecordId),
    /// Search scheduled through the queue
    Scheduled(OperationHandle),
}

/// Maps a user identity to the remote store's record identifier
pub struct RecordLocator {
    queue: Arc<OperationQueue>,
    cache: Arc<RecordIdCache>,
}

impl RecordLocator {
    pub fn new(queue: Arc<OperationQueue>, cache: Arc<RecordIdCache>) -> Self {
        Self { queue, cache }
    }

    pub fn cached(&self, user: &UserIdentity) -> Option<RecordId> {
        self.cache.get(user)
    }

    /// Cache hit, or a scheduled lookup the caller can depend on
    pub fn lookup_or_schedule(&self, user: &UserIdentity) -> Located {
        if let Some(record_id) = self.cache.get(user) {
            debug!(user_id = %user.id, record_id = %record_id, "Record id cache hit");
            return Located::Cached(record_id);
        }

        let handle = self.queue.enqueue(
            WorkItem::LocateRecord { user: user.clone() },
            EnqueueOptions::with_priority(MAX_PRIORITY),
        );
        info!(
            user_id = %user.id,
            operation_id = %handle.id(),
            "Record lookup scheduled"
        );
        Located::Scheduled(handle)
    }

    /// Resolve a user's record id, waiting for the scheduled search on a
    /// cache miss. Fails with NotFound when the search completes cleanly
    /// but matches nothing; network errors propagate unchanged.
    pub async fn resolve(&self, user: &UserIdentity) -> Result<RecordId> {
        match self.lookup_or_schedule(user) {
            Located::Cached(record_id) => Ok(record_id),
            Located::Scheduled(handle) => match handle.wait().await? {
                WorkOutput::Record(record_id) => Ok(record_id),
                other => Err(SyncError::Internal(format!(
                    "unexpected lookup output: {other:?}"
                ))),
            },
        }
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }
}
