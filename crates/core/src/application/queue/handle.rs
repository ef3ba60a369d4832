// Operation Handle - caller-owned view of an enqueued operation

use std::sync::Arc;

use tokio::sync::oneshot;

use crate::domain::operation::{OperationId, Priority};
use crate::domain::work::WorkOutput;
use crate::error::{Result, SyncError};

use super::QueueCore;

/// Caller-owned handle to an enqueued operation.
///
/// Dropping the handle does not cancel the operation; the queue keeps
/// running it and discards the result.
pub struct OperationHandle {
    pub(super) id: OperationId,
    pub(super) core: Option<Arc<QueueCore>>,
    pub(super) rx: oneshot::Receiver<Result<WorkOutput>>,
}

impl OperationHandle {
    pub fn id(&self) -> &OperationId {
        &self.id
    }

    /// Cancel the operation if it is still pending; returns whether an
    /// entry was removed. Cancelling an in-flight operation is a no-op
    /// (the narrow race with selection is acknowledged, not eliminated).
    pub fn cancel(&self) -> bool {
        match &self.core {
            Some(core) => core.cancel_pending(&self.id),
            None => false,
        }
    }

    /// Raise the operation's priority, clamped to the 1-10 band; returns
    /// the effective priority, or None once the operation left the
    /// pending set
    pub fn increase_priority(&self, amount: Priority) -> Option<Priority> {
        self.core
            .as_ref()
            .and_then(|core| core.increase_priority(&self.id, amount))
    }

    /// Wait for the operation to settle
    pub async fn wait(self) -> Result<WorkOutput> {
        self.rx.await.unwrap_or(Err(SyncError::Cancelled))
    }
}
