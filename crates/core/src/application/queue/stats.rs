// Queue statistics and status snapshots

use serde::Serialize;

use crate::domain::operation::{OperationId, OperationStatus, OperationType, Priority};

/// Process-wide queue counters. Mutated only by the queue; callers get a
/// cloned snapshot through `get_status`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QueueStatistics {
    pub total_operations: u64,
    pub successful: u64,
    pub failed: u64,
    pub retried: u64,
    pub last_completed_at: Option<i64>,
    pub last_error_at: Option<i64>,
    /// Running average over successful executions
    pub avg_execution_ms: f64,
    pub max_execution_ms: u64,
}

impl QueueStatistics {
    pub(crate) fn record_success(&mut self, duration_ms: u64, now_millis: i64) {
        self.successful += 1;
        let n = self.successful as f64;
        self.avg_execution_ms += (duration_ms as f64 - self.avg_execution_ms) / n;
        self.max_execution_ms = self.max_execution_ms.max(duration_ms);
        self.last_completed_at = Some(now_millis);
    }

    pub(crate) fn record_failure(&mut self, now_millis: i64) {
        self.failed += 1;
        self.last_error_at = Some(now_millis);
    }

    pub(crate) fn record_retry(&mut self) {
        self.retried += 1;
    }
}

/// Summary of a pending operation
#[derive(Debug, Clone, Serialize)]
pub struct OperationSummary {
    pub id: OperationId,
    pub op_type: OperationType,
    pub priority: Priority,
    pub status: OperationStatus,
    pub enqueued_at: i64,
}

/// Descriptor of the in-flight operation
#[derive(Debug, Clone, Serialize)]
pub struct CurrentOperation {
    pub id: OperationId,
    pub op_type: OperationType,
    pub elapsed_ms: i64,
}

/// Point-in-time queue snapshot; pure read, no side effects
#[derive(Debug, Clone, Serialize)]
pub struct QueueStatus {
    pub queue_len: usize,
    pub processing: bool,
    pub current: Option<CurrentOperation>,
    pub offline: bool,
    pub stats: QueueStatistics,
    pub pending: Vec<OperationSummary>,
}
