// Operation Domain Model

use serde::{Deserialize, Serialize};

use crate::domain::work::WorkItem;

/// Operation ID (UUID v4, injected via IdProvider)
pub type OperationId = String;

/// Priority (1-10, higher number = higher priority)
pub type Priority = u8;

pub const MIN_PRIORITY: Priority = 1;
pub const MAX_PRIORITY: Priority = 10;
pub const DEFAULT_PRIORITY: Priority = 5;

/// Clamp an arbitrary priority into the supported 1-10 band
pub fn clamp_priority(priority: Priority) -> Priority {
    priority.clamp(MIN_PRIORITY, MAX_PRIORITY)
}

/// Operation State
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperationStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

impl std::fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OperationStatus::Pending => write!(f, "PENDING"),
            OperationStatus::Processing => write!(f, "PROCESSING"),
            OperationStatus::Completed => write!(f, "COMPLETED"),
            OperationStatus::Failed => write!(f, "FAILED"),
            OperationStatus::Cancelled => write!(f, "CANCELLED"),
        }
    }
}

/// Operation type tag (for grouping, clearing and telemetry)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OperationType(String);

impl OperationType {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for OperationType {
    fn default() -> Self {
        Self("generic".to_string())
    }
}

/// Operation Entity - the unit of scheduled work
///
/// Owned exclusively by the queue for its lifetime; the enqueuing caller
/// only holds the returned handle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Operation {
    pub id: OperationId,
    pub op_type: OperationType,
    pub work: WorkItem,

    pub priority: Priority,
    pub dependencies: Vec<OperationId>,
    pub metadata: serde_json::Value,

    /// Remaining retry budget; never underflows
    pub remaining_retries: u32,
    /// Completed failed attempts
    pub attempts: u32,
    /// May run while connectivity is down
    pub offline_safe: bool,
    pub timeout_ms: u64,

    pub status: OperationStatus,
    pub enqueued_at: i64, // epoch ms
    pub started_at: Option<i64>,
}

impl Operation {
    /// Create a new Operation with defaults
    ///
    /// # Arguments
    ///
    /// * `id` - Unique operation ID (injected, not generated)
    /// * `enqueued_at` - Enqueue timestamp in epoch ms (injected)
    /// * `work` - The typed work item to execute
    /// * `op_type` - Type tag for grouping
    pub fn new(
        id: impl Into<String>,
        enqueued_at: i64,
        work: WorkItem,
        op_type: OperationType,
    ) -> Self {
        Self {
            id: id.into(),
            op_type,
            work,
            priority: DEFAULT_PRIORITY,
            dependencies: Vec::new(),
            metadata: serde_json::Value::Null,
            remaining_retries: 3,
            attempts: 0,
            offline_safe: false,
            timeout_ms: 30_000,
            status: OperationStatus::Pending,
            enqueued_at,
            started_at: None,
        }
    }

    /// Transition to Processing with explicit timestamp
    pub fn start(&mut self, now_millis: i64) -> crate::domain::error::Result<()> {
        if self.status != OperationStatus::Pending {
            return Err(crate::domain::error::DomainError::InvalidStateTransition {
                from: self.status.to_string(),
                to: "PROCESSING".to_string(),
            });
        }
        self.status = OperationStatus::Processing;
        self.started_at = Some(now_millis);
        Ok(())
    }

    /// Return a failed attempt to Pending, consuming one retry
    pub fn requeue(&mut self) -> crate::domain::error::Result<()> {
        if self.status != OperationStatus::Processing {
            return Err(crate::domain::error::DomainError::InvalidStateTransition {
                from: self.status.to_string(),
                to: "PENDING".to_string(),
            });
        }
        self.status = OperationStatus::Pending;
        self.attempts += 1;
        self.remaining_retries = self.remaining_retries.saturating_sub(1);
        self.started_at = None;
        Ok(())
    }

    /// Transition to Completed
    pub fn complete(&mut self) -> crate::domain::error::Result<()> {
        if self.status != OperationStatus::Processing {
            return Err(crate::domain::error::DomainError::InvalidStateTransition {
                from: self.status.to_string(),
                to: "COMPLETED".to_string(),
            });
        }
        self.status = OperationStatus::Completed;
        Ok(())
    }

    /// Mark as permanently Failed
    pub fn fail(&mut self) {
        self.status = OperationStatus::Failed;
    }

    /// Mark as Cancelled
    pub fn cancel(&mut self) {
        self.status = OperationStatus::Cancelled;
    }
}
