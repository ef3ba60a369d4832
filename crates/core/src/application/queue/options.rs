// Queue configuration types

use crate::domain::operation::{OperationId, OperationType, Priority, DEFAULT_PRIORITY};

use super::constants::{
    DEFAULT_MAX_RETRIES, DEFAULT_MAX_RETRY_DELAY_MS, DEFAULT_RETRY_BASE_DELAY_MS,
};

/// Per-operation enqueue options
#[derive(Debug, Clone)]
pub struct EnqueueOptions {
    /// 1-10, clamped at admission
    pub priority: Priority,
    /// Operation ids that must leave the queue before this one runs
    pub dependencies: Vec<OperationId>,
    /// Type tag; None uses the work item's own tag
    pub op_type: Option<OperationType>,
    /// Free-form metadata carried for telemetry
    pub metadata: serde_json::Value,
    /// Retry budget; None uses the queue's max_retries setting
    pub retries: Option<u32>,
    /// May run while connectivity is down
    pub offline_safe: bool,
    /// Per-operation timeout; None uses the 30s default
    pub timeout_ms: Option<u64>,
}

impl Default for EnqueueOptions {
    fn default() -> Self {
        Self {
            priority: DEFAULT_PRIORITY,
            dependencies: Vec::new(),
            op_type: None,
            metadata: serde_json::Value::Null,
            retries: None,
            offline_safe: false,
            timeout_ms: None,
        }
    }
}

impl EnqueueOptions {
    pub fn with_priority(priority: Priority) -> Self {
        Self {
            priority,
            ..Default::default()
        }
    }
}

/// Global queue settings
#[derive(Debug, Clone, PartialEq)]
pub struct QueueSettings {
    /// Default retry budget for operations that do not override it
    pub max_retries: u32,
    /// Base retry delay in ms
    pub retry_delay_ms: u64,
    /// delay = retry_delay * 2^(attempt-1) when set, flat otherwise
    pub exponential_backoff: bool,
    /// Cap on a single backoff delay; None means uncapped
    pub max_retry_delay_ms: Option<u64>,
    /// Deterministic +-10% jitter on retry delays
    pub retry_jitter: bool,
    /// Only offline-safe operations are admitted while set
    pub offline_mode: bool,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay_ms: DEFAULT_RETRY_BASE_DELAY_MS,
            exponential_backoff: true,
            max_retry_delay_ms: Some(DEFAULT_MAX_RETRY_DELAY_MS),
            retry_jitter: false,
            offline_mode: false,
        }
    }
}

impl QueueSettings {
    /// Merge a partial update; None fields are left unchanged
    pub fn merge(&mut self, patch: SettingsPatch) {
        if let Some(v) = patch.max_retries {
            self.max_retries = v;
        }
        if let Some(v) = patch.retry_delay_ms {
            self.retry_delay_ms = v;
        }
        if let Some(v) = patch.exponential_backoff {
            self.exponential_backoff = v;
        }
        if let Some(v) = patch.max_retry_delay_ms {
            self.max_retry_delay_ms = v;
        }
        if let Some(v) = patch.retry_jitter {
            self.retry_jitter = v;
        }
        if let Some(v) = patch.offline_mode {
            self.offline_mode = v;
        }
    }
}

/// Partial settings update
#[derive(Debug, Clone, Default)]
pub struct SettingsPatch {
    pub max_retries: Option<u32>,
    pub retry_delay_ms: Option<u64>,
    pub exponential_backoff: Option<bool>,
    pub max_retry_delay_ms: Option<Option<u64>>,
    pub retry_jitter: Option<bool>,
    pub offline_mode: Option<bool>,
}

/// Administrative queue clearing options
#[derive(Debug, Clone)]
pub struct ClearOptions {
    /// Only remove operations with this type tag; None removes all
    pub op_type: Option<OperationType>,
    /// Also abort the currently-processing operation
    pub force: bool,
    /// Leave the in-flight operation alone (default)
    pub only_pending: bool,
}

impl Default for ClearOptions {
    fn default() -> Self {
        Self {
            op_type: None,
            force: false,
            only_pending: true,
        }
    }
}
