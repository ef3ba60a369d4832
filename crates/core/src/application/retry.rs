// Retry logic with exponential backoff

use tracing::{info, warn};

use crate::application::queue::QueueSettings;
use crate::domain::operation::Operation;

/// Retry decision result
#[derive(Debug, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry the operation (with backoff delay in ms)
    Retry(u64),
    /// Do not retry, the operation has failed permanently
    Failed,
}

/// Retry policy
///
/// delay(attempt) = base * 2^(attempt-1) when exponential backoff is on,
/// flat base otherwise; clamped to the configured maximum, with optional
/// deterministic +-10% jitter.
pub struct RetryPolicy {
    base_delay_ms: u64,
    exponential: bool,
    max_delay_ms: Option<u64>,
    jitter: bool,
}

impl RetryPolicy {
    pub fn new(
        base_delay_ms: u64,
        exponential: bool,
        max_delay_ms: Option<u64>,
        jitter: bool,
    ) -> Self {
        Self {
            base_delay_ms,
            exponential,
            max_delay_ms,
            jitter,
        }
    }

    pub fn from_settings(settings: &QueueSettings) -> Self {
        Self::new(
            settings.retry_delay_ms,
            settings.exponential_backoff,
            settings.max_retry_delay_ms,
            settings.retry_jitter,
        )
    }

    /// Decide whether an operation that just failed should be retried
    pub fn decide(&self, op: &Operation) -> RetryDecision {
        if op.remaining_retries == 0 {
            warn!(
                operation_id = %op.id,
                attempts = op.attempts,
                "Retry budget exhausted"
            );
            return RetryDecision::Failed;
        }

        // the upcoming retry, counted from 1
        let attempt = op.attempts + 1;
        let mut delay_ms = self.backoff_delay(attempt);
        if self.jitter {
            delay_ms = apply_jitter(delay_ms, &op.id);
        }

        info!(
            operation_id = %op.id,
            attempt = attempt,
            delay_ms = delay_ms,
            "Scheduling retry"
        );
        RetryDecision::Retry(delay_ms)
    }

    /// Backoff delay for a retry attempt (1-based)
    pub fn backoff_delay(&self, attempt: u32) -> u64 {
        let raw = if self.exponential {
            let exponent = attempt.saturating_sub(1).min(32);
            self.base_delay_ms.saturating_mul(1u64 << exponent)
        } else {
            self.base_delay_ms
        };
        match self.max_delay_ms {
            Some(max) => raw.min(max),
            None => raw,
        }
    }
}

/// +-10% jitter, seeded from the operation id so retry timing stays
/// reproducible per operation
fn apply_jitter(delay_ms: u64, op_id: &str) -> u64 {
    let seed = op_id.chars().map(|c| c as u32).sum::<u32>();
    let factor = 0.9 + ((seed % 21) as f64 / 100.0); // 0.9 to 1.1
    (delay_ms as f64 * factor) as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::document::UserIdentity;
    use crate::domain::work::WorkItem;

    fn operation_with_budget(remaining: u32, attempts: u32) -> Operation {
        let work = WorkItem::LocateRecord {
            user: UserIdentity::new("u1"),
        };
        let op_type = work.op_type();
        let mut op = Operation::new("op-jitter-seed", 1000, work, op_type);
        op.remaining_retries = remaining;
        op.attempts = attempts;
        op
    }

    #[test]
    fn test_exponential_sequence() {
        let policy = RetryPolicy::new(100, true, None, false);

        assert_eq!(policy.backoff_delay(1), 100);
        assert_eq!(policy.backoff_delay(2), 200);
        assert_eq!(policy.backoff_delay(3), 400);
        assert_eq!(policy.backoff_delay(4), 800);
    }

    #[test]
    fn test_flat_delay_when_backoff_disabled() {
        let policy = RetryPolicy::new(100, false, None, false);

        assert_eq!(policy.backoff_delay(1), 100);
        assert_eq!(policy.backoff_delay(5), 100);
    }

    #[test]
    fn test_delay_cap() {
        let policy = RetryPolicy::new(100, true, Some(250), false);

        assert_eq!(policy.backoff_delay(1), 100);
        assert_eq!(policy.backoff_delay(2), 200);
        assert_eq!(policy.backoff_delay(3), 250);
        assert_eq!(policy.backoff_delay(10), 250);
    }

    #[test]
    fn test_decide_uses_attempt_counter() {
        let policy = RetryPolicy::new(100, true, None, false);

        let first_failure = operation_with_budget(2, 0);
        assert_eq!(policy.decide(&first_failure), RetryDecision::Retry(100));

        let second_failure = operation_with_budget(1, 1);
        assert_eq!(policy.decide(&second_failure), RetryDecision::Retry(200));
    }

    #[test]
    fn test_decide_failed_when_budget_spent() {
        let policy = RetryPolicy::new(100, true, None, false);

        let spent = operation_with_budget(0, 3);
        assert_eq!(policy.decide(&spent), RetryDecision::Failed);
    }

    #[test]
    fn test_jitter_is_deterministic_and_bounded() {
        let policy = RetryPolicy::new(1000, false, None, true);

        let op = operation_with_budget(1, 0);
        let RetryDecision::Retry(first) = policy.decide(&op) else {
            panic!("expected retry");
        };
        let RetryDecision::Retry(second) = policy.decide(&op) else {
            panic!("expected retry");
        };

        assert_eq!(first, second);
        assert!((900..=1100).contains(&first));
    }
}
