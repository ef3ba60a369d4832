// Work Executor Port
// Abstraction for running the typed work items selected by the queue

use async_trait::async_trait;

use crate::domain::work::{WorkItem, WorkOutput};
use crate::error::Result;

/// Work Executor trait
///
/// Implementations:
/// - RecordStoreExecutor: translates work into remote store calls
/// - MockWorkExecutor: scripted behavior for tests
#[async_trait]
pub trait WorkExecutor: Send + Sync {
    /// Execute a work item and return its output
    async fn execute(&self, work: &WorkItem) -> Result<WorkOutput>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use crate::domain::document::RecordId;
    use crate::error::SyncError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Mock executor behavior
    #[derive(Debug, Clone)]
    pub enum MockBehavior {
        /// Always succeed
        Success,
        /// Always fail with the given error
        Fail(SyncError),
        /// Fail the first n calls, then succeed
        FailTimes(u32, SyncError),
        /// Succeed after sleeping (for timeout tests)
        Slow(u64),
    }

    /// Mock Work Executor for testing
    pub struct MockWorkExecutor {
        behavior: Mutex<MockBehavior>,
        call_count: AtomicUsize,
        executed: Mutex<Vec<WorkItem>>,
    }

    impl MockWorkExecutor {
        pub fn new(behavior: MockBehavior) -> Self {
            Self {
                behavior: Mutex::new(behavior),
                call_count: AtomicUsize::new(0),
                executed: Mutex::new(Vec::new()),
            }
        }

        pub fn new_success() -> Self {
            Self::new(MockBehavior::Success)
        }

        pub fn new_fail(err: SyncError) -> Self {
            Self::new(MockBehavior::Fail(err))
        }

        pub fn set_behavior(&self, behavior: MockBehavior) {
            *self.behavior.lock().unwrap() = behavior;
        }

        pub fn call_count(&self) -> usize {
            self.call_count.load(Ordering::SeqCst)
        }

        /// Work items in execution order
        pub fn executed(&self) -> Vec<WorkItem> {
            self.executed.lock().unwrap().clone()
        }

        /// User ids of executed work items, in execution order
        pub fn executed_users(&self) -> Vec<String> {
            self.executed
                .lock()
                .unwrap()
                .iter()
                .map(|work| work.user().id.clone())
                .collect()
        }

        fn output_for(work: &WorkItem) -> WorkOutput {
            match work {
                WorkItem::LocateRecord { user } => {
                    WorkOutput::Record(RecordId::from(format!("rec-{}", user.id)))
                }
                _ => WorkOutput::Saved,
            }
        }
    }

    #[async_trait]
    impl WorkExecutor for MockWorkExecutor {
        async fn execute(&self, work: &WorkItem) -> Result<WorkOutput> {
            let call = self.call_count.fetch_add(1, Ordering::SeqCst);
            self.executed.lock().unwrap().push(work.clone());

            let behavior = self.behavior.lock().unwrap().clone();
            match behavior {
                MockBehavior::Success => Ok(Self::output_for(work)),
                MockBehavior::Fail(err) => Err(err),
                MockBehavior::FailTimes(n, err) => {
                    if (call as u32) < n {
                        Err(err)
                    } else {
                        Ok(Self::output_for(work))
                    }
                }
                MockBehavior::Slow(delay_ms) => {
                    tokio::time::sleep(std::time::Duration::from_millis(delay_ms)).await;
                    Ok(Self::output_for(work))
                }
            }
        }
    }
}
