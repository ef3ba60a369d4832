// Local Snapshot Store Port (Interface)

use thiserror::Error;

/// Snapshot persistence errors. Callers treat the store as best-effort:
/// failures are logged, never propagated into the queue.
#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("IO error: {0}")]
    Io(String),

    #[error("Invalid snapshot key: {0}")]
    InvalidKey(String),
}

/// Synchronous, best-effort local persistence.
///
/// Survives process restarts and serves as the offline fallback and crash
/// backup for the cached document. Implementations stay on fast local
/// media so a write never stalls the queue.
pub trait SnapshotStore: Send + Sync {
    /// Write a blob under a key, overwriting any previous value
    fn write(&self, key: &str, blob: &[u8]) -> Result<(), SnapshotError>;

    /// Read a blob; Ok(None) when the key was never written
    fn read(&self, key: &str) -> Result<Option<Vec<u8>>, SnapshotError>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    /// In-memory snapshot store
    #[derive(Default)]
    pub struct MemorySnapshotStore {
        blobs: Mutex<HashMap<String, Vec<u8>>>,
        fail_writes: AtomicBool,
    }

    impl MemorySnapshotStore {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn set_fail_writes(&self, fail: bool) {
            self.fail_writes.store(fail, Ordering::SeqCst);
        }

        pub fn keys(&self) -> Vec<String> {
            self.blobs.lock().unwrap().keys().cloned().collect()
        }
    }

    impl SnapshotStore for MemorySnapshotStore {
        fn write(&self, key: &str, blob: &[u8]) -> Result<(), SnapshotError> {
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(SnapshotError::Io("injected write failure".to_string()));
            }
            self.blobs
                .lock()
                .unwrap()
                .insert(key.to_string(), blob.to_vec());
            Ok(())
        }

        fn read(&self, key: &str) -> Result<Option<Vec<u8>>, SnapshotError> {
            Ok(self.blobs.lock().unwrap().get(key).cloned())
        }
    }
}
