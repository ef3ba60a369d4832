// Remote Record Store Port (Interface)
//
// The remote store keeps all of a user's flashcard data inside one record
// as composite fields; this port exposes only the generic get / update /
// search contract the core needs.

use async_trait::async_trait;
use serde_json::Value;

use crate::domain::document::{RecordId, UserIdentity};
use crate::error::Result;

/// Field names of the composite record
pub mod fields {
    pub const CARDS: &str = "Cards";
    pub const TOPICS: &str = "Topics";
    pub const COLOR_MAP: &str = "ColorMap";
    pub const METADATA: &str = "Meta";
    pub const BUCKETS: &str = "ReviewBuckets";
    pub const USER_ID: &str = "UserId";
    pub const USER_EMAIL: &str = "UserEmail";
}

/// Composite field map of a stored record
pub type FieldMap = serde_json::Map<String, Value>;

/// A record as returned by the remote store
#[derive(Debug, Clone)]
pub struct StoredRecord {
    pub id: RecordId,
    pub fields: FieldMap,
}

/// Search predicate: a record matches when its user-id or user-email
/// field equals one of the given values
#[derive(Debug, Clone, Default)]
pub struct RecordFilter {
    pub user_id: Option<String>,
    pub user_email: Option<String>,
}

impl RecordFilter {
    pub fn for_user(user: &UserIdentity) -> Self {
        Self {
            user_id: Some(user.id.clone()),
            user_email: user.email.clone(),
        }
    }

    pub fn matches(&self, record_fields: &FieldMap) -> bool {
        let field_equals = |name: &str, expected: &Option<String>| {
            match (record_fields.get(name), expected) {
                (Some(Value::String(actual)), Some(expected)) => actual == expected,
                _ => false,
            }
        };
        field_equals(fields::USER_ID, &self.user_id)
            || field_equals(fields::USER_EMAIL, &self.user_email)
    }
}

/// Remote record store interface
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Fetch a record by id
    async fn get_record(&self, record_id: &RecordId) -> Result<StoredRecord>;

    /// Overwrite fields of a record; untouched fields keep their value
    async fn update_record(&self, record_id: &RecordId, record_fields: FieldMap) -> Result<()>;

    /// Search records matching the filter
    async fn search_records(&self, filter: &RecordFilter) -> Result<Vec<StoredRecord>>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use crate::error::SyncError;
    use std::collections::{HashMap, VecDeque};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// In-memory record store with scripted failures and call counting
    #[derive(Default)]
    pub struct MockRecordStore {
        records: Mutex<HashMap<RecordId, FieldMap>>,
        update_failures: Mutex<VecDeque<SyncError>>,
        search_failures: Mutex<VecDeque<SyncError>>,
        fail_all_updates: AtomicBool,
        update_count: AtomicUsize,
        search_count: AtomicUsize,
    }

    impl MockRecordStore {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_record(self, id: impl Into<RecordId>, record_fields: FieldMap) -> Self {
            self.insert_record(id, record_fields);
            self
        }

        pub fn insert_record(&self, id: impl Into<RecordId>, record_fields: FieldMap) {
            self.records
                .lock()
                .unwrap()
                .insert(id.into(), record_fields);
        }

        /// Fail the next update with the given error, then resume normal
        /// behavior (queued, first pushed fails first)
        pub fn push_update_failure(&self, err: SyncError) {
            self.update_failures.lock().unwrap().push_back(err);
        }

        pub fn push_search_failure(&self, err: SyncError) {
            self.search_failures.lock().unwrap().push_back(err);
        }

        pub fn set_fail_all_updates(&self, fail: bool) {
            self.fail_all_updates.store(fail, Ordering::SeqCst);
        }

        pub fn update_count(&self) -> usize {
            self.update_count.load(Ordering::SeqCst)
        }

        pub fn search_count(&self) -> usize {
            self.search_count.load(Ordering::SeqCst)
        }

        pub fn record(&self, id: &str) -> Option<FieldMap> {
            self.records.lock().unwrap().get(id).cloned()
        }
    }

    #[async_trait]
    impl RecordStore for MockRecordStore {
        async fn get_record(&self, record_id: &RecordId) -> Result<StoredRecord> {
            let records = self.records.lock().unwrap();
            records
                .get(record_id)
                .map(|record_fields| StoredRecord {
                    id: record_id.clone(),
                    fields: record_fields.clone(),
                })
                .ok_or_else(|| SyncError::NotFound(format!("record {record_id}")))
        }

        async fn update_record(
            &self,
            record_id: &RecordId,
            record_fields: FieldMap,
        ) -> Result<()> {
            self.update_count.fetch_add(1, Ordering::SeqCst);

            if let Some(err) = self.update_failures.lock().unwrap().pop_front() {
                return Err(err);
            }
            if self.fail_all_updates.load(Ordering::SeqCst) {
                return Err(SyncError::Network("injected update failure".to_string()));
            }

            let mut records = self.records.lock().unwrap();
            match records.get_mut(record_id) {
                Some(existing) => {
                    for (key, value) in record_fields {
                        existing.insert(key, value);
                    }
                    Ok(())
                }
                None => Err(SyncError::NotFound(format!("record {record_id}"))),
            }
        }

        async fn search_records(&self, filter: &RecordFilter) -> Result<Vec<StoredRecord>> {
            self.search_count.fetch_add(1, Ordering::SeqCst);

            if let Some(err) = self.search_failures.lock().unwrap().pop_front() {
                return Err(err);
            }

            let records = self.records.lock().unwrap();
            Ok(records
                .iter()
                .filter(|(_, record_fields)| filter.matches(record_fields))
                .map(|(id, record_fields)| StoredRecord {
                    id: id.clone(),
                    fields: record_fields.clone(),
                })
                .collect())
        }
    }
}
