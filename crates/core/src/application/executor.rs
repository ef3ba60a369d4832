// Record Store Executor - translates work items into remote store calls

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::application::locator::RecordIdCache;
use crate::application::queue::constants::CREDENTIAL_REFRESH_TIMEOUT_MS;
use crate::domain::document::{CachedDocument, RecordId, UserIdentity};
use crate::domain::work::{WorkItem, WorkOutput};
use crate::error::{Result, SyncError};
use crate::port::record_store::{fields, FieldMap, RecordFilter, RecordStore};
use crate::port::{CredentialProvider, WorkExecutor};

/// Production work executor: every variant becomes one remote store call.
///
/// On an authorization failure it runs exactly one refresh-credential-
/// and-retry cycle before surfacing the error; the store adapter reads
/// the current token from the shared provider on every call.
pub struct RecordStoreExecutor {
    records: Arc<dyn RecordStore>,
    credentials: Arc<dyn CredentialProvider>,
    record_ids: Arc<RecordIdCache>,
}

impl RecordStoreExecutor {
    pub fn new(
        records: Arc<dyn RecordStore>,
        credentials: Arc<dyn CredentialProvider>,
        record_ids: Arc<RecordIdCache>,
    ) -> Self {
        Self {
            records,
            credentials,
            record_ids,
        }
    }

    fn require_record_id(&self, user: &UserIdentity) -> Result<RecordId> {
        self.record_ids.get(user).ok_or_else(|| {
            SyncError::NotFound(format!("no record id cached for user {}", user.id))
        })
    }

    async fn save_fields(&self, user: &UserIdentity, record_fields: FieldMap) -> Result<WorkOutput> {
        let record_id = self.require_record_id(user)?;
        self.update_with_refresh(&record_id, record_fields).await?;
        Ok(WorkOutput::Saved)
    }

    /// One transparent refresh-then-retry on authorization failure
    async fn update_with_refresh(&self, record_id: &RecordId, record_fields: FieldMap) -> Result<()> {
        match self
            .records
            .update_record(record_id, record_fields.clone())
            .await
        {
            Err(SyncError::NotAuthorized(reason)) => {
                warn!(
                    record_id = %record_id,
                    reason = %reason,
                    "Update not authorized, refreshing credential"
                );
                self.refresh_credential().await?;
                self.records.update_record(record_id, record_fields).await
            }
            other => other,
        }
    }

    async fn refresh_credential(&self) -> Result<()> {
        let refresh = self.credentials.refresh_token();
        match tokio::time::timeout(
            Duration::from_millis(CREDENTIAL_REFRESH_TIMEOUT_MS),
            refresh,
        )
        .await
        {
            Ok(Ok(_token)) => {
                debug!("Credential refreshed");
                Ok(())
            }
            Ok(Err(err)) => Err(err),
            Err(_) => Err(SyncError::RefreshTimeout(CREDENTIAL_REFRESH_TIMEOUT_MS)),
        }
    }

    async fn locate(&self, user: &UserIdentity) -> Result<WorkOutput> {
        let filter = RecordFilter::for_user(user);
        let matches = self.records.search_records(&filter).await?;
        match matches.into_iter().next() {
            Some(record) => {
                info!(user_id = %user.id, record_id = %record.id, "Record located");
                self.record_ids.insert(user, record.id.clone());
                Ok(WorkOutput::Record(record.id))
            }
            None => Err(SyncError::NotFound(format!(
                "no record matches user {}",
                user.id
            ))),
        }
    }
}

/// Collections are stored as JSON text inside the record's composite
/// fields; the store has no partial-update semantics for them
fn json_field<T: serde::Serialize>(name: &str, value: &T) -> Result<(String, Value)> {
    Ok((name.to_string(), Value::String(serde_json::to_string(value)?)))
}

pub(crate) fn document_fields(document: &CachedDocument) -> Result<FieldMap> {
    let mut map = FieldMap::new();
    for (name, value) in [
        json_field(fields::CARDS, &document.cards)?,
        json_field(fields::TOPICS, &document.topics)?,
        json_field(fields::COLOR_MAP, &document.colors)?,
        json_field(fields::METADATA, &document.metadata)?,
        json_field(fields::BUCKETS, &document.buckets)?,
    ] {
        map.insert(name, value);
    }
    Ok(map)
}

#[async_trait]
impl WorkExecutor for RecordStoreExecutor {
    async fn execute(&self, work: &WorkItem) -> Result<WorkOutput> {
        match work {
            WorkItem::SaveCards { user, cards } => {
                let mut map = FieldMap::new();
                let (name, value) = json_field(fields::CARDS, cards)?;
                map.insert(name, value);
                self.save_fields(user, map).await
            }
            WorkItem::SaveTopics { user, topics } => {
                let mut map = FieldMap::new();
                let (name, value) = json_field(fields::TOPICS, topics)?;
                map.insert(name, value);
                self.save_fields(user, map).await
            }
            WorkItem::SaveMetadata {
                user,
                metadata,
                buckets,
            } => {
                let mut map = FieldMap::new();
                for (name, value) in [
                    json_field(fields::METADATA, metadata)?,
                    json_field(fields::BUCKETS, buckets)?,
                ] {
                    map.insert(name, value);
                }
                self.save_fields(user, map).await
            }
            WorkItem::SaveColors { user, colors } => {
                let mut map = FieldMap::new();
                let (name, value) = json_field(fields::COLOR_MAP, colors)?;
                map.insert(name, value);
                self.save_fields(user, map).await
            }
            WorkItem::SaveDocument { user, document } => {
                self.save_fields(user, document_fields(document)?).await
            }
            WorkItem::LocateRecord { user } => self.locate(user).await,
        }
    }
}
