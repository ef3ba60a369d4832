// Work Item Model - typed units of scheduled work
//
// Operations carry explicit variants rather than opaque closures so
// executors can match exhaustively and errors stay enumerable.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::document::{CachedDocument, Card, CardId, RecordId, TopicShell, UserIdentity};
use crate::domain::operation::OperationType;

/// The work carried by an operation.
///
/// Save variants overwrite whole collections on the remote record
/// (last-writer-wins at collection granularity).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum WorkItem {
    /// Overwrite the remote card collection
    SaveCards {
        user: UserIdentity,
        cards: Vec<Card>,
    },
    /// Overwrite the remote topic shells
    SaveTopics {
        user: UserIdentity,
        topics: Vec<TopicShell>,
    },
    /// Overwrite document metadata and spaced-repetition buckets
    SaveMetadata {
        user: UserIdentity,
        metadata: serde_json::Map<String, serde_json::Value>,
        buckets: Vec<Vec<CardId>>,
    },
    /// Overwrite the subject color map
    SaveColors {
        user: UserIdentity,
        colors: BTreeMap<String, String>,
    },
    /// Comprehensive save of every collection at once
    SaveDocument {
        user: UserIdentity,
        document: CachedDocument,
    },
    /// Search the remote store for the record belonging to a user
    LocateRecord { user: UserIdentity },
}

impl WorkItem {
    /// Default type tag for grouping and telemetry
    pub fn op_type(&self) -> OperationType {
        match self {
            WorkItem::SaveCards { .. } => OperationType::new("saveCards"),
            WorkItem::SaveTopics { .. } => OperationType::new("saveTopics"),
            WorkItem::SaveMetadata { .. } => OperationType::new("saveMetadata"),
            WorkItem::SaveColors { .. } => OperationType::new("saveColors"),
            WorkItem::SaveDocument { .. } => OperationType::new("saveDocument"),
            WorkItem::LocateRecord { .. } => OperationType::new("recordLookup"),
        }
    }

    /// The user whose record this work targets
    pub fn user(&self) -> &UserIdentity {
        match self {
            WorkItem::SaveCards { user, .. }
            | WorkItem::SaveTopics { user, .. }
            | WorkItem::SaveMetadata { user, .. }
            | WorkItem::SaveColors { user, .. }
            | WorkItem::SaveDocument { user, .. }
            | WorkItem::LocateRecord { user } => user,
        }
    }
}

/// Result of executing a work item
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkOutput {
    /// Write acknowledged by the remote store
    Saved,
    /// Record id located for a user
    Record(RecordId),
}
