// Cached Document Model - in-memory mirror of the remote record

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Card ID (UUID v4, assigned by the application layer)
pub type CardId = String;

/// Topic ID
pub type TopicId = String;

/// Opaque identifier of a record in the remote store
pub type RecordId = String;

/// Identity used to locate a user's record in the remote store.
///
/// The remote record embeds both a user identifier and a user email;
/// either one is enough for a lookup to match.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserIdentity {
    pub id: String,
    pub email: Option<String>,
}

impl UserIdentity {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email: None,
        }
    }

    pub fn with_email(id: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email: Some(email.into()),
        }
    }
}

/// A single flashcard
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Card {
    pub id: CardId,
    pub topic_id: TopicId,
    pub front: String,
    pub back: String,
    /// Spaced-repetition bucket index (0 = new)
    #[serde(default)]
    pub bucket: u8,
    pub created_at: i64, // epoch ms
}

/// A topic shell; its cards live in the card collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicShell {
    pub id: TopicId,
    pub subject: String,
    pub name: String,
    /// Key into the subject color map
    #[serde(default)]
    pub color_key: Option<String>,
}

/// In-memory mirror of the remote record's content.
///
/// Owned by the transaction coordinator; mutated only inside an active
/// transaction or by the load path, and backed up to the snapshot store
/// after every successful commit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CachedDocument {
    pub record_id: Option<RecordId>,
    pub cards: Vec<Card>,
    pub topics: Vec<TopicShell>,
    /// subject -> base color hex
    pub colors: BTreeMap<String, String>,
    /// Spaced-repetition bucket lists (bucket index -> card ids)
    pub buckets: Vec<Vec<CardId>>,
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

/// Classification of a staged write, used to consolidate commits into one
/// network operation per class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WriteKind {
    CardWrite,
    TopicWrite,
    MetadataUpdate,
    ColorUpdate,
    FullSave,
}

impl std::fmt::Display for WriteKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WriteKind::CardWrite => write!(f, "card-write"),
            WriteKind::TopicWrite => write!(f, "topic-write"),
            WriteKind::MetadataUpdate => write!(f, "metadata-update"),
            WriteKind::ColorUpdate => write!(f, "color-update"),
            WriteKind::FullSave => write!(f, "full-save"),
        }
    }
}

/// A logical write staged inside a transaction.
///
/// Writes replace whole collections (last-writer-wins at collection
/// granularity); the remote store has no partial-update semantics for its
/// composite fields.
#[derive(Debug, Clone)]
pub enum DocumentWrite {
    ReplaceCards(Vec<Card>),
    ReplaceTopics(Vec<TopicShell>),
    MergeMetadata(serde_json::Map<String, serde_json::Value>),
    ReplaceBuckets(Vec<Vec<CardId>>),
    ReplaceColors(BTreeMap<String, String>),
    ReplaceDocument(CachedDocument),
}

impl DocumentWrite {
    pub fn kind(&self) -> WriteKind {
        match self {
            DocumentWrite::ReplaceCards(_) => WriteKind::CardWrite,
            DocumentWrite::ReplaceTopics(_) => WriteKind::TopicWrite,
            DocumentWrite::MergeMetadata(_) | DocumentWrite::ReplaceBuckets(_) => {
                WriteKind::MetadataUpdate
            }
            DocumentWrite::ReplaceColors(_) => WriteKind::ColorUpdate,
            DocumentWrite::ReplaceDocument(_) => WriteKind::FullSave,
        }
    }

    /// Apply the write to the live document
    pub fn apply(self, document: &mut CachedDocument) {
        match self {
            DocumentWrite::ReplaceCards(cards) => document.cards = cards,
            DocumentWrite::ReplaceTopics(topics) => document.topics = topics,
            DocumentWrite::MergeMetadata(map) => {
                for (key, value) in map {
                    document.metadata.insert(key, value);
                }
            }
            DocumentWrite::ReplaceBuckets(buckets) => document.buckets = buckets,
            DocumentWrite::ReplaceColors(colors) => document.colors = colors,
            DocumentWrite::ReplaceDocument(next) => {
                // a full save replaces content; the resolved record id is
                // resolution state, not content
                let record_id = document.record_id.take();
                *document = next;
                if document.record_id.is_none() {
                    document.record_id = record_id;
                }
            }
        }
    }
}
