// Domain Layer - Pure entities and state machines

pub mod document;
pub mod error;
pub mod operation;
pub mod work;

// Re-exports
pub use document::{
    CachedDocument, Card, CardId, DocumentWrite, RecordId, TopicId, TopicShell, UserIdentity,
    WriteKind,
};
pub use error::DomainError;
pub use operation::{
    clamp_priority, Operation, OperationId, OperationStatus, OperationType, Priority,
    DEFAULT_PRIORITY, MAX_PRIORITY, MIN_PRIORITY,
};
pub use work::{WorkItem, WorkOutput};
