// Recall Infra: file-backed persistence and configuration loading

mod settings;
mod snapshot;

pub use settings::{default_snapshot_dir, SyncConfig};
pub use snapshot::FileSnapshotStore;
