// Sync engine configuration loading

use std::path::{Path, PathBuf};

use config::{Config, Environment, File};
use directories::ProjectDirs;
use recall_core::application::queue::{QueueSettings, SettingsPatch};
use serde::Deserialize;

/// On-disk / environment configuration for the sync engine.
///
/// Sources, later wins: an optional TOML file, then `RECALL_SYNC_*`
/// environment variables (e.g. `RECALL_SYNC_RETRY_DELAY_MS=500`). Every
/// field is optional; unset fields keep the queue defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SyncConfig {
    pub max_retries: Option<u32>,
    pub retry_delay_ms: Option<u64>,
    pub exponential_backoff: Option<bool>,
    pub max_retry_delay_ms: Option<u64>,
    pub retry_jitter: Option<bool>,
    pub offline_mode: Option<bool>,
    pub snapshot_dir: Option<PathBuf>,
}

impl SyncConfig {
    /// Load configuration, optionally from an explicit file
    pub fn load(file: Option<&Path>) -> Result<Self, config::ConfigError> {
        let mut builder = Config::builder();
        if let Some(path) = file {
            builder = builder.add_source(File::from(path.to_path_buf()));
        }
        builder = builder.add_source(Environment::with_prefix("RECALL_SYNC"));
        builder.build()?.try_deserialize()
    }

    /// Settings patch to merge into a queue's defaults
    pub fn settings_patch(&self) -> SettingsPatch {
        SettingsPatch {
            max_retries: self.max_retries,
            retry_delay_ms: self.retry_delay_ms,
            exponential_backoff: self.exponential_backoff,
            max_retry_delay_ms: self.max_retry_delay_ms.map(Some),
            retry_jitter: self.retry_jitter,
            offline_mode: self.offline_mode,
        }
    }

    /// Queue settings with this configuration applied over the defaults
    pub fn queue_settings(&self) -> QueueSettings {
        let mut settings = QueueSettings::default();
        settings.merge(self.settings_patch());
        settings
    }

    /// Snapshot directory: configured, or the platform data dir
    pub fn snapshot_dir(&self) -> PathBuf {
        self.snapshot_dir.clone().unwrap_or_else(default_snapshot_dir)
    }
}

/// Platform data directory for snapshots
pub fn default_snapshot_dir() -> PathBuf {
    ProjectDirs::from("app", "Recall", "recall-sync")
        .map(|dirs| dirs.data_dir().join("snapshots"))
        .unwrap_or_else(|| PathBuf::from(".recall-sync/snapshots"))
}
