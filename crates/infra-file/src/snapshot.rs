// File-backed Snapshot Store

use std::fs;
use std::io::Write;
use std::path::PathBuf;

use recall_core::port::{SnapshotError, SnapshotStore};
use tracing::{debug, warn};

/// Snapshot store writing one file per key under a data directory.
///
/// Writes land in a temporary sibling first and are renamed into place,
/// so a crash mid-write never corrupts the previous snapshot.
pub struct FileSnapshotStore {
    dir: PathBuf,
}

impl FileSnapshotStore {
    /// Store snapshots under the given directory, created on first write
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, SnapshotError> {
        if key.is_empty() {
            return Err(SnapshotError::InvalidKey("empty key".to_string()));
        }
        // keys come from trusted callers, but never let one escape the dir
        let name: String = key
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        Ok(self.dir.join(format!("{name}.snapshot")))
    }
}

impl SnapshotStore for FileSnapshotStore {
    fn write(&self, key: &str, blob: &[u8]) -> Result<(), SnapshotError> {
        let path = self.path_for(key)?;
        fs::create_dir_all(&self.dir).map_err(|e| SnapshotError::Io(e.to_string()))?;

        let tmp = path.with_extension("snapshot.tmp");
        let mut file = fs::File::create(&tmp).map_err(|e| SnapshotError::Io(e.to_string()))?;
        file.write_all(blob)
            .map_err(|e| SnapshotError::Io(e.to_string()))?;
        drop(file);
        fs::rename(&tmp, &path).map_err(|e| SnapshotError::Io(e.to_string()))?;

        debug!(key = %key, bytes = blob.len(), "Snapshot written");
        Ok(())
    }

    fn read(&self, key: &str) -> Result<Option<Vec<u8>>, SnapshotError> {
        let path = self.path_for(key)?;
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => {
                warn!(key = %key, error = %err, "Snapshot read failed");
                Err(SnapshotError::Io(err.to_string()))
            }
        }
    }
}
