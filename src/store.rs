//! Persistence of the last known snapshot between restarts.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use log::{info, warn};

use crate::error::StoreError;
use crate::types::Snapshot;

pub trait SnapshotStore: Send + Sync {
    /// Loads the persisted snapshot.  A missing or unreadable file yields an
    /// empty snapshot, which puts the next poll in bootstrap mode.
    fn load(&self) -> Snapshot;

    fn save(&self, snapshot: &Snapshot) -> Result<(), StoreError>;
}

/// Stores the snapshot as a pretty-printed JSON object keyed by container id.
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<Option<Snapshot>, StoreError> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_slice(&bytes)?))
    }
}

impl SnapshotStore for JsonFileStore {
    fn load(&self) -> Snapshot {
        match self.read() {
            Ok(Some(snapshot)) => {
                info!(
                    "Loaded {} containers from {}",
                    snapshot.len(),
                    self.path.display()
                );
                snapshot
            }
            Ok(None) => {
                info!("No snapshot at {}, starting fresh", self.path.display());
                Snapshot::new()
            }
            Err(e) => {
                warn!("Failed to read {}: {}", self.path.display(), e);
                Snapshot::new()
            }
        }
    }

    fn save(&self, snapshot: &Snapshot) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        // Write next to the target and rename, so a crash never leaves a
        // truncated file behind.
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(snapshot)?)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}
