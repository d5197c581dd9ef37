//! Snapshot manager - byte-exact pre-mutation captures of files.
//!
//! Every file the release touches is captured here before the first write,
//! both in memory and durably under the session directory so a crashed
//! release can still be rolled back. Restores go through a temporary file
//! and a rename so a crash mid-restore leaves the target either original or
//! fully restored, never in between.

use crate::error::{ReleaseError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// A byte-exact pre-mutation capture of one file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    /// Unique within one release session
    pub id: String,
    pub path: PathBuf,
    /// Raw original bytes, or `None` if the file did not previously exist
    pub original: Option<Vec<u8>>,
    pub taken_at: DateTime<Utc>,
}

/// Durable sidecar metadata for one snapshot
#[derive(Debug, Serialize, Deserialize)]
struct SnapshotMeta {
    id: String,
    path: PathBuf,
    existed: bool,
    taken_at: DateTime<Utc>,
}

/// Owns all snapshots for the lifetime of one release session
pub struct SnapshotManager {
    dir: PathBuf,
    counter: u32,
    snapshots: HashMap<String, Snapshot>,
}

impl SnapshotManager {
    /// Create a manager rooted at the session directory
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .map_err(|e| ReleaseError::snapshot(dir.display().to_string(), e.to_string()))?;
        Ok(SnapshotManager {
            dir,
            counter: 0,
            snapshots: HashMap::new(),
        })
    }

    /// Reload snapshots persisted by a previous (crashed) session
    pub fn load(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        let mut manager = SnapshotManager {
            dir: dir.clone(),
            counter: 0,
            snapshots: HashMap::new(),
        };

        if !dir.exists() {
            return Ok(manager);
        }

        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().map(|e| e == "meta") != Some(true) {
                continue;
            }
            let meta: SnapshotMeta = serde_json::from_str(&fs::read_to_string(&path)?)?;
            let original = if meta.existed {
                Some(fs::read(dir.join(&meta.id)).map_err(|e| {
                    ReleaseError::snapshot(meta.path.display().to_string(), e.to_string())
                })?)
            } else {
                None
            };
            let sequence: u32 = meta
                .id
                .trim_start_matches("snap-")
                .parse()
                .unwrap_or_default();
            manager.counter = manager.counter.max(sequence);
            manager.snapshots.insert(
                meta.id.clone(),
                Snapshot {
                    id: meta.id,
                    path: meta.path,
                    original,
                    taken_at: meta.taken_at,
                },
            );
        }

        Ok(manager)
    }

    /// Capture the current content of `path` (or record that it does not
    /// exist) before any write. Returns the new snapshot.
    pub fn take(&mut self, path: &Path) -> Result<Snapshot> {
        self.counter += 1;
        let id = format!("snap-{:04}", self.counter);

        let original = match fs::read(path) {
            Ok(bytes) => Some(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => {
                return Err(ReleaseError::snapshot(
                    path.display().to_string(),
                    e.to_string(),
                ))
            }
        };

        // Durable copy first; the in-memory snapshot only exists once the
        // sidecar is on disk.
        if let Some(bytes) = &original {
            fs::write(self.dir.join(&id), bytes)
                .map_err(|e| ReleaseError::snapshot(path.display().to_string(), e.to_string()))?;
        }
        let meta = SnapshotMeta {
            id: id.clone(),
            path: path.to_path_buf(),
            existed: original.is_some(),
            taken_at: Utc::now(),
        };
        let meta_path = self.dir.join(format!("{}.meta", id));
        fs::write(&meta_path, serde_json::to_string_pretty(&meta)?)
            .map_err(|e| ReleaseError::snapshot(path.display().to_string(), e.to_string()))?;

        let snapshot = Snapshot {
            id: id.clone(),
            path: path.to_path_buf(),
            original,
            taken_at: meta.taken_at,
        };
        self.snapshots.insert(id, snapshot.clone());
        Ok(snapshot)
    }

    /// Look up a snapshot by its identifier
    pub fn get(&self, id: &str) -> Option<&Snapshot> {
        self.snapshots.get(id)
    }

    /// Number of snapshots held
    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    /// Whether no snapshots are held
    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    /// Write the original content back verbatim, or delete the file if it
    /// did not previously exist. Atomic from the caller's perspective: the
    /// new content lands in a temporary file that is renamed over the
    /// target.
    pub fn restore(&self, snapshot: &Snapshot) -> Result<()> {
        match &snapshot.original {
            Some(bytes) => {
                let tmp = temp_path(&snapshot.path);
                fs::write(&tmp, bytes).map_err(|e| {
                    ReleaseError::snapshot(snapshot.path.display().to_string(), e.to_string())
                })?;
                fs::rename(&tmp, &snapshot.path).map_err(|e| {
                    ReleaseError::snapshot(snapshot.path.display().to_string(), e.to_string())
                })
            }
            None => match fs::remove_file(&snapshot.path) {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(ReleaseError::snapshot(
                    snapshot.path.display().to_string(),
                    e.to_string(),
                )),
            },
        }
    }

    /// Independently re-read the target and confirm it matches the snapshot
    pub fn verify(&self, snapshot: &Snapshot) -> Result<bool> {
        match fs::read(&snapshot.path) {
            Ok(current) => Ok(snapshot.original.as_deref() == Some(current.as_slice())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Ok(snapshot.original.is_none())
            }
            Err(e) => Err(ReleaseError::snapshot(
                snapshot.path.display().to_string(),
                e.to_string(),
            )),
        }
    }

    /// Remove all durable snapshot copies. Called after a session reaches a
    /// successful terminal state.
    pub fn discard(self) -> Result<()> {
        if self.dir.exists() {
            fs::remove_dir_all(&self.dir)?;
        }
        Ok(())
    }
}

fn temp_path(target: &Path) -> PathBuf {
    let mut name = target
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".restore-tmp");
    target.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_snapshot_and_restore_roundtrip() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("package.json");
        fs::write(&target, b"{\"version\": \"1.0.0\"}").unwrap();

        let mut manager = SnapshotManager::new(dir.path().join("snapshots")).unwrap();
        let snapshot = manager.take(&target).unwrap();

        fs::write(&target, b"{\"version\": \"1.1.0\"}").unwrap();
        assert!(!manager.verify(&snapshot).unwrap());

        manager.restore(&snapshot).unwrap();
        assert_eq!(fs::read(&target).unwrap(), b"{\"version\": \"1.0.0\"}");
        assert!(manager.verify(&snapshot).unwrap());
    }

    #[test]
    fn test_restore_deletes_previously_absent_file() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("CHANGELOG.md");

        let mut manager = SnapshotManager::new(dir.path().join("snapshots")).unwrap();
        let snapshot = manager.take(&target).unwrap();
        assert!(snapshot.original.is_none());

        fs::write(&target, b"# Changelog").unwrap();
        manager.restore(&snapshot).unwrap();
        assert!(!target.exists());
        assert!(manager.verify(&snapshot).unwrap());
    }

    #[test]
    fn test_restore_absent_twice_is_ok() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("missing.txt");

        let mut manager = SnapshotManager::new(dir.path().join("snapshots")).unwrap();
        let snapshot = manager.take(&target).unwrap();
        manager.restore(&snapshot).unwrap();
        manager.restore(&snapshot).unwrap();
        assert!(!target.exists());
    }

    #[test]
    fn test_snapshot_ids_unique_and_sequential() {
        let dir = tempdir().unwrap();
        let a = dir.path().join("a");
        let b = dir.path().join("b");
        fs::write(&a, b"a").unwrap();
        fs::write(&b, b"b").unwrap();

        let mut manager = SnapshotManager::new(dir.path().join("snapshots")).unwrap();
        let s1 = manager.take(&a).unwrap();
        let s2 = manager.take(&b).unwrap();
        assert_ne!(s1.id, s2.id);
        assert_eq!(manager.len(), 2);
    }

    #[test]
    fn test_load_rebuilds_from_disk() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("version.txt");
        fs::write(&target, b"1.0.0").unwrap();
        let snapshot_dir = dir.path().join("snapshots");

        let id = {
            let mut manager = SnapshotManager::new(&snapshot_dir).unwrap();
            manager.take(&target).unwrap().id
        };

        // Simulate a crashed process picking the session back up
        fs::write(&target, b"9.9.9").unwrap();
        let reloaded = SnapshotManager::load(&snapshot_dir).unwrap();
        let snapshot = reloaded.get(&id).expect("snapshot should reload");
        assert_eq!(snapshot.original.as_deref(), Some(b"1.0.0".as_slice()));

        reloaded.restore(snapshot).unwrap();
        assert_eq!(fs::read(&target).unwrap(), b"1.0.0");
    }

    #[test]
    fn test_load_missing_dir_is_empty() {
        let dir = tempdir().unwrap();
        let manager = SnapshotManager::load(dir.path().join("nope")).unwrap();
        assert!(manager.is_empty());
    }

    #[test]
    fn test_verify_detects_drift() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("file");
        fs::write(&target, b"original").unwrap();

        let mut manager = SnapshotManager::new(dir.path().join("snapshots")).unwrap();
        let snapshot = manager.take(&target).unwrap();

        assert!(manager.verify(&snapshot).unwrap());
        fs::write(&target, b"mutated").unwrap();
        assert!(!manager.verify(&snapshot).unwrap());
        fs::remove_file(&target).unwrap();
        assert!(!manager.verify(&snapshot).unwrap());
    }
}
