//! File update collaborator - plans the byte-level writes for a release.
//!
//! The coordinator does not know or care about file formats; it consumes
//! `(path, new bytes)` pairs from a [FileUpdater], snapshots each target,
//! and performs the writes itself so every mutation goes through the
//! ledger.

use crate::domain::Version;
use crate::error::{ReleaseError, Result};
use std::fs;
use std::path::PathBuf;

/// One planned file mutation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedWrite {
    pub path: PathBuf,
    pub contents: Vec<u8>,
}

/// Plans the file mutations for moving from `current` to `target`
pub trait FileUpdater {
    fn plan(&self, current: &Version, target: &Version) -> Result<Vec<PlannedWrite>>;
}

/// Plain-text version rewriter: replaces every occurrence of the current
/// version string in each configured file with the target version.
///
/// Deliberately format-agnostic. Projects needing structured rewriting
/// (TOML tables, JSON fields) plug in their own [FileUpdater].
pub struct VersionFileUpdater {
    root: PathBuf,
    files: Vec<String>,
}

impl VersionFileUpdater {
    pub fn new(root: impl Into<PathBuf>, files: Vec<String>) -> Self {
        VersionFileUpdater {
            root: root.into(),
            files,
        }
    }
}

impl FileUpdater for VersionFileUpdater {
    fn plan(&self, current: &Version, target: &Version) -> Result<Vec<PlannedWrite>> {
        let mut writes = Vec::new();
        let from = current.to_string();
        let to = target.to_string();

        for file in &self.files {
            let path = self.root.join(file);
            let content = fs::read_to_string(&path).map_err(|e| {
                ReleaseError::config(format!("cannot read version file '{}': {}", file, e))
            })?;

            if !content.contains(&from) {
                return Err(ReleaseError::config(format!(
                    "version file '{}' does not contain current version {}",
                    file, from
                )));
            }

            writes.push(PlannedWrite {
                path,
                contents: content.replace(&from, &to).into_bytes(),
            });
        }

        Ok(writes)
    }
}

/// Fixed set of writes, for callers that already know the target bytes
pub struct StaticUpdater {
    writes: Vec<PlannedWrite>,
}

impl StaticUpdater {
    pub fn new(writes: Vec<PlannedWrite>) -> Self {
        StaticUpdater { writes }
    }
}

impl FileUpdater for StaticUpdater {
    fn plan(&self, _current: &Version, _target: &Version) -> Result<Vec<PlannedWrite>> {
        Ok(self.writes.clone())
    }
}
