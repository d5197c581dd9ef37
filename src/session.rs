//! Release session - the aggregate root for one release, persisted as JSON
//! so a crashed release can later be inspected and rolled back.

use crate::domain::{BumpLevel, Version};
use crate::error::{ReleaseError, Result};
use crate::ledger::Ledger;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Name of the working directory git-release keeps its state under
pub const SESSION_DIR: &str = ".git-release";
/// Session file name inside [SESSION_DIR]
pub const SESSION_FILE: &str = "session.json";
/// Snapshot directory name inside [SESSION_DIR]
pub const SNAPSHOT_DIR: &str = "snapshots";

/// Release pipeline states. The forward pass runs top to bottom; the last
/// four are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReleaseState {
    Idle,
    Preflight,
    Snapshotting,
    FilesUpdating,
    Committing,
    Tagging,
    Pushing,
    PublishVerifying,
    Completed,
    CompletedWithWarning,
    RolledBack,
    RollbackFailed,
}

impl ReleaseState {
    /// Whether this state ends the session
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ReleaseState::Completed
                | ReleaseState::CompletedWithWarning
                | ReleaseState::RolledBack
                | ReleaseState::RollbackFailed
        )
    }

    /// Whether a failure in this state triggers automatic rollback.
    ///
    /// From Pushing onward the commit and tag are shared remote state;
    /// deleting them unilaterally would surprise other consumers, so
    /// compensation is only run on explicit request.
    pub fn auto_rollback_on_failure(&self) -> bool {
        matches!(
            self,
            ReleaseState::Preflight
                | ReleaseState::Snapshotting
                | ReleaseState::FilesUpdating
                | ReleaseState::Committing
                | ReleaseState::Tagging
        )
    }
}

impl std::fmt::Display for ReleaseState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ReleaseState::Idle => "idle",
            ReleaseState::Preflight => "preflight",
            ReleaseState::Snapshotting => "snapshotting",
            ReleaseState::FilesUpdating => "files-updating",
            ReleaseState::Committing => "committing",
            ReleaseState::Tagging => "tagging",
            ReleaseState::Pushing => "pushing",
            ReleaseState::PublishVerifying => "publish-verifying",
            ReleaseState::Completed => "completed",
            ReleaseState::CompletedWithWarning => "completed-with-warning",
            ReleaseState::RolledBack => "rolled-back",
            ReleaseState::RollbackFailed => "rollback-failed",
        };
        write!(f, "{}", s)
    }
}

/// The aggregate root for one release invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleaseSession {
    pub id: String,
    pub target_version: Version,
    pub bump: BumpLevel,
    pub state: ReleaseState,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub ledger: Ledger,
}

impl ReleaseSession {
    /// Start a new session for a target version
    pub fn new(target_version: Version, bump: BumpLevel) -> Self {
        let started_at = Utc::now();
        ReleaseSession {
            id: format!(
                "release-{}-{}",
                started_at.format("%Y%m%d%H%M%S"),
                std::process::id()
            ),
            target_version,
            bump,
            state: ReleaseState::Idle,
            started_at,
            finished_at: None,
            ledger: Ledger::new(),
        }
    }

    /// Move to a new state, stamping the finish time on terminal states
    pub fn transition(&mut self, state: ReleaseState) {
        self.state = state;
        if state.is_terminal() {
            self.finished_at = Some(Utc::now());
        }
    }

    /// Serialize the session to its file under `root`
    pub fn save(&self, root: &Path) -> Result<()> {
        let dir = root.join(SESSION_DIR);
        fs::create_dir_all(&dir)?;
        let json = serde_json::to_string_pretty(self)?;
        fs::write(dir.join(SESSION_FILE), json)?;
        Ok(())
    }

    /// Load the persisted session under `root`, if one exists
    pub fn load(root: &Path) -> Result<Option<ReleaseSession>> {
        let path = root.join(SESSION_DIR).join(SESSION_FILE);
        if !path.exists() {
            return Ok(None);
        }
        let session = serde_json::from_str(&fs::read_to_string(&path)?)
            .map_err(|e| ReleaseError::session(format!("corrupt session file: {}", e)))?;
        Ok(Some(session))
    }

    /// Remove all persisted state for the session under `root`
    pub fn discard(root: &Path) -> Result<()> {
        let dir = root.join(SESSION_DIR);
        if dir.exists() {
            fs::remove_dir_all(dir)?;
        }
        Ok(())
    }

    /// Directory holding this session's durable snapshots
    pub fn snapshot_dir(root: &Path) -> PathBuf {
        root.join(SESSION_DIR).join(SNAPSHOT_DIR)
    }
}
