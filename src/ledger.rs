//! Operation ledger - durable, ordered memory of every mutating action.
//!
//! Entries are appended during the forward pass and never reordered or
//! removed; `status` is the only field mutated in place, and only during
//! rollback. Rollback walks entries in strict reverse sequence order,
//! dispatches one compensating action per operation variant, then
//! independently re-queries actual state before marking the entry rolled
//! back. The first entry whose compensation cannot be verified halts the
//! whole rollback: later guesses on top of an unexplained failure risk
//! compounding the damage.

use crate::error::Result;
use crate::git::Repository;
use crate::snapshot::SnapshotManager;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One mutating action taken during a release, self-describing enough to be
/// compensated and independently re-verified.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Operation {
    FileSnapshot {
        path: PathBuf,
        snapshot_id: String,
    },
    FileWrite {
        path: PathBuf,
        snapshot_id: String,
    },
    Commit {
        hash: String,
        /// HEAD before the commit, target of the compensating soft reset
        prior_head: String,
    },
    TagCreate {
        tag: String,
    },
    TagPush {
        tag: String,
        remote: String,
        /// Whether the push actually reached the remote
        pushed: bool,
    },
    RemoteStateCheck {
        tag: String,
        remote: String,
        exists: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryStatus {
    Pending,
    Completed,
    RolledBack,
    RollbackFailed,
}

/// One durable ledger record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub sequence: u64,
    pub operation: Operation,
    pub status: EntryStatus,
    pub recorded_at: DateTime<Utc>,
}

/// Outcome of one rollback run
#[derive(Debug, Clone, PartialEq)]
pub struct RollbackReport {
    /// Sequences compensated and verified during this run
    pub rolled_back: Vec<u64>,
    /// Sequence and reason of the entry that halted rollback, if any
    pub failed: Option<(u64, String)>,
}

impl RollbackReport {
    /// Whether every processed entry verified clean
    pub fn succeeded(&self) -> bool {
        self.failed.is_none()
    }
}

/// Append-only record of mutating release actions
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Ledger {
    entries: Vec<LedgerEntry>,
}

impl Ledger {
    pub fn new() -> Self {
        Ledger::default()
    }

    /// Append a pending entry; returns its sequence number
    pub fn record(&mut self, operation: Operation) -> u64 {
        let sequence = self.entries.len() as u64 + 1;
        self.entries.push(LedgerEntry {
            sequence,
            operation,
            status: EntryStatus::Pending,
            recorded_at: Utc::now(),
        });
        sequence
    }

    /// Append an entry that is already complete
    pub fn record_completed(&mut self, operation: Operation) -> u64 {
        let sequence = self.record(operation);
        self.mark_completed(sequence);
        sequence
    }

    /// Mark a pending entry's side effects as durable
    pub fn mark_completed(&mut self, sequence: u64) {
        if let Some(entry) = self.entry_mut(sequence) {
            entry.status = EntryStatus::Completed;
        }
    }

    pub fn entries(&self) -> &[LedgerEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether a completed snapshot entry exists for this path; the
    /// coordinator refuses file writes without one.
    pub fn has_snapshot_for(&self, path: &std::path::Path) -> bool {
        self.entries.iter().any(|e| {
            e.status == EntryStatus::Completed
                && matches!(&e.operation, Operation::FileSnapshot { path: p, .. } if p == path)
        })
    }

    fn entry_mut(&mut self, sequence: u64) -> Option<&mut LedgerEntry> {
        self.entries.iter_mut().find(|e| e.sequence == sequence)
    }

    /// Compensate all completed entries in reverse sequence order.
    ///
    /// Each compensation is followed by an independent state re-query; an
    /// entry is only marked `RolledBack` once that verification passes. On
    /// the first verification failure the entry is marked `RollbackFailed`
    /// and the run halts, leaving lower-sequence entries `Completed` for
    /// manual intervention. Re-running over already rolled-back entries
    /// re-verifies without re-compensating.
    pub fn rollback(
        &mut self,
        snapshots: &SnapshotManager,
        repo: &dyn Repository,
    ) -> RollbackReport {
        let mut report = RollbackReport {
            rolled_back: Vec::new(),
            failed: None,
        };

        let sequences: Vec<u64> = self.entries.iter().rev().map(|e| e.sequence).collect();

        for sequence in sequences {
            let entry = match self.entry_mut(sequence) {
                Some(e) => e,
                None => continue,
            };

            match entry.status {
                // Never became durable, nothing to compensate
                EntryStatus::Pending => continue,
                EntryStatus::RollbackFailed => {
                    report.failed = Some((
                        sequence,
                        "entry previously failed rollback verification".to_string(),
                    ));
                    break;
                }
                EntryStatus::RolledBack => {
                    // Idempotence: re-verify only
                    let operation = entry.operation.clone();
                    match verify_rolled_back(&operation, snapshots, repo) {
                        Ok(true) => continue,
                        Ok(false) | Err(_) => {
                            if let Some(entry) = self.entry_mut(sequence) {
                                entry.status = EntryStatus::RollbackFailed;
                            }
                            report.failed = Some((
                                sequence,
                                "previously rolled-back state no longer verifies".to_string(),
                            ));
                            break;
                        }
                    }
                }
                EntryStatus::Completed => {
                    let operation = entry.operation.clone();
                    match compensate(&operation, snapshots, repo)
                        .and_then(|()| verify_rolled_back(&operation, snapshots, repo))
                    {
                        Ok(true) => {
                            if let Some(entry) = self.entry_mut(sequence) {
                                entry.status = EntryStatus::RolledBack;
                            }
                            report.rolled_back.push(sequence);
                        }
                        Ok(false) => {
                            if let Some(entry) = self.entry_mut(sequence) {
                                entry.status = EntryStatus::RollbackFailed;
                            }
                            report.failed = Some((
                                sequence,
                                "state verification failed after compensation".to_string(),
                            ));
                            break;
                        }
                        Err(e) => {
                            if let Some(entry) = self.entry_mut(sequence) {
                                entry.status = EntryStatus::RollbackFailed;
                            }
                            report.failed = Some((sequence, e.to_string()));
                            break;
                        }
                    }
                }
            }
        }

        report
    }
}

/// Dispatch the compensating action for one operation.
fn compensate(
    operation: &Operation,
    snapshots: &SnapshotManager,
    repo: &dyn Repository,
) -> Result<()> {
    match operation {
        // Read-only captures have no side effects to undo
        Operation::FileSnapshot { .. } | Operation::RemoteStateCheck { .. } => Ok(()),
        Operation::FileWrite { snapshot_id, path } => {
            let snapshot = snapshots.get(snapshot_id).ok_or_else(|| {
                crate::error::ReleaseError::rollback(format!(
                    "no snapshot '{}' for {}",
                    snapshot_id,
                    path.display()
                ))
            })?;
            snapshots.restore(snapshot)
        }
        Operation::Commit { prior_head, .. } => repo.soft_reset(prior_head),
        Operation::TagCreate { tag } => repo.delete_local_tag(tag),
        Operation::TagPush { tag, remote, .. } => {
            // Never assume the remote is clean: re-check before deleting,
            // and treat "already absent" as success.
            if repo.remote_tag_exists(remote, tag)? {
                repo.delete_remote_tag(remote, tag)?;
            }
            Ok(())
        }
    }
}

/// Independently re-query actual state for one compensated operation.
fn verify_rolled_back(
    operation: &Operation,
    snapshots: &SnapshotManager,
    repo: &dyn Repository,
) -> Result<bool> {
    match operation {
        Operation::FileSnapshot { .. } | Operation::RemoteStateCheck { .. } => Ok(true),
        Operation::FileWrite { snapshot_id, .. } => match snapshots.get(snapshot_id) {
            Some(snapshot) => snapshots.verify(snapshot),
            None => Ok(false),
        },
        Operation::Commit { prior_head, .. } => Ok(repo.head_oid()? == *prior_head),
        Operation::TagCreate { tag } => Ok(!repo.tag_exists(tag)?),
        Operation::TagPush { tag, remote, .. } => Ok(!repo.remote_tag_exists(remote, tag)?),
    }
}
