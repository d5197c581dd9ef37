//! Release coordinator - the top-level state machine.
//!
//! Sequences snapshotting, file mutation, commit, tag, push and registry
//! verification, persisting the session after every transition so a crash
//! at any point leaves enough on disk to compensate later. The pipeline is
//! strictly sequential: no step begins before the previous one's side
//! effects are durable and ledgered.
//!
//! The push is the reversibility boundary. Failures before it trigger an
//! automatic, verified rollback through the ledger; failures at or after it
//! are surfaced with guidance to run an explicit rollback, because the
//! commit and tag are shared remote state by then and deleting them
//! unilaterally would surprise other consumers.

use crate::analyzer::{compute_bump, last_release_tag};
use crate::config::Config;
use crate::domain::{BumpLevel, CommitRecord, TagName, Version};
use crate::error::{ReleaseError, Result};
use crate::git::Repository;
use crate::ledger::Operation;
use crate::registry::{PublishVerifier, RegistryClient, VerifyOutcome};
use crate::session::{ReleaseSession, ReleaseState};
use crate::snapshot::SnapshotManager;
use crate::updater::{FileUpdater, PlannedWrite};
use std::fs;
use std::path::PathBuf;

/// Everything decided before the first mutation
#[derive(Debug, Clone)]
pub struct ReleasePlan {
    pub last_tag: Option<TagName>,
    pub commits: Vec<CommitRecord>,
    pub bump: BumpLevel,
    pub current_version: Version,
    pub target_version: Version,
    pub tag: TagName,
}

/// Terminal result of a release invocation, mapped onto process exit codes
#[derive(Debug, Clone, PartialEq)]
pub enum ReleaseOutcome {
    Completed {
        version: Version,
        tag: String,
    },
    CompletedWithWarning {
        version: Version,
        tag: String,
        warning: String,
    },
    RolledBack {
        reason: String,
    },
    RollbackFailed {
        reason: String,
    },
}

impl ReleaseOutcome {
    pub fn exit_code(&self) -> i32 {
        match self {
            ReleaseOutcome::Completed { .. } => 0,
            ReleaseOutcome::RolledBack { .. } => 1,
            ReleaseOutcome::RollbackFailed { .. } => 2,
            ReleaseOutcome::CompletedWithWarning { .. } => 3,
        }
    }
}

/// Top-level release state machine over a repository, a file updater and an
/// optional registry verifier
pub struct ReleaseCoordinator<'a, R: Repository> {
    config: &'a Config,
    repo: &'a R,
    updater: &'a dyn FileUpdater,
    verifier: Option<PublishVerifier<Box<dyn RegistryClient>>>,
    root: PathBuf,
}

impl<'a, R: Repository> ReleaseCoordinator<'a, R> {
    pub fn new(
        config: &'a Config,
        repo: &'a R,
        updater: &'a dyn FileUpdater,
        root: impl Into<PathBuf>,
    ) -> Self {
        ReleaseCoordinator {
            config,
            repo,
            updater,
            verifier: None,
            root: root.into(),
        }
    }

    /// Attach a publish verifier for the post-push confirmation step
    pub fn with_verifier(mut self, verifier: PublishVerifier<Box<dyn RegistryClient>>) -> Self {
        self.verifier = Some(verifier);
        self
    }

    /// Compute the release plan from commit history without mutating
    /// anything.
    pub fn plan(&self) -> Result<ReleasePlan> {
        let prefix = &self.config.release.tag_prefix;
        let last_tag = last_release_tag(self.repo, prefix)?;

        let lines = self.repo.log_lines_since(last_tag.as_ref().map(|t| t.name.as_str()))?;
        let commits: Vec<CommitRecord> = lines
            .iter()
            .filter_map(|line| CommitRecord::parse_line(line))
            .collect();

        let bump = compute_bump(&commits);
        if bump == BumpLevel::None {
            return Err(ReleaseError::preflight(
                "no releasable commits since the last release",
            ));
        }

        let current_version = match &last_tag {
            Some(tag) => tag.version(prefix)?,
            // First release: the whole history is in scope
            None => Version::new(0, 0, 0),
        };
        let target_version = current_version.bump(bump);
        let tag = TagName::format(prefix, &target_version);

        Ok(ReleasePlan {
            last_tag,
            commits,
            bump,
            current_version,
            target_version,
            tag,
        })
    }

    /// Execute the full release pipeline for a previously computed plan.
    pub fn run(&self, plan: &ReleasePlan) -> Result<ReleaseOutcome> {
        // Must happen before the new session file could clobber an old one
        self.check_no_unreconciled_session()?;

        let mut session = ReleaseSession::new(plan.target_version, plan.bump);
        let mut snapshots = SnapshotManager::new(ReleaseSession::snapshot_dir(&self.root))?;

        match self.forward(plan, &mut session, &mut snapshots) {
            Ok(outcome) => Ok(outcome),
            // The session state alone decides the boundary: Pushing is only
            // entered once the push begins, so any failure before that is
            // compensated regardless of how the error is classed.
            Err(e) if session.state.auto_rollback_on_failure() => {
                Ok(self.compensate(&mut session, &snapshots, e.to_string()))
            }
            Err(e) => {
                // At or past the push: report, keep everything, point at the
                // explicit rollback command.
                session.transition(ReleaseState::CompletedWithWarning);
                session.save(&self.root)?;
                Ok(ReleaseOutcome::CompletedWithWarning {
                    version: plan.target_version,
                    tag: plan.tag.name.clone(),
                    warning: format!(
                        "{}; automatic rollback is skipped once the push has started - \
                         run `git-release --rollback` to compensate after reviewing remote state",
                        e
                    ),
                })
            }
        }
    }

    /// Roll back the persisted session, whether it was left behind by a
    /// crash or is a completed-with-warning release the operator decided to
    /// withdraw. Safe to invoke repeatedly.
    pub fn rollback_persisted(&self) -> Result<ReleaseOutcome> {
        let mut session = ReleaseSession::load(&self.root)?.ok_or_else(|| {
            ReleaseError::session("no persisted release session found to roll back")
        })?;

        let snapshots = SnapshotManager::load(ReleaseSession::snapshot_dir(&self.root))?;
        Ok(self.compensate(&mut session, &snapshots, "explicit rollback requested".into()))
    }

    fn check_no_unreconciled_session(&self) -> Result<()> {
        if let Some(existing) = ReleaseSession::load(&self.root)? {
            let blocked = !existing.state.is_terminal()
                || existing.state == ReleaseState::RollbackFailed;
            if blocked {
                return Err(ReleaseError::preflight(format!(
                    "found session '{}' in state '{}'; resolve it first (git-release --rollback)",
                    existing.id, existing.state
                )));
            }
        }
        Ok(())
    }

    fn preflight(&self, plan: &ReleasePlan) -> Result<()> {
        let remote = &self.config.release.remote;
        if !self.repo.has_remote(remote)? {
            return Err(ReleaseError::preflight(format!(
                "remote '{}' is not configured",
                remote
            )));
        }
        if self.repo.tag_exists(&plan.tag.name)? {
            return Err(ReleaseError::preflight(format!(
                "tag '{}' already exists locally",
                plan.tag
            )));
        }
        Ok(())
    }

    fn forward(
        &self,
        plan: &ReleasePlan,
        session: &mut ReleaseSession,
        snapshots: &mut SnapshotManager,
    ) -> Result<ReleaseOutcome> {
        session.transition(ReleaseState::Preflight);
        session.save(&self.root)?;
        self.preflight(plan)?;

        // Snapshotting: capture every target before the first write
        session.transition(ReleaseState::Snapshotting);
        session.save(&self.root)?;
        let writes = self.updater.plan(&plan.current_version, &plan.target_version)?;
        let mut snapshot_ids = Vec::with_capacity(writes.len());
        for write in &writes {
            let snapshot = snapshots.take(&write.path)?;
            session.ledger.record_completed(Operation::FileSnapshot {
                path: write.path.clone(),
                snapshot_id: snapshot.id.clone(),
            });
            snapshot_ids.push(snapshot.id);
        }
        session.save(&self.root)?;

        // FilesUpdating
        session.transition(ReleaseState::FilesUpdating);
        session.save(&self.root)?;
        for (write, snapshot_id) in writes.iter().zip(&snapshot_ids) {
            if !session.ledger.has_snapshot_for(&write.path) {
                return Err(ReleaseError::snapshot(
                    write.path.display().to_string(),
                    "refusing to write a file without a completed snapshot",
                ));
            }
            // Ledger the intent before touching the file: a write that fails
            // midway leaves partial content that still needs restoring.
            session.ledger.record_completed(Operation::FileWrite {
                path: write.path.clone(),
                snapshot_id: snapshot_id.clone(),
            });
            session.save(&self.root)?;
            fs::write(&write.path, &write.contents)?;
        }

        // Committing
        session.transition(ReleaseState::Committing);
        session.save(&self.root)?;
        let prior_head = self.repo.head_oid()?;
        let message = format!("chore(release): {}", plan.target_version);
        let staged = self.staging_paths(&writes);
        let hash = self.repo.commit_files(&message, &staged)?;
        session.ledger.record_completed(Operation::Commit {
            hash: hash.clone(),
            prior_head,
        });
        session.save(&self.root)?;

        // Tagging
        session.transition(ReleaseState::Tagging);
        session.save(&self.root)?;
        self.repo.create_tag(&plan.tag.name, &hash)?;
        session.ledger.record_completed(Operation::TagCreate {
            tag: plan.tag.name.clone(),
        });
        session.save(&self.root)?;

        // Last read-only look at the remote while rollback is still cheap
        let remote = self.config.release.remote.clone();
        let already_remote = self.repo.remote_tag_exists(&remote, &plan.tag.name)?;
        session.ledger.record_completed(Operation::RemoteStateCheck {
            tag: plan.tag.name.clone(),
            remote: remote.clone(),
            exists: already_remote,
        });
        session.save(&self.root)?;
        if already_remote {
            return Err(ReleaseError::vcs(
                "remote-check",
                format!("tag '{}' already exists on remote '{}'", plan.tag, remote),
            ));
        }

        // Pushing: the reversibility boundary
        session.transition(ReleaseState::Pushing);
        session.save(&self.root)?;
        let branch = self.repo.current_branch()?;
        let push_result = self.repo.push(&remote, &branch, &plan.tag.name);
        session.ledger.record_completed(Operation::TagPush {
            tag: plan.tag.name.clone(),
            remote,
            pushed: push_result.is_ok(),
        });
        session.save(&self.root)?;
        push_result?;

        // PublishVerifying
        session.transition(ReleaseState::PublishVerifying);
        session.save(&self.root)?;
        let package = &self.config.registry.package;
        if let (Some(verifier), false) = (&self.verifier, package.is_empty()) {
            let version = plan.target_version.to_string();
            if let VerifyOutcome::TimedOut { attempts, elapsed } =
                verifier.verify(package, &version)
            {
                session.transition(ReleaseState::CompletedWithWarning);
                session.save(&self.root)?;
                return Ok(ReleaseOutcome::CompletedWithWarning {
                    version: plan.target_version,
                    tag: plan.tag.name.clone(),
                    warning: format!(
                        "version {} not visible on the registry after {} attempts over {:.1}s; \
                         the pushed tag is kept - publication may simply be slow",
                        version,
                        attempts,
                        elapsed.as_secs_f64()
                    ),
                });
            }
        }

        session.transition(ReleaseState::Completed);
        session.save(&self.root)?;
        ReleaseSession::discard(&self.root)?;

        Ok(ReleaseOutcome::Completed {
            version: plan.target_version,
            tag: plan.tag.name.clone(),
        })
    }

    /// Run ledger rollback to a terminal state. Once entered this always
    /// finishes in `RolledBack` or `RollbackFailed`; there is no
    /// cancellation point, because an interrupted rollback is
    /// indistinguishable from a corrupted one.
    fn compensate(
        &self,
        session: &mut ReleaseSession,
        snapshots: &SnapshotManager,
        reason: String,
    ) -> ReleaseOutcome {
        let report = session.ledger.rollback(snapshots, self.repo);

        if report.succeeded() {
            session.transition(ReleaseState::RolledBack);
            if let Err(e) = session
                .save(&self.root)
                .and_then(|()| ReleaseSession::discard(&self.root))
            {
                return ReleaseOutcome::RollbackFailed {
                    reason: format!("{}; session cleanup failed: {}", reason, e),
                };
            }
            ReleaseOutcome::RolledBack { reason }
        } else {
            session.transition(ReleaseState::RollbackFailed);
            let detail = report
                .failed
                .map(|(sequence, cause)| format!("ledger entry {}: {}", sequence, cause))
                .unwrap_or_default();
            // Keep the session and snapshots on disk for manual inspection
            let _ = session.save(&self.root);
            ReleaseOutcome::RollbackFailed {
                reason: format!("{}; {}", reason, detail),
            }
        }
    }

    /// Repo-relative paths for staging
    fn staging_paths(&self, writes: &[PlannedWrite]) -> Vec<String> {
        writes
            .iter()
            .map(|w| {
                w.path
                    .strip_prefix(&self.root)
                    .unwrap_or(&w.path)
                    .display()
                    .to_string()
            })
            .collect()
    }
}
