use crate::domain::commit::LOG_DELIMITER;
use crate::error::{ReleaseError, Result};
use crate::git::Repository;
use chrono::{DateTime, FixedOffset, Offset, TimeZone, Utc};
use git2::{Direction, ObjectType, Oid, Repository as Git2Repo, ResetType};
use std::path::Path;

/// Real [Repository] implementation backed by the `git2` crate
pub struct Git2Repository {
    repo: Git2Repo,
}

impl Git2Repository {
    /// Open or discover a git repository at or above `path`
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let repo = Git2Repo::discover(path)
            .map_err(|e| ReleaseError::vcs("discover", e.message().to_string()))?;
        Ok(Git2Repository { repo })
    }

    /// Root of the repository working directory
    pub fn workdir(&self) -> Result<std::path::PathBuf> {
        self.repo
            .workdir()
            .map(|p| p.to_path_buf())
            .ok_or_else(|| ReleaseError::vcs("workdir", "repository is bare"))
    }

    fn tag_oid(&self, tag: &str) -> Result<Option<Oid>> {
        match self.repo.find_reference(&format!("refs/tags/{}", tag)) {
            Ok(reference) => {
                let oid = reference
                    .peel(ObjectType::Any)
                    .map_err(|e| ReleaseError::vcs("tag-peel", e.message().to_string()))?
                    .id();
                Ok(Some(oid))
            }
            Err(e) if e.code() == git2::ErrorCode::NotFound => Ok(None),
            Err(e) => Err(ReleaseError::vcs("tag-lookup", e.message().to_string())),
        }
    }

    /// Format one commit into the `hash|||isoDate|||subject|||body` wire line.
    ///
    /// Delimiter occurrences inside the message are flattened so the line
    /// stays parseable.
    fn format_log_line(commit: &git2::Commit<'_>) -> String {
        let time = commit.time();
        let offset: FixedOffset =
            FixedOffset::east_opt(time.offset_minutes() * 60).unwrap_or_else(|| Utc.fix());
        let date: DateTime<FixedOffset> = offset
            .timestamp_opt(time.seconds(), 0)
            .single()
            .unwrap_or_else(|| Utc::now().into());

        let subject = commit
            .summary()
            .unwrap_or("(empty message)")
            .replace(LOG_DELIMITER, " ");
        let body = commit
            .body()
            .unwrap_or("")
            .replace(LOG_DELIMITER, " ")
            .replace('\n', " ");

        format!(
            "{}{}{}{}{}{}{}",
            commit.id(),
            LOG_DELIMITER,
            date.to_rfc3339(),
            LOG_DELIMITER,
            subject,
            LOG_DELIMITER,
            body
        )
    }
}

/// Remote callbacks with SSH credential resolution: keys from ~/.ssh in
/// order of preference, then the SSH agent, then default credentials.
fn remote_callbacks() -> git2::RemoteCallbacks<'static> {
    let mut callbacks = git2::RemoteCallbacks::new();
    callbacks.credentials(|_url, username_from_url, allowed_types| {
        if allowed_types.contains(git2::CredentialType::SSH_KEY) {
            let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
            let key_paths = [
                format!("{}/.ssh/id_ed25519", home),
                format!("{}/.ssh/id_rsa", home),
                format!("{}/.ssh/id_ecdsa", home),
            ];

            for key_path in key_paths {
                let path = std::path::Path::new(&key_path);
                if path.exists() {
                    if let Ok(cred) =
                        git2::Cred::ssh_key(username_from_url.unwrap_or("git"), None, path, None)
                    {
                        return Ok(cred);
                    }
                }
            }

            if let Ok(cred) = git2::Cred::ssh_key_from_agent(username_from_url.unwrap_or("git")) {
                return Ok(cred);
            }
        }

        git2::Cred::default()
    });
    callbacks
}

impl Repository for Git2Repository {
    fn head_oid(&self) -> Result<String> {
        let head = self
            .repo
            .head()
            .map_err(|e| ReleaseError::vcs("head", e.message().to_string()))?;
        let oid = head
            .target()
            .ok_or_else(|| ReleaseError::vcs("head", "HEAD is detached or invalid"))?;
        Ok(oid.to_string())
    }

    fn current_branch(&self) -> Result<String> {
        let head = self
            .repo
            .head()
            .map_err(|e| ReleaseError::vcs("head", e.message().to_string()))?;
        head.shorthand()
            .map(|s| s.to_string())
            .ok_or_else(|| ReleaseError::vcs("branch", "cannot resolve branch name"))
    }

    fn has_remote(&self, remote: &str) -> Result<bool> {
        match self.repo.find_remote(remote) {
            Ok(_) => Ok(true),
            Err(e) if e.code() == git2::ErrorCode::NotFound => Ok(false),
            Err(e) => Err(ReleaseError::vcs("remote-lookup", e.message().to_string())),
        }
    }

    fn log_lines_since(&self, tag: Option<&str>) -> Result<Vec<String>> {
        let head = Oid::from_str(&self.head_oid()?)
            .map_err(|e| ReleaseError::vcs("head", e.message().to_string()))?;

        let stop_oid = match tag {
            Some(tag) => self.tag_oid(tag)?,
            None => None,
        };

        let mut revwalk = self
            .repo
            .revwalk()
            .map_err(|e| ReleaseError::vcs("log", e.message().to_string()))?;
        revwalk
            .push(head)
            .map_err(|e| ReleaseError::vcs("log", e.message().to_string()))?;

        let mut lines = Vec::new();
        for oid in revwalk {
            let oid = oid.map_err(|e| ReleaseError::vcs("log", e.message().to_string()))?;
            if Some(oid) == stop_oid {
                break;
            }
            if let Ok(commit) = self.repo.find_commit(oid) {
                lines.push(Self::format_log_line(&commit));
            }
        }

        // Chronological order, oldest first
        lines.reverse();
        Ok(lines)
    }

    fn list_tags(&self) -> Result<Vec<String>> {
        let tags = self
            .repo
            .tag_names(None)
            .map_err(|e| ReleaseError::vcs("tag-list", e.message().to_string()))?;
        Ok(tags.iter().flatten().map(|s| s.to_string()).collect())
    }

    fn tag_exists(&self, tag: &str) -> Result<bool> {
        Ok(self.tag_oid(tag)?.is_some())
    }

    fn commit_files(&self, message: &str, files: &[String]) -> Result<String> {
        let mut index = self
            .repo
            .index()
            .map_err(|e| ReleaseError::vcs("index", e.message().to_string()))?;

        // Stage exactly the release-touched files
        for file in files {
            index
                .add_path(Path::new(file))
                .map_err(|e| ReleaseError::vcs("stage", format!("{}: {}", file, e.message())))?;
        }
        index
            .write()
            .map_err(|e| ReleaseError::vcs("stage", e.message().to_string()))?;

        let tree_oid = index
            .write_tree()
            .map_err(|e| ReleaseError::vcs("commit", e.message().to_string()))?;
        let tree = self
            .repo
            .find_tree(tree_oid)
            .map_err(|e| ReleaseError::vcs("commit", e.message().to_string()))?;

        let signature = self
            .repo
            .signature()
            .map_err(|e| ReleaseError::vcs("commit", e.message().to_string()))?;
        let parent = self
            .repo
            .head()
            .and_then(|h| h.peel_to_commit())
            .map_err(|e| ReleaseError::vcs("commit", e.message().to_string()))?;

        let commit_oid = self
            .repo
            .commit(Some("HEAD"), &signature, &signature, message, &tree, &[&parent])
            .map_err(|e| ReleaseError::vcs("commit", e.message().to_string()))?;

        Ok(commit_oid.to_string())
    }

    fn create_tag(&self, tag: &str, oid: &str) -> Result<()> {
        let oid = Oid::from_str(oid)
            .map_err(|e| ReleaseError::vcs("tag-create", e.message().to_string()))?;
        let object = self
            .repo
            .find_object(oid, None)
            .map_err(|e| ReleaseError::vcs("tag-create", e.message().to_string()))?;
        let signature = self
            .repo
            .signature()
            .map_err(|e| ReleaseError::vcs("tag-create", e.message().to_string()))?;
        self.repo
            .tag(tag, &object, &signature, &format!("Release {}", tag), false)
            .map_err(|e| ReleaseError::vcs("tag-create", e.message().to_string()))?;
        Ok(())
    }

    fn push(&self, remote: &str, branch: &str, tag: &str) -> Result<()> {
        let mut remote = self
            .repo
            .find_remote(remote)
            .map_err(|e| ReleaseError::remote(format!("remote not found: {}", e.message())))?;

        let mut push_options = git2::PushOptions::new();
        push_options.remote_callbacks(remote_callbacks());

        let refspecs = [
            format!("refs/heads/{}:refs/heads/{}", branch, branch),
            format!("refs/tags/{}:refs/tags/{}", tag, tag),
        ];
        let refspec_strs: Vec<&str> = refspecs.iter().map(|s| s.as_str()).collect();

        remote
            .push(&refspec_strs, Some(&mut push_options))
            .map_err(|e| {
                if e.class() == git2::ErrorClass::Net {
                    ReleaseError::remote(format!("network error during push: {}", e.message()))
                } else {
                    ReleaseError::remote(format!("push failed: {}", e.message()))
                }
            })
    }

    fn remote_tag_exists(&self, remote: &str, tag: &str) -> Result<bool> {
        let mut remote = self
            .repo
            .find_remote(remote)
            .map_err(|e| ReleaseError::remote(format!("remote not found: {}", e.message())))?;

        let mut connection = remote
            .connect_auth(Direction::Fetch, Some(remote_callbacks()), None)
            .map_err(|e| ReleaseError::remote(format!("cannot connect: {}", e.message())))?;

        let wanted = format!("refs/tags/{}", tag);
        let exists = connection
            .list()
            .map_err(|e| ReleaseError::remote(format!("cannot list refs: {}", e.message())))?
            .iter()
            .any(|head| head.name() == wanted);

        Ok(exists)
    }

    fn delete_local_tag(&self, tag: &str) -> Result<()> {
        match self.repo.tag_delete(tag) {
            Ok(()) => Ok(()),
            // Already absent counts as deleted
            Err(e) if e.code() == git2::ErrorCode::NotFound => Ok(()),
            Err(e) => Err(ReleaseError::vcs("tag-delete", e.message().to_string())),
        }
    }

    fn delete_remote_tag(&self, remote: &str, tag: &str) -> Result<()> {
        let mut remote = self
            .repo
            .find_remote(remote)
            .map_err(|e| ReleaseError::remote(format!("remote not found: {}", e.message())))?;

        let mut push_options = git2::PushOptions::new();
        push_options.remote_callbacks(remote_callbacks());

        // An empty source side deletes the remote ref
        let refspec = format!(":refs/tags/{}", tag);
        remote
            .push(&[refspec.as_str()], Some(&mut push_options))
            .map_err(|e| ReleaseError::remote(format!("remote tag delete failed: {}", e.message())))
    }

    fn soft_reset(&self, oid: &str) -> Result<()> {
        let oid = Oid::from_str(oid)
            .map_err(|e| ReleaseError::vcs("reset", e.message().to_string()))?;
        let object = self
            .repo
            .find_object(oid, None)
            .map_err(|e| ReleaseError::vcs("reset", e.message().to_string()))?;
        self.repo
            .reset(&object, ResetType::Soft, None)
            .map_err(|e| ReleaseError::vcs("reset", e.message().to_string()))
    }
}

// SAFETY: Git2Repository wraps git2::Repository which is Send. The release
// pipeline is strictly sequential, so no concurrent access occurs; the Sync
// bound exists only to satisfy the Repository trait.
unsafe impl Sync for Git2Repository {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_outside_repository_fails() {
        let dir = tempfile::tempdir().unwrap();
        let result = Git2Repository::open(dir.path());
        assert!(result.is_err());
    }
}
