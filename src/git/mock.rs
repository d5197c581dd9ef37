use crate::error::{ReleaseError, Result};
use crate::git::Repository;
use std::collections::HashSet;
use std::sync::Mutex;

#[derive(Default)]
struct MockState {
    head: String,
    branch: String,
    remotes: Vec<String>,
    log_lines: Vec<String>,
    tags: Vec<String>,
    remote_tags: Vec<String>,
    commit_counter: u32,
    fail_ops: HashSet<String>,
    calls: Vec<String>,
}

/// Mock repository for testing without actual git operations.
///
/// Holds scripted state behind a mutex, records every call, and can be told
/// to fail specific operations so rollback paths can be exercised.
pub struct MockRepository {
    state: Mutex<MockState>,
}

impl MockRepository {
    /// Create a mock with a single "origin" remote on branch "main"
    pub fn new() -> Self {
        let state = MockState {
            head: "0000000000000000000000000000000000000000".to_string(),
            branch: "main".to_string(),
            remotes: vec!["origin".to_string()],
            ..Default::default()
        };
        MockRepository {
            state: Mutex::new(state),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        // A poisoned mutex means a prior test assertion already failed
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Set the current HEAD hash
    pub fn set_head(&self, oid: impl Into<String>) {
        self.lock().head = oid.into();
    }

    /// Add a commit log line that `log_lines_since` will return
    pub fn add_log_line(&self, line: impl Into<String>) {
        self.lock().log_lines.push(line.into());
    }

    /// Add a local tag
    pub fn add_tag(&self, name: impl Into<String>) {
        self.lock().tags.push(name.into());
    }

    /// Add a tag on the mock remote
    pub fn add_remote_tag(&self, name: impl Into<String>) {
        self.lock().remote_tags.push(name.into());
    }

    /// Make the named operation fail with a version-control error
    pub fn fail_on(&self, operation: &str) {
        self.lock().fail_ops.insert(operation.to_string());
    }

    /// Stop failing the named operation
    pub fn clear_failure(&self, operation: &str) {
        self.lock().fail_ops.remove(operation);
    }

    /// Names of all operations invoked so far, in order
    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    /// Whether the named operation was invoked at least once
    pub fn was_called(&self, operation: &str) -> bool {
        self.lock().calls.iter().any(|c| c == operation)
    }

    /// Current local tags
    pub fn local_tags(&self) -> Vec<String> {
        self.lock().tags.clone()
    }

    /// Current remote tags
    pub fn remote_tags(&self) -> Vec<String> {
        self.lock().remote_tags.clone()
    }

    fn check(&self, operation: &str) -> Result<()> {
        let mut state = self.lock();
        state.calls.push(operation.to_string());
        if state.fail_ops.contains(operation) {
            return Err(ReleaseError::vcs(operation, "injected failure"));
        }
        Ok(())
    }
}

impl Default for MockRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl Repository for MockRepository {
    fn head_oid(&self) -> Result<String> {
        self.check("head_oid")?;
        Ok(self.lock().head.clone())
    }

    fn current_branch(&self) -> Result<String> {
        self.check("current_branch")?;
        Ok(self.lock().branch.clone())
    }

    fn has_remote(&self, remote: &str) -> Result<bool> {
        self.check("has_remote")?;
        Ok(self.lock().remotes.iter().any(|r| r == remote))
    }

    fn log_lines_since(&self, _tag: Option<&str>) -> Result<Vec<String>> {
        self.check("log_lines_since")?;
        Ok(self.lock().log_lines.clone())
    }

    fn list_tags(&self) -> Result<Vec<String>> {
        self.check("list_tags")?;
        Ok(self.lock().tags.clone())
    }

    fn tag_exists(&self, tag: &str) -> Result<bool> {
        self.check("tag_exists")?;
        Ok(self.lock().tags.iter().any(|t| t == tag))
    }

    fn commit_files(&self, _message: &str, _files: &[String]) -> Result<String> {
        self.check("commit_files")?;
        let mut state = self.lock();
        state.commit_counter += 1;
        let hash = format!("{:040x}", state.commit_counter);
        state.head = hash.clone();
        Ok(hash)
    }

    fn create_tag(&self, tag: &str, _oid: &str) -> Result<()> {
        self.check("create_tag")?;
        self.lock().tags.push(tag.to_string());
        Ok(())
    }

    fn push(&self, _remote: &str, _branch: &str, tag: &str) -> Result<()> {
        self.check("push")
            .map_err(|_| ReleaseError::remote("injected push failure"))?;
        self.lock().remote_tags.push(tag.to_string());
        Ok(())
    }

    fn remote_tag_exists(&self, _remote: &str, tag: &str) -> Result<bool> {
        // Real repositories surface connect/list failures as Remote errors
        self.check("remote_tag_exists")
            .map_err(|_| ReleaseError::remote("injected connect failure"))?;
        Ok(self.lock().remote_tags.iter().any(|t| t == tag))
    }

    fn delete_local_tag(&self, tag: &str) -> Result<()> {
        self.check("delete_local_tag")?;
        self.lock().tags.retain(|t| t != tag);
        Ok(())
    }

    fn delete_remote_tag(&self, remote: &str, tag: &str) -> Result<()> {
        self.check("delete_remote_tag")
            .map_err(|_| ReleaseError::remote(format!("injected delete failure on {}", remote)))?;
        self.lock().remote_tags.retain(|t| t != tag);
        Ok(())
    }

    fn soft_reset(&self, oid: &str) -> Result<()> {
        self.check("soft_reset")?;
        self.lock().head = oid.to_string();
        Ok(())
    }
}
