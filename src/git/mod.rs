//! Git operations abstraction layer
//!
//! Trait-based abstraction over the version-control operations the release
//! engine needs, with a real implementation backed by the `git2` crate and a
//! mock implementation for testing coordinator and rollback behavior.
//!
//! Mutating operations surface [crate::error::ReleaseError::VersionControl]
//! carrying the failing operation name and the raw diagnostic text. None of
//! them are retried automatically: these are local operations, and a repeated
//! failure indicates a real problem rather than transient unavailability.

pub mod mock;
pub mod repository;

pub use mock::MockRepository;
pub use repository::Git2Repository;

use crate::error::Result;

/// Common git operation trait for abstraction
///
/// Most code should depend on this trait rather than concrete
/// implementations, so coordinator and rollback logic can be exercised
/// against [MockRepository] without a real repository.
pub trait Repository: Send + Sync {
    /// Full hash of the current HEAD commit
    fn head_oid(&self) -> Result<String>;

    /// Name of the currently checked-out branch
    fn current_branch(&self) -> Result<String>;

    /// Whether a remote with this name is configured
    fn has_remote(&self, remote: &str) -> Result<bool>;

    /// Commit log lines since a tag (or all history when `tag` is `None`),
    /// oldest first, in the `hash|||isoDate|||subject|||body` wire form
    /// consumed by [crate::domain::CommitRecord::parse_line].
    fn log_lines_since(&self, tag: Option<&str>) -> Result<Vec<String>>;

    /// All local tag names
    fn list_tags(&self) -> Result<Vec<String>>;

    /// Whether a local tag with this name exists
    fn tag_exists(&self, tag: &str) -> Result<bool>;

    /// Stage exactly `files` and commit them with `message`. Returns the new
    /// commit hash.
    ///
    /// Staging is restricted to the named files so unrelated working
    /// directory state is never swept into a release commit.
    fn commit_files(&self, message: &str, files: &[String]) -> Result<String>;

    /// Create an annotated tag pointing at a commit
    fn create_tag(&self, tag: &str, oid: &str) -> Result<()>;

    /// Push the branch head and the tag to a remote
    fn push(&self, remote: &str, branch: &str, tag: &str) -> Result<()>;

    /// Read-only query: does the tag exist on the remote right now?
    fn remote_tag_exists(&self, remote: &str, tag: &str) -> Result<bool>;

    /// Delete a local tag. Deleting a tag that does not exist is success.
    fn delete_local_tag(&self, tag: &str) -> Result<()>;

    /// Delete a tag on the remote. Callers must confirm existence via
    /// [Repository::remote_tag_exists] first; deletion is not attempted
    /// blindly.
    fn delete_remote_tag(&self, remote: &str, tag: &str) -> Result<()>;

    /// Soft-reset the repository to a previous commit, keeping the working
    /// directory and index intact
    fn soft_reset(&self, oid: &str) -> Result<()>;
}
