use thiserror::Error;

/// Unified error type for git-release operations
#[derive(Error, Debug)]
pub enum ReleaseError {
    #[error("Preflight check failed: {0}")]
    Preflight(String),

    #[error("Snapshot failed for '{path}': {details}")]
    Snapshot { path: String, details: String },

    #[error("Version control operation '{operation}' failed: {details}")]
    VersionControl { operation: String, details: String },

    #[error("Git operation failed: {0}")]
    Git(#[from] git2::Error),

    #[error("Remote operation failed: {0}")]
    Remote(String),

    #[error("Registry verification timed out: {0}")]
    PublishVerification(String),

    #[error("Rollback verification failed: {0}")]
    RollbackVerification(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Version parsing error: {0}")]
    Version(String),

    #[error("Session error: {0}")]
    Session(String),

    #[error("Session serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience type alias for Results in git-release
pub type Result<T> = std::result::Result<T, ReleaseError>;

impl ReleaseError {
    /// Create a preflight error with context
    pub fn preflight(msg: impl Into<String>) -> Self {
        ReleaseError::Preflight(msg.into())
    }

    /// Create a snapshot error for a specific path
    pub fn snapshot(path: impl Into<String>, details: impl Into<String>) -> Self {
        ReleaseError::Snapshot {
            path: path.into(),
            details: details.into(),
        }
    }

    /// Create a version-control error carrying the failing operation
    pub fn vcs(operation: impl Into<String>, details: impl Into<String>) -> Self {
        ReleaseError::VersionControl {
            operation: operation.into(),
            details: details.into(),
        }
    }

    /// Create a remote error with context
    pub fn remote(msg: impl Into<String>) -> Self {
        ReleaseError::Remote(msg.into())
    }

    /// Create a rollback verification error with context
    pub fn rollback(msg: impl Into<String>) -> Self {
        ReleaseError::RollbackVerification(msg.into())
    }

    /// Create a configuration error with context
    pub fn config(msg: impl Into<String>) -> Self {
        ReleaseError::Config(msg.into())
    }

    /// Create a version error with context
    pub fn version(msg: impl Into<String>) -> Self {
        ReleaseError::Version(msg.into())
    }

    /// Create a session error with context
    pub fn session(msg: impl Into<String>) -> Self {
        ReleaseError::Session(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ReleaseError::preflight("working tree not ready");
        assert_eq!(
            err.to_string(),
            "Preflight check failed: working tree not ready"
        );
    }

    #[test]
    fn test_vcs_error_carries_operation_and_diagnostic() {
        let err = ReleaseError::vcs("tag-create", "reference already exists");
        let msg = err.to_string();
        assert!(msg.contains("tag-create"));
        assert!(msg.contains("reference already exists"));
    }

    #[test]
    fn test_snapshot_error_carries_path() {
        let err = ReleaseError::snapshot("package.json", "permission denied");
        assert!(err.to_string().contains("package.json"));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: ReleaseError = io_err.into();
        assert!(err.to_string().contains("I/O error"));
    }

    #[test]
    fn test_error_constructors() {
        assert!(ReleaseError::version("test").to_string().contains("Version"));
        assert!(ReleaseError::session("test").to_string().contains("Session"));
        assert!(ReleaseError::rollback("test")
            .to_string()
            .contains("Rollback verification"));
    }
}
