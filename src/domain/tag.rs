use crate::domain::Version;
use crate::error::Result;

/// A release tag name built from a prefix and a version
/// (e.g., prefix "v" + version 1.2.3 -> "v1.2.3").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagName {
    pub name: String,
}

impl TagName {
    /// Format a tag name for a version using the given prefix
    pub fn format(prefix: &str, version: &Version) -> Self {
        TagName {
            name: format!("{}{}", prefix, version),
        }
    }

    /// Wrap an existing tag string
    pub fn new(name: impl Into<String>) -> Self {
        TagName { name: name.into() }
    }

    /// Whether this tag carries the given prefix
    pub fn has_prefix(&self, prefix: &str) -> bool {
        self.name.starts_with(prefix)
    }

    /// Parse the version component after stripping the prefix
    pub fn version(&self, prefix: &str) -> Result<Version> {
        Version::parse(self.name.strip_prefix(prefix).unwrap_or(&self.name))
    }
}

impl std::fmt::Display for TagName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}
