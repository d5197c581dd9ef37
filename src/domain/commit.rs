use regex::Regex;
use serde::{Deserialize, Serialize};

/// Field delimiter used by the commit log wire format.
pub const LOG_DELIMITER: &str = "|||";

/// Commit types recognized by the conventional commit grammar.
pub const KNOWN_TYPES: [&str; 12] = [
    "feat", "fix", "docs", "style", "refactor", "perf", "test", "chore", "build", "ci", "revert",
    "security",
];

/// Descriptions longer than this are truncated at parse time.
const MAX_DESCRIPTION_LEN: usize = 100;

/// One parsed version-control commit. Read-only after parsing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitRecord {
    pub hash: String,
    pub date: String,
    pub r#type: String,
    pub scope: Option<String>,
    pub description: String,
    pub body: String,
    pub breaking: bool,
}

impl CommitRecord {
    /// Parse one commit log line in the form `hash|||isoDate|||subject` or
    /// the extended `hash|||isoDate|||subject|||body` form.
    ///
    /// Subjects matching the conventional grammar
    /// (`type(scope)!: description`) yield their declared type; anything else
    /// is captured as `chore` so non-conventional history is never dropped.
    /// Breaking changes are detected from the `!` marker or from the literal
    /// `BREAKING CHANGE` token in subject or body.
    ///
    /// Returns `None` for malformed lines and for subjects that look like
    /// continuation/body lines (leading `-` or whitespace), which would
    /// otherwise be double-counted.
    pub fn parse_line(raw: &str) -> Option<CommitRecord> {
        let mut parts = raw.splitn(4, LOG_DELIMITER);
        let hash = parts.next()?.trim();
        let date = parts.next()?.trim();
        let subject = parts.next()?;
        let body = parts.next().unwrap_or("").trim().to_string();

        if hash.is_empty() || date.is_empty() {
            return None;
        }

        // Body/continuation lines must not be counted as commits.
        if subject.starts_with('-') || subject.starts_with(' ') || subject.starts_with('\t') {
            return None;
        }
        let subject = subject.trim_end();
        if subject.is_empty() {
            return None;
        }

        let has_breaking_token =
            subject.contains("BREAKING CHANGE") || body.contains("BREAKING CHANGE");

        let (r#type, scope, description, breaking) = match parse_subject(subject) {
            Some((t, s, d, bang)) => (t, s, d, bang || has_breaking_token),
            // Non-conventional subject: keep it as a chore and infer breaking
            // from the literal markers only.
            None => (
                "chore".to_string(),
                None,
                subject.to_string(),
                has_breaking_token || subject.contains("!:"),
            ),
        };

        Some(CommitRecord {
            hash: hash.to_string(),
            date: date.to_string(),
            r#type,
            scope,
            description: truncate(&description, MAX_DESCRIPTION_LEN),
            breaking,
            body,
        })
    }
}

/// Parse a conventional subject into (type, scope, description, breaking-bang).
///
/// Only the fixed vocabulary in [KNOWN_TYPES] matches; anything else falls
/// through to the caller's non-conventional handling.
fn parse_subject(subject: &str) -> Option<(String, Option<String>, String, bool)> {
    let re = Regex::new(r"^([a-z]+)(?:\(([^)]+)\))?(!?):\s*(.*)$").ok()?;
    let captures = re.captures(subject)?;

    let r#type = captures.get(1)?.as_str();
    if !KNOWN_TYPES.contains(&r#type) {
        return None;
    }

    let scope = captures.get(2).map(|m| m.as_str().to_string());
    let bang = captures.get(3).map(|m| m.as_str()) == Some("!");
    let description = captures.get(4).map(|m| m.as_str()).unwrap_or("").to_string();

    Some((r#type.to_string(), scope, description, bang))
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        s.chars().take(max).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(subject: &str) -> String {
        format!("abc1234|||2024-05-01T10:00:00+00:00|||{}", subject)
    }

    #[test]
    fn test_parse_with_scope() {
        let commit = CommitRecord::parse_line(&line("feat(auth): add login")).unwrap();
        assert_eq!(commit.r#type, "feat");
        assert_eq!(commit.scope, Some("auth".to_string()));
        assert_eq!(commit.description, "add login");
        assert!(!commit.breaking);
    }

    #[test]
    fn test_parse_without_scope() {
        let commit = CommitRecord::parse_line(&line("fix: resolve crash")).unwrap();
        assert_eq!(commit.r#type, "fix");
        assert_eq!(commit.scope, None);
        assert_eq!(commit.description, "resolve crash");
    }

    #[test]
    fn test_parse_breaking_marker() {
        let commit = CommitRecord::parse_line(&line("feat(api)!: redesign endpoint")).unwrap();
        assert!(commit.breaking);
        assert_eq!(commit.scope, Some("api".to_string()));
    }

    #[test]
    fn test_parse_breaking_without_scope() {
        let commit = CommitRecord::parse_line(&line("refactor!: drop legacy config")).unwrap();
        assert_eq!(commit.r#type, "refactor");
        assert!(commit.breaking);
    }

    #[test]
    fn test_parse_breaking_token_in_body() {
        let raw = format!("{}|||BREAKING CHANGE: field renamed", line("fix: rename field"));
        let commit = CommitRecord::parse_line(&raw).unwrap();
        assert_eq!(commit.r#type, "fix");
        assert!(commit.breaking);
        assert!(commit.body.contains("BREAKING CHANGE"));
    }

    #[test]
    fn test_non_conventional_becomes_chore() {
        let commit = CommitRecord::parse_line(&line("Update the readme")).unwrap();
        assert_eq!(commit.r#type, "chore");
        assert_eq!(commit.description, "Update the readme");
        assert!(!commit.breaking);
    }

    #[test]
    fn test_unknown_type_token_becomes_chore() {
        let commit = CommitRecord::parse_line(&line("wip: half-done thing")).unwrap();
        assert_eq!(commit.r#type, "chore");
        assert_eq!(commit.description, "wip: half-done thing");
    }

    #[test]
    fn test_non_conventional_breaking_token_detected() {
        let commit =
            CommitRecord::parse_line(&line("rewrite parser BREAKING CHANGE everywhere")).unwrap();
        assert_eq!(commit.r#type, "chore");
        assert!(commit.breaking);
    }

    #[test]
    fn test_continuation_lines_rejected() {
        assert!(CommitRecord::parse_line(&line("- bullet from a body")).is_none());
        assert!(CommitRecord::parse_line(&line(" indented continuation")).is_none());
        assert!(CommitRecord::parse_line(&line("\ttabbed continuation")).is_none());
    }

    #[test]
    fn test_malformed_lines_rejected() {
        assert!(CommitRecord::parse_line("no delimiters here").is_none());
        assert!(CommitRecord::parse_line("abc1234|||2024-05-01").is_none());
        assert!(CommitRecord::parse_line("|||2024-05-01|||fix: x").is_none());
    }

    #[test]
    fn test_description_truncated() {
        let long = "a".repeat(300);
        let commit = CommitRecord::parse_line(&line(&format!("feat: {}", long))).unwrap();
        assert_eq!(commit.description.len(), 100);
    }

    #[test]
    fn test_hash_and_date_preserved() {
        let commit = CommitRecord::parse_line(&line("chore: bump deps")).unwrap();
        assert_eq!(commit.hash, "abc1234");
        assert_eq!(commit.date, "2024-05-01T10:00:00+00:00");
    }
}
