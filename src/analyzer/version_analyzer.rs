use crate::domain::{BumpLevel, CommitRecord, TagName, Version};
use crate::error::Result;
use crate::git::Repository;

/// Determine the version bump for a set of commits.
///
/// Pure and total: the decision is the maximum severity across all commits.
/// Any breaking commit forces a major bump, any `feat` at least minor, any
/// `fix` or `perf` at least patch; everything else contributes nothing, so
/// an empty or all-chore set yields [BumpLevel::None].
pub fn compute_bump(commits: &[CommitRecord]) -> BumpLevel {
    commits
        .iter()
        .map(severity)
        .max()
        .unwrap_or(BumpLevel::None)
}

fn severity(commit: &CommitRecord) -> BumpLevel {
    if commit.breaking {
        return BumpLevel::Major;
    }
    match commit.r#type.as_str() {
        "feat" => BumpLevel::Minor,
        "fix" | "perf" => BumpLevel::Patch,
        _ => BumpLevel::None,
    }
}

/// Find the most recent release tag matching `prefix`.
///
/// Tags are ordered by their parsed version, not lexically, so "v1.10.0"
/// ranks above "v1.9.0". Returns `None` when no parseable tag with the
/// prefix exists, which makes the release scope the entire history.
pub fn last_release_tag(repo: &dyn Repository, prefix: &str) -> Result<Option<TagName>> {
    let mut best: Option<(Version, TagName)> = None;

    for name in repo.list_tags()? {
        let tag = TagName::new(name);
        if !tag.has_prefix(prefix) {
            continue;
        }
        let version = match tag.version(prefix) {
            Ok(v) => v,
            // Unparsable tags under the prefix are not release tags
            Err(_) => continue,
        };
        match &best {
            Some((current, _)) if *current >= version => {}
            _ => best = Some((version, tag)),
        }
    }

    Ok(best.map(|(_, tag)| tag))
}
