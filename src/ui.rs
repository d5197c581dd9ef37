//! Terminal output formatting. Pure display helpers, no coordination logic.

use crate::domain::{BumpLevel, CommitRecord, TagName, Version};
use console::style;

pub fn display_error(message: &str) {
    eprintln!("{} {}", style("ERROR:").red().bold(), message);
}

pub fn display_success(message: &str) {
    println!("{} {}", style("✓").green(), message);
}

pub fn display_status(message: &str) {
    println!("{} {}", style("→").yellow(), message);
}

pub fn display_warning(message: &str) {
    println!("{} {}", style("⚠").yellow().bold(), message);
}

/// Ask a yes/no question on stdin, defaulting to no
pub fn confirm_action(prompt: &str) -> std::io::Result<bool> {
    use std::io::Write;
    print!("{} [y/N] ", style(prompt).bold());
    std::io::stdout().flush()?;
    let mut line = String::new();
    std::io::stdin().read_line(&mut line)?;
    Ok(matches!(line.trim().to_lowercase().as_str(), "y" | "yes"))
}

/// Show the commits feeding the bump decision, up to 10
pub fn display_commit_analysis(commits: &[CommitRecord]) {
    println!(
        "\n{}",
        style(format!("{} commits since last release:", commits.len())).bold()
    );

    for (i, commit) in commits.iter().take(10).enumerate() {
        let marker = if commit.breaking { "!" } else { " " };
        println!(
            "  {}.{} {}: {}",
            i + 1,
            marker,
            commit.r#type,
            commit.description
        );
    }

    if commits.len() > 10 {
        println!("  ... and {} more commits", commits.len() - 10);
    }
}

/// Show what the release will do before it does it
pub fn display_release_plan(
    last_tag: Option<&TagName>,
    bump: BumpLevel,
    target: &Version,
    tag: &TagName,
) {
    println!("\n{}", style("Release plan:").bold());
    match last_tag {
        Some(last) => println!("  From: {}", style(&last.name).red()),
        None => println!("  From: {}", style("(no previous release)").dim()),
    }
    println!("  Bump: {}", bump);
    println!("  To:   {} (tag {})", style(target).green(), tag);
}
