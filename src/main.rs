use anyhow::Result;
use clap::Parser;

use git_release::config;
use git_release::coordinator::{ReleaseCoordinator, ReleaseOutcome};
use git_release::git::Git2Repository;
use git_release::registry::{HttpRegistryClient, PublishVerifier, RegistryClient};
use git_release::ui;
use git_release::updater::VersionFileUpdater;

#[derive(clap::Parser)]
#[command(
    name = "git-release",
    about = "Cut releases from conventional commits: bump, commit, tag, push, verify"
)]
struct Args {
    #[arg(short, long, help = "Custom configuration file path")]
    config: Option<String>,

    #[arg(short, long, help = "Override the configured remote")]
    remote: Option<String>,

    #[arg(long, help = "Preview the release plan without making changes")]
    dry_run: bool,

    #[arg(short, long, help = "Skip confirmation prompts")]
    yes: bool,

    #[arg(long, help = "Roll back the persisted release session and exit")]
    rollback: bool,

    #[arg(short, long, help = "Print version information")]
    version: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    if args.version {
        println!("git-release {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let mut config = match config::load_config(args.config.as_deref()) {
        Ok(cfg) => cfg,
        Err(e) => {
            ui::display_error(&format!("Error loading config: {}", e));
            std::process::exit(1);
        }
    };
    if let Some(remote) = args.remote {
        config.release.remote = remote;
    }

    let repo = match Git2Repository::open(".") {
        Ok(repo) => repo,
        Err(e) => {
            ui::display_error(&format!("Git repository error: {}", e));
            std::process::exit(1);
        }
    };
    let root = repo.workdir()?;

    let updater = VersionFileUpdater::new(&root, config.release.version_files.clone());
    let mut coordinator = ReleaseCoordinator::new(&config, &repo, &updater, &root);

    if !config.registry.package.is_empty() {
        let client: Box<dyn RegistryClient> =
            match HttpRegistryClient::new(&config.registry.api_base) {
                Ok(client) => Box::new(client),
                Err(e) => {
                    ui::display_error(&format!("Registry client error: {}", e));
                    std::process::exit(1);
                }
            };
        coordinator = coordinator
            .with_verifier(PublishVerifier::new(config.registry.verifier_config(), client));
    }

    if args.rollback {
        let outcome = match coordinator.rollback_persisted() {
            Ok(outcome) => outcome,
            Err(e) => {
                ui::display_error(&e.to_string());
                std::process::exit(1);
            }
        };
        report(&outcome);
        std::process::exit(outcome.exit_code());
    }

    let plan = match coordinator.plan() {
        Ok(plan) => plan,
        Err(e) => {
            ui::display_error(&e.to_string());
            std::process::exit(1);
        }
    };

    ui::display_commit_analysis(&plan.commits);
    ui::display_release_plan(
        plan.last_tag.as_ref(),
        plan.bump,
        &plan.target_version,
        &plan.tag,
    );

    if args.dry_run {
        ui::display_status("Dry run: no files, commits, tags or pushes were made");
        return Ok(());
    }

    if !args.yes && !ui::confirm_action(&format!("Release {}?", plan.target_version))? {
        println!("Release cancelled.");
        return Ok(());
    }

    let outcome = match coordinator.run(&plan) {
        Ok(outcome) => outcome,
        Err(e) => {
            ui::display_error(&e.to_string());
            std::process::exit(1);
        }
    };
    report(&outcome);
    std::process::exit(outcome.exit_code());
}

fn report(outcome: &ReleaseOutcome) {
    match outcome {
        ReleaseOutcome::Completed { version, tag } => {
            ui::display_success(&format!("Released {} (tag {})", version, tag));
        }
        ReleaseOutcome::CompletedWithWarning { version, tag, warning } => {
            ui::display_success(&format!("Released {} (tag {})", version, tag));
            ui::display_warning(warning);
        }
        ReleaseOutcome::RolledBack { reason } => {
            ui::display_warning(&format!("Release rolled back: {}", reason));
            ui::display_success("All completed operations were compensated and verified");
        }
        ReleaseOutcome::RollbackFailed { reason } => {
            ui::display_error(&format!("Rollback halted: {}", reason));
            ui::display_warning(
                "Session state was kept on disk; inspect it and re-run `git-release --rollback`",
            );
        }
    }
}
