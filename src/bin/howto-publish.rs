// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use howto_publish::{
    config::PublishDefinition,
    credential::Credentials,
    publish::Publisher,
    vcs::GitCli,
};

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use indicatif::ProgressBar;
use std::{path::PathBuf, process::exit};
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Debug, Clone, Parser)]
#[command(
    about,
    override_usage = "howto-publish [options] <command>",
    subcommand_help_heading = "Commands",
    version
)]
struct Cli {
    /// Run as if started in given path.
    #[arg(short = 'C', long, value_name = "path", default_value = ".")]
    pub repo: PathBuf,

    /// Path to configuration file instead of howto.toml.
    #[arg(short, long, value_name = "path")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    fn run(self) -> Result<()> {
        match self.command {
            Command::Publish => run_publish(self.repo, self.config),
            Command::Plan => run_plan(self.repo, self.config),
            Command::Check => run_check(self.repo, self.config),
        }
    }
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Replace remote HOWTO branches with freshly applied patches.
    #[command(override_usage = "howto-publish [options] publish")]
    Publish,

    /// Show stale branches and patches that publishing would touch.
    #[command(override_usage = "howto-publish [options] plan")]
    Plan,

    /// Dry-run every patch against the base branch.
    #[command(override_usage = "howto-publish [options] check")]
    Check,
}

fn main() {
    let layer = fmt::layer()
        .compact()
        .with_target(false)
        .without_time();
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap();
    tracing_subscriber::registry()
        .with(layer)
        .with(filter)
        .init();

    if let Err(error) = run() {
        error!("{error:?}");
        exit(1);
    }

    exit(0)
}

fn run() -> Result<()> {
    Cli::parse().run()
}

fn open_publisher(repo: PathBuf, config: Option<PathBuf>) -> Result<Publisher<GitCli>> {
    let git = GitCli::open(repo)?;
    let definition = PublishDefinition::load(git.work_tree(), config.as_deref())?;

    Ok(Publisher::new(git, definition))
}

fn run_publish(repo: PathBuf, config: Option<PathBuf>) -> Result<()> {
    // INVARIANT: Credentials are checked before the repository is touched.
    let credentials = Credentials::from_env()?;
    let publisher = open_publisher(repo, config)?.with_progress(ProgressBar::new(0))?;
    let report = publisher.run(&credentials)?;

    for branch in &report.published {
        info!("published {branch}");
    }

    if !report.failed_deletions.is_empty() {
        info!(
            "stale branches left behind: {}",
            report.failed_deletions.join(", ")
        );
    }

    Ok(())
}

fn run_plan(repo: PathBuf, config: Option<PathBuf>) -> Result<()> {
    let credentials = Credentials::from_env()?;
    let plan = open_publisher(repo, config)?.plan(&credentials)?;

    for branch in &plan.stale {
        info!("delete {branch}");
    }

    for patch in &plan.patches {
        info!("publish {} from {}", patch.branch, patch.path.display());
    }

    Ok(())
}

fn run_check(repo: PathBuf, config: Option<PathBuf>) -> Result<()> {
    let failures = open_publisher(repo, config)?.check()?;
    if !failures.is_empty() {
        let names = failures
            .iter()
            .map(|patch| patch.branch.as_str())
            .collect::<Vec<_>>();
        bail!("patches do not apply: {}", names.join(", "));
    }

    Ok(())
}
