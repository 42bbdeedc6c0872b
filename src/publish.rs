// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! HOWTO branch publishing.
//!
//! A __HOWTO branch__ is a remote branch holding the base branch plus exactly
//! one HOWTO patch. Viewers of the hosted repository can browse or diff it to
//! see a worked example in place.
//!
//! # Reconciliation
//!
//! Publishing keeps one rule: the remote branches whose names start with the
//! reserved prefix are exactly the branches named after the patches in the
//! patch directory. Rather than diffing the two sets, every prefixed remote
//! branch is deleted, and every patch is published from scratch. This makes
//! reruns with unchanged patches produce identical branches.
//!
//! # Failure Behaviour
//!
//! Publishing is strictly sequential, and the first failing step ends it. A
//! patch that does not apply stops the run on that patch's branch without
//! committing or pushing anything for it, so the offending tree can be
//! inspected. Deleting stale branches is the one best-effort step: failures
//! are logged and collected in the [`PublishReport`].

use crate::{
    config::{render_remote_url, PublishDefinition},
    credential::Credentials,
    patch::{self, Patch},
    vcs::VersionControl,
};

use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use tracing::{info, instrument, warn};

/// Outcome of a successful publishing run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PublishReport {
    /// Stale remote branches that were deleted.
    pub deleted: Vec<String>,

    /// Stale remote branches that could not be deleted.
    pub failed_deletions: Vec<String>,

    /// HOWTO branches that were published.
    pub published: Vec<String>,
}

/// What a publishing run would do.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Plan {
    /// Stale remote branches that would be deleted.
    pub stale: Vec<String>,

    /// Patches that would be published.
    pub patches: Vec<Patch>,
}

/// Publish HOWTO branches through some [`VersionControl`].
pub struct Publisher<V>
where
    V: VersionControl,
{
    vcs: V,
    definition: PublishDefinition,
    bar: ProgressBar,
}

impl<V> Publisher<V>
where
    V: VersionControl,
{
    /// Construct new publisher.
    pub fn new(vcs: V, definition: PublishDefinition) -> Self {
        Self {
            vcs,
            definition,
            bar: ProgressBar::hidden(),
        }
    }

    /// Report patch progress through `bar`.
    ///
    /// # Errors
    ///
    /// - Return [`PublishError::IndicatifStyleTemplate`] if progress bar
    ///   style cannot be set.
    pub fn with_progress(mut self, bar: ProgressBar) -> Result<Self> {
        let style = ProgressStyle::with_template(
            "{elapsed_precise:.green}  {msg:<40}  [{wide_bar:.yellow/blue}] {pos}/{len}",
        )?
        .progress_chars("-Cco.");
        bar.set_style(style);
        self.bar = bar;

        Ok(self)
    }

    /// Version control the publisher works through.
    pub fn vcs(&self) -> &V {
        &self.vcs
    }

    /// Publish every HOWTO patch as its own remote branch.
    ///
    /// # Errors
    ///
    /// - Return [`PublishError::Patch`] if patches cannot be discovered.
    /// - Return [`PublishError::Config`] if remote URL cannot be rendered.
    /// - Return [`PublishError::PatchDoesNotApply`] if a patch fails its
    ///   dry-run. The working copy stays on that patch's branch.
    /// - Return [`PublishError::Vcs`] if any other checked step fails.
    #[instrument(skip(self, credentials), level = "debug")]
    pub fn run(&self, credentials: &Credentials) -> Result<PublishReport> {
        let patches = self.patches()?;
        self.configure_remote(credentials)?;
        self.vcs.set_identity(
            &credentials.actor,
            &credentials.author_email(&self.definition.identity.email_domain),
        )?;

        let remote = self.remote();
        let base = self.definition.repository.base_branch.as_str();
        let mut report = PublishReport::default();

        for branch in self.stale_branches()? {
            info!("delete stale branch {branch:?} on {remote:?}");
            match self.vcs.delete_remote_branch(remote, &branch) {
                Ok(()) => report.deleted.push(branch),
                Err(err) => {
                    warn!("failed to delete stale branch {branch:?}: {err}");
                    report.failed_deletions.push(branch);
                }
            }
        }

        self.bar.set_length(patches.len() as u64);
        for patch in &patches {
            self.bar.set_message(patch.branch.clone());
            self.publish_patch(patch, remote, base)?;
            report.published.push(patch.branch.clone());
            self.bar.inc(1);
        }
        self.bar.finish_and_clear();

        info!(
            "published {} HOWTO branches, deleted {} stale branches",
            report.published.len(),
            report.deleted.len()
        );

        Ok(report)
    }

    /// Determine what [`Publisher::run`] would delete and publish.
    ///
    /// Configures remote URL, and fetches from it, but leaves remote branches,
    /// commit identity, and the current checkout alone.
    ///
    /// # Errors
    ///
    /// - Return [`PublishError::Patch`] if patches cannot be discovered.
    /// - Return [`PublishError::Config`] if remote URL cannot be rendered.
    /// - Return [`PublishError::Vcs`] if fetching or listing branches fails.
    #[instrument(skip(self, credentials), level = "debug")]
    pub fn plan(&self, credentials: &Credentials) -> Result<Plan> {
        let patches = self.patches()?;
        self.configure_remote(credentials)?;

        Ok(Plan {
            stale: self.stale_branches()?,
            patches,
        })
    }

    /// Dry-run every patch against the base branch.
    ///
    /// Unlike [`Publisher::run`], checking does not stop at the first failing
    /// patch. Nothing is committed, and the working copy ends up on the base
    /// branch.
    ///
    /// Returns the patches that do not apply.
    ///
    /// # Errors
    ///
    /// - Return [`PublishError::Patch`] if patches cannot be discovered.
    /// - Return [`PublishError::Vcs`] if checking out the base branch fails.
    #[instrument(skip(self), level = "debug")]
    pub fn check(&self) -> Result<Vec<Patch>> {
        let patches = self.patches()?;
        let base = self.definition.repository.base_branch.as_str();
        self.vcs.checkout(base)?;

        let mut failures = Vec::new();
        for patch in patches {
            if self.vcs.apply_check(&patch.path)? {
                info!("patch {:?} applies cleanly", patch.path.display());
            } else {
                warn!("patch {:?} does not apply", patch.path.display());
                failures.push(patch);
            }
        }

        Ok(failures)
    }

    fn remote(&self) -> &str {
        self.definition.repository.remote.as_str()
    }

    fn patches(&self) -> Result<Vec<Patch>> {
        let patches = patch::discover(&self.definition.howto.patch_dir)?;
        patch::reject_base_branch(&patches, &self.definition.repository.base_branch)?;
        patch::unprefixed(&patches, &self.definition.howto.branch_prefix);
        info!(
            "found {} HOWTO patches in {:?}",
            patches.len(),
            self.definition.howto.patch_dir.display()
        );

        Ok(patches)
    }

    fn configure_remote(&self, credentials: &Credentials) -> Result<()> {
        let url = render_remote_url(&self.definition.repository.url_template, credentials)?;
        self.vcs.set_remote_url(self.remote(), &url)?;
        self.vcs.fetch(self.remote())?;

        Ok(())
    }

    fn stale_branches(&self) -> Result<Vec<String>> {
        let prefix = self.definition.howto.branch_prefix.as_str();
        let base = self.definition.repository.base_branch.as_str();

        // INVARIANT: Base branch is never stale, whatever the prefix.
        Ok(self
            .vcs
            .remote_branches(self.remote())?
            .into_iter()
            .filter(|branch| branch.starts_with(prefix) && branch != base)
            .collect())
    }

    #[instrument(skip(self, patch, remote, base), fields(branch = %patch.branch), level = "debug")]
    fn publish_patch(&self, patch: &Patch, remote: &str, base: &str) -> Result<()> {
        info!("publish {:?} to branch {:?}", patch.path.display(), patch.branch);
        self.vcs.create_branch(&patch.branch, base)?;

        // INVARIANT: Nothing gets committed or pushed for a patch that fails
        // its dry-run, and no later patch gets processed.
        if !self.vcs.apply_check(&patch.path)? {
            return Err(PublishError::PatchDoesNotApply {
                patch: patch.path.clone(),
            });
        }

        self.vcs.apply(&patch.path)?;
        self.vcs.commit_all(&format!("Add HOWTO {}", patch.branch))?;
        self.vcs.push_branch(remote, &patch.branch)?;
        self.vcs.checkout(base)?;

        Ok(())
    }
}

/// Publishing error types.
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    /// Patch fails its dry-run against the base branch.
    #[error("patch {:?} does not apply cleanly", patch.display())]
    PatchDoesNotApply { patch: PathBuf },

    /// Patch discovery fails.
    #[error(transparent)]
    Patch(#[from] crate::patch::PatchError),

    /// Remote URL template is malformed.
    #[error(transparent)]
    Config(#[from] crate::config::ConfigError),

    /// Version control operation fails.
    #[error(transparent)]
    Vcs(#[from] crate::vcs::VcsError),

    /// Style template cannot be set for progress bars.
    #[error(transparent)]
    IndicatifStyleTemplate(#[from] indicatif::style::TemplateError),
}

/// Friendly result alias :3
pub type Result<T, E = PublishError> = std::result::Result<T, E>;
