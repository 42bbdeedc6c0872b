// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Version control layer.
//!
//! Everything the publisher does to a repository goes through the
//! [`VersionControl`] trait. The real implementation, [`GitCli`], inspects
//! and configures the repository through libgit2, and hands every operation
//! that touches the network, the index, or the working tree to the Git binary
//! itself. Patch application in particular is left entirely to
//! `git apply`, which already knows every corner of the unified diff format.

use git2::{BranchType, Repository};
use std::{
    ffi::{OsStr, OsString},
    path::{Path, PathBuf},
    process::{Command, Output},
};
use tracing::{debug, instrument};

/// Operations needed to publish HOWTO branches.
pub trait VersionControl {
    /// Point `remote` at `url`.
    ///
    /// The URL may carry credentials, so implementations must never log it.
    fn set_remote_url(&self, remote: &str, url: &str) -> Result<()>;

    /// Set commit author identity for the repository.
    fn set_identity(&self, name: &str, email: &str) -> Result<()>;

    /// Fetch branch references from `remote`, pruning deleted ones.
    fn fetch(&self, remote: &str) -> Result<()>;

    /// List branches of `remote` known locally, without the remote prefix.
    fn remote_branches(&self, remote: &str) -> Result<Vec<String>>;

    /// Delete `branch` on `remote`.
    fn delete_remote_branch(&self, remote: &str, branch: &str) -> Result<()>;

    /// Create or reset `branch` to `base` and check it out.
    fn create_branch(&self, branch: &str, base: &str) -> Result<()>;

    /// Dry-run patch against working tree.
    ///
    /// Returns `false` if the patch does not apply cleanly.
    fn apply_check(&self, patch: &Path) -> Result<bool>;

    /// Apply patch to working tree.
    fn apply(&self, patch: &Path) -> Result<()>;

    /// Stage every change in working tree and commit it.
    fn commit_all(&self, message: &str) -> Result<()>;

    /// Push `branch` to `remote`, replacing whatever is there.
    fn push_branch(&self, remote: &str, branch: &str) -> Result<()>;

    /// Check out existing local `branch`.
    fn checkout(&self, branch: &str) -> Result<()>;

    /// Name of currently checked out branch, if any.
    fn current_branch(&self) -> Result<Option<String>>;
}

/// Version control through libgit2 and the Git binary.
pub struct GitCli {
    repository: Repository,
    work_tree: PathBuf,
}

impl GitCli {
    /// Open repository containing `path`.
    ///
    /// # Errors
    ///
    /// - Return [`VcsError::Git2`] if no repository can be found.
    /// - Return [`VcsError::Bare`] if the repository has no working tree.
    #[instrument(skip(path), level = "debug")]
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let repository = Repository::discover(path.as_ref())?;
        let work_tree = repository
            .workdir()
            .map(Path::to_path_buf)
            .ok_or_else(|| VcsError::Bare {
                path: repository.path().to_path_buf(),
            })?;
        debug!("opened repository at {:?}", work_tree.display());

        Ok(Self {
            repository,
            work_tree,
        })
    }

    /// Top-level of working tree.
    pub fn work_tree(&self) -> &Path {
        self.work_tree.as_path()
    }

    fn gitcall(&self, args: impl IntoIterator<Item = impl Into<OsString>>) -> Result<String> {
        syscall_non_interactive("git", &self.work_tree, args)
    }
}

impl VersionControl for GitCli {
    #[instrument(skip(self, url), level = "debug")]
    fn set_remote_url(&self, remote: &str, url: &str) -> Result<()> {
        self.repository.find_remote(remote)?;
        self.repository.remote_set_url(remote, url)?;

        Ok(())
    }

    #[instrument(skip(self), level = "debug")]
    fn set_identity(&self, name: &str, email: &str) -> Result<()> {
        let mut config = self.repository.config()?;
        config.set_str("user.name", name)?;
        config.set_str("user.email", email)?;

        Ok(())
    }

    #[instrument(skip(self), level = "debug")]
    fn fetch(&self, remote: &str) -> Result<()> {
        let output = self.gitcall(["fetch", "--prune", remote])?;
        debug!("{output}");

        Ok(())
    }

    fn remote_branches(&self, remote: &str) -> Result<Vec<String>> {
        let prefix = format!("{remote}/");
        let mut branches = Vec::new();
        for entry in self.repository.branches(Some(BranchType::Remote))? {
            let (branch, _) = entry?;
            let Some(name) = branch.name()? else {
                continue;
            };

            // INVARIANT: Skip symbolic remote HEAD, it is not a real branch.
            match name.strip_prefix(&prefix) {
                Some("HEAD") | None => continue,
                Some(name) => branches.push(name.to_string()),
            }
        }
        branches.sort();

        Ok(branches)
    }

    #[instrument(skip(self), level = "debug")]
    fn delete_remote_branch(&self, remote: &str, branch: &str) -> Result<()> {
        let output = self.gitcall(["push", remote, "--delete", branch])?;
        debug!("{output}");

        Ok(())
    }

    #[instrument(skip(self), level = "debug")]
    fn create_branch(&self, branch: &str, base: &str) -> Result<()> {
        let output = self.gitcall(["checkout", "-B", branch, base])?;
        debug!("{output}");

        Ok(())
    }

    #[instrument(skip(self), level = "debug")]
    fn apply_check(&self, patch: &Path) -> Result<bool> {
        let output = syscall_output(
            "git",
            &self.work_tree,
            [OsStr::new("apply"), OsStr::new("--check"), patch.as_os_str()],
        )?;
        if !output.status.success() {
            debug!("{}", render_output(&output));
        }

        Ok(output.status.success())
    }

    #[instrument(skip(self), level = "debug")]
    fn apply(&self, patch: &Path) -> Result<()> {
        self.gitcall([OsStr::new("apply"), patch.as_os_str()])?;

        Ok(())
    }

    #[instrument(skip(self), level = "debug")]
    fn commit_all(&self, message: &str) -> Result<()> {
        self.gitcall(["add", "--all"])?;
        let output = self.gitcall(["commit", "--quiet", "-m", message])?;
        debug!("{output}");

        Ok(())
    }

    #[instrument(skip(self), level = "debug")]
    fn push_branch(&self, remote: &str, branch: &str) -> Result<()> {
        let output = self.gitcall(["push", "--force", remote, branch])?;
        debug!("{output}");

        Ok(())
    }

    #[instrument(skip(self), level = "debug")]
    fn checkout(&self, branch: &str) -> Result<()> {
        let output = self.gitcall(["checkout", branch])?;
        debug!("{output}");

        Ok(())
    }

    fn current_branch(&self) -> Result<Option<String>> {
        let head = match self.repository.head() {
            Ok(head) => head,
            Err(err) if err.code() == git2::ErrorCode::UnbornBranch => return Ok(None),
            Err(err) => return Err(err.into()),
        };

        if !head.is_branch() {
            return Ok(None);
        }

        Ok(head.shorthand().map(ToString::to_string))
    }
}

fn syscall_output(
    cmd: impl AsRef<OsStr>,
    cwd: &Path,
    args: impl IntoIterator<Item = impl AsRef<OsStr>>,
) -> Result<Output> {
    // INVARIANT: Never block on credential prompts, there is no one to answer.
    Command::new(cmd.as_ref())
        .current_dir(cwd)
        .env("GIT_TERMINAL_PROMPT", "0")
        .args(args)
        .output()
        .map_err(|err| VcsError::Spawn {
            source: err,
            command: cmd.as_ref().to_string_lossy().into_owned(),
        })
}

fn syscall_non_interactive(
    cmd: impl AsRef<OsStr>,
    cwd: &Path,
    args: impl IntoIterator<Item = impl Into<OsString>>,
) -> Result<String> {
    let args = args.into_iter().map(Into::into).collect::<Vec<OsString>>();
    let output = syscall_output(cmd.as_ref(), cwd, &args)?;
    let message = render_output(&output);

    if !output.status.success() {
        let subcommand = args
            .first()
            .map(|arg| arg.to_string_lossy().into_owned())
            .unwrap_or_default();
        return Err(VcsError::Syscall {
            command: format!("{} {subcommand}", cmd.as_ref().to_string_lossy()),
            message,
        });
    }

    Ok(message)
}

fn render_output(output: &Output) -> String {
    let stdout = String::from_utf8_lossy(output.stdout.as_slice()).into_owned();
    let stderr = String::from_utf8_lossy(output.stderr.as_slice()).into_owned();
    let mut message = String::new();

    if !stdout.is_empty() {
        message.push_str(format!("stdout: {stdout}").as_str());
    }

    if !stderr.is_empty() {
        message.push_str(format!("stderr: {stderr}").as_str());
    }

    // INVARIANT: Chomp trailing newlines.
    message
        .strip_suffix("\r\n")
        .or(message.strip_suffix('\n'))
        .map(ToString::to_string)
        .unwrap_or(message)
}

/// Version control error types.
#[derive(Debug, thiserror::Error)]
pub enum VcsError {
    /// Repository has no working tree to apply patches to.
    #[error("repository at {:?} is bare", path.display())]
    Bare { path: PathBuf },

    /// External command could not be started.
    #[error("failed to run {command:?}")]
    Spawn {
        #[source]
        source: std::io::Error,
        command: String,
    },

    /// External command exited unsuccessfully.
    #[error("command {command:?} failed:\n{message}")]
    Syscall { command: String, message: String },

    /// Operations from libgit2 fail.
    #[error(transparent)]
    Git2(#[from] git2::Error),
}

/// Friendly result alias :3
pub type Result<T, E = VcsError> = std::result::Result<T, E>;
