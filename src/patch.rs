// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! HOWTO patch discovery.
//!
//! A HOWTO is stored as a single unified diff named `<name>.diff` inside the
//! patch directory. Each patch becomes one branch named `<name>` that holds
//! the base branch plus that diff.

use git2::Branch;
use std::path::{Path, PathBuf};
use tracing::{debug, instrument, warn};

/// File extension every HOWTO patch carries.
pub const PATCH_EXTENSION: &str = "diff";

/// A HOWTO patch file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Patch {
    /// Branch name derived from file name.
    pub branch: String,

    /// Path to patch file.
    pub path: PathBuf,
}

impl Patch {
    /// Construct patch from path to `<name>.diff` file.
    ///
    /// # Errors
    ///
    /// - Return [`PatchError::InvalidBranchName`] if file stem is not a valid
    ///   branch name.
    pub fn from_path(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let branch = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();

        if branch.is_empty() || !Branch::name_is_valid(&branch)? {
            return Err(PatchError::InvalidBranchName { branch, path });
        }

        Ok(Self { branch, path })
    }
}

/// Discover all HOWTO patches in `patch_dir`.
///
/// Only the top-level of the directory is searched. Patches are returned in
/// file name order so that publishing order is stable between runs.
///
/// # Errors
///
/// - Return [`PatchError::MissingDirectory`] if `patch_dir` is not a
///   directory.
/// - Return [`PatchError::Glob`] if a directory entry cannot be read.
/// - Return [`PatchError::InvalidBranchName`] if a patch name cannot be used
///   as a branch name.
#[instrument(skip(patch_dir), level = "debug")]
pub fn discover(patch_dir: impl AsRef<Path>) -> Result<Vec<Patch>> {
    let patch_dir = patch_dir.as_ref();
    if !patch_dir.is_dir() {
        return Err(PatchError::MissingDirectory {
            path: patch_dir.to_path_buf(),
        });
    }

    // INVARIANT: Metacharacters in directory name match literally.
    let pattern = format!(
        "{}/*.{PATCH_EXTENSION}",
        glob::Pattern::escape(&patch_dir.to_string_lossy())
    );

    // INVARIANT: Hidden files are skipped, as a shell glob would.
    let options = glob::MatchOptions {
        case_sensitive: true,
        require_literal_separator: false,
        require_literal_leading_dot: true,
    };

    let mut patches = Vec::new();
    for entry in glob::glob_with(&pattern, options)? {
        let path = entry?;
        if !path.is_file() {
            continue;
        }

        debug!("found patch {:?}", path.display());
        patches.push(Patch::from_path(path)?);
    }
    patches.sort_by(|a, b| a.path.cmp(&b.path));

    Ok(patches)
}

/// Warn about patches whose branch would not be reconciled on the next run.
///
/// Returns the offending branch names.
pub fn unprefixed<'a>(patches: &'a [Patch], prefix: &str) -> Vec<&'a str> {
    let mut offenders = Vec::new();
    for patch in patches {
        if !patch.branch.starts_with(prefix) {
            warn!(
                "branch {:?} lacks prefix {prefix:?}, stale copies will not be cleaned up",
                patch.branch
            );
            offenders.push(patch.branch.as_str());
        }
    }

    offenders
}

/// Ensure no patch would publish over the base branch.
///
/// # Errors
///
/// - Return [`PatchError::ShadowsBaseBranch`] if a patch is named after
///   `base`.
pub fn reject_base_branch(patches: &[Patch], base: &str) -> Result<()> {
    match patches.iter().find(|patch| patch.branch == base) {
        Some(patch) => Err(PatchError::ShadowsBaseBranch {
            branch: patch.branch.clone(),
            path: patch.path.clone(),
        }),
        None => Ok(()),
    }
}

/// Patch discovery error types.
#[derive(Debug, thiserror::Error)]
pub enum PatchError {
    /// Patch directory does not exist.
    #[error("patch directory {:?} does not exist", path.display())]
    MissingDirectory { path: PathBuf },

    /// Patch name cannot be used as branch name.
    #[error("patch {:?} does not name a valid branch {branch:?}", path.display())]
    InvalidBranchName { branch: String, path: PathBuf },

    /// Patch would overwrite the base branch it is derived from.
    #[error("patch {:?} is named after base branch {branch:?}", path.display())]
    ShadowsBaseBranch { branch: String, path: PathBuf },

    /// Glob pattern for patch directory is malformed.
    #[error(transparent)]
    Pattern(#[from] glob::PatternError),

    /// Directory entry cannot be read.
    #[error(transparent)]
    Glob(#[from] glob::GlobError),

    /// Operations from libgit2 fail.
    #[error(transparent)]
    Git2(#[from] git2::Error),
}

/// Friendly result alias :3
pub type Result<T, E = PatchError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs::{create_dir, write};

    #[test]
    fn discover_patches_in_name_order() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        write(dir.path().join("howto-b.diff"), "")?;
        write(dir.path().join("howto-a.diff"), "")?;
        write(dir.path().join("README.md"), "")?;
        create_dir(dir.path().join("nested.diff"))?;

        let result = discover(dir.path())?
            .into_iter()
            .map(|patch| patch.branch)
            .collect::<Vec<_>>();
        assert_eq!(result, vec!["howto-a", "howto-b"]);

        Ok(())
    }

    #[test]
    fn discover_skips_hidden_files() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        write(dir.path().join(".diff"), "")?;
        write(dir.path().join(".howto-hidden.diff"), "")?;
        write(dir.path().join("howto-a.diff"), "")?;

        let result = discover(dir.path())?
            .into_iter()
            .map(|patch| patch.branch)
            .collect::<Vec<_>>();
        assert_eq!(result, vec!["howto-a"]);

        Ok(())
    }

    #[test]
    fn base_branch_patch_is_rejected() -> anyhow::Result<()> {
        let patches = vec![
            Patch::from_path("/tmp/howto-a.diff")?,
            Patch::from_path("/tmp/main.diff")?,
        ];
        let result = reject_base_branch(&patches, "main");
        assert!(matches!(
            result,
            Err(PatchError::ShadowsBaseBranch { branch, .. }) if branch == "main"
        ));
        assert!(reject_base_branch(&patches, "trunk").is_ok());

        Ok(())
    }

    #[test]
    fn discover_empty_directory() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        assert_eq!(discover(dir.path())?, Vec::new());

        Ok(())
    }

    #[test]
    fn discover_missing_directory() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let result = discover(dir.path().join("nope"));
        assert!(matches!(result, Err(PatchError::MissingDirectory { .. })));

        Ok(())
    }

    #[test]
    fn discover_escapes_directory_metacharacters() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let patch_dir = dir.path().join("[diffs]");
        create_dir(&patch_dir)?;
        write(patch_dir.join("howto-x.diff"), "")?;

        let result = discover(&patch_dir)?;
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].branch, "howto-x");

        Ok(())
    }

    #[test]
    fn branch_name_is_file_stem() -> anyhow::Result<()> {
        let result = Patch::from_path("/tmp/diffs/howto-flax-basics.diff")?;
        assert_eq!(result.branch, "howto-flax-basics");

        let result = Patch::from_path("/tmp/diffs/howto..bad.diff");
        assert!(matches!(result, Err(PatchError::InvalidBranchName { .. })));

        Ok(())
    }

    #[test]
    fn unprefixed_branches_are_reported() -> anyhow::Result<()> {
        let patches = vec![
            Patch::from_path("/tmp/howto-a.diff")?,
            Patch::from_path("/tmp/ensembling.diff")?,
        ];
        assert_eq!(unprefixed(&patches, "howto-"), vec!["ensembling"]);

        Ok(())
    }
}
