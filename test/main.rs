// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT


use anyhow::Result;
use git2::{BranchType, Oid, Repository, RepositoryInitOptions};
use std::{
    fs::{create_dir_all, write},
    path::{Path, PathBuf},
};
use tempfile::TempDir;

/// Working copy cloned from a local bare remote.
pub(crate) struct RepoFixture {
    _root: TempDir,
    remote_path: PathBuf,
    work: Repository,
    patch_dir: PathBuf,
}

impl RepoFixture {
    pub(crate) fn new() -> Result<Self> {
        let root = tempfile::tempdir()?;
        let remote_path = root.path().join("remote.git");
        let work_path = root.path().join("work");
        let patch_dir = root.path().join("diffs");
        create_dir_all(&patch_dir)?;

        let mut opts = RepositoryInitOptions::new();
        opts.initial_head("main");
        opts.bare(true);
        Repository::init_opts(&remote_path, &opts)?;

        let mut opts = RepositoryInitOptions::new();
        opts.initial_head("main");
        let work = Repository::init_opts(&work_path, &opts)?;

        // INVARIANT: Always provide valid name and email.
        //   - Git will complain if this is not set in CI/CD environments.
        let mut config = work.config()?;
        config.set_str("user.name", "John Doe")?;
        config.set_str("user.email", "john@doe.com")?;
        work.remote("origin", &remote_path.to_string_lossy())?;

        Ok(Self {
            _root: root,
            remote_path,
            work,
            patch_dir,
        })
    }

    pub(crate) fn work_path(&self) -> &Path {
        self.work.workdir().unwrap()
    }

    pub(crate) fn remote_path(&self) -> &Path {
        &self.remote_path
    }

    pub(crate) fn patch_dir(&self) -> &Path {
        &self.patch_dir
    }

    pub(crate) fn stage_and_commit(
        &self,
        filename: impl AsRef<Path>,
        contents: impl AsRef<str>,
    ) -> Result<()> {
        let full_path = self.work_path().join(filename.as_ref());
        if let Some(parent) = full_path.parent() {
            create_dir_all(parent)?;
        }
        write(&full_path, contents.as_ref())?;

        // INVARIANT: Always use new tree produced by index after staging new entry.
        let mut index = self.work.index()?;
        index.add_path(filename.as_ref())?;
        index.write()?;
        let tree_oid = index.write_tree()?;
        let tree = self.work.find_tree(tree_oid)?;

        // INVARIANT: Always determine latest parent commits to append to.
        let signature = self.work.signature()?;
        let mut parents = Vec::new();
        if let Some(parent) = self.work.head().ok().and_then(|head| head.target()) {
            parents.push(self.work.find_commit(parent)?);
        }
        let parents = parents.iter().collect::<Vec<_>>();

        self.work.commit(
            Some("HEAD"),
            &signature,
            &signature,
            format!("chore: add {:?}", filename.as_ref()).as_ref(),
            &tree,
            &parents,
        )?;

        Ok(())
    }

    /// Push local `main` to remote under each of `branches`.
    pub(crate) fn push_main_as(&self, branches: &[&str]) -> Result<()> {
        let mut remote = self.work.find_remote("origin")?;
        let refspecs = branches
            .iter()
            .map(|branch| format!("+refs/heads/main:refs/heads/{branch}"))
            .collect::<Vec<_>>();
        remote.push(&refspecs, None)?;

        Ok(())
    }

    pub(crate) fn write_patch(&self, name: &str, contents: &str) -> Result<()> {
        write(self.patch_dir.join(format!("{name}.diff")), contents)?;

        Ok(())
    }

    pub(crate) fn remote_branches(&self) -> Result<Vec<String>> {
        let remote = Repository::open(&self.remote_path)?;
        let mut names = Vec::new();
        for entry in remote.branches(Some(BranchType::Local))? {
            let (branch, _) = entry?;
            if let Some(name) = branch.name()? {
                names.push(name.to_string());
            }
        }
        names.sort();

        Ok(names)
    }

    pub(crate) fn remote_tree(&self, branch: &str) -> Result<Oid> {
        let remote = Repository::open(&self.remote_path)?;
        let commit = remote
            .find_branch(branch, BranchType::Local)?
            .get()
            .peel_to_commit()?;

        Ok(commit.tree_id())
    }

    pub(crate) fn remote_file(&self, branch: &str, path: &str) -> Result<String> {
        let remote = Repository::open(&self.remote_path)?;
        let tree = remote
            .find_branch(branch, BranchType::Local)?
            .get()
            .peel_to_tree()?;
        let blob = tree.get_path(Path::new(path))?.to_object(&remote)?.peel_to_blob()?;

        Ok(String::from_utf8_lossy(blob.content()).into_owned())
    }
}
