use codecontext_core::error::VcsError;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Paths changed since a commit, relative to the repository root.
#[derive(Debug, Clone, Default)]
pub struct ChangedFiles {
    pub added: Vec<String>,
    pub modified: Vec<String>,
    pub deleted: Vec<String>,
}

impl ChangedFiles {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.modified.is_empty() && self.deleted.is_empty()
    }
}

/// Thin wrapper over a libgit2 repository handle.
pub struct GitRepo {
    repo: git2::Repository,
    root: PathBuf,
}

impl GitRepo {
    /// Open the repository containing `path`, searching parent directories.
    pub fn open(path: &Path) -> Result<Self, VcsError> {
        let repo = git2::Repository::discover(path).map_err(|_| VcsError::NotGitRepo {
            path: path.display().to_string(),
        })?;
        let root = repo
            .workdir()
            .ok_or_else(|| VcsError::Git("repository has no working tree".to_string()))?
            .to_path_buf();
        Ok(Self { repo, root })
    }

    pub fn is_repository(path: &Path) -> bool {
        git2::Repository::discover(path).is_ok()
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Current HEAD commit sha, or None for an unborn branch.
    pub fn head_sha(&self) -> Result<Option<String>, VcsError> {
        match self.repo.head() {
            Ok(head) => {
                let commit = head.peel_to_commit().map_err(VcsError::git)?;
                Ok(Some(commit.id().to_string()))
            }
            Err(e) if e.code() == git2::ErrorCode::UnbornBranch => Ok(None),
            Err(e) => Err(VcsError::git(e)),
        }
    }

    /// The `origin` remote URL, when configured.
    pub fn remote_origin_url(&self) -> Option<String> {
        let remote = self.repo.find_remote("origin").ok()?;
        remote.url().map(str::to_string)
    }

    /// Diff the working tree (plus index) against a past commit and classify
    /// each path as added, modified, or deleted. Renames surface as a delete
    /// of the old path plus an add of the new one.
    pub fn diff_since(&self, from_sha: &str) -> Result<ChangedFiles, VcsError> {
        let object = self
            .repo
            .revparse_single(from_sha)
            .map_err(|e| VcsError::Git(format!("invalid commit {from_sha}: {e}")))?;
        let commit = object.peel_to_commit().map_err(VcsError::git)?;
        let tree = commit.tree().map_err(VcsError::git)?;

        let mut options = git2::DiffOptions::new();
        options.include_untracked(true).recurse_untracked_dirs(true);
        let diff = self
            .repo
            .diff_tree_to_workdir_with_index(Some(&tree), Some(&mut options))
            .map_err(VcsError::git)?;

        let mut changed = ChangedFiles::default();
        for delta in diff.deltas() {
            let old_path = delta.old_file().path().map(path_to_relative);
            let new_path = delta.new_file().path().map(path_to_relative);
            match delta.status() {
                git2::Delta::Added | git2::Delta::Untracked => {
                    if let Some(path) = new_path {
                        changed.added.push(path);
                    }
                }
                git2::Delta::Deleted => {
                    if let Some(path) = old_path {
                        changed.deleted.push(path);
                    }
                }
                git2::Delta::Renamed => {
                    if let Some(path) = old_path {
                        changed.deleted.push(path);
                    }
                    if let Some(path) = new_path {
                        changed.added.push(path);
                    }
                }
                _ => {
                    if let Some(path) = new_path.or(old_path) {
                        changed.modified.push(path);
                    }
                }
            }
        }

        debug!(
            added = changed.added.len(),
            modified = changed.modified.len(),
            deleted = changed.deleted.len(),
            "diff since {from_sha}"
        );
        Ok(changed)
    }
}

fn path_to_relative(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}
