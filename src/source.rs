//! # Source Provider
//!
//! This module materializes manifest sources into the lodge. It is the only
//! place that knows how a `git` or `file` source becomes content on disk; the
//! assembly and freeze engines simply hand it a [`Source`] and a target path.
//!
//! ## Design
//!
//! Git access goes through the **`GitOperations`** trait. In the application,
//! `DefaultGitOperations` wraps the system `git` command (see [`crate::git`]);
//! tests substitute their own implementation to simulate clones, fetches and
//! dirty checkouts without touching the network.
//!
//! Both variants are idempotent: materializing the same source twice leaves
//! the target unchanged the second time.
//!
//! - **git**: clone when the target is absent (or an empty directory), refuse
//!   when it holds something other than a clean checkout of the same
//!   repository, otherwise fetch if needed and check out the pinned revision
//!   with a detached HEAD.
//! - **file**: copy the bytes, creating parent directories, refusing to
//!   replace a directory.

use std::fs;
use std::path::Path;

use log::{debug, info};

use crate::error::{Error, Result};
use crate::manifest::Source;

/// Trait for git operations - allows mocking in tests
pub trait GitOperations {
    /// Clone `url` into `target_dir`.
    fn clone_repo(&self, url: &str, target_dir: &Path) -> Result<()>;

    /// Fetch branches and tags from `origin`.
    fn fetch(&self, dir: &Path, url: &str) -> Result<()>;

    /// Whether `dir` is the top of a git working tree.
    fn is_checkout(&self, dir: &Path) -> bool;

    /// URL of the `origin` remote.
    fn remote_url(&self, dir: &Path) -> Result<Option<String>>;

    /// Resolve a revision to a commit id.
    fn resolve_commit(&self, dir: &Path, revision: &str) -> Result<Option<String>>;

    /// Commit id checked out in `dir`.
    fn head_revision(&self, dir: &Path) -> Result<String>;

    /// Tracked paths with local modifications.
    fn modified_paths(&self, dir: &Path) -> Result<Vec<String>>;

    /// Discard local modifications to `paths`.
    fn restore_paths(&self, dir: &Path, paths: &[String]) -> Result<()>;

    /// Check out `commit` with a detached HEAD.
    fn checkout_detached(&self, dir: &Path, commit: &str) -> Result<()>;

    /// Tags pointing exactly at `commit`.
    fn tags_at(&self, dir: &Path, commit: &str) -> Result<Vec<String>>;

    /// Whether the index of the repository at `dir` tracks anything under
    /// `path`.
    fn tracks(&self, dir: &Path, path: &str) -> Result<bool>;

    /// Stage everything under `paths`, ignored files included.
    fn stage(&self, dir: &Path, paths: &[&str]) -> Result<()>;
}

/// The default implementation of `GitOperations`, which uses the system's
/// `git` command to perform real Git operations.
pub struct DefaultGitOperations;

impl GitOperations for DefaultGitOperations {
    fn clone_repo(&self, url: &str, target_dir: &Path) -> Result<()> {
        crate::git::clone(url, target_dir)
    }

    fn fetch(&self, dir: &Path, url: &str) -> Result<()> {
        crate::git::fetch(dir, url)
    }

    fn is_checkout(&self, dir: &Path) -> bool {
        crate::git::is_checkout(dir)
    }

    fn remote_url(&self, dir: &Path) -> Result<Option<String>> {
        crate::git::remote_url(dir)
    }

    fn resolve_commit(&self, dir: &Path, revision: &str) -> Result<Option<String>> {
        crate::git::resolve_commit(dir, revision)
    }

    fn head_revision(&self, dir: &Path) -> Result<String> {
        crate::git::head_revision(dir)
    }

    fn modified_paths(&self, dir: &Path) -> Result<Vec<String>> {
        crate::git::modified_paths(dir)
    }

    fn restore_paths(&self, dir: &Path, paths: &[String]) -> Result<()> {
        crate::git::restore_paths(dir, paths)
    }

    fn checkout_detached(&self, dir: &Path, commit: &str) -> Result<()> {
        crate::git::checkout_detached(dir, commit)
    }

    fn tags_at(&self, dir: &Path, commit: &str) -> Result<Vec<String>> {
        crate::git::tags_at(dir, commit)
    }

    fn tracks(&self, dir: &Path, path: &str) -> Result<bool> {
        crate::git::tracks(dir, path)
    }

    fn stage(&self, dir: &Path, paths: &[&str]) -> Result<()> {
        crate::git::stage(dir, paths)
    }
}

/// Materializes manifest sources at absolute target paths.
pub struct SourceProvider {
    git_ops: Box<dyn GitOperations>,
}

impl Default for SourceProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl SourceProvider {
    /// Creates a `SourceProvider` backed by the system `git` command.
    pub fn new() -> Self {
        Self {
            git_ops: Box::new(DefaultGitOperations),
        }
    }

    /// Creates a `SourceProvider` with a custom `GitOperations`
    /// implementation.
    pub fn with_operations(git_ops: Box<dyn GitOperations>) -> Self {
        Self { git_ops }
    }

    /// The git operations backing this provider.
    pub fn git(&self) -> &dyn GitOperations {
        self.git_ops.as_ref()
    }

    /// Materialize `source` at `target_abs`.
    ///
    /// `root` is the castor root, against which file sources are resolved.
    /// `overlays` lists paths, relative to `target_abs`, that belong to
    /// nested entries; modifications there do not count as local changes.
    ///
    /// Returns the checked-out commit for git sources.
    pub fn materialize(
        &self,
        source: &Source,
        target_abs: &Path,
        root: &Path,
        overlays: &[String],
    ) -> Result<Option<String>> {
        match source {
            Source::Git { repo, version } => self
                .materialize_git(target_abs, repo, version, overlays)
                .map(Some),
            Source::File { path } => {
                self.materialize_file(target_abs, &root.join(path))?;
                Ok(None)
            }
        }
    }

    /// Clone or update the checkout at `target_abs` and pin it to `version`.
    pub fn materialize_git(
        &self,
        target_abs: &Path,
        repo: &str,
        version: &str,
        overlays: &[String],
    ) -> Result<String> {
        let fresh = if !target_abs.exists() || is_empty_dir(target_abs)? {
            info!("Cloning {} into {}", repo, target_abs.display());
            self.git_ops.clone_repo(repo, target_abs)?;
            true
        } else {
            self.ensure_checkout_of(target_abs, repo)?;
            false
        };

        let commit = self.resolve_version(target_abs, repo, version, fresh)?;

        if !fresh {
            let head = self.git_ops.resolve_commit(target_abs, "HEAD")?;
            if head.as_deref() == Some(commit.as_str()) {
                debug!("{} already at {}", target_abs.display(), commit);
                return Ok(commit);
            }
            self.prepare_switch(target_abs, version, overlays)?;
        }

        debug!("Checking out {} ({}) in {}", version, commit, target_abs.display());
        self.git_ops.checkout_detached(target_abs, &commit)?;
        Ok(commit)
    }

    /// Refuse anything at `target_abs` other than a checkout of `repo`.
    fn ensure_checkout_of(&self, target_abs: &Path, repo: &str) -> Result<()> {
        if !self.git_ops.is_checkout(target_abs) {
            return Err(Error::DirtyTarget {
                path: target_abs.to_path_buf(),
                reason: format!(
                    "it exists and is not a git checkout, it was supposed to be a clone of {}",
                    repo
                ),
            });
        }

        match self.git_ops.remote_url(target_abs)? {
            Some(url) if same_remote(&url, repo) => Ok(()),
            Some(url) => Err(Error::DirtyTarget {
                path: target_abs.to_path_buf(),
                reason: format!("it is a checkout of {}, not {}", url, repo),
            }),
            None => Err(Error::DirtyTarget {
                path: target_abs.to_path_buf(),
                reason: format!("it has no origin remote, expected {}", repo),
            }),
        }
    }

    /// Resolve `version` to a commit, fetching when it is a branch or not
    /// known locally.
    ///
    /// Remote branches win over local names so that branch versions follow
    /// the remote.
    fn resolve_version(
        &self,
        target_abs: &Path,
        repo: &str,
        version: &str,
        fresh: bool,
    ) -> Result<String> {
        let remote_branch = format!("refs/remotes/origin/{}", version);

        if !fresh {
            let is_branch = self
                .git_ops
                .resolve_commit(target_abs, &remote_branch)?
                .is_some();
            let known = self.git_ops.resolve_commit(target_abs, version)?.is_some();
            if is_branch || !known {
                info!("Fetching {}", repo);
                self.git_ops.fetch(target_abs, repo)?;
            }
        }

        if let Some(commit) = self.git_ops.resolve_commit(target_abs, &remote_branch)? {
            return Ok(commit);
        }
        self.git_ops
            .resolve_commit(target_abs, version)?
            .ok_or_else(|| Error::RevisionNotFound {
                repo: repo.to_string(),
                version: version.to_string(),
            })
    }

    /// Make sure switching commits destroys nothing but overlaid paths.
    fn prepare_switch(&self, target_abs: &Path, version: &str, overlays: &[String]) -> Result<()> {
        let (overlaid, local): (Vec<String>, Vec<String>) = self
            .git_ops
            .modified_paths(target_abs)?
            .into_iter()
            .partition(|p| is_overlaid(p, overlays));

        if !local.is_empty() {
            let shown: Vec<&str> = local.iter().take(5).map(String::as_str).collect();
            let more = if local.len() > shown.len() {
                format!(" and {} more", local.len() - shown.len())
            } else {
                String::new()
            };
            return Err(Error::DirtyTarget {
                path: target_abs.to_path_buf(),
                reason: format!(
                    "checking out {} would discard local modifications to {}{}",
                    version,
                    shown.join(", "),
                    more
                ),
            });
        }

        // Nested entries are materialized again after this checkout
        self.git_ops.restore_paths(target_abs, &overlaid)
    }

    /// Copy `source_abs` to `target_abs`.
    pub fn materialize_file(&self, target_abs: &Path, source_abs: &Path) -> Result<()> {
        if target_abs.is_dir() {
            return Err(Error::TargetIsDirectory {
                path: target_abs.to_path_buf(),
            });
        }
        if !source_abs.is_file() {
            return Err(Error::SourceFetch {
                source_name: source_abs.display().to_string(),
                message: "no such file".to_string(),
            });
        }

        if let Some(parent) = target_abs.parent() {
            fs::create_dir_all(parent)?;
        }
        debug!("Copying {} to {}", source_abs.display(), target_abs.display());
        fs::copy(source_abs, target_abs)?;
        Ok(())
    }

    /// Commit id checked out at `target_abs`.
    pub fn current_revision(&self, target_abs: &Path) -> Result<String> {
        if !self.git_ops.is_checkout(target_abs) {
            return Err(Error::MissingCheckout {
                path: target_abs.to_path_buf(),
            });
        }
        self.git_ops.head_revision(target_abs)
    }

    /// Tracked paths with local modifications at `target_abs`.
    pub fn local_modifications(&self, target_abs: &Path) -> Result<Vec<String>> {
        self.git_ops.modified_paths(target_abs)
    }
}

fn is_empty_dir(path: &Path) -> Result<bool> {
    if !path.is_dir() {
        return Ok(false);
    }
    Ok(fs::read_dir(path)?.next().is_none())
}

fn same_remote(a: &str, b: &str) -> bool {
    a.trim_end_matches('/') == b.trim_end_matches('/')
}

/// Whether a repository-relative `path` lies at or below one of `overlays`.
pub(crate) fn is_overlaid(path: &str, overlays: &[String]) -> bool {
    overlays.iter().any(|overlay| {
        path == overlay
            || path
                .strip_prefix(overlay.as_str())
                .is_some_and(|rest| rest.starts_with('/'))
    })
}

/// Paths of `targets` nested below `parent_target`, relative to it and
/// without a leading slash, as expected by [`SourceProvider::materialize`].
pub fn overlay_paths<'a, I>(parent_target: &str, targets: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    targets
        .into_iter()
        .filter_map(|t| crate::path::relative_to(t, parent_target))
        .map(|rel| rel.trim_start_matches('/').to_string())
        .collect()
}
