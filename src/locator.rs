//! Repository locator and per-invocation workspace context.
//!
//! A castor root is a directory holding a `Castorfile` and a `.git`
//! directory: the outer repository that receives the frozen dam. The lodge
//! (`<root>/lodge`) and the dam (`<root>/dam`) are created on demand.
//!
//! The root is resolved once per command and carried around as a
//! [`Workspace`] value rather than looked up again by each component.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use log::debug;

use crate::error::{Error, Result};
use crate::manifest::{Manifest, MANIFEST_FILE};
use crate::path;

/// Directory holding the assembled working trees.
pub const LODGE_DIR: &str = "lodge";

/// Directory holding the frozen, git-free mirror.
pub const DAM_DIR: &str = "dam";

/// Whether `dir` holds a `Castorfile` and a `.git` directory.
pub fn is_castor_root(dir: &Path) -> bool {
    dir.join(MANIFEST_FILE).is_file() && dir.join(".git").is_dir()
}

/// Walk from `start` up to the filesystem root looking for a castor root.
///
/// Paths are canonicalized before being checked and every visited path is
/// remembered, so symlink cycles end the walk instead of looping.
pub fn find_root(start: &Path) -> Result<PathBuf> {
    let not_found = || Error::NotARepository {
        start: start.to_path_buf(),
    };

    let mut candidate = fs::canonicalize(start).map_err(|_| not_found())?;
    let mut visited = HashSet::new();

    while visited.insert(candidate.clone()) {
        if is_castor_root(&candidate) {
            debug!("Found castor root at {}", candidate.display());
            return Ok(candidate);
        }
        let parent = match candidate.parent() {
            Some(parent) => parent.to_path_buf(),
            None => break,
        };
        candidate = fs::canonicalize(&parent).unwrap_or(parent);
    }

    Err(not_found())
}

/// Resolved paths of one castor invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workspace {
    /// The castor root (outer git repository).
    pub root: PathBuf,
    /// `<root>/Castorfile`.
    pub manifest_path: PathBuf,
    /// `<root>/lodge`.
    pub lodge: PathBuf,
    /// `<root>/dam`.
    pub dam: PathBuf,
}

impl Workspace {
    /// Workspace rooted exactly at `root`, which must be a castor root.
    pub fn at(root: &Path) -> Result<Self> {
        if !is_castor_root(root) {
            return Err(Error::NotARepository {
                start: root.to_path_buf(),
            });
        }
        let root = fs::canonicalize(root)?;
        Ok(Self::from_root(root))
    }

    /// Workspace of the nearest castor root at or above `start`.
    pub fn discover(start: &Path) -> Result<Self> {
        find_root(start).map(Self::from_root)
    }

    fn from_root(root: PathBuf) -> Self {
        Self {
            manifest_path: root.join(MANIFEST_FILE),
            lodge: root.join(LODGE_DIR),
            dam: root.join(DAM_DIR),
            root,
        }
    }

    /// Load the workspace's manifest.
    pub fn load_manifest(&self) -> Result<Manifest> {
        Manifest::load(&self.manifest_path)
    }

    /// Absolute lodge path of a target.
    pub fn lodge_path(&self, target: &str) -> PathBuf {
        path::resolve(&self.lodge, target)
    }

    /// Absolute dam path of a target.
    pub fn dam_path(&self, target: &str) -> PathBuf {
        path::resolve(&self.dam, target)
    }
}
