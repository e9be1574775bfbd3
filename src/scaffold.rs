//! Scaffolding for `castor init`.
//!
//! A new castor root is a fresh git repository holding an empty `Castorfile`
//! and a `.gitignore` that keeps the lodge out of version control. Both files
//! are staged but not committed.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::info;

use crate::error::{Error, Result};
use crate::git;
use crate::locator::LODGE_DIR;
use crate::manifest::{Manifest, MANIFEST_FILE};

/// Name of the ignore file written at the root.
pub const GITIGNORE_FILE: &str = ".gitignore";

/// Content of the root `.gitignore`.
pub fn gitignore_content() -> String {
    format!("/{}\n", LODGE_DIR)
}

/// Create a castor root at `directory` and return its canonical path.
///
/// The directory must be empty or absent; when absent, its parent must
/// exist.
pub fn init(directory: &Path) -> Result<PathBuf> {
    prepare_directory(directory)?;
    let root = fs::canonicalize(directory)?;

    info!("Initializing castor root in {}", root.display());
    git::init(&root)?;
    Manifest::empty().save(&root.join(MANIFEST_FILE))?;
    fs::write(root.join(GITIGNORE_FILE), gitignore_content())?;
    git::stage(&root, &[MANIFEST_FILE, GITIGNORE_FILE])?;

    Ok(root)
}

fn prepare_directory(directory: &Path) -> Result<()> {
    match fs::symlink_metadata(directory) {
        Ok(meta) if meta.is_dir() => {
            if fs::read_dir(directory)?.next().is_some() {
                return Err(Error::DirtyTarget {
                    path: directory.to_path_buf(),
                    reason: "the directory is not empty".to_string(),
                });
            }
            Ok(())
        }
        Ok(_) => Err(Error::DirtyTarget {
            path: directory.to_path_buf(),
            reason: "it exists and is not a directory".to_string(),
        }),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            let parent = match directory.parent() {
                Some(p) if !p.as_os_str().is_empty() => p,
                _ => Path::new("."),
            };
            if !parent.is_dir() {
                return Err(Error::Io(io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("parent directory {} does not exist", parent.display()),
                )));
            }
            fs::create_dir(directory)?;
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}
