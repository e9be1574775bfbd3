//! Synchronizing copy of lodge subtrees into the dam.
//!
//! A mirror replaces whatever was at the destination with an exact copy of
//! the source, minus version-control metadata (`.git` directories and gitlink
//! files, at any depth). Symbolic links are copied as links on Unix.

use std::ffi::OsStr;
use std::fs;
use std::io;
use std::path::Path;

use log::debug;
use walkdir::WalkDir;

use crate::error::{Error, Result};
use crate::path;

/// Names that are never copied into the dam.
pub const VCS_METADATA: &[&str] = &[".git"];

/// Whether a file name is version-control metadata.
pub fn is_vcs_metadata(name: &OsStr) -> bool {
    VCS_METADATA.iter().any(|m| name == OsStr::new(m))
}

/// Remove a file, symlink or directory tree; missing paths are fine.
pub fn remove_path(target: &Path) -> Result<()> {
    match fs::symlink_metadata(target) {
        Ok(meta) if meta.is_dir() => fs::remove_dir_all(target)?,
        Ok(_) => fs::remove_file(target)?,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }
    Ok(())
}

#[cfg(unix)]
fn copy_symlink(src: &Path, dst: &Path) -> Result<()> {
    let link = fs::read_link(src)?;
    std::os::unix::fs::symlink(link, dst)?;
    Ok(())
}

#[cfg(not(unix))]
fn copy_symlink(src: &Path, dst: &Path) -> Result<()> {
    if src.is_dir() {
        fs::create_dir_all(dst)?;
    } else {
        fs::copy(src, dst)?;
    }
    Ok(())
}

/// Replace `dst` with a copy of `src`, leaving out VCS metadata.
pub fn mirror(src: &Path, dst: &Path) -> Result<()> {
    let meta = fs::symlink_metadata(src).map_err(|e| {
        if e.kind() == io::ErrorKind::NotFound {
            Error::Io(io::Error::new(
                io::ErrorKind::NotFound,
                format!(
                    "{} does not exist, run `castor apply` first",
                    src.display()
                ),
            ))
        } else {
            Error::Io(e)
        }
    })?;

    remove_path(dst)?;
    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent)?;
    }

    if meta.file_type().is_symlink() {
        return copy_symlink(src, dst);
    }
    if meta.is_file() {
        fs::copy(src, dst)?;
        return Ok(());
    }

    debug!("Mirroring {} to {}", src.display(), dst.display());
    let walker = WalkDir::new(src)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !is_vcs_metadata(e.file_name()));

    for entry in walker {
        let entry = entry.map_err(|e| {
            Error::Io(
                e.into_io_error()
                    .unwrap_or_else(|| io::Error::other("filesystem loop while mirroring")),
            )
        })?;
        let relative = entry
            .path()
            .strip_prefix(src)
            .map_err(|e| Error::Io(io::Error::other(e)))?;
        let target = dst.join(relative);
        let file_type = entry.file_type();

        if file_type.is_symlink() {
            copy_symlink(entry.path(), &target)?;
        } else if file_type.is_dir() {
            fs::create_dir_all(&target)?;
        } else {
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

/// Remove everything under `root` that no target covers.
///
/// A path survives if it is one of `targets`, lies below one, or is an
/// ancestor directory of one. A `/` target covers everything.
pub fn prune(root: &Path, targets: &[&str]) -> Result<()> {
    if targets.contains(&"/") || !root.is_dir() {
        return Ok(());
    }
    prune_dir(root, "", targets)
}

fn prune_dir(dir: &Path, prefix: &str, targets: &[&str]) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let child = format!("{}/{}", prefix, entry.file_name().to_string_lossy());

        if targets.contains(&child.as_str()) {
            continue;
        }
        let is_ancestor = targets.iter().any(|t| path::is_strictly_within(t, &child));
        if is_ancestor && entry.file_type()?.is_dir() {
            prune_dir(&entry.path(), &child, targets)?;
        } else {
            debug!("Pruning stale {}", entry.path().display());
            remove_path(&entry.path())?;
        }
    }
    Ok(())
}
