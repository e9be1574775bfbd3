//! Target path utilities for castor
//!
//! Manifest targets are slash-rooted paths relative to the lodge (and dam)
//! root, such as `/`, `/themes/x` or `/config/settings.php`. They are kept as
//! normalized strings so that they compare, sort and serialize the same way
//! on every platform.

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Normalize a manifest target.
///
/// Repeated and trailing slashes are collapsed (`/a//b/` becomes `/a/b`).
/// The target must start with `/` and must not contain `.` or `..`
/// components, so it can never escape the lodge.
pub fn normalize_target(target: &str) -> Result<String> {
    if !target.starts_with('/') {
        return Err(Error::Manifest {
            message: format!("target '{}' must start with '/'", target),
        });
    }
    if target.contains('\0') {
        return Err(Error::Manifest {
            message: format!("target '{}' contains a NUL byte", target.escape_debug()),
        });
    }

    let mut normalized = String::new();
    for component in target.split('/').filter(|c| !c.is_empty()) {
        if component == "." || component == ".." {
            return Err(Error::Manifest {
                message: format!("target '{}' must not contain '.' or '..'", target),
            });
        }
        normalized.push('/');
        normalized.push_str(component);
    }

    if normalized.is_empty() {
        normalized.push('/');
    }
    Ok(normalized)
}

/// Components of a normalized target (empty for `/`).
pub fn components(target: &str) -> impl Iterator<Item = &str> {
    target.split('/').filter(|c| !c.is_empty())
}

/// Number of components below the root; `/` has depth 0.
pub fn depth(target: &str) -> usize {
    components(target).count()
}

/// Whether `target` lies strictly below `ancestor`.
pub fn is_strictly_within(target: &str, ancestor: &str) -> bool {
    if target == ancestor {
        return false;
    }
    if ancestor == "/" {
        return true;
    }
    target
        .strip_prefix(ancestor)
        .is_some_and(|rest| rest.starts_with('/'))
}

/// Resolve a normalized target below a filesystem root.
///
/// `/` resolves to `root` itself.
pub fn resolve(root: &Path, target: &str) -> PathBuf {
    let mut path = root.to_path_buf();
    for component in components(target) {
        path.push(component);
    }
    path
}

/// The part of `target` below `ancestor`, itself slash-rooted.
///
/// Returns `None` unless `target` is strictly within `ancestor`.
pub fn relative_to(target: &str, ancestor: &str) -> Option<String> {
    if !is_strictly_within(target, ancestor) {
        return None;
    }
    if ancestor == "/" {
        return Some(target.to_string());
    }
    target.strip_prefix(ancestor).map(str::to_string)
}
