//! Assembly engine: materialize every manifest entry into the lodge.
//!
//! ## Process
//!
//! 1.  **Order**: entries are visited shallowest target first (stable), so a
//!     nested entry always lands on top of its enclosing checkout.
//!
//! 2.  **Materialize**: each entry's source is handed to the
//!     [`SourceProvider`]. Paths owned by nested entries are passed along as
//!     overlays so that the enclosing checkout does not count them as local
//!     modifications. A nested git entry is refused when its enclosing
//!     checkout tracks files at its target.
//!
//! 3.  **Exclude**: nested targets are listed in the enclosing checkout's
//!     `.git/info/exclude`, keeping `git status` in that checkout clean.
//!
//! 4.  **Hooks** (optional): with `exec_post_freeze`, every entry's
//!     post-freeze commands run against its lodge subtree.
//!
//! The first failing entry stops the run. Entries already materialized stay
//! on disk and the error names the failing target.

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use log::{debug, info};

use crate::error::{Error, Result, Step};
use crate::hooks::{self, Phase};
use crate::locator::Workspace;
use crate::manifest::{Entry, Manifest, Source};
use crate::path;
use crate::source::{self, SourceProvider};

/// Options for [`apply`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ApplyOptions {
    /// Run post-freeze hooks against the lodge after assembling it.
    pub exec_post_freeze: bool,
}

/// Outcome of materializing a single entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedEntry {
    pub target: String,
    pub kind: &'static str,
    /// Checked-out commit, for git entries.
    pub revision: Option<String>,
}

/// Summary of an [`apply`] run, in the order entries were processed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyReport {
    pub entries: Vec<AppliedEntry>,
    /// Number of entries whose hooks were executed.
    pub hooks_run: usize,
}

/// Assemble the lodge described by `manifest`.
pub fn apply(
    workspace: &Workspace,
    manifest: &Manifest,
    provider: &SourceProvider,
    options: &ApplyOptions,
) -> Result<ApplyReport> {
    let ordered = manifest.ordered();
    let mut report = ApplyReport::default();

    for entry in &ordered {
        info!("Applying {}", entry.describe());
        let revision = apply_entry(workspace, entry, &ordered, provider)
            .map_err(|e| e.for_entry(&entry.target, Step::Apply))?;

        report.entries.push(AppliedEntry {
            target: entry.target.clone(),
            kind: entry.source.kind(),
            revision,
        });
    }

    if options.exec_post_freeze {
        for entry in &ordered {
            if entry.post_freeze.is_empty() {
                continue;
            }
            let subtree = workspace.lodge_path(&entry.target);
            hooks::run_for_entry(entry, &subtree, &workspace.root, Phase::Apply)
                .map_err(|e| e.for_entry(&entry.target, Step::Hook))?;
            report.hooks_run += 1;
        }
    }

    Ok(report)
}

fn apply_entry(
    workspace: &Workspace,
    entry: &Entry,
    ordered: &[&Entry],
    provider: &SourceProvider,
) -> Result<Option<String>> {
    let target_abs = workspace.lodge_path(&entry.target);
    let overlays = match entry.source {
        Source::Git { .. } => {
            if let Some(parent) = enclosing_checkout(ordered, &entry.target) {
                ensure_untracked_by(workspace, provider, &entry.target, parent)?;
            }
            source::overlay_paths(&entry.target, ordered.iter().map(|e| e.target.as_str()))
        }
        Source::File { .. } => Vec::new(),
    };

    let revision = provider.materialize(&entry.source, &target_abs, &workspace.root, &overlays)?;

    if revision.is_some() && !overlays.is_empty() {
        let patterns: Vec<String> = overlays.iter().map(|o| format!("/{}", o)).collect();
        exclude_nested(&target_abs, &patterns)?;
    }
    Ok(revision)
}

/// The deepest git entry strictly enclosing `target`.
fn enclosing_checkout<'a>(ordered: &[&'a Entry], target: &str) -> Option<&'a Entry> {
    ordered
        .iter()
        .copied()
        .filter(|e| matches!(e.source, Source::Git { .. }))
        .filter(|e| path::is_strictly_within(target, &e.target))
        .max_by_key(|e| e.depth())
}

/// Refuse a nested git target that the enclosing checkout tracks files
/// under. Every checkout of the enclosing entry would write them into the
/// nested clone.
fn ensure_untracked_by(
    workspace: &Workspace,
    provider: &SourceProvider,
    target: &str,
    parent: &Entry,
) -> Result<()> {
    let parent_abs = workspace.lodge_path(&parent.target);
    let Some(relative) = path::relative_to(target, &parent.target) else {
        return Ok(());
    };
    let git = provider.git();
    let relative = relative.trim_start_matches('/');
    if !git.is_checkout(&parent_abs) || !git.tracks(&parent_abs, relative)? {
        return Ok(());
    }
    Err(Error::DirtyTarget {
        path: workspace.lodge_path(target),
        reason: format!(
            "the checkout at {} tracks files there, so {} cannot be cloned over them",
            parent.target, target
        ),
    })
}

/// Append `patterns` to the checkout's `.git/info/exclude`, skipping lines
/// already present.
///
/// Checkouts whose `.git` is a gitlink file are left alone.
fn exclude_nested(checkout: &Path, patterns: &[String]) -> Result<()> {
    let git_dir = checkout.join(".git");
    if !git_dir.is_dir() {
        return Ok(());
    }
    let exclude = git_dir.join("info").join("exclude");
    ensure_lines(&exclude, patterns)
}

fn ensure_lines(file: &Path, lines: &[String]) -> Result<()> {
    let existing = match fs::read_to_string(file) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(e) => return Err(Error::Io(e)),
    };
    let present: BTreeSet<&str> = existing.lines().map(str::trim).collect();

    let mut missing: Vec<&str> = Vec::new();
    for line in lines {
        if !present.contains(line.as_str()) && !missing.contains(&line.as_str()) {
            missing.push(line);
        }
    }
    if missing.is_empty() {
        return Ok(());
    }

    debug!("Excluding {} in {}", missing.join(", "), file.display());
    let mut content = existing;
    if !content.is_empty() && !content.ends_with('\n') {
        content.push('\n');
    }
    for line in missing {
        content.push_str(line);
        content.push('\n');
    }
    if let Some(parent) = file.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(file, content)?;
    Ok(())
}
