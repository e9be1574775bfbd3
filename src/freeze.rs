//! Freeze engine: pin revisions, mirror the lodge into the dam and persist.
//!
//! ## Process
//!
//! 1.  **Resolve**: every git entry's checkout is asked for its current
//!     commit, which becomes the entry's new `version` (or a tag pointing at
//!     that commit, with `prefer_tags`; a pinned tag that still points there
//!     is kept).
//!
//! 2.  **Mirror**: in depth order, each entry's lodge subtree replaces the
//!     matching dam subtree, without any `.git` metadata. Dam content that no
//!     entry covers any more is pruned.
//!
//! 3.  **Hooks**: each entry's `post_freeze` commands run in its dam subtree.
//!
//! 4.  **Persist**: only once all of the above succeeded, the rewritten
//!     manifest is saved and `dam/` plus the `Castorfile` are staged in the
//!     outer repository.

use std::fs;

use log::{debug, info, warn};

use crate::error::{Result, Step};
use crate::hooks::{self, Phase};
use crate::locator::{Workspace, DAM_DIR};
use crate::manifest::{Manifest, Source, MANIFEST_FILE};
use crate::mirror;
use crate::source::{self, SourceProvider};

/// Options for [`freeze`].
#[derive(Debug, Clone, Copy)]
pub struct FreezeOptions {
    /// Record a tag pointing at the checked-out commit instead of the commit
    /// id, when there is one.
    pub prefer_tags: bool,
    /// Stage `dam/` and the `Castorfile` in the outer repository.
    pub stage: bool,
}

impl Default for FreezeOptions {
    fn default() -> Self {
        Self {
            prefer_tags: false,
            stage: true,
        }
    }
}

/// Version change of one git entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrozenEntry {
    pub target: String,
    pub old_version: String,
    pub new_version: String,
}

impl FrozenEntry {
    pub fn changed(&self) -> bool {
        self.old_version != self.new_version
    }
}

/// Summary of a [`freeze`] run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FreezeReport {
    /// Git entries, in depth order.
    pub entries: Vec<FrozenEntry>,
    /// Number of entries mirrored into the dam.
    pub mirrored: usize,
    pub staged: bool,
}

/// Freeze the lodge described by `manifest` into the dam.
///
/// `manifest` is updated in memory with the resolved versions; it is written
/// to disk only when every step succeeded.
pub fn freeze(
    workspace: &Workspace,
    manifest: &mut Manifest,
    provider: &SourceProvider,
    options: &FreezeOptions,
) -> Result<FreezeReport> {
    let order = manifest.ordered_indices();
    let targets: Vec<String> = order
        .iter()
        .map(|&i| manifest.entries[i].target.clone())
        .collect();
    let mut report = FreezeReport::default();

    // Resolve
    let mut resolved: Vec<(usize, String)> = Vec::new();
    for &i in &order {
        let entry = &manifest.entries[i];
        let version = match &entry.source {
            Source::Git { version, .. } => version,
            Source::File { .. } => continue,
        };
        let new_version =
            resolve_entry(workspace, &entry.target, version, &targets, provider, options)
                .map_err(|e| e.for_entry(&entry.target, Step::Resolve))?;

        report.entries.push(FrozenEntry {
            target: entry.target.clone(),
            old_version: version.clone(),
            new_version: new_version.clone(),
        });
        resolved.push((i, new_version));
    }

    // Mirror
    fs::create_dir_all(&workspace.dam)?;
    for &i in &order {
        let entry = &manifest.entries[i];
        debug!("Mirroring {}", entry.target);
        mirror::mirror(
            &workspace.lodge_path(&entry.target),
            &workspace.dam_path(&entry.target),
        )
        .map_err(|e| e.for_entry(&entry.target, Step::Mirror))?;
        report.mirrored += 1;
    }
    let covered: Vec<&str> = targets.iter().map(String::as_str).collect();
    mirror::prune(&workspace.dam, &covered)?;

    // Hooks
    for &i in &order {
        let entry = &manifest.entries[i];
        let subtree = workspace.dam_path(&entry.target);
        hooks::run_for_entry(entry, &subtree, &workspace.root, Phase::Freeze)
            .map_err(|e| e.for_entry(&entry.target, Step::Hook))?;
    }

    // Persist
    for (i, new_version) in resolved {
        if let Source::Git { version, .. } = &mut manifest.entries[i].source {
            *version = new_version;
        }
    }
    manifest.save(&workspace.manifest_path)?;
    info!("Saved {}", workspace.manifest_path.display());

    if options.stage {
        stage(workspace, provider)?;
        report.staged = true;
    }

    Ok(report)
}

/// The version to record for the git entry at `target`.
///
/// With `prefer_tags`, a `current` version that is already a tag at the
/// checked-out commit is kept as is.
fn resolve_entry(
    workspace: &Workspace,
    target: &str,
    current: &str,
    targets: &[String],
    provider: &SourceProvider,
    options: &FreezeOptions,
) -> Result<String> {
    let checkout = workspace.lodge_path(target);
    let commit = provider.current_revision(&checkout)?;

    let overlays = source::overlay_paths(target, targets.iter().map(String::as_str));
    let local: Vec<String> = provider
        .local_modifications(&checkout)?
        .into_iter()
        .filter(|p| !source::is_overlaid(p, &overlays))
        .collect();
    if !local.is_empty() {
        warn!(
            "{} has local modifications ({}), which {} does not include",
            checkout.display(),
            local.join(", "),
            commit
        );
    }

    if options.prefer_tags {
        let tags = provider.git().tags_at(&checkout, &commit)?;
        if tags.iter().any(|t| t == current) {
            return Ok(current.to_string());
        }
        if let Some(tag) = tags.into_iter().next() {
            debug!("{} is tagged {}", commit, tag);
            return Ok(tag);
        }
    }
    Ok(commit)
}

fn stage(workspace: &Workspace, provider: &SourceProvider) -> Result<()> {
    let git = provider.git();
    let dam_has_content = fs::read_dir(&workspace.dam)
        .map(|mut entries| entries.next().is_some())
        .unwrap_or(false);

    let mut paths = vec![MANIFEST_FILE];
    if dam_has_content || git.tracks(&workspace.root, DAM_DIR)? {
        paths.insert(0, DAM_DIR);
    }
    info!("Staging {}", paths.join(" "));
    git.stage(&workspace.root, &paths)
}
