//! # Manifest Model
//!
//! This module defines the in-memory representation of the `Castorfile`, the
//! JSON manifest that lists every source assembled into the lodge, and the
//! logic to load and save it.
//!
//! ## Format
//!
//! ```json
//! {
//!     "lodge": [
//!         {
//!             "target": "/",
//!             "type": "git",
//!             "repo": "https://github.com/example/platform.git",
//!             "version": "v1.2.0",
//!             "post_freeze": ["composer update --no-dev"]
//!         },
//!         {
//!             "target": "/config/settings.php",
//!             "type": "file",
//!             "source": "files/settings.php"
//!         }
//!     ]
//! }
//! ```
//!
//! ## Key Components
//!
//! - **`Manifest`**: the ordered list of entries. Document order is preserved
//!   on save so that diffs across freezes only show the `version` fields that
//!   changed.
//! - **`Entry`**: one target path plus its `Source`.
//! - **`Source`**: the tagged variant of source kinds, `Git` or `File`.
//!
//! Saving is atomic: the document is written to a temporary file next to the
//! manifest, which then replaces it.

use std::collections::HashSet;
use std::fs;
use std::io::Write;
use std::path::{Component, Path};
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::path;

/// File name of the manifest at the castor root.
pub const MANIFEST_FILE: &str = "Castorfile";

/// Where the content of an entry comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    /// A git repository pinned to a revision.
    Git {
        /// Clone URL; the identity of the source.
        repo: String,
        /// Tag, branch or commit. Rewritten by freeze.
        version: String,
    },
    /// A single file stored next to the manifest.
    File {
        /// Path of the content, relative to the castor root.
        path: String,
    },
}

impl Source {
    /// Name of the source kind, as written in the manifest's `type` field.
    pub fn kind(&self) -> &'static str {
        match self {
            Source::Git { .. } => "git",
            Source::File { .. } => "file",
        }
    }

    /// Short human-readable description, e.g. `git https://...@v1.0.0`.
    pub fn describe(&self) -> String {
        match self {
            Source::Git { repo, version } => format!("git {}@{}", repo, version),
            Source::File { path } => format!("file {}", path),
        }
    }
}

/// One manifest item: a target in the lodge and its source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "EntryDocument", into = "EntryDocument")]
pub struct Entry {
    /// Normalized slash-rooted target, relative to the lodge root.
    pub target: String,
    pub source: Source,
    /// Shell commands run in this entry's subtree after freezing.
    pub post_freeze: Vec<String>,
}

impl Entry {
    /// Create a git entry.
    pub fn git(target: &str, repo: &str, version: &str) -> Result<Self> {
        Ok(Self {
            target: path::normalize_target(target)?,
            source: Source::Git {
                repo: repo.to_string(),
                version: version.to_string(),
            },
            post_freeze: Vec::new(),
        })
    }

    /// Create a file entry.
    pub fn file(target: &str, source: &str) -> Result<Self> {
        Ok(Self {
            target: path::normalize_target(target)?,
            source: Source::File {
                path: source.to_string(),
            },
            post_freeze: Vec::new(),
        })
    }

    /// Set the post-freeze commands.
    pub fn with_post_freeze<I, S>(mut self, commands: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.post_freeze = commands.into_iter().map(Into::into).collect();
        self
    }

    /// Depth of the target below the lodge root.
    pub fn depth(&self) -> usize {
        path::depth(&self.target)
    }

    /// `target (git repo@version)`, used in logs and error messages.
    pub fn describe(&self) -> String {
        format!("{} ({})", self.target, self.source.describe())
    }

    fn validate(&self) -> Result<()> {
        match &self.source {
            Source::Git { repo, version } => {
                if !repo_pattern().is_match(repo) {
                    return Err(Error::Manifest {
                        message: format!(
                            "entry {}: '{}' does not look like a git repository URL",
                            self.target, repo
                        ),
                    });
                }
                if version.trim().is_empty() {
                    return Err(Error::Manifest {
                        message: format!("entry {}: version must not be empty", self.target),
                    });
                }
            }
            Source::File { path } => {
                if path.trim().is_empty() {
                    return Err(Error::Manifest {
                        message: format!("entry {}: source must not be empty", self.target),
                    });
                }
                if Path::new(path).is_absolute() {
                    return Err(Error::Manifest {
                        message: format!(
                            "entry {}: source '{}' must be relative to the Castorfile",
                            self.target, path
                        ),
                    });
                }
                if Path::new(path)
                    .components()
                    .any(|c| matches!(c, Component::ParentDir))
                {
                    return Err(Error::Manifest {
                        message: format!(
                            "entry {}: source '{}' must not contain '..'",
                            self.target, path
                        ),
                    });
                }
            }
        }
        Ok(())
    }
}

/// Accepts `scheme://...`, scp-like `[user@]host:path`, and explicit paths.
fn repo_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"^(?:[A-Za-z][A-Za-z0-9+.\-]*://\S+|(?:[^\s@/:]+@)?[A-Za-z0-9.\-]+:\S+|\.{0,2}/\S+)$",
        )
        .expect("repository pattern is a valid regex")
    })
}

/// Serialized shape of an entry. Field order here is the order on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct EntryDocument {
    target: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    repo: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    source: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    post_freeze: Vec<String>,
}

impl TryFrom<EntryDocument> for Entry {
    type Error = String;

    fn try_from(doc: EntryDocument) -> std::result::Result<Self, Self::Error> {
        let target = path::normalize_target(&doc.target).map_err(|e| match e {
            Error::Manifest { message } => message,
            other => other.to_string(),
        })?;

        let source = match doc.kind.as_str() {
            "git" => {
                if doc.source.is_some() {
                    return Err(format!("git entry {} must not have a 'source'", target));
                }
                let repo = doc
                    .repo
                    .ok_or_else(|| format!("git entry {} is missing 'repo'", target))?;
                let version = doc
                    .version
                    .ok_or_else(|| format!("git entry {} is missing 'version'", target))?;
                Source::Git { repo, version }
            }
            "file" => {
                if doc.repo.is_some() || doc.version.is_some() {
                    return Err(format!(
                        "file entry {} must not have 'repo' or 'version'",
                        target
                    ));
                }
                let path = doc
                    .source
                    .ok_or_else(|| format!("file entry {} is missing 'source'", target))?;
                Source::File { path }
            }
            other => {
                return Err(format!(
                    "entry {} has unknown type '{}' (expected 'git' or 'file')",
                    target, other
                ))
            }
        };

        Ok(Entry {
            target,
            source,
            post_freeze: doc.post_freeze,
        })
    }
}

impl From<Entry> for EntryDocument {
    fn from(entry: Entry) -> Self {
        let kind = entry.source.kind().to_string();
        let (repo, version, source) = match entry.source {
            Source::Git { repo, version } => (Some(repo), Some(version), None),
            Source::File { path } => (None, None, Some(path)),
        };
        EntryDocument {
            kind,
            target: entry.target,
            repo,
            version,
            source,
            post_freeze: entry.post_freeze,
        }
    }
}

/// The ordered list of entries making up a lodge.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    #[serde(rename = "lodge")]
    pub entries: Vec<Entry>,
}

impl Manifest {
    /// A manifest with no entries, as written by `castor init`.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a manifest from entries, checking its invariants.
    pub fn new(entries: Vec<Entry>) -> Result<Self> {
        let manifest = Self { entries };
        manifest.validate()?;
        Ok(manifest)
    }

    /// Parse and validate a manifest document.
    pub fn parse(content: &str) -> Result<Self> {
        let manifest: Manifest = serde_json::from_str(content).map_err(|e| Error::Manifest {
            message: e.to_string(),
        })?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Load and validate the manifest at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| Error::Manifest {
            message: format!("cannot read {}: {}", path.display(), e),
        })?;
        Self::parse(&content).map_err(|e| match e {
            Error::Manifest { message } => Error::Manifest {
                message: format!("{}: {}", path.display(), message),
            },
            other => other,
        })
    }

    /// Stable serialization: four-space indent, entries in document order,
    /// trailing newline.
    pub fn to_json_string(&self) -> Result<String> {
        let mut buffer = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut buffer, formatter);
        self.serialize(&mut serializer)?;
        buffer.push(b'\n');
        String::from_utf8(buffer).map_err(|e| Error::Manifest {
            message: format!("serialized manifest is not UTF-8: {}", e),
        })
    }

    /// Validate and atomically write the manifest to `path`.
    ///
    /// The document is written to a temporary file in the same directory and
    /// renamed over `path`, so readers only ever see the old or the new
    /// manifest.
    pub fn save(&self, path: &Path) -> Result<()> {
        self.validate().map_err(|e| Error::Manifest {
            message: format!("refusing to write an invalid Castorfile: {}", e),
        })?;
        let content = self.to_json_string()?;

        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut temp = tempfile::NamedTempFile::new_in(dir)?;
        temp.write_all(content.as_bytes())?;
        temp.as_file().sync_all()?;

        match fs::metadata(path) {
            Ok(metadata) => fs::set_permissions(temp.path(), metadata.permissions())?,
            Err(_) => {
                #[cfg(unix)]
                {
                    use std::os::unix::fs::PermissionsExt;
                    fs::set_permissions(temp.path(), fs::Permissions::from_mode(0o644))?;
                }
            }
        }

        temp.persist(path).map_err(|e| Error::Io(e.error))?;
        log::debug!("Wrote {}", path.display());
        Ok(())
    }

    /// Check entry fields, target uniqueness and nesting.
    ///
    /// Normalized targets are always either nested or disjoint. Two entries
    /// may not share a target, and nothing may nest below a file entry.
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for entry in &self.entries {
            let normalized = path::normalize_target(&entry.target)?;
            if normalized != entry.target {
                return Err(Error::Manifest {
                    message: format!("target '{}' is not normalized", entry.target),
                });
            }
            entry.validate()?;
            if !seen.insert(normalized) {
                return Err(Error::Manifest {
                    message: format!("target {} appears more than once", entry.target),
                });
            }
        }

        for file in self.entries.iter().filter(|e| matches!(e.source, Source::File { .. })) {
            if let Some(nested) = self
                .entries
                .iter()
                .find(|e| path::is_strictly_within(&e.target, &file.target))
            {
                return Err(Error::Manifest {
                    message: format!(
                        "target {} is nested below {}, which is a file entry",
                        nested.target, file.target
                    ),
                });
            }
        }
        Ok(())
    }

    /// Entry indices sorted by target depth, shallowest first.
    ///
    /// The sort is stable: entries at the same depth keep document order.
    pub fn ordered_indices(&self) -> Vec<usize> {
        let mut indices: Vec<usize> = (0..self.entries.len()).collect();
        indices.sort_by_key(|&i| self.entries[i].depth());
        indices
    }

    /// Entries sorted by target depth, shallowest first.
    pub fn ordered(&self) -> Vec<&Entry> {
        self.ordered_indices()
            .into_iter()
            .map(|i| &self.entries[i])
            .collect()
    }

    /// Look up an entry by (normalized) target.
    pub fn get(&self, target: &str) -> Option<&Entry> {
        self.entries.iter().find(|e| e.target == target)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
