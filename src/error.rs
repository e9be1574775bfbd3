//! # Error Handling
//!
//! This module defines the error type shared by every part of the `castor`
//! library. It uses `thiserror` to build a single `Error` enum whose variants
//! map onto the failure modes of the assembly and freeze engines:
//!
//! - **Locating**: the working directory is not inside a castor root.
//! - **Manifest**: the `Castorfile` is malformed or inconsistent.
//! - **Materializing**: a git source could not be fetched, a revision could
//!   not be resolved, a checkout would lose local changes, or a file entry
//!   collides with a directory.
//! - **Hooks**: a post-freeze command exited with a non-zero status.
//!
//! Errors raised while handling a specific manifest entry are wrapped in
//! [`Error::Entry`], which records the entry's target and the step that
//! failed so the user knows exactly where to resume.
//!
//! The `Result` alias is used across the library; the binary converts into
//! `anyhow::Error` at the command layer.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// The step of an engine run during which an entry failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Materializing the entry into the lodge.
    Apply,
    /// Reading the entry's current revision from the lodge.
    Resolve,
    /// Copying the entry's lodge subtree into the dam.
    Mirror,
    /// Running the entry's post-freeze commands.
    Hook,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Step::Apply => "apply",
            Step::Resolve => "resolve",
            Step::Mirror => "mirror",
            Step::Hook => "hook",
        };
        f.write_str(name)
    }
}

/// Main error type for castor operations
#[derive(Error, Debug)]
pub enum Error {
    /// No castor root was found walking up from the given directory.
    #[error("{} is not inside a castor repository (no directory with a Castorfile and a .git directory)", start.display())]
    NotARepository { start: PathBuf },

    /// The manifest is malformed or violates an invariant.
    #[error("Invalid Castorfile: {message}")]
    Manifest { message: String },

    /// A source could not be fetched (clone, fetch, or missing file).
    #[error("Unable to fetch {source_name}: {message}")]
    SourceFetch {
        source_name: String,
        message: String,
    },

    /// The requested revision does not exist in the repository.
    #[error("Revision '{version}' not found in {repo}")]
    RevisionNotFound { repo: String, version: String },

    /// The target exists with content that a checkout would destroy.
    #[error("Refusing to touch {}: {reason}", path.display())]
    DirtyTarget { path: PathBuf, reason: String },

    /// A git entry has no checkout in the lodge.
    #[error("{} is not a git checkout, run `castor apply` first", path.display())]
    MissingCheckout { path: PathBuf },

    /// A file entry's target exists as a directory.
    #[error("Target {} is a directory, a file entry must own a single file", path.display())]
    TargetIsDirectory { path: PathBuf },

    /// A hook command exited unsuccessfully.
    #[error("Hook `{command}` failed {}", match code {
        Some(code) => format!("with exit code {}", code),
        None => "after being terminated by a signal".to_string(),
    })]
    HookFailed { command: String, code: Option<i32> },

    /// A git command failed for a reason not covered above.
    #[error("Git command failed in {}: git {command} - {stderr}", dir.display())]
    GitCommand {
        command: String,
        dir: PathBuf,
        stderr: String,
    },

    /// Any of the above, attributed to a manifest entry and step.
    #[error("Entry {target} failed during {step}: {source}")]
    Entry {
        target: String,
        step: Step,
        #[source]
        source: Box<Error>,
    },

    /// An I/O error, wrapped from `std::io::Error`.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A JSON error, wrapped from `serde_json::Error`.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Attribute this error to the entry at `target` during `step`.
    pub fn for_entry(self, target: &str, step: Step) -> Self {
        Error::Entry {
            target: target.to_string(),
            step,
            source: Box::new(self),
        }
    }

    /// The innermost error, skipping [`Error::Entry`] wrappers.
    pub fn root_cause(&self) -> &Error {
        match self {
            Error::Entry { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

/// A convenient type alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;
