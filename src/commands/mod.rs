//! # CLI Command Implementations
//!
//! This module contains the implementation for each subcommand of the `castor`
//! command-line tool. Each subcommand is defined in its own file.
//!
//! ## Structure
//!
//! Each command module contains:
//! - An `Args` struct that defines the command-specific arguments and options,
//!   derived using `clap`.
//! - An `execute` function that takes the parsed `Args` (plus the global
//!   flags it needs) and calls into the `castor` library.

use std::path::Path;

use anyhow::{Context, Result};

use castor::locator::Workspace;

pub mod apply;
pub mod completions;
pub mod freeze;
pub mod init;

/// Resolve the workspace from `--root`, or by searching upwards from the
/// current directory.
pub fn workspace(root: Option<&Path>) -> Result<Workspace> {
    let workspace = match root {
        Some(root) => Workspace::at(root)?,
        None => {
            let cwd = std::env::current_dir().context("Failed to get current directory")?;
            Workspace::discover(&cwd)?
        }
    };
    Ok(workspace)
}

/// First 12 characters of a commit id; other versions are returned as is.
pub fn short_version(version: &str) -> &str {
    let is_commit = version.len() == 40 && version.chars().all(|c| c.is_ascii_hexdigit());
    if is_commit {
        &version[..12]
    } else {
        version
    }
}
