//! # Castor Library
//!
//! This library provides the core functionality of the `castor` command-line
//! tool: assembling a website's source tree from several git repositories and
//! plain files, and freezing it into a git-free copy that can be committed and
//! deployed.
//!
//! ## Quick Example
//!
//! ```
//! use castor::manifest::{Manifest, Source};
//!
//! let manifest = Manifest::parse(r#"{
//!     "lodge": [
//!         {"target": "/themes/x", "type": "git",
//!          "repo": "https://example.com/theme.git", "version": "v2.0"},
//!         {"target": "/", "type": "git",
//!          "repo": "https://example.com/platform.git", "version": "main"}
//!     ]
//! }"#).unwrap();
//!
//! // Entries are processed shallowest target first
//! let order: Vec<&str> = manifest.ordered().iter().map(|e| e.target.as_str()).collect();
//! assert_eq!(order, vec!["/", "/themes/x"]);
//! assert!(matches!(manifest.entries[0].source, Source::Git { .. }));
//! ```
//!
//! ## Core Concepts
//!
//! - **Manifest (`manifest`)**: the `Castorfile`, an ordered list of entries,
//!   each mapping a target path to a git or file source.
//! - **Lodge**: `<root>/lodge`, the live working tree made of real git
//!   checkouts, where development happens.
//! - **Dam**: `<root>/dam`, the frozen mirror of the lodge without any git
//!   metadata, committed to the outer repository.
//! - **Workspace (`locator`)**: the resolved root, manifest, lodge and dam
//!   paths of one invocation.
//!
//! ## Execution Flow
//!
//! 1.  **Apply** (`assembly`): every entry is materialized into the lodge by
//!     the `source` provider, shallowest first, so nested entries overlay
//!     their parents.
//! 2.  **Freeze** (`freeze`): git entries are pinned to their checked-out
//!     commits, the lodge is mirrored into the dam (`mirror`), post-freeze
//!     hooks run (`hooks`), and the manifest is saved and staged.

pub mod assembly;
pub mod error;
pub mod freeze;
pub mod git;
pub mod hooks;
pub mod locator;
pub mod manifest;
pub mod mirror;
pub mod output;
pub mod path;
pub mod scaffold;
pub mod source;

#[cfg(test)]
mod path_proptest;
