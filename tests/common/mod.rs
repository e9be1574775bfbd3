//! Shared test utilities for integration and E2E tests.
//!
//! Tests build throwaway upstream repositories with the system `git` and
//! point Castorfile entries at their local paths, so nothing touches the
//! network.
//!
//! ## Usage
//!
//! ```rust,ignore
//! mod common;
//! use common::prelude::*;
//!
//! #[test]
//! fn test_example() {
//!     if skip_without_git() {
//!         return;
//!     }
//!     let fixture = CastorFixture::new();
//!     let platform = fixture.upstream("platform", &[("index.php", "<?php")]);
//!     fixture.write_manifest(&format!(r#"{{"lodge": [{}]}}"#, git_entry("/", &platform, "main")));
//!     fixture.command().arg("apply").assert().success();
//! }
//! ```

#![allow(dead_code)]

use assert_fs::prelude::*;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Re-export commonly used test dependencies for convenience.
#[allow(unused_imports)]
pub mod prelude {
    pub use assert_cmd::cargo::cargo_bin_cmd;
    pub use assert_fs::prelude::*;
    pub use predicates::prelude::*;

    pub use super::{
        file_entry, git, git_entry, manifest_of, skip_without_git, CastorFixture, Upstream,
    };
}

/// Whether the calling test should bail out because `git` is missing.
pub fn skip_without_git() -> bool {
    if git_available() {
        return false;
    }
    eprintln!("git is not available, skipping");
    true
}

/// Whether a working `git` binary is on the PATH.
pub fn git_available() -> bool {
    Command::new("git")
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// Run `git` in `dir` with a fixed identity, returning trimmed stdout.
///
/// Panics when the command fails.
pub fn git(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .arg("-C")
        .arg(dir)
        .args([
            "-c",
            "user.name=Castor Tests",
            "-c",
            "user.email=tests@castor.invalid",
            "-c",
            "commit.gpgsign=false",
            "-c",
            "tag.gpgsign=false",
            "-c",
            "init.defaultBranch=main",
        ])
        .args(args)
        .output()
        .expect("failed to run git");
    assert!(
        output.status.success(),
        "git {} failed: {}",
        args.join(" "),
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

/// A local upstream repository used as an entry source.
pub struct Upstream {
    pub path: PathBuf,
}

impl Upstream {
    /// The repository URL to put in a Castorfile.
    pub fn url(&self) -> String {
        self.path.to_string_lossy().into_owned()
    }

    /// Write `files` and commit them on the current branch; returns the
    /// commit id.
    pub fn commit(&self, files: &[(&str, &str)], message: &str) -> String {
        for (name, content) in files {
            let file = self.path.join(name);
            std::fs::create_dir_all(file.parent().unwrap()).unwrap();
            std::fs::write(file, content).unwrap();
        }
        git(&self.path, &["add", "--all"]);
        git(&self.path, &["commit", "--quiet", "-m", message]);
        self.head()
    }

    pub fn head(&self) -> String {
        git(&self.path, &["rev-parse", "HEAD"])
    }

    pub fn tag(&self, name: &str) {
        git(&self.path, &["tag", name]);
    }
}

/// A castor root (git repository plus Castorfile) next to a directory of
/// upstream repositories, all inside one temporary directory.
pub struct CastorFixture {
    temp_dir: assert_fs::TempDir,
}

impl CastorFixture {
    /// Create an initialized castor root with an empty Castorfile.
    pub fn new() -> Self {
        let temp_dir = assert_fs::TempDir::new().expect("Failed to create temp directory");
        let root = temp_dir.child("site");
        root.create_dir_all().unwrap();
        git(root.path(), &["init", "--quiet"]);
        root.child("Castorfile")
            .write_str("{\n    \"lodge\": []\n}\n")
            .unwrap();
        root.child(".gitignore").write_str("/lodge\n").unwrap();
        Self { temp_dir }
    }

    /// The castor root.
    pub fn root(&self) -> PathBuf {
        self.temp_dir.path().join("site")
    }

    pub fn lodge(&self) -> PathBuf {
        self.root().join("lodge")
    }

    pub fn dam(&self) -> PathBuf {
        self.root().join("dam")
    }

    /// Create an upstream repository on branch `main` with one commit.
    pub fn upstream(&self, name: &str, files: &[(&str, &str)]) -> Upstream {
        let path = self.temp_dir.path().join("upstream").join(name);
        std::fs::create_dir_all(&path).unwrap();
        git(&path, &["init", "--quiet"]);
        git(&path, &["symbolic-ref", "HEAD", "refs/heads/main"]);
        let upstream = Upstream { path };
        upstream.commit(files, "initial");
        upstream
    }

    /// Write a file relative to the castor root.
    pub fn write(&self, path: &str, content: &str) {
        self.temp_dir
            .child("site")
            .child(path)
            .write_str(content)
            .expect("Failed to write file");
    }

    pub fn read(&self, path: &str) -> String {
        std::fs::read_to_string(self.root().join(path)).expect("Failed to read file")
    }

    /// Replace the Castorfile.
    pub fn write_manifest(&self, content: &str) {
        self.write("Castorfile", content);
    }

    /// The Castorfile as JSON.
    pub fn manifest(&self) -> serde_json::Value {
        serde_json::from_str(&self.read("Castorfile")).expect("Castorfile is not JSON")
    }

    /// `version` of the entry at `target`.
    pub fn version_of(&self, target: &str) -> String {
        self.manifest()["lodge"]
            .as_array()
            .unwrap()
            .iter()
            .find(|e| e["target"] == target)
            .and_then(|e| e["version"].as_str())
            .unwrap_or_else(|| panic!("no versioned entry for {}", target))
            .to_string()
    }

    /// A `castor` command running in the castor root.
    pub fn command(&self) -> assert_cmd::Command {
        let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("castor");
        cmd.current_dir(self.root())
            .env_remove("CASTOR_ROOT")
            .env_remove("RUST_LOG")
            .env("NO_COLOR", "1");
        cmd
    }
}

impl Default for CastorFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// JSON for a git entry.
pub fn git_entry(target: &str, upstream: &Upstream, version: &str) -> String {
    serde_json::json!({
        "target": target,
        "type": "git",
        "repo": upstream.url(),
        "version": version,
    })
    .to_string()
}

/// JSON for a file entry.
pub fn file_entry(target: &str, source: &str) -> String {
    serde_json::json!({
        "target": target,
        "type": "file",
        "source": source,
    })
    .to_string()
}

/// A Castorfile document holding `entries`.
pub fn manifest_of(entries: &[String]) -> String {
    format!("{{\"lodge\": [{}]}}", entries.join(", "))
}
