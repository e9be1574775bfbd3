//! Thin wrappers around the system `git` command.
//!
//! Every function shells out to `git`, which automatically handles:
//! - SSH keys from ~/.ssh/
//! - Git credential helpers
//! - Personal access tokens
//! - Any authentication configured in ~/.gitconfig

use std::ffi::OsStr;
use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use crate::error::{Error, Result};

fn git_in(dir: &Path) -> Command {
    let mut cmd = Command::new("git");
    cmd.arg("-C").arg(dir);
    cmd
}

fn describe_args<I, S>(args: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    args.into_iter()
        .map(|a| a.as_ref().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Run `git -C dir <args>`, returning the raw output whatever the exit code.
fn output_in<I, S>(dir: &Path, args: I) -> Result<Output>
where
    I: IntoIterator<Item = S> + Clone,
    S: AsRef<OsStr>,
{
    git_in(dir)
        .args(args.clone())
        .output()
        .map_err(|e| Error::GitCommand {
            command: describe_args(args),
            dir: dir.to_path_buf(),
            stderr: e.to_string(),
        })
}

/// Run `git -C dir <args>` and return its trimmed stdout, failing on a
/// non-zero exit.
fn run_in<I, S>(dir: &Path, args: I) -> Result<String>
where
    I: IntoIterator<Item = S> + Clone,
    S: AsRef<OsStr>,
{
    let output = output_in(dir, args.clone())?;
    if !output.status.success() {
        return Err(Error::GitCommand {
            command: describe_args(args),
            dir: dir.to_path_buf(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

fn auth_hint(stderr: &str) -> String {
    if stderr.contains("Authentication failed")
        || stderr.contains("Permission denied")
        || stderr.contains("Could not read from remote repository")
    {
        format!(
            "Authentication failed. Make sure you have access to the repository.\n\
            For private repos, ensure you have:\n\
            - SSH key added to ssh-agent\n\
            - Git credentials configured\n\
            - Personal access token set up\n\
            Error: {}",
            stderr
        )
    } else {
        stderr.to_string()
    }
}

/// Whether `dir` is the top of a git working tree (`.git` directory or
/// gitlink file).
pub fn is_checkout(dir: &Path) -> bool {
    dir.join(".git").exists()
}

/// Clone `url` into `target_dir`, creating parent directories.
///
/// `target_dir` must be absent or an empty directory.
pub fn clone(url: &str, target_dir: &Path) -> Result<()> {
    if let Some(parent) = target_dir.parent() {
        fs::create_dir_all(parent)?;
    }

    let output = Command::new("git")
        .args(["clone", "--quiet", url])
        .arg(target_dir)
        .output()
        .map_err(|e| Error::SourceFetch {
            source_name: url.to_string(),
            message: e.to_string(),
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(Error::SourceFetch {
            source_name: url.to_string(),
            message: auth_hint(stderr.trim()),
        });
    }

    Ok(())
}

/// Fetch branches and tags from `origin`.
pub fn fetch(dir: &Path, url: &str) -> Result<()> {
    let output = output_in(dir, ["fetch", "--quiet", "--tags", "origin"])?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(Error::SourceFetch {
            source_name: url.to_string(),
            message: auth_hint(stderr.trim()),
        });
    }
    Ok(())
}

/// URL of the `origin` remote, if configured.
pub fn remote_url(dir: &Path) -> Result<Option<String>> {
    let output = output_in(dir, ["config", "--get", "remote.origin.url"])?;
    if output.status.success() {
        let url = String::from_utf8_lossy(&output.stdout).trim().to_string();
        Ok(Some(url))
    } else {
        Ok(None)
    }
}

/// Resolve a revision to a full commit id, or `None` if it does not exist.
pub fn resolve_commit(dir: &Path, revision: &str) -> Result<Option<String>> {
    let spec = format!("{}^{{commit}}", revision);
    let output = output_in(dir, ["rev-parse", "--verify", "--quiet", spec.as_str()])?;
    if output.status.success() {
        Ok(Some(
            String::from_utf8_lossy(&output.stdout).trim().to_string(),
        ))
    } else {
        Ok(None)
    }
}

/// Commit id checked out in `dir`.
pub fn head_revision(dir: &Path) -> Result<String> {
    run_in(dir, ["rev-parse", "HEAD"])
}

/// Paths of tracked files with staged or unstaged modifications.
///
/// Untracked files are not reported.
pub fn modified_paths(dir: &Path) -> Result<Vec<String>> {
    let args = ["status", "--porcelain", "-z", "--untracked-files=no"];
    let output = output_in(dir, args)?;
    if !output.status.success() {
        return Err(Error::GitCommand {
            command: describe_args(args),
            dir: dir.to_path_buf(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    // Not trimmed: the status columns may start with a space
    Ok(parse_porcelain_z(&String::from_utf8_lossy(&output.stdout)))
}

/// Parse `git status --porcelain -z` records into paths.
fn parse_porcelain_z(output: &str) -> Vec<String> {
    let mut paths = Vec::new();
    let mut records = output.split('\0').filter(|r| !r.is_empty());
    while let Some(record) = records.next() {
        if record.len() < 4 {
            continue;
        }
        let status = &record[..2];
        paths.push(record[3..].to_string());
        // Renames and copies are followed by their original path
        if status.starts_with('R') || status.starts_with('C') {
            records.next();
        }
    }
    paths
}

/// Discard working-tree and index changes to `paths`.
pub fn restore_paths(dir: &Path, paths: &[String]) -> Result<()> {
    if paths.is_empty() {
        return Ok(());
    }
    let mut args = vec!["checkout", "--quiet", "HEAD", "--"];
    args.extend(paths.iter().map(String::as_str));
    run_in(dir, args).map(|_| ())
}

/// Check out `commit` with a detached HEAD.
pub fn checkout_detached(dir: &Path, commit: &str) -> Result<()> {
    run_in(dir, ["checkout", "--quiet", "--detach", commit]).map(|_| ())
}

/// Tags pointing exactly at `commit`, sorted by name.
pub fn tags_at(dir: &Path, commit: &str) -> Result<Vec<String>> {
    let stdout = run_in(dir, ["tag", "--points-at", commit])?;
    let mut tags: Vec<String> = stdout
        .lines()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect();
    tags.sort();
    Ok(tags)
}

/// Whether the index tracks anything under `path`.
pub fn tracks(dir: &Path, path: &str) -> Result<bool> {
    let stdout = run_in(dir, ["ls-files", "--", path])?;
    Ok(!stdout.is_empty())
}

/// Initialize a repository in `dir`.
pub fn init(dir: &Path) -> Result<()> {
    run_in(dir, ["init", "--quiet"]).map(|_| ())
}

/// Stage additions, modifications and deletions under `paths`, including
/// files matched by ignore rules.
pub fn stage(dir: &Path, paths: &[&str]) -> Result<()> {
    let mut args = vec!["add", "--all", "--force", "--"];
    args.extend_from_slice(paths);
    run_in(dir, args).map(|_| ())
}
