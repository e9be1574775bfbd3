//! Hook runner for `post_freeze` commands.
//!
//! Each command string is handed to the platform shell (`sh -c` on Unix,
//! `cmd /C` on Windows) as a separate process, so entries can write hooks the
//! way they would type them, e.g. `composer update --no-dev`. Commands run in
//! order with inherited standard streams; the first non-zero exit stops the
//! run.

use std::fmt;
use std::path::Path;
use std::process::Command;

use log::info;

use crate::error::{Error, Result};
use crate::manifest::{Entry, Source};

/// The engine a hook runs under, exported as `CASTOR_PHASE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Apply,
    Freeze,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Apply => f.write_str("apply"),
            Phase::Freeze => f.write_str("freeze"),
        }
    }
}

/// Build the shell invocation for a single hook command.
fn shell_command(command: &str) -> Command {
    #[cfg(windows)]
    {
        let mut cmd = Command::new("cmd");
        cmd.arg("/C").arg(command);
        cmd
    }
    #[cfg(not(windows))]
    {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(command);
        cmd
    }
}

/// Run `commands` in order with `working_dir` as the current directory.
pub fn run(commands: &[String], working_dir: &Path) -> Result<()> {
    run_with_env(commands, working_dir, &[])
}

/// Like [`run`], with extra environment variables exported to every
/// command.
pub fn run_with_env(commands: &[String], working_dir: &Path, env: &[(&str, &str)]) -> Result<()> {
    for command in commands {
        info!("Running `{}` in {}", command, working_dir.display());

        let status = shell_command(command)
            .current_dir(working_dir)
            .envs(env.iter().copied())
            .status()
            .map_err(|e| Error::HookFailed {
                command: format!("{} ({})", command, e),
                code: None,
            })?;

        if !status.success() {
            return Err(Error::HookFailed {
                command: command.clone(),
                code: status.code(),
            });
        }
    }
    Ok(())
}

/// Directory an entry's hooks run in, given the entry's materialized path.
///
/// Directory entries run in their own subtree, file entries in the directory
/// containing the file.
pub fn working_dir<'a>(entry: &Entry, subtree: &'a Path) -> &'a Path {
    match entry.source {
        Source::File { .. } => subtree.parent().unwrap_or(subtree),
        Source::Git { .. } => subtree,
    }
}

/// Run an entry's `post_freeze` commands against `subtree`.
///
/// `CASTOR_ROOT`, `CASTOR_TARGET` and `CASTOR_PHASE` are exported to each
/// command.
pub fn run_for_entry(entry: &Entry, subtree: &Path, root: &Path, phase: Phase) -> Result<()> {
    if entry.post_freeze.is_empty() {
        return Ok(());
    }
    let root = root.to_string_lossy();
    let phase = phase.to_string();
    run_with_env(
        &entry.post_freeze,
        working_dir(entry, subtree),
        &[
            ("CASTOR_ROOT", root.as_ref()),
            ("CASTOR_TARGET", entry.target.as_str()),
            ("CASTOR_PHASE", phase.as_str()),
        ],
    )
}
