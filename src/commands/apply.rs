//! Apply command implementation
//!
//! Assembles the lodge: every Castorfile entry is cloned, checked out or
//! copied into `<root>/lodge`, shallowest target first. With
//! `--exec-post-freeze`, the entries' hooks then run against the lodge.

use std::path::Path;
use std::time::Instant;

use anyhow::Result;
use clap::Args;

use castor::assembly::{self, ApplyOptions};
use castor::output::{emoji, OutputConfig};
use castor::source::SourceProvider;

use super::short_version;

/// Arguments for the apply command
#[derive(Args, Debug)]
pub struct ApplyArgs {
    /// Also run every entry's post_freeze commands against the lodge
    #[arg(long)]
    pub exec_post_freeze: bool,
}

/// Execute the apply command
pub fn execute(args: ApplyArgs, root: Option<&Path>, color_flag: &str) -> Result<()> {
    let out = OutputConfig::from_env_and_flag(color_flag);
    let start_time = Instant::now();

    let workspace = super::workspace(root)?;
    let manifest = workspace.load_manifest()?;

    println!(
        "{} Applying {} entries into {}",
        emoji(&out, "🔍", "[APPLY]"),
        manifest.len(),
        workspace.lodge.display()
    );

    let options = ApplyOptions {
        exec_post_freeze: args.exec_post_freeze,
    };
    let result = assembly::apply(&workspace, &manifest, &SourceProvider::new(), &options);

    match result {
        Ok(report) => {
            for entry in &report.entries {
                match &entry.revision {
                    Some(revision) => {
                        println!("   {} at {}", entry.target, short_version(revision))
                    }
                    None => println!("   {} copied", entry.target),
                }
            }
            if report.hooks_run > 0 {
                println!("   hooks run for {} entries", report.hooks_run);
            }
            println!(
                "{} Applied successfully in {:.2}s",
                emoji(&out, "✅", "[OK]"),
                start_time.elapsed().as_secs_f64()
            );
            Ok(())
        }
        Err(e) => {
            println!("{} Apply failed", emoji(&out, "❌", "[ERR]"));
            Err(e.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_execute_outside_castor_root() {
        let temp = TempDir::new().unwrap();
        let args = ApplyArgs {
            exec_post_freeze: false,
        };

        let result = execute(args, Some(temp.path()), "never");
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("not inside a castor repository"));
    }

    #[test]
    fn test_execute_empty_manifest() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir(temp.path().join(".git")).unwrap();
        std::fs::write(temp.path().join("Castorfile"), "{\"lodge\": []}\n").unwrap();

        let args = ApplyArgs {
            exec_post_freeze: true,
        };
        assert!(execute(args, Some(temp.path()), "never").is_ok());
    }
}
