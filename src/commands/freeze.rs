//! Freeze command implementation
//!
//! Pins every git entry to the commit checked out in the lodge, mirrors the
//! lodge into `<root>/dam` without git metadata, runs post-freeze hooks in the
//! dam, then saves the Castorfile and stages `dam/` and the Castorfile.

use std::path::Path;

use anyhow::Result;
use clap::Args;

use castor::freeze::{self, FreezeOptions};
use castor::output::{emoji, OutputConfig};
use castor::source::SourceProvider;

use super::short_version;

/// Arguments for the freeze command
#[derive(Args, Debug)]
pub struct FreezeArgs {
    /// Record a tag pointing at the checked-out commit instead of the commit id
    #[arg(long)]
    pub prefer_tags: bool,

    /// Do not stage dam/ and the Castorfile in the outer repository
    #[arg(long)]
    pub no_stage: bool,
}

/// Execute the freeze command
pub fn execute(args: FreezeArgs, root: Option<&Path>, color_flag: &str) -> Result<()> {
    let out = OutputConfig::from_env_and_flag(color_flag);

    let workspace = super::workspace(root)?;
    let mut manifest = workspace.load_manifest()?;

    println!(
        "{} Freezing {} into {}",
        emoji(&out, "🧊", "[FREEZE]"),
        workspace.lodge.display(),
        workspace.dam.display()
    );

    let options = FreezeOptions {
        prefer_tags: args.prefer_tags,
        stage: !args.no_stage,
    };
    let result = freeze::freeze(&workspace, &mut manifest, &SourceProvider::new(), &options);

    match result {
        Ok(report) => {
            for entry in &report.entries {
                if entry.changed() {
                    println!(
                        "   {} {} -> {}",
                        entry.target,
                        short_version(&entry.old_version),
                        short_version(&entry.new_version)
                    );
                } else {
                    println!("   {} unchanged", entry.target);
                }
            }
            println!(
                "{} Froze {} entries{}",
                emoji(&out, "✅", "[OK]"),
                report.mirrored,
                if report.staged {
                    ", changes staged"
                } else {
                    ""
                }
            );
            Ok(())
        }
        Err(e) => {
            println!("{} Freeze failed", emoji(&out, "❌", "[ERR]"));
            Err(e.into())
        }
    }
}
