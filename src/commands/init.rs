//! # Init Command Implementation
//!
//! This module implements the `init` subcommand, which turns an empty (or
//! not yet existing) directory into a castor root: a git repository with an
//! empty `Castorfile` and a `.gitignore` excluding the lodge, both staged.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use castor::output::{emoji, OutputConfig};
use castor::scaffold;

/// Create a new castor root
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Directory to initialize; must be empty or not exist yet
    #[arg(value_name = "DIRECTORY", default_value = ".")]
    pub directory: PathBuf,
}

/// Execute the `init` command.
pub fn execute(args: InitArgs, color_flag: &str) -> Result<()> {
    let out = OutputConfig::from_env_and_flag(color_flag);

    let root = scaffold::init(&args.directory)
        .with_context(|| format!("Failed to initialize {}", args.directory.display()))?;

    println!(
        "{} Initialized castor root in {}",
        emoji(&out, "✅", "[OK]"),
        root.display()
    );
    println!("   Add entries to the Castorfile, then run `castor apply`.");
    Ok(())
}
