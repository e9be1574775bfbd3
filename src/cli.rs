//! CLI argument parsing and command dispatch

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::commands;

/// Castor - Assemble a site from git repositories and freeze it for deployment
#[derive(Parser, Debug)]
#[command(name = "castor")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,

    /// Castor root to operate on instead of searching from the current directory
    #[arg(long, global = true, value_name = "DIR", env = "CASTOR_ROOT")]
    root: Option<PathBuf>,

    /// Colorize output (always, never, auto)
    #[arg(
        long,
        global = true,
        value_name = "WHEN",
        default_value = "auto",
        value_parser = ["always", "never", "auto"]
    )]
    color: String,

    /// Set log level (error, warn, info, debug, trace)
    #[arg(
        long,
        global = true,
        value_name = "LEVEL",
        default_value = "info",
        value_parser = ["off", "error", "warn", "info", "debug", "trace"]
    )]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create a new castor root (git repository, Castorfile and .gitignore)
    Init(commands::init::InitArgs),

    /// Assemble the lodge from the Castorfile
    Apply(commands::apply::ApplyArgs),

    /// Pin versions, mirror the lodge into the dam and stage the result
    Freeze(commands::freeze::FreezeArgs),

    /// Generate shell completion scripts
    Completions(commands::completions::CompletionsArgs),
}

impl Cli {
    /// Execute the CLI command
    pub fn execute(self) -> Result<()> {
        init_logging(&self.log_level);

        let root = self.root.as_deref();
        match self.command {
            Commands::Init(args) => commands::init::execute(args, &self.color),
            Commands::Apply(args) => commands::apply::execute(args, root, &self.color),
            Commands::Freeze(args) => commands::freeze::execute(args, root, &self.color),
            Commands::Completions(args) => commands::completions::execute(args),
        }
    }
}

/// Route `log` output to stderr at `level`, unless `RUST_LOG` says otherwise.
fn init_logging(level: &str) {
    let env = env_logger::Env::default().default_filter_or(level);
    let _ = env_logger::Builder::from_env(env)
        .format_timestamp(None)
        .format_target(false)
        .try_init();
}
