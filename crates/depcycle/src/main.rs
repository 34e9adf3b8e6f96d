//! Depcycle CLI - Circular dependency tracking from the command line.
//!
//! Depcycle extracts namespace, class and system dependencies from C# sources,
//! keeps an incremental cache next to the workspace, and reports cycles as
//! they appear and disappear.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing_subscriber::EnvFilter;

mod cli;

/// Depcycle: Multi-level dependency graph and cycle tracker.
#[derive(Parser)]
#[command(name = "depcycle")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Workspace root directory (defaults to current directory)
    #[arg(short, long, global = true)]
    workspace: Option<PathBuf>,

    /// Verbose output (can be repeated: -v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze every source file in the workspace
    Analyze {
        /// Discard the cache and known cycles first
        #[arg(long)]
        rebuild: bool,
    },

    /// Re-analyze only what changed since the last run
    Update,

    /// List circular dependencies
    Cycles {
        /// Only show one level (namespace, class, system)
        #[arg(short, long)]
        level: Option<String>,

        /// Only show cycles that appeared in this run
        #[arg(short, long)]
        new_only: bool,

        /// Show fix suggestions for each cycle
        #[arg(short, long)]
        fixes: bool,
    },

    /// Show graph and cycle statistics
    Stats,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    // Determine workspace root
    let workspace = match cli.workspace {
        Some(w) => w,
        None => match std::env::current_dir() {
            Ok(dir) => dir,
            Err(e) => {
                eprintln!(
                    "{}: failed to get current directory: {e}",
                    "error".red().bold()
                );
                return ExitCode::FAILURE;
            }
        },
    };

    let result = match cli.command {
        Commands::Analyze { rebuild } => cli::analyze::run(&workspace, rebuild),
        Commands::Update => cli::update::run(&workspace),
        Commands::Cycles {
            level,
            new_only,
            fixes,
        } => cli::cycles::run(&workspace, level.as_deref(), new_only, fixes),
        Commands::Stats => cli::stats::run(&workspace),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}: {e}", "error".red().bold());
            // Show cause chain for nested errors
            let mut source = std::error::Error::source(&e);
            while let Some(cause) = source {
                eprintln!("  {}: {cause}", "caused by".dimmed());
                source = std::error::Error::source(cause);
            }
            ExitCode::FAILURE
        }
    }
}
