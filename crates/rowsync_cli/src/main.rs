//! RowSync CLI
//!
//! Maintenance tools for batch directories left on disk by RowSync.
//!
//! # Commands
//!
//! - `inspect` - Display the manifest and parts of a batch
//! - `verify` - Check a batch against its manifest
//! - `purge` - Delete a batch directory

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// RowSync batch maintenance tools.
#[derive(Parser)]
#[command(name = "rowsync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the batch directory
    #[arg(global = true, short, long)]
    path: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Display the manifest and parts of a batch
    Inspect {
        /// Read every part and show its columns
        #[arg(short, long)]
        rows: bool,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Check that a batch matches its manifest
    Verify {
        /// Skip reading part contents
        #[arg(short, long)]
        quick: bool,
    },

    /// Delete a batch directory
    Purge {
        /// Dry run - show what would be deleted
        #[arg(short, long)]
        dry_run: bool,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Inspect { rows, format } => {
            let path = cli.path.ok_or("Batch path required for inspect")?;
            commands::inspect::run(&path, rows, &format)?;
        }
        Commands::Verify { quick } => {
            let path = cli.path.ok_or("Batch path required for verify")?;
            commands::verify::run(&path, !quick)?;
        }
        Commands::Purge { dry_run } => {
            let path = cli.path.ok_or("Batch path required for purge")?;
            commands::purge::run(&path, dry_run)?;
        }
        Commands::Version => {
            println!("RowSync CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("RowSync Core v{}", rowsync_core::VERSION);
        }
    }

    Ok(())
}
