//! # outline-backup
//!
//! **outline-backup** keeps an off-site, versioned copy of a hosted wiki.
//!
//! One run:
//! - asks the server to export all collections
//! - polls the export job until it completes
//! - downloads the resulting zip archive
//! - extracts it into the `backup_repo/` working copy
//! - commits and pushes the snapshot
//!
//! This CLI is built with [clap](https://docs.rs/clap).

use anyhow::Result;
use clap::Parser;
use outline_backup::cmd_backup;
use std::path::PathBuf;

/// Command-line interface definition.
///
/// Parsed using `clap` derive macros.
#[derive(Parser, Debug)]
#[command(
    name = "outline-backup",
    version,
    about = "Back up a hosted wiki into a git repository"
)]
struct Cli {
    /// Config file to read (a default is written there if missing)
    config: PathBuf,
}

/// CLI entry point.
///
/// Parses arguments with `clap` and runs one backup cycle. Errors are
/// printed by `anyhow` and terminate the process with a non-zero status.
fn main() -> Result<()> {
    let cli = Cli::parse();
    cmd_backup(&cli.config)
}
