//! Purge command implementation.

use super::{require_batch, CliResult};
use rowsync_batch::BatchInfo;
use std::path::Path;

/// Runs the purge command.
pub fn run(path: &Path, dry_run: bool) -> CliResult<()> {
    let info = purge(path, dry_run)?;
    if dry_run {
        println!(
            "Would delete {} ({} parts, {} rows)",
            info.directory_full_path().display(),
            info.parts.len(),
            info.rows_count
        );
    } else {
        println!("Deleted {}", info.directory_full_path().display());
    }
    Ok(())
}

/// Deletes the batch directory at `path` unless `dry_run` is set.
///
/// Only directories holding a readable manifest are deleted.
pub fn purge(path: &Path, dry_run: bool) -> CliResult<BatchInfo> {
    require_batch(path)?;
    let info = BatchInfo::load_summary(path)?;
    if !dry_run {
        info.try_remove_directory();
        tracing::info!(directory = %info.directory_name, "batch purged");
    }
    Ok(info)
}
