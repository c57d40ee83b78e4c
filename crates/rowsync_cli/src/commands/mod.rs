//! CLI command implementations.

pub mod inspect;
pub mod purge;
pub mod verify;

use rowsync_batch::BatchError;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for CLI commands.
pub type CliResult<T> = Result<T, CliError>;

/// Errors reported by CLI commands.
#[derive(Debug, Error)]
pub enum CliError {
    /// The path does not hold a batch manifest.
    #[error("no batch found at {}", .0.display())]
    NotABatch(PathBuf),

    /// The batch could not be read.
    #[error(transparent)]
    Batch(#[from] BatchError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON could not be encoded or decoded.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Verification found problems.
    #[error("verification failed with {0} problem(s)")]
    VerificationFailed(usize),
}

fn require_batch(path: &std::path::Path) -> CliResult<()> {
    if path.join(rowsync_batch::SUMMARY_FILE).is_file() {
        Ok(())
    } else {
        Err(CliError::NotABatch(path.to_path_buf()))
    }
}
