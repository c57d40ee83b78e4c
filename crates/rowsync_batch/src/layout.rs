//! Batch directory layout and file naming.
//!
//! Every change-selection run writes into its own directory:
//!
//! ```text
//! <batch_root>/
//! └─ 2024_05_17_093012_4f1c2a9be0d3/     # UTC stamp + random suffix
//!    ├─ summary.json                      # BatchInfo manifest
//!    ├─ Customers_0000_9a1be2c4d5f6.json  # part 0
//!    └─ Orders_0001_3c8e1f07b2aa.json     # part 1
//! ```
//!
//! Directory names are unique per run; this is the only guard against two
//! concurrent sessions writing into the same directory.

use crate::error::{BatchError, BatchResult};
use chrono::Utc;
use std::fs;
use std::path::Path;
use uuid::Uuid;

/// File name of the manifest inside a batch directory.
pub const SUMMARY_FILE: &str = "summary.json";

/// Temporary file used for atomic manifest writes.
pub(crate) const SUMMARY_TEMP: &str = "summary.json.tmp";

/// Maximum number of decimal digits in a part index.
pub const MAX_INDEX_DIGITS: usize = 4;

/// Length of the random suffix appended to directory and file names.
const SUFFIX_LEN: usize = 12;

/// Builds a part file name: `{table}_{index:04}{_info}_{random}.{extension}`.
///
/// # Errors
///
/// Returns `IndexOverflow` when the index needs more than four digits.
/// Indices are never truncated or wrapped.
pub fn generate_new_file_name(
    batch_index: u32,
    table_name: &str,
    extension: &str,
    info: &str,
) -> BatchResult<String> {
    let index = format!("{batch_index:04}");
    if index.len() > MAX_INDEX_DIGITS {
        return Err(BatchError::IndexOverflow { index: batch_index });
    }

    let info = if info.is_empty() {
        String::new()
    } else {
        format!("_{info}")
    };

    Ok(format!(
        "{table_name}_{index}{info}_{}.{extension}",
        random_suffix()
    ))
}

/// Builds a fresh batch directory name from the UTC clock and a random suffix.
pub fn new_directory_name() -> String {
    format!("{}_{}", Utc::now().format("%Y_%m_%d_%H%M%S"), random_suffix())
}

/// Recursively deletes a directory, ignoring every failure.
///
/// Returns true if the directory is gone afterwards.
pub fn try_remove_dir(path: &Path) -> bool {
    if !path.exists() {
        return true;
    }
    match fs::remove_dir_all(path) {
        Ok(()) => true,
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "batch directory cleanup failed");
            false
        }
    }
}

fn random_suffix() -> String {
    let mut suffix = Uuid::new_v4().simple().to_string();
    suffix.truncate(SUFFIX_LEN);
    suffix
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_name_shape() {
        let name = generate_new_file_name(7, "Customers", "json", "").unwrap();
        assert!(name.starts_with("Customers_0007_"));
        assert!(name.ends_with(".json"));
        // table, index, suffix
        assert_eq!(name.trim_end_matches(".json").split('_').count(), 3);
    }

    #[test]
    fn file_name_with_info() {
        let name = generate_new_file_name(12, "Orders", "cbor", "snapshot").unwrap();
        assert!(name.starts_with("Orders_0012_snapshot_"));
        assert!(name.ends_with(".cbor"));
    }

    #[test]
    fn largest_index_fits() {
        assert!(generate_new_file_name(9999, "T", "json", "").is_ok());
    }

    #[test]
    fn index_overflow() {
        let result = generate_new_file_name(10000, "T", "json", "");
        assert!(matches!(result, Err(BatchError::IndexOverflow { index: 10000 })));
    }

    #[test]
    fn file_names_are_unique() {
        let a = generate_new_file_name(1, "T", "json", "").unwrap();
        let b = generate_new_file_name(1, "T", "json", "").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn directory_names_are_unique() {
        assert_ne!(new_directory_name(), new_directory_name());
    }

    #[test]
    fn remove_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        assert!(try_remove_dir(&missing));
    }

    #[test]
    fn remove_failure_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("part.json");
        fs::write(&file, b"{}").unwrap();

        assert!(!try_remove_dir(&file));
        assert!(file.is_file());
    }
}
