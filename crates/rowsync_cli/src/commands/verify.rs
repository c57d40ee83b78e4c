//! Verify command implementation.

use super::{require_batch, CliError, CliResult};
use rowsync_batch::{BatchInfo, SUMMARY_FILE};
use std::collections::HashSet;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Verification result.
#[derive(Debug, Default)]
pub struct VerifyResult {
    /// Number of parts checked.
    pub parts_checked: usize,
    /// List of problems found.
    pub problems: Vec<String>,
}

impl VerifyResult {
    fn is_ok(&self) -> bool {
        self.problems.is_empty()
    }
}

/// Runs the verify command.
pub fn run(path: &Path, read_parts: bool) -> CliResult<()> {
    println!("Verifying batch at {}", path.display());
    println!();

    let result = verify(path, read_parts)?;
    for problem in &result.problems {
        println!("  - {problem}");
    }

    println!();
    if result.is_ok() {
        println!("✓ Batch verification passed ({} parts)", result.parts_checked);
        Ok(())
    } else {
        println!("✗ Batch verification failed");
        Err(CliError::VerificationFailed(result.problems.len()))
    }
}

/// Checks the batch at `path` against its manifest.
///
/// With `read_parts`, every part is decoded and its row count compared to
/// the manifest.
pub fn verify(path: &Path, read_parts: bool) -> CliResult<VerifyResult> {
    require_batch(path)?;
    // Loading reconciles the row count, so the stored one is read raw.
    let summary = File::open(path.join(SUMMARY_FILE))?;
    let stored: BatchInfo = serde_json::from_reader(BufReader::new(summary))?;
    let info = BatchInfo::load_summary(path)?;

    let mut result = VerifyResult::default();

    let mut indices = HashSet::new();
    for part in &info.parts {
        if !indices.insert(part.index) {
            result.problems.push(format!("duplicate part index {}", part.index));
        }
    }

    if let Some(max_index) = info.parts.iter().map(|p| p.index).max() {
        let last: Vec<u32> = info
            .parts
            .iter()
            .filter(|p| p.is_last_batch)
            .map(|p| p.index)
            .collect();
        if last != [max_index] {
            result.problems.push(format!(
                "expected part {max_index} to be the only last part, found {last:?}"
            ));
        }
    }

    let computed = info.parts_rows_count();
    if stored.rows_count != computed {
        result.problems.push(format!(
            "manifest row count {} does not match the parts ({computed})",
            stored.rows_count
        ));
    }

    for part in &info.parts {
        result.parts_checked += 1;
        let part_path = info.part_path(part);
        if !part_path.is_file() {
            result.problems.push(format!("missing part file {}", part.file_name));
            continue;
        }
        if !read_parts {
            continue;
        }
        match info.read_part(part) {
            Ok(content) => {
                if content.rows.len() != part.rows_count as usize {
                    result.problems.push(format!(
                        "part {} holds {} rows, manifest says {}",
                        part.file_name,
                        content.rows.len(),
                        part.rows_count
                    ));
                }
                if !content.table().matches(&part.table_name, part.schema_name.as_deref()) {
                    result.problems.push(format!(
                        "part {} belongs to {}, manifest says {}",
                        part.file_name,
                        content.table(),
                        part.table()
                    ));
                }
            }
            Err(e) => {
                result
                    .problems
                    .push(format!("unreadable part {}: {e}", part.file_name));
            }
        }
    }

    tracing::debug!(parts = result.parts_checked, problems = result.problems.len(), "batch verified");
    Ok(result)
}
