//! Inspect command implementation.

use super::{require_batch, CliResult};
use rowsync_batch::BatchInfo;
use serde::Serialize;
use std::fs;
use std::path::Path;

/// Batch inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Batch directory path.
    pub path: String,
    /// Batch directory name.
    pub directory_name: String,
    /// Source watermark.
    pub timestamp: i64,
    /// Part format.
    pub serializer: String,
    /// Row count recorded in the manifest.
    pub rows_count: u32,
    /// Total size of the part files in bytes.
    pub total_size: u64,
    /// Parts in index order.
    pub parts: Vec<PartStats>,
}

/// Statistics for a single part.
#[derive(Debug, Serialize)]
pub struct PartStats {
    /// Part index.
    pub index: u32,
    /// File name.
    pub file: String,
    /// Owning table, schema qualified.
    pub table: String,
    /// Row state of the part.
    pub state: String,
    /// Row count recorded in the manifest.
    pub rows_count: u32,
    /// Whether the part is flagged as last.
    pub last: bool,
    /// File size in bytes, if the file exists.
    pub size: Option<u64>,
    /// Columns read from the file (if requested).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub columns: Option<Vec<String>>,
}

/// Runs the inspect command.
pub fn run(path: &Path, read_rows: bool, format: &str) -> CliResult<()> {
    let result = inspect(path, read_rows)?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        _ => {
            print_text_output(&result);
        }
    }

    Ok(())
}

/// Builds the inspection result of the batch at `path`.
pub fn inspect(path: &Path, read_rows: bool) -> CliResult<InspectResult> {
    require_batch(path)?;
    let info = BatchInfo::load_summary(path)?;

    let mut parts: Vec<_> = info.parts.iter().collect();
    parts.sort_by_key(|p| p.index);

    let mut stats = Vec::with_capacity(parts.len());
    for part in parts {
        let size = fs::metadata(info.part_path(part)).ok().map(|m| m.len());
        let columns = if read_rows && size.is_some() {
            Some(info.read_part(part)?.columns)
        } else {
            None
        };
        stats.push(PartStats {
            index: part.index,
            file: part.file_name.clone(),
            table: part.table().to_string(),
            state: format!("{:?}", part.state),
            rows_count: part.rows_count,
            last: part.is_last_batch,
            size,
            columns,
        });
    }

    Ok(InspectResult {
        path: path.display().to_string(),
        directory_name: info.directory_name.clone(),
        timestamp: info.timestamp,
        serializer: info
            .serializer_key
            .clone()
            .unwrap_or_else(|| rowsync_batch::DEFAULT_SERIALIZER_KEY.to_string()),
        rows_count: info.rows_count,
        total_size: stats.iter().filter_map(|p| p.size).sum(),
        parts: stats,
    })
}

fn print_text_output(result: &InspectResult) {
    println!("RowSync Batch Inspection");
    println!("========================");
    println!();
    println!("Path:       {}", result.path);
    println!("Directory:  {}", result.directory_name);
    println!("Timestamp:  {}", result.timestamp);
    println!("Format:     {}", result.serializer);
    println!("Rows:       {}", result.rows_count);
    println!("Total size: {}", format_size(result.total_size));
    println!();
    println!("Parts:");
    for part in &result.parts {
        let size = part.size.map_or_else(|| "missing".to_string(), format_size);
        let last = if part.last { " (last)" } else { "" };
        println!(
            "  [{:04}] {} {} {} rows, {}{}",
            part.index, part.table, part.state, part.rows_count, size, last
        );
        if let Some(columns) = &part.columns {
            println!("         columns: {}", columns.join(", "));
        }
    }
}

fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} bytes", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}
