//! Batch part serializers.
//!
//! A serializer turns the rows of one part into a file and back. The key of
//! the serializer that produced a batch is recorded in the manifest so the
//! consumer reads parts with the same format.

use crate::error::{BatchError, BatchResult};
use rowsync_core::{RowState, SyncRow, TableName};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

/// Contents of one batch part file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchPartContent {
    /// Owning table name.
    pub table_name: String,
    /// Owning table schema.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_name: Option<String>,
    /// Column names, in the order of each row's values.
    pub columns: Vec<String>,
    /// State shared by every row in the part.
    pub state: RowState,
    /// Rows.
    pub rows: Vec<SyncRow>,
}

impl BatchPartContent {
    /// Creates part contents for `table`.
    pub fn new(table: &TableName, columns: Vec<String>, state: RowState, rows: Vec<SyncRow>) -> Self {
        Self {
            table_name: table.name.clone(),
            schema_name: table.schema.clone(),
            columns,
            state,
            rows,
        }
    }

    /// Returns the identity of the owning table.
    pub fn table(&self) -> TableName {
        TableName {
            name: self.table_name.clone(),
            schema: self.schema_name.clone(),
        }
    }
}

/// Reads and writes batch part files in one format.
pub trait BatchSerializer: Send + Sync {
    /// Key recorded in the manifest.
    fn key(&self) -> &'static str;

    /// File extension of the part files.
    fn extension(&self) -> &'static str;

    /// Writes a part to a new file.
    ///
    /// # Errors
    ///
    /// Fails if the file already exists: part files are never rewritten.
    fn write_part(&self, path: &Path, content: &BatchPartContent) -> BatchResult<()>;

    /// Reads a part file.
    fn read_part(&self, path: &Path) -> BatchResult<BatchPartContent>;
}

/// JSON part files.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSerializer;

impl BatchSerializer for JsonSerializer {
    fn key(&self) -> &'static str {
        "json"
    }

    fn extension(&self) -> &'static str {
        "json"
    }

    fn write_part(&self, path: &Path, content: &BatchPartContent) -> BatchResult<()> {
        let mut writer = BufWriter::new(create_new(path)?);
        serde_json::to_writer(&mut writer, content)?;
        finish(writer)
    }

    fn read_part(&self, path: &Path) -> BatchResult<BatchPartContent> {
        let reader = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }
}

/// CBOR part files.
#[derive(Debug, Clone, Copy, Default)]
pub struct CborSerializer;

impl BatchSerializer for CborSerializer {
    fn key(&self) -> &'static str {
        "cbor"
    }

    fn extension(&self) -> &'static str {
        "cbor"
    }

    fn write_part(&self, path: &Path, content: &BatchPartContent) -> BatchResult<()> {
        let mut writer = BufWriter::new(create_new(path)?);
        ciborium::ser::into_writer(content, &mut writer)
            .map_err(|e| BatchError::codec(format!("failed to encode part: {e:?}")))?;
        finish(writer)
    }

    fn read_part(&self, path: &Path) -> BatchResult<BatchPartContent> {
        let reader = BufReader::new(File::open(path)?);
        ciborium::de::from_reader(reader)
            .map_err(|e| BatchError::codec(format!("failed to decode part: {e:?}")))
    }
}

/// Key of the serializer used when a manifest does not record one.
pub const DEFAULT_SERIALIZER_KEY: &str = "json";

/// Returns the serializer registered under `key`.
pub fn serializer_for_key(key: &str) -> BatchResult<Box<dyn BatchSerializer>> {
    match key.to_ascii_lowercase().as_str() {
        "json" => Ok(Box::new(JsonSerializer)),
        "cbor" => Ok(Box::new(CborSerializer)),
        _ => Err(BatchError::unknown_serializer(key)),
    }
}

fn create_new(path: &Path) -> BatchResult<File> {
    Ok(OpenOptions::new().write(true).create_new(true).open(path)?)
}

fn finish(mut writer: BufWriter<File>) -> BatchResult<()> {
    writer.flush()?;
    let file = writer
        .into_inner()
        .map_err(|e| BatchError::Io(e.into_error()))?;
    file.sync_all()?;
    Ok(())
}
