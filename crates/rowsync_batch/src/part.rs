//! Batch part descriptors.

use rowsync_core::{RowState, TableName};
use serde::{Deserialize, Serialize};

/// Describes one persisted batch part file.
///
/// A part holds rows of a single table in a single row state. The descriptor
/// only stores the file name; the full path is resolved through the owning
/// [`crate::BatchInfo`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchPartInfo {
    /// File name inside the batch directory.
    #[serde(rename = "file")]
    pub file_name: String,
    /// Position of the part in the batch. Unique within a batch.
    pub index: u32,
    /// Whether this is the last part of the batch.
    #[serde(rename = "last")]
    pub is_last_batch: bool,
    /// Number of rows stored in the file.
    #[serde(rename = "rc")]
    pub rows_count: u32,
    /// Owning table name.
    #[serde(rename = "tn")]
    pub table_name: String,
    /// Owning table schema.
    #[serde(rename = "ts", default, skip_serializing_if = "Option::is_none")]
    pub schema_name: Option<String>,
    /// State of the rows in the file.
    #[serde(default)]
    pub state: RowState,
}

impl BatchPartInfo {
    /// Creates a descriptor for a freshly written part.
    pub fn new(
        file_name: impl Into<String>,
        index: u32,
        table: &TableName,
        state: RowState,
        rows_count: u32,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            index,
            is_last_batch: false,
            rows_count,
            table_name: table.name.clone(),
            schema_name: table.schema.clone(),
            state,
        }
    }

    /// Returns the identity of the owning table.
    pub fn table(&self) -> TableName {
        TableName {
            name: self.table_name.clone(),
            schema: self.schema_name.clone(),
        }
    }

    /// Returns true if this part belongs to `table_name` in `schema_name`.
    pub fn is_for_table(&self, table_name: &str, schema_name: Option<&str>) -> bool {
        self.table().matches(table_name, schema_name)
    }
}
