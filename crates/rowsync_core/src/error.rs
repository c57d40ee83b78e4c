//! Error types for schema operations.

use thiserror::Error;

/// Result type for schema operations.
pub type SchemaResult<T> = Result<T, SchemaError>;

/// Errors raised while interpreting a sync schema.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SchemaError {
    /// Relations between tables form a cycle, so no creation order exists.
    #[error("cyclic dependency detected through table {table}")]
    CyclicDependency {
        /// A table that participates in the cycle.
        table: String,
    },

    /// A table referenced by name is not part of the schema.
    #[error("table not found in schema: {table}")]
    TableNotFound {
        /// Display name of the missing table.
        table: String,
    },
}

impl SchemaError {
    /// Creates a table not found error.
    pub fn table_not_found(table: impl Into<String>) -> Self {
        Self::TableNotFound {
            table: table.into(),
        }
    }
}
