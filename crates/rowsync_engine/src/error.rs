//! Error types for the sync engine.

use crate::scoped::SyncStage;
use rowsync_batch::BatchError;
use rowsync_core::{SchemaError, SyncObject, TableName};
use std::fmt;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Error reported by a database driver.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct DbError {
    /// Driver message.
    pub message: String,
    /// Engine specific error code, if the driver reports one.
    pub code: Option<i32>,
}

impl DbError {
    /// Creates a driver error without a code.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
        }
    }

    /// Sets the engine specific error code.
    #[must_use]
    pub fn with_code(mut self, code: i32) -> Self {
        self.code = Some(code);
        self
    }
}

/// Where a failing command was running.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorContext {
    /// Table name, if the failure is tied to a table.
    pub table: Option<String>,
    /// Schema of the table.
    pub schema: Option<String>,
    /// Object the command was acting on.
    pub object: Option<SyncObject>,
    /// Overwrite flag in effect.
    pub overwrite: bool,
}

impl ErrorContext {
    /// Creates a context for `object` on `table`.
    pub fn new(table: &TableName, object: SyncObject, overwrite: bool) -> Self {
        Self {
            table: Some(table.name.clone()),
            schema: table.schema.clone(),
            object: Some(object),
            overwrite,
        }
    }

    /// Creates a context for a table without a specific object.
    pub fn for_table(table: &TableName) -> Self {
        Self {
            table: Some(table.name.clone()),
            schema: table.schema.clone(),
            ..Self::default()
        }
    }

    /// Returns true if nothing is known about the failure site.
    pub fn is_empty(&self) -> bool {
        self.table.is_none() && self.object.is_none()
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("no table");
        }
        match (&self.schema, &self.table) {
            (Some(schema), Some(table)) if !schema.is_empty() => write!(f, "table {schema}.{table}")?,
            (_, Some(table)) => write!(f, "table {table}")?,
            (_, None) => f.write_str("no table")?,
        }
        if let Some(object) = &self.object {
            write!(f, ", object {object}")?;
        }
        write!(f, ", overwrite={}", self.overwrite)
    }
}

/// Broad classification of a [`SyncError`], for callers that branch on the
/// kind of failure rather than the exact variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncErrorKind {
    /// The schema cannot be provisioned as declared. Raised before any SQL.
    Precondition,
    /// A batch ran out of part indices.
    Overflow,
    /// The database rejected a command.
    Execution,
    /// The caller asked to stop.
    Cancelled,
    /// Batch files could not be written or read.
    Batch,
    /// Options or provider setup are invalid.
    Configuration,
}

/// Errors that can occur during sync operations.
#[derive(Error, Debug)]
pub enum SyncError {
    /// A table-scoped object was requested for a table without columns.
    #[error("table {table} has no columns")]
    MissingColumns {
        /// Display name of the table.
        table: String,
    },

    /// A table-scoped object was requested for a table without a primary key.
    #[error("table {table} has no primary key")]
    MissingPrimaryKey {
        /// Display name of the table.
        table: String,
    },

    /// Relations between tables form a cycle.
    #[error("cyclic dependency detected through table {table}")]
    CyclicDependency {
        /// A table that participates in the cycle.
        table: String,
    },

    /// A table is not part of the scope.
    #[error("table not found in scope: {table}")]
    TableNotFound {
        /// Display name of the table.
        table: String,
    },

    /// A database command failed.
    #[error("command failed ({context}): {source}")]
    Execution {
        /// Where the command was running.
        context: ErrorContext,
        /// Driver error.
        #[source]
        source: DbError,
    },

    /// The operation was cancelled.
    #[error("cancelled during {stage}")]
    Cancelled {
        /// Stage that was running.
        stage: SyncStage,
    },

    /// Batch file error.
    #[error("batch error: {0}")]
    Batch(#[from] BatchError),

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl SyncError {
    /// Creates an execution error.
    pub fn execution(context: ErrorContext, source: DbError) -> Self {
        Self::Execution { context, source }
    }

    /// Creates a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Fills in the context of an execution error that does not have one yet.
    #[must_use]
    pub fn with_context(self, context: ErrorContext) -> Self {
        match self {
            Self::Execution { context: existing, source } if existing.is_empty() => {
                Self::Execution { context, source }
            }
            other => other,
        }
    }

    /// Returns the kind of this error.
    pub fn kind(&self) -> SyncErrorKind {
        match self {
            Self::MissingColumns { .. }
            | Self::MissingPrimaryKey { .. }
            | Self::CyclicDependency { .. }
            | Self::TableNotFound { .. } => SyncErrorKind::Precondition,
            Self::Execution { .. } => SyncErrorKind::Execution,
            Self::Cancelled { .. } | Self::Batch(BatchError::Cancelled) => SyncErrorKind::Cancelled,
            Self::Batch(BatchError::IndexOverflow { .. }) => SyncErrorKind::Overflow,
            Self::Batch(BatchError::UnknownSerializer { .. }) | Self::Configuration(_) => {
                SyncErrorKind::Configuration
            }
            Self::Batch(_) => SyncErrorKind::Batch,
        }
    }

    /// Returns true if the caller asked for the operation to stop.
    pub fn is_cancelled(&self) -> bool {
        self.kind() == SyncErrorKind::Cancelled
    }
}

impl From<SchemaError> for SyncError {
    fn from(err: SchemaError) -> Self {
        match err {
            SchemaError::CyclicDependency { table } => Self::CyclicDependency { table },
            SchemaError::TableNotFound { table } => Self::TableNotFound { table },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rowsync_core::TriggerKind;

    #[test]
    fn execution_message_carries_context() {
        let context = ErrorContext::new(
            &TableName::with_schema("Orders", "sales"),
            SyncObject::Trigger(TriggerKind::Update),
            true,
        );
        let err = SyncError::execution(context, DbError::new("deadlock").with_code(1205));

        let message = err.to_string();
        assert!(message.contains("sales.Orders"));
        assert!(message.contains("update trigger"));
        assert!(message.contains("overwrite=true"));
        assert!(message.contains("deadlock"));
        assert_eq!(err.kind(), SyncErrorKind::Execution);
    }

    #[test]
    fn with_context_keeps_existing_context() {
        let table = TableName::new("Orders");
        let inner = ErrorContext::new(&table, SyncObject::Table, false);
        let err = SyncError::execution(inner.clone(), DbError::new("boom"))
            .with_context(ErrorContext::for_table(&TableName::new("Other")));
        assert!(matches!(err, SyncError::Execution { context, .. } if context == inner));

        let err = SyncError::execution(ErrorContext::default(), DbError::new("boom"))
            .with_context(inner.clone());
        assert!(matches!(err, SyncError::Execution { context, .. } if context == inner));
    }

    #[test]
    fn kinds() {
        assert_eq!(
            SyncError::MissingPrimaryKey { table: "T".into() }.kind(),
            SyncErrorKind::Precondition
        );
        assert_eq!(
            SyncError::from(SchemaError::CyclicDependency { table: "T".into() }).kind(),
            SyncErrorKind::Precondition
        );
        assert_eq!(
            SyncError::from(BatchError::IndexOverflow { index: 10_000 }).kind(),
            SyncErrorKind::Overflow
        );
        assert_eq!(
            SyncError::from(BatchError::codec("bad")).kind(),
            SyncErrorKind::Batch
        );
        assert!(SyncError::Cancelled {
            stage: SyncStage::Provisioning
        }
        .is_cancelled());
        assert!(SyncError::from(BatchError::Cancelled).is_cancelled());
    }

    #[test]
    fn empty_context_display() {
        assert_eq!(ErrorContext::default().to_string(), "no table");
        let context = ErrorContext::for_table(&TableName::new("T"));
        assert_eq!(context.to_string(), "table T, overwrite=false");
    }
}
