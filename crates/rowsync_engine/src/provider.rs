//! Database provider abstraction.
//!
//! The engine never builds SQL itself. A provider hands out connections and
//! per-table builders; the builders produce the text for every object kind
//! and the driver executes it. This keeps the engine independent of any
//! particular database.

use crate::error::DbError;
use rowsync_core::{ProcedureKind, RowValue, SyncFilter, SyncObject, SyncTable};
use std::fmt;

/// A named command parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct DbParameter {
    /// Parameter name, without any engine specific prefix.
    pub name: String,
    /// Bound value.
    pub value: RowValue,
}

/// A command ready to be executed by a driver.
#[derive(Debug, Clone, PartialEq)]
pub struct DbCommand {
    /// Command text in the engine's dialect.
    pub text: String,
    /// Bound parameters.
    pub parameters: Vec<DbParameter>,
}

impl DbCommand {
    /// Creates a command without parameters.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            parameters: Vec::new(),
        }
    }

    /// Adds a parameter.
    #[must_use]
    pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<RowValue>) -> Self {
        self.set_parameter(name, value);
        self
    }

    /// Returns the value bound to `name`, matched case-insensitively.
    pub fn parameter(&self, name: &str) -> Option<&RowValue> {
        self.parameters
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name))
            .map(|p| &p.value)
    }

    /// Binds `value` to `name`, replacing any previous binding.
    pub fn set_parameter(&mut self, name: impl Into<String>, value: impl Into<RowValue>) {
        let name = name.into();
        let value = value.into();
        match self
            .parameters
            .iter_mut()
            .find(|p| p.name.eq_ignore_ascii_case(&name))
        {
            Some(existing) => existing.value = value,
            None => self.parameters.push(DbParameter { name, value }),
        }
    }
}

impl fmt::Display for DbCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// A live database connection.
///
/// Connections are used by one thread of control at a time and are never
/// shared between concurrent operations.
pub trait DbConnection {
    /// Starts a transaction.
    fn begin_transaction(&mut self) -> Result<(), DbError>;

    /// Commits the current transaction.
    fn commit(&mut self) -> Result<(), DbError>;

    /// Rolls back the current transaction.
    fn rollback(&mut self) -> Result<(), DbError>;

    /// Executes a command and returns the number of affected rows.
    fn execute_non_query(&mut self, command: &DbCommand) -> Result<u64, DbError>;

    /// Executes a command and returns the first column of the first row.
    fn execute_scalar(&mut self, command: &DbCommand) -> Result<Option<RowValue>, DbError>;
}

/// Produces the commands for the objects of one table.
///
/// Returning `None` means the object does not apply to this table or engine.
/// The engine treats that as a no-op, never as a failure.
pub trait TableBuilder {
    /// Command creating `object`.
    fn create_command(&self, object: SyncObject, filter: Option<&SyncFilter>) -> Option<DbCommand>;

    /// Command dropping `object`.
    fn drop_command(&self, object: SyncObject, filter: Option<&SyncFilter>) -> Option<DbCommand>;

    /// Scalar command returning a positive count when `object` exists.
    fn exists_command(&self, object: SyncObject, filter: Option<&SyncFilter>) -> Option<DbCommand>;

    /// Command invoking the stored procedure `kind`, with one parameter per
    /// column left unbound.
    fn procedure_command(&self, kind: ProcedureKind) -> Option<DbCommand>;
}

/// Entry point to one database engine.
pub trait SyncProvider {
    /// Connection type.
    type Connection: DbConnection;
    /// Builder type.
    type Builder: TableBuilder;

    /// Opens a new connection.
    fn connect(&self) -> Result<Self::Connection, DbError>;

    /// Returns the command builder for `table`.
    fn table_builder(&self, table: &SyncTable) -> Self::Builder;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parameters_are_replaced_case_insensitively() {
        let mut command = DbCommand::new("EXEC dbo.Customers_update")
            .with_parameter("CustomerID", 1i64)
            .with_parameter("sync_force_write", false);

        command.set_parameter("SYNC_FORCE_WRITE", true);

        assert_eq!(command.parameters.len(), 2);
        assert_eq!(command.parameter("sync_force_write"), Some(&RowValue::Bool(true)));
        assert_eq!(command.parameter("customerid"), Some(&RowValue::Int(1)));
        assert_eq!(command.parameter("missing"), None);
    }

    #[test]
    fn display_is_text() {
        assert_eq!(DbCommand::new("SELECT 1").to_string(), "SELECT 1");
    }
}
