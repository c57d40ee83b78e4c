//! In-memory database and provider.
//!
//! [`MemoryDatabase`] keeps a catalog of provisioned objects and the rows of
//! each table. Connections stage their changes on a private copy of the
//! catalog while a transaction is open; commit publishes the copy and
//! rollback discards it. Every command is recorded in a spy log.
//!
//! Commands use a tiny text format produced by [`MemoryTableBuilder`]:
//!
//! ```text
//! CREATE TABLE dbo.Customers
//! DROP TRIGGER dbo.Customers_insert_trigger
//! EXISTS PROCEDURE dbo.Customers_select_changes
//! UPDATE_ROW dbo.Customers CustomerID
//! DELETE_ROW dbo.Customers CustomerID
//! ```

use parking_lot::Mutex;
use rowsync_core::{ProcedureKind, RowValue, SyncFilter, SyncObject, SyncTable, TableName};
use rowsync_engine::{
    DbCommand, DbConnection, DbError, SyncProvider, TableBuilder, FORCE_WRITE_PARAMETER,
};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;

/// Returns the catalog key of `object` on `table`.
pub fn object_key(table: &TableName, object: SyncObject) -> String {
    match object {
        SyncObject::Schema => format!("SCHEMA {}", table.schema_or_empty()),
        SyncObject::Table => format!("TABLE {table}"),
        SyncObject::TrackingTable => format!("TRACKING_TABLE {table}_tracking"),
        SyncObject::Trigger(kind) => format!("TRIGGER {table}_{}_trigger", kind.as_str()),
        SyncObject::StoredProcedure(kind) => format!("PROCEDURE {table}_{}", kind.as_str()),
    }
}

/// Returns the storage key of a row identified by its primary key values.
pub fn row_key(values: &[RowValue]) -> String {
    values
        .iter()
        .map(|v| format!("{v:?}"))
        .collect::<Vec<_>>()
        .join("|")
}

type Row = Vec<(String, RowValue)>;

#[derive(Debug, Clone, Default)]
struct Catalog {
    objects: BTreeSet<String>,
    rows: BTreeMap<String, BTreeMap<String, Row>>,
}

#[derive(Debug, Default)]
struct State {
    catalog: Catalog,
    log: Vec<String>,
    failures: Vec<String>,
    conflicts: HashSet<(String, String)>,
    connections: usize,
}

/// Shared in-memory database.
///
/// Clones share the same state.
#[derive(Debug, Clone, Default)]
pub struct MemoryDatabase {
    inner: Arc<Mutex<State>>,
}

impl MemoryDatabase {
    /// Creates an empty database.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every command whose text contains `pattern` fail.
    ///
    /// `BEGIN`, `COMMIT` and `CONNECT` can be matched too.
    pub fn fail_on(&self, pattern: impl Into<String>) {
        self.inner.lock().failures.push(pattern.into());
    }

    /// Removes every injected failure.
    pub fn clear_failures(&self) {
        self.inner.lock().failures.clear();
    }

    /// Makes row commands on `key` of `table` affect no rows unless forced.
    pub fn inject_conflict(&self, table: &TableName, key: &[RowValue]) {
        self.inner
            .lock()
            .conflicts
            .insert((table.to_string(), row_key(key)));
    }

    /// Returns every log entry, in order.
    ///
    /// Entries are `CONNECT`, `BEGIN`, `COMMIT`, `ROLLBACK`, `EXEC <text>`
    /// and `SCALAR <text>`.
    pub fn log(&self) -> Vec<String> {
        self.inner.lock().log.clone()
    }

    /// Returns the text of every non-query command, in order.
    pub fn executed(&self) -> Vec<String> {
        self.entries_with_prefix("EXEC ")
    }

    /// Returns the text of every scalar command, in order.
    pub fn queried(&self) -> Vec<String> {
        self.entries_with_prefix("SCALAR ")
    }

    /// Returns the number of commands sent, scalar ones included.
    pub fn command_count(&self) -> usize {
        self.executed().len() + self.queried().len()
    }

    /// Clears the log.
    pub fn clear_log(&self) {
        self.inner.lock().log.clear();
    }

    /// Returns the number of connections opened so far.
    pub fn connections_opened(&self) -> usize {
        self.inner.lock().connections
    }

    /// Returns true if `object` of `table` is committed.
    pub fn has_object(&self, table: &TableName, object: SyncObject) -> bool {
        self.inner
            .lock()
            .catalog
            .objects
            .contains(&object_key(table, object))
    }

    /// Returns the keys of every committed object.
    pub fn objects(&self) -> Vec<String> {
        self.inner.lock().catalog.objects.iter().cloned().collect()
    }

    /// Commits an object without going through a connection.
    pub fn seed_object(&self, table: &TableName, object: SyncObject) {
        self.inner
            .lock()
            .catalog
            .objects
            .insert(object_key(table, object));
    }

    /// Commits a row without going through a connection.
    pub fn seed_row(&self, table: &TableName, key: &[RowValue], values: Vec<(String, RowValue)>) {
        self.inner
            .lock()
            .catalog
            .rows
            .entry(table.to_string())
            .or_default()
            .insert(row_key(key), values);
    }

    /// Returns a committed row.
    pub fn row(&self, table: &TableName, key: &[RowValue]) -> Option<Vec<(String, RowValue)>> {
        self.inner
            .lock()
            .catalog
            .rows
            .get(&table.to_string())
            .and_then(|rows| rows.get(&row_key(key)))
            .cloned()
    }

    /// Returns the number of committed rows of `table`.
    pub fn row_count(&self, table: &TableName) -> usize {
        self.inner
            .lock()
            .catalog
            .rows
            .get(&table.to_string())
            .map_or(0, BTreeMap::len)
    }

    fn entries_with_prefix(&self, prefix: &str) -> Vec<String> {
        self.inner
            .lock()
            .log
            .iter()
            .filter_map(|entry| entry.strip_prefix(prefix))
            .map(str::to_string)
            .collect()
    }

    fn record(&self, entry: String) {
        self.inner.lock().log.push(entry);
    }

    fn check_failure(&self, text: &str) -> Result<(), DbError> {
        let state = self.inner.lock();
        match state.failures.iter().find(|pattern| text.contains(pattern.as_str())) {
            Some(pattern) => Err(DbError::new(format!("injected failure on '{pattern}'"))),
            None => Ok(()),
        }
    }

    fn is_conflict(&self, table: &str, key: &str) -> bool {
        self.inner
            .lock()
            .conflicts
            .contains(&(table.to_string(), key.to_string()))
    }
}

/// Connection to a [`MemoryDatabase`].
#[derive(Debug)]
pub struct MemoryConnection {
    db: MemoryDatabase,
    staged: Option<Catalog>,
}

impl MemoryConnection {
    /// Opens a connection without a transaction.
    pub fn new(db: MemoryDatabase) -> Self {
        Self { db, staged: None }
    }

    /// Returns true while a transaction is open.
    pub fn in_transaction(&self) -> bool {
        self.staged.is_some()
    }

    fn with_catalog<T>(&mut self, f: impl FnOnce(&mut Catalog) -> T) -> T {
        match &mut self.staged {
            Some(catalog) => f(catalog),
            None => f(&mut self.db.inner.lock().catalog),
        }
    }

    fn execute_row(&mut self, verb: &str, rest: &str, command: &DbCommand) -> Result<u64, DbError> {
        let (table, pk_list) = rest.split_once(' ').unwrap_or((rest, ""));
        let key_values: Vec<RowValue> = pk_list
            .split(',')
            .filter(|pk| !pk.is_empty())
            .map(|pk| command.parameter(pk).cloned().unwrap_or(RowValue::Null))
            .collect();
        let key = row_key(&key_values);
        let forced = command
            .parameter(FORCE_WRITE_PARAMETER)
            .and_then(RowValue::as_i64)
            == Some(1);
        let conflict = !forced && self.db.is_conflict(table, &key);

        self.with_catalog(|catalog| {
            if !catalog.objects.contains(&format!("TABLE {table}")) {
                return Err(DbError::new(format!("table does not exist: {table}")));
            }
            if conflict {
                return Ok(0);
            }
            let rows = catalog.rows.entry(table.to_string()).or_default();
            if verb == "UPDATE_ROW" {
                let values = command
                    .parameters
                    .iter()
                    .filter(|p| !p.name.eq_ignore_ascii_case(FORCE_WRITE_PARAMETER))
                    .map(|p| (p.name.clone(), p.value.clone()))
                    .collect();
                rows.insert(key, values);
                return Ok(1);
            }
            let removed = rows.remove(&key).is_some();
            Ok(u64::from(removed || forced))
        })
    }
}

impl DbConnection for MemoryConnection {
    fn begin_transaction(&mut self) -> Result<(), DbError> {
        self.db.record("BEGIN".to_string());
        self.db.check_failure("BEGIN")?;
        if self.staged.is_some() {
            return Err(DbError::new("a transaction is already open"));
        }
        self.staged = Some(self.db.inner.lock().catalog.clone());
        Ok(())
    }

    fn commit(&mut self) -> Result<(), DbError> {
        self.db.record("COMMIT".to_string());
        self.db.check_failure("COMMIT")?;
        let staged = self
            .staged
            .take()
            .ok_or_else(|| DbError::new("no open transaction"))?;
        self.db.inner.lock().catalog = staged;
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), DbError> {
        self.db.record("ROLLBACK".to_string());
        self.staged
            .take()
            .map(|_| ())
            .ok_or_else(|| DbError::new("no open transaction"))
    }

    fn execute_non_query(&mut self, command: &DbCommand) -> Result<u64, DbError> {
        self.db.record(format!("EXEC {}", command.text));
        self.db.check_failure(&command.text)?;

        let (verb, rest) = command
            .text
            .split_once(' ')
            .ok_or_else(|| DbError::new(format!("malformed command: {}", command.text)))?;
        match verb {
            "CREATE" => self.with_catalog(|catalog| {
                if catalog.objects.insert(rest.to_string()) {
                    Ok(0)
                } else {
                    Err(DbError::new(format!("object already exists: {rest}")))
                }
            }),
            "DROP" => self.with_catalog(|catalog| {
                if catalog.objects.remove(rest) {
                    Ok(0)
                } else {
                    Err(DbError::new(format!("object does not exist: {rest}")))
                }
            }),
            "UPDATE_ROW" | "DELETE_ROW" => self.execute_row(verb, rest, command),
            _ => Err(DbError::new(format!("unknown command: {}", command.text))),
        }
    }

    fn execute_scalar(&mut self, command: &DbCommand) -> Result<Option<RowValue>, DbError> {
        self.db.record(format!("SCALAR {}", command.text));
        self.db.check_failure(&command.text)?;

        match command.text.split_once(' ') {
            Some(("EXISTS", key)) => {
                let exists = self.with_catalog(|catalog| catalog.objects.contains(key));
                Ok(Some(RowValue::Int(i64::from(exists))))
            }
            _ => Err(DbError::new(format!("unknown query: {}", command.text))),
        }
    }
}

/// Builds the commands understood by [`MemoryConnection`].
#[derive(Debug, Clone)]
pub struct MemoryTableBuilder {
    table: SyncTable,
    unsupported: Vec<SyncObject>,
}

impl MemoryTableBuilder {
    /// Creates a builder for `table`.
    pub fn new(table: SyncTable) -> Self {
        Self {
            table,
            unsupported: Vec::new(),
        }
    }

    fn command(&self, verb: &str, object: SyncObject) -> Option<DbCommand> {
        if self.unsupported.contains(&object) {
            return None;
        }
        if object == SyncObject::Schema && self.table.name.schema.is_none() {
            return None;
        }
        Some(DbCommand::new(format!("{verb} {}", object_key(&self.table.name, object))))
    }
}

impl TableBuilder for MemoryTableBuilder {
    fn create_command(&self, object: SyncObject, _filter: Option<&SyncFilter>) -> Option<DbCommand> {
        self.command("CREATE", object)
    }

    fn drop_command(&self, object: SyncObject, _filter: Option<&SyncFilter>) -> Option<DbCommand> {
        self.command("DROP", object)
    }

    fn exists_command(&self, object: SyncObject, _filter: Option<&SyncFilter>) -> Option<DbCommand> {
        self.command("EXISTS", object)
    }

    fn procedure_command(&self, kind: ProcedureKind) -> Option<DbCommand> {
        let verb = match kind {
            ProcedureKind::UpdateRow => "UPDATE_ROW",
            ProcedureKind::DeleteRow => "DELETE_ROW",
            _ => return None,
        };
        if self.unsupported.contains(&SyncObject::StoredProcedure(kind)) {
            return None;
        }
        Some(DbCommand::new(format!(
            "{verb} {} {}",
            self.table.name,
            self.table.primary_keys.join(",")
        )))
    }
}

/// Provider over a [`MemoryDatabase`].
#[derive(Debug, Clone, Default)]
pub struct MemoryProvider {
    db: MemoryDatabase,
    unsupported: Vec<SyncObject>,
}

impl MemoryProvider {
    /// Creates a provider over `db`.
    pub fn new(db: MemoryDatabase) -> Self {
        Self {
            db,
            unsupported: Vec::new(),
        }
    }

    /// Makes builders return no command for `object`.
    #[must_use]
    pub fn without(mut self, object: SyncObject) -> Self {
        self.unsupported.push(object);
        self
    }

    /// Returns the database.
    pub fn database(&self) -> &MemoryDatabase {
        &self.db
    }
}

impl SyncProvider for MemoryProvider {
    type Connection = MemoryConnection;
    type Builder = MemoryTableBuilder;

    fn connect(&self) -> Result<MemoryConnection, DbError> {
        self.db.record("CONNECT".to_string());
        self.db.check_failure("CONNECT")?;
        self.db.inner.lock().connections += 1;
        Ok(MemoryConnection::new(self.db.clone()))
    }

    fn table_builder(&self, table: &SyncTable) -> MemoryTableBuilder {
        MemoryTableBuilder {
            table: table.clone(),
            unsupported: self.unsupported.clone(),
        }
    }
}
