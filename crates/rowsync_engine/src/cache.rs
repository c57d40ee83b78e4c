//! Session command cache.

use crate::provider::DbCommand;
use parking_lot::Mutex;
use rowsync_core::{ProcedureKind, TableName};
use std::collections::HashMap;

/// Caches the stored procedure commands of each table for one session.
///
/// Commands are derived from the table builder once and reused for every row
/// applied afterwards. Entries of a table are invalidated whenever that
/// table's stored procedures are created or dropped.
#[derive(Debug, Default)]
pub struct CommandCache {
    entries: Mutex<HashMap<(TableName, ProcedureKind), DbCommand>>,
}

impl CommandCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached command, building and caching it on a miss.
    ///
    /// A builder result of `None` is not cached.
    pub fn get_or_insert_with<F>(&self, table: &TableName, kind: ProcedureKind, build: F) -> Option<DbCommand>
    where
        F: FnOnce() -> Option<DbCommand>,
    {
        let key = (table.clone(), kind);
        if let Some(command) = self.entries.lock().get(&key) {
            return Some(command.clone());
        }

        let command = build()?;
        self.entries.lock().insert(key, command.clone());
        Some(command)
    }

    /// Returns true if a command is cached.
    pub fn contains(&self, table: &TableName, kind: ProcedureKind) -> bool {
        self.entries.lock().contains_key(&(table.clone(), kind))
    }

    /// Drops every entry of `table`.
    pub fn invalidate_table(&self, table: &TableName) {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|(name, _), _| name != table);
        if entries.len() != before {
            tracing::debug!(%table, "command cache invalidated");
        }
    }

    /// Drops every entry.
    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    /// Returns the number of cached commands.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Returns true if nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn builds_once() {
        let cache = CommandCache::new();
        let table = TableName::with_schema("Customers", "dbo");
        let calls = Cell::new(0);
        let build = || {
            calls.set(calls.get() + 1);
            Some(DbCommand::new("EXEC update"))
        };

        assert!(cache.get_or_insert_with(&table, ProcedureKind::UpdateRow, build).is_some());
        assert!(cache.get_or_insert_with(&table, ProcedureKind::UpdateRow, build).is_some());
        // Lookup is case-insensitive through TableName equality.
        let other_case = TableName::with_schema("CUSTOMERS", "DBO");
        assert!(cache.contains(&other_case, ProcedureKind::UpdateRow));
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn missing_commands_are_not_cached() {
        let cache = CommandCache::new();
        let table = TableName::new("T");
        assert!(cache.get_or_insert_with(&table, ProcedureKind::DeleteRow, || None).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn invalidation_is_per_table() {
        let cache = CommandCache::new();
        let a = TableName::new("A");
        let b = TableName::new("B");
        for kind in [ProcedureKind::UpdateRow, ProcedureKind::DeleteRow] {
            cache.get_or_insert_with(&a, kind, || Some(DbCommand::new("a")));
            cache.get_or_insert_with(&b, kind, || Some(DbCommand::new("b")));
        }
        assert_eq!(cache.len(), 4);

        cache.invalidate_table(&a);
        assert_eq!(cache.len(), 2);
        assert!(!cache.contains(&a, ProcedureKind::UpdateRow));
        assert!(cache.contains(&b, ProcedureKind::UpdateRow));

        cache.clear();
        assert!(cache.is_empty());
    }
}
