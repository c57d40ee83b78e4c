//! Provisionable database objects.

use std::fmt;

/// Trigger sub-kinds installed on a tracked table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TriggerKind {
    /// Fires after rows are inserted.
    Insert,
    /// Fires after rows are updated.
    Update,
    /// Fires after rows are deleted.
    Delete,
}

impl TriggerKind {
    /// Every trigger sub-kind, in declaration order.
    pub const ALL: [TriggerKind; 3] = [TriggerKind::Insert, TriggerKind::Update, TriggerKind::Delete];

    /// Returns the short name used in logs and generated object names.
    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerKind::Insert => "insert",
            TriggerKind::Update => "update",
            TriggerKind::Delete => "delete",
        }
    }
}

/// Stored procedure sub-kinds used to select and apply changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProcedureKind {
    /// Selects rows changed since a timestamp.
    SelectChanges,
    /// Selects rows changed since a timestamp, restricted by filter parameters.
    SelectChangesWithFilters,
    /// Selects every row for an initial snapshot.
    SelectInitializedChanges,
    /// Selects every row for an initial snapshot, restricted by filter parameters.
    SelectInitializedChangesWithFilters,
    /// Selects a single row by primary key.
    SelectRow,
    /// Inserts or updates a single row.
    UpdateRow,
    /// Deletes a single row.
    DeleteRow,
}

impl ProcedureKind {
    /// Every procedure sub-kind, in declaration order.
    pub const ALL: [ProcedureKind; 7] = [
        ProcedureKind::SelectChanges,
        ProcedureKind::SelectChangesWithFilters,
        ProcedureKind::SelectInitializedChanges,
        ProcedureKind::SelectInitializedChangesWithFilters,
        ProcedureKind::SelectRow,
        ProcedureKind::UpdateRow,
        ProcedureKind::DeleteRow,
    ];

    /// Returns true if this procedure can only exist for a filtered table.
    pub fn requires_filter(&self) -> bool {
        matches!(
            self,
            ProcedureKind::SelectChangesWithFilters
                | ProcedureKind::SelectInitializedChangesWithFilters
        )
    }

    /// Returns the short name used in logs and generated object names.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcedureKind::SelectChanges => "select_changes",
            ProcedureKind::SelectChangesWithFilters => "select_changes_filtered",
            ProcedureKind::SelectInitializedChanges => "select_initialized_changes",
            ProcedureKind::SelectInitializedChangesWithFilters => {
                "select_initialized_changes_filtered"
            }
            ProcedureKind::SelectRow => "select_row",
            ProcedureKind::UpdateRow => "update_row",
            ProcedureKind::DeleteRow => "delete_row",
        }
    }
}

/// A database object that RowSync provisions for a tracked table.
///
/// Every variant follows the same exists / create / drop protocol. Triggers and
/// stored procedures carry the sub-kind they refer to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncObject {
    /// The database schema that encloses the table.
    Schema,
    /// The user table itself.
    Table,
    /// The shadow table recording per-row change metadata.
    TrackingTable,
    /// One trigger on the user table.
    Trigger(TriggerKind),
    /// One stored procedure (or equivalent command) for the table.
    StoredProcedure(ProcedureKind),
}

impl SyncObject {
    /// Returns true if creating this object needs columns and a primary key.
    pub fn is_table_scoped(&self) -> bool {
        !matches!(self, SyncObject::Schema)
    }

    /// Returns true if this object only applies to filtered tables.
    pub fn requires_filter(&self) -> bool {
        matches!(self, SyncObject::StoredProcedure(kind) if kind.requires_filter())
    }
}

impl fmt::Display for SyncObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncObject::Schema => f.write_str("schema"),
            SyncObject::Table => f.write_str("table"),
            SyncObject::TrackingTable => f.write_str("tracking table"),
            SyncObject::Trigger(kind) => write!(f, "{} trigger", kind.as_str()),
            SyncObject::StoredProcedure(kind) => write!(f, "{} procedure", kind.as_str()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filtered_procedures() {
        let filtered: Vec<_> = ProcedureKind::ALL
            .iter()
            .filter(|k| k.requires_filter())
            .collect();
        assert_eq!(filtered.len(), 2);
        assert!(SyncObject::StoredProcedure(ProcedureKind::SelectChangesWithFilters)
            .requires_filter());
        assert!(!SyncObject::Trigger(TriggerKind::Insert).requires_filter());
    }

    #[test]
    fn schema_is_not_table_scoped() {
        assert!(!SyncObject::Schema.is_table_scoped());
        assert!(SyncObject::Table.is_table_scoped());
        assert!(SyncObject::StoredProcedure(ProcedureKind::SelectRow).is_table_scoped());
    }

    #[test]
    fn display_names() {
        assert_eq!(SyncObject::TrackingTable.to_string(), "tracking table");
        assert_eq!(
            SyncObject::Trigger(TriggerKind::Update).to_string(),
            "update trigger"
        );
        assert_eq!(
            SyncObject::StoredProcedure(ProcedureKind::DeleteRow).to_string(),
            "delete_row procedure"
        );
    }
}
