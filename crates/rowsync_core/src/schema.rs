//! Sync schema: tables, columns, relations and filters.

use crate::error::{SchemaError, SchemaResult};
use crate::name::{eq_ignore_case, TableName};
use serde::{Deserialize, Serialize};

/// A column of a tracked table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncColumn {
    /// Column name.
    pub name: String,
    /// Engine-specific type name.
    pub data_type: String,
    /// Whether the column accepts NULL.
    pub allow_null: bool,
}

impl SyncColumn {
    /// Creates a non-nullable column.
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            allow_null: false,
        }
    }

    /// Marks the column as nullable.
    #[must_use]
    pub fn nullable(mut self) -> Self {
        self.allow_null = true;
        self
    }
}

/// A tracked table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncTable {
    /// Table identity.
    pub name: TableName,
    /// Columns in declaration order.
    pub columns: Vec<SyncColumn>,
    /// Names of the primary key columns.
    pub primary_keys: Vec<String>,
}

impl SyncTable {
    /// Creates an empty table definition.
    pub fn new(name: TableName) -> Self {
        Self {
            name,
            columns: Vec::new(),
            primary_keys: Vec::new(),
        }
    }

    /// Adds a column.
    #[must_use]
    pub fn with_column(mut self, column: SyncColumn) -> Self {
        self.columns.push(column);
        self
    }

    /// Adds a primary key column, declaring it if it does not exist yet.
    #[must_use]
    pub fn with_primary_key(mut self, name: impl Into<String>, data_type: impl Into<String>) -> Self {
        let name = name.into();
        if self.column_index(&name).is_none() {
            self.columns.push(SyncColumn::new(name.clone(), data_type));
        }
        self.primary_keys.push(name);
        self
    }

    /// Returns true if the table declares at least one column.
    pub fn has_columns(&self) -> bool {
        !self.columns.is_empty()
    }

    /// Returns true if the table declares at least one primary key column.
    pub fn has_primary_keys(&self) -> bool {
        !self.primary_keys.is_empty()
    }

    /// Returns the position of a column, matched case-insensitively.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| eq_ignore_case(&c.name, name))
    }

    /// Returns the positions of the primary key columns.
    pub fn primary_key_indices(&self) -> Vec<usize> {
        self.primary_keys
            .iter()
            .filter_map(|pk| self.column_index(pk))
            .collect()
    }
}

/// A foreign key style relation: `child` references `parent`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncRelation {
    /// Relation name.
    pub name: String,
    /// The referencing table.
    pub child: TableName,
    /// Referencing columns.
    pub child_columns: Vec<String>,
    /// The referenced table.
    pub parent: TableName,
    /// Referenced columns.
    pub parent_columns: Vec<String>,
}

impl SyncRelation {
    /// Creates a single-column relation.
    pub fn new(
        name: impl Into<String>,
        child: TableName,
        child_column: impl Into<String>,
        parent: TableName,
        parent_column: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            child,
            child_columns: vec![child_column.into()],
            parent,
            parent_columns: vec![parent_column.into()],
        }
    }
}

/// Filter definition restricting the rows of one table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncFilter {
    /// Filtered table.
    pub table: TableName,
    /// Filter parameter names.
    pub parameters: Vec<String>,
}

impl SyncFilter {
    /// Creates a filter on `table` with the given parameters.
    pub fn new(table: TableName, parameters: Vec<String>) -> Self {
        Self { table, parameters }
    }
}

/// The schema of a scope: every tracked table with its relations and filters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncSet {
    /// Tables in declaration order.
    pub tables: Vec<SyncTable>,
    /// Relations between tables.
    pub relations: Vec<SyncRelation>,
    /// Filters on tables.
    pub filters: Vec<SyncFilter>,
}

impl SyncSet {
    /// Creates an empty schema.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a table.
    #[must_use]
    pub fn with_table(mut self, table: SyncTable) -> Self {
        self.tables.push(table);
        self
    }

    /// Adds a relation.
    #[must_use]
    pub fn with_relation(mut self, relation: SyncRelation) -> Self {
        self.relations.push(relation);
        self
    }

    /// Adds a filter.
    #[must_use]
    pub fn with_filter(mut self, filter: SyncFilter) -> Self {
        self.filters.push(filter);
        self
    }

    /// Returns true if the schema has at least one table.
    pub fn has_tables(&self) -> bool {
        !self.tables.is_empty()
    }

    /// Returns true if at least one table declares columns.
    pub fn has_columns(&self) -> bool {
        self.tables.iter().any(SyncTable::has_columns)
    }

    /// Looks a table up by identity.
    pub fn table(&self, name: &TableName) -> Option<&SyncTable> {
        self.tables.iter().find(|t| &t.name == name)
    }

    /// Looks a table up by identity, failing if it is not declared.
    pub fn require_table(&self, name: &TableName) -> SchemaResult<&SyncTable> {
        self.table(name)
            .ok_or_else(|| SchemaError::table_not_found(name.to_string()))
    }

    /// Returns the filter declared for a table, if any.
    pub fn filter_for(&self, name: &TableName) -> Option<&SyncFilter> {
        self.filters.iter().find(|f| &f.table == name)
    }

    /// Returns the tables a table references, ignoring self references.
    pub fn parents_of<'a>(&'a self, name: &'a TableName) -> impl Iterator<Item = &'a TableName> {
        self.relations
            .iter()
            .filter(move |r| &r.child == name && &r.parent != name)
            .map(|r| &r.parent)
    }

    /// Returns the tables ordered so that every parent precedes its children.
    ///
    /// Independent tables keep their declaration order. Relations that point
    /// outside the schema are ignored.
    ///
    /// # Errors
    ///
    /// Returns `CyclicDependency` if the relations form a cycle.
    pub fn tables_by_dependency(&self) -> SchemaResult<Vec<&SyncTable>> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            Unvisited,
            Visiting,
            Done,
        }

        fn visit<'a>(
            set: &'a SyncSet,
            index: usize,
            marks: &mut [Mark],
            ordered: &mut Vec<&'a SyncTable>,
        ) -> SchemaResult<()> {
            match marks[index] {
                Mark::Done => return Ok(()),
                Mark::Visiting => {
                    return Err(SchemaError::CyclicDependency {
                        table: set.tables[index].name.to_string(),
                    })
                }
                Mark::Unvisited => {}
            }

            marks[index] = Mark::Visiting;
            let table = &set.tables[index];
            for parent in set.parents_of(&table.name) {
                if let Some(parent_index) = set.tables.iter().position(|t| &t.name == parent) {
                    visit(set, parent_index, marks, ordered)?;
                }
            }
            marks[index] = Mark::Done;
            ordered.push(table);
            Ok(())
        }

        let mut marks = vec![Mark::Unvisited; self.tables.len()];
        let mut ordered = Vec::with_capacity(self.tables.len());
        for index in 0..self.tables.len() {
            visit(self, index, &mut marks, &mut ordered)?;
        }
        Ok(ordered)
    }
}
