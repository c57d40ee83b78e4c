//! Change application.
//!
//! A [`BatchApplier`] replays the parts of a batch against a database
//! through the `update_row` and `delete_row` procedures of each table.
//! Within a table, parts are applied in ascending index order. Deletes
//! that open a table's run of parts go first, children before parents;
//! everything else follows, parents before children.

use crate::cache::CommandCache;
use crate::error::{ErrorContext, SyncError, SyncResult};
use crate::interceptor::Interceptors;
use crate::provider::{DbCommand, DbConnection, SyncProvider, TableBuilder};
use crate::scoped::ScopedConnection;
use rowsync_batch::{BatchInfo, BatchPartInfo};
use rowsync_core::{ProcedureKind, RowState, SyncObject, SyncRow, SyncSet, SyncTable, TableName};
use std::collections::BTreeSet;

/// Parameter that makes a row procedure overwrite a conflicting row.
pub const FORCE_WRITE_PARAMETER: &str = "sync_force_write";

/// Which side wins when an applied row conflicts with a local edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConflictResolution {
    /// The row from the batch overwrites the local row.
    #[default]
    ServerWins,
    /// The local row is kept and the batch row is skipped.
    ClientWins,
}

/// A row the database refused to apply without forcing.
#[derive(Debug)]
pub struct ApplyConflict<'a> {
    /// Table the row belongs to.
    pub table: &'a TableName,
    /// Change being applied.
    pub state: RowState,
    /// Column names, in the order of the row values.
    pub columns: &'a [String],
    /// The conflicting row.
    pub row: &'a SyncRow,
    /// How the conflict is about to be resolved.
    pub resolution: ConflictResolution,
}

/// Counters of one apply run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyStats {
    /// Parts read.
    pub parts: u32,
    /// Rows written, forced ones included.
    pub applied: u64,
    /// Rows that conflicted.
    pub conflicts: u64,
    /// Conflicting rows written with the force parameter.
    pub forced: u64,
    /// Conflicting rows skipped in favor of the local row.
    pub skipped: u64,
}

/// Applies batches against a connection.
pub struct BatchApplier<'a> {
    schema: &'a SyncSet,
    cache: &'a CommandCache,
    interceptors: &'a Interceptors,
    resolution: ConflictResolution,
}

impl<'a> BatchApplier<'a> {
    /// Creates an applier over the tables of `schema`.
    pub fn new(schema: &'a SyncSet, cache: &'a CommandCache, interceptors: &'a Interceptors) -> Self {
        Self {
            schema,
            cache,
            interceptors,
            resolution: ConflictResolution::default(),
        }
    }

    /// Sets the conflict resolution policy.
    #[must_use]
    pub fn with_resolution(mut self, resolution: ConflictResolution) -> Self {
        self.resolution = resolution;
        self
    }

    /// Applies every part of `batch`.
    ///
    /// Parts of one table always run in ascending index order, each through
    /// the procedure of its own row state. Across tables, the leading
    /// deleted parts of every table run first, children before parents;
    /// the remaining parts follow, parents before children. Snapshot rows
    /// (`RowState::None`) are upserted like modified rows.
    ///
    /// Parts of tables that are not part of the schema are skipped with a
    /// warning.
    pub fn apply<P: SyncProvider>(
        &self,
        provider: &P,
        connection: &mut ScopedConnection<P::Connection>,
        batch: &BatchInfo,
    ) -> SyncResult<ApplyStats> {
        let mut stats = ApplyStats::default();
        if !batch.has_data() {
            return Ok(stats);
        }
        self.warn_unknown_tables(batch);

        let plans: Vec<(&SyncTable, Vec<&BatchPartInfo>, usize)> = self
            .schema
            .tables_by_dependency()?
            .into_iter()
            .map(|table| {
                let parts: Vec<_> = batch
                    .parts_for_table(&table.name.name, table.name.schema.as_deref())
                    .collect();
                let leading_deletes = parts
                    .iter()
                    .take_while(|p| p.state == RowState::Deleted)
                    .count();
                (table, parts, leading_deletes)
            })
            .collect();

        for (table, parts, leading_deletes) in plans.iter().rev() {
            self.apply_parts(provider, connection, batch, table, &parts[..*leading_deletes], &mut stats)?;
        }
        for (table, parts, leading_deletes) in &plans {
            self.apply_parts(provider, connection, batch, table, &parts[*leading_deletes..], &mut stats)?;
        }

        tracing::info!(
            directory = %batch.directory_name,
            parts = stats.parts,
            applied = stats.applied,
            conflicts = stats.conflicts,
            "batch applied"
        );
        Ok(stats)
    }

    fn warn_unknown_tables(&self, batch: &BatchInfo) {
        let unknown: BTreeSet<String> = batch
            .parts
            .iter()
            .filter(|p| p.rows_count > 0)
            .filter(|p| {
                !self
                    .schema
                    .tables
                    .iter()
                    .any(|t| p.is_for_table(&t.name.name, t.name.schema.as_deref()))
            })
            .map(|p| p.table().to_string())
            .collect();
        for table in unknown {
            tracing::warn!(%table, directory = %batch.directory_name, "batch holds rows of a table outside the scope, skipping");
        }
    }

    fn apply_parts<P: SyncProvider>(
        &self,
        provider: &P,
        connection: &mut ScopedConnection<P::Connection>,
        batch: &BatchInfo,
        table: &SyncTable,
        parts: &[&BatchPartInfo],
        stats: &mut ApplyStats,
    ) -> SyncResult<()> {
        for part in parts {
            connection.check_cancelled()?;
            let kind = match part.state {
                RowState::Deleted => ProcedureKind::DeleteRow,
                RowState::Modified | RowState::None => ProcedureKind::UpdateRow,
            };
            let template = self
                .cache
                .get_or_insert_with(&table.name, kind, || {
                    provider.table_builder(table).procedure_command(kind)
                })
                .ok_or_else(|| {
                    SyncError::configuration(format!(
                        "no {} command for table {}",
                        kind.as_str(),
                        table.name
                    ))
                })?;

            let content = batch.read_part(part)?;
            for row in &content.rows {
                self.apply_row(connection, &table.name, kind, &template, &content.columns, row, stats)?;
            }
            stats.parts += 1;
            tracing::debug!(
                table = %table.name,
                index = part.index,
                state = ?part.state,
                rows = content.rows.len(),
                "part applied"
            );
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn apply_row<C: DbConnection>(
        &self,
        connection: &mut ScopedConnection<C>,
        table: &TableName,
        kind: ProcedureKind,
        template: &DbCommand,
        columns: &[String],
        row: &SyncRow,
        stats: &mut ApplyStats,
    ) -> SyncResult<()> {
        let context = ErrorContext::new(table, SyncObject::StoredProcedure(kind), false);

        let mut command = template.clone();
        for (column, value) in columns.iter().zip(&row.values) {
            command.set_parameter(column.as_str(), value.clone());
        }
        command.set_parameter(FORCE_WRITE_PARAMETER, false);

        let affected = connection
            .execute_non_query(&command)
            .map_err(|e| e.with_context(context.clone()))?;
        if affected > 0 {
            stats.applied += 1;
            return Ok(());
        }

        stats.conflicts += 1;
        self.interceptors.apply_conflict(&ApplyConflict {
            table,
            state: row.state,
            columns,
            row,
            resolution: self.resolution,
        });

        match self.resolution {
            ConflictResolution::ServerWins => {
                command.set_parameter(FORCE_WRITE_PARAMETER, true);
                let affected = connection
                    .execute_non_query(&command)
                    .map_err(|e| e.with_context(context))?;
                if affected == 0 {
                    tracing::warn!(%table, "forced write affected no rows");
                }
                stats.forced += 1;
                stats.applied += 1;
            }
            ConflictResolution::ClientWins => {
                tracing::debug!(%table, "conflict resolved in favor of the local row");
                stats.skipped += 1;
            }
        }
        Ok(())
    }
}
