//! Per-table provisioning state machine.
//!
//! Every provisionable object follows the same protocol: its state is
//! `Unknown` until queried, then `Absent` or `Present`. Creating an absent
//! object makes it present, dropping a present one makes it absent, and an
//! overwrite is a drop followed by a create in the same transaction.
//! Existence is always queried from the database; nothing is cached.

use crate::error::{ErrorContext, SyncError, SyncResult};
use crate::interceptor::{CommandOutcome, Interceptors};
use crate::provider::{DbConnection, TableBuilder};
use crate::scoped::ScopedConnection;
use rowsync_core::{ProcedureKind, SyncFilter, SyncObject, SyncTable, TriggerKind};

/// Drives exists / create / drop for the objects of one table over a live
/// scoped connection.
pub struct ObjectProvisioner<'a, C: DbConnection, B: TableBuilder> {
    table: &'a SyncTable,
    filter: Option<&'a SyncFilter>,
    builder: &'a B,
    connection: &'a mut ScopedConnection<C>,
    interceptors: &'a Interceptors,
}

impl<'a, C: DbConnection, B: TableBuilder> ObjectProvisioner<'a, C, B> {
    /// Creates a provisioner for `table`.
    pub fn new(
        table: &'a SyncTable,
        filter: Option<&'a SyncFilter>,
        builder: &'a B,
        connection: &'a mut ScopedConnection<C>,
        interceptors: &'a Interceptors,
    ) -> Self {
        Self {
            table,
            filter,
            builder,
            connection,
            interceptors,
        }
    }

    /// Returns the table being provisioned.
    pub fn table(&self) -> &'a SyncTable {
        self.table
    }

    /// Fails if `object` needs columns or a primary key the table lacks.
    pub fn check_preconditions(&self, object: SyncObject) -> SyncResult<()> {
        if !object.is_table_scoped() {
            return Ok(());
        }
        if !self.table.has_columns() {
            return Err(SyncError::MissingColumns {
                table: self.table.name.to_string(),
            });
        }
        if !self.table.has_primary_keys() {
            return Err(SyncError::MissingPrimaryKey {
                table: self.table.name.to_string(),
            });
        }
        Ok(())
    }

    /// Returns true if `object` exists.
    ///
    /// An object the builder has no existence check for is reported absent.
    pub fn exists(&mut self, object: SyncObject) -> SyncResult<bool> {
        let Some(command) = self.builder.exists_command(object, self.filter) else {
            return Ok(false);
        };
        let count = self
            .connection
            .execute_scalar(&command)
            .map_err(|e| e.with_context(self.context(object, false)))?;
        Ok(count.and_then(|v| v.as_i64()).is_some_and(|c| c > 0))
    }

    /// Creates `object` without checking whether it exists.
    ///
    /// Returns false when the builder has no command for the object or a
    /// "creating" hook cancelled it. In both cases nothing is executed.
    pub fn create(&mut self, object: SyncObject) -> SyncResult<bool> {
        self.create_with(object, false)
    }

    /// Drops `object` without checking whether it exists.
    pub fn drop(&mut self, object: SyncObject) -> SyncResult<bool> {
        self.drop_with(object, false)
    }

    /// Makes sure `object` is present.
    ///
    /// With `overwrite`, an existing object is dropped and created again.
    /// Tables and tracking tables get their schema created first. Returns
    /// true if the object was created.
    pub fn ensure_created(&mut self, object: SyncObject, overwrite: bool) -> SyncResult<bool> {
        self.check_preconditions(object)?;
        if object.requires_filter() && self.filter.is_none() {
            return Ok(false);
        }
        if matches!(object, SyncObject::Table | SyncObject::TrackingTable) {
            self.ensure_schema()?;
        }

        let exists = self.exists(object)?;
        if exists && overwrite {
            self.drop_with(object, true)?;
        }
        if !exists || overwrite {
            return self.create_with(object, overwrite);
        }
        Ok(false)
    }

    /// Makes sure `object` is absent. Returns true if it was dropped.
    pub fn ensure_absent(&mut self, object: SyncObject) -> SyncResult<bool> {
        if self.exists(object)? {
            return self.drop(object);
        }
        Ok(false)
    }

    /// Makes sure every trigger kind is present.
    pub fn ensure_triggers_created(&mut self, overwrite: bool) -> SyncResult<bool> {
        let mut changed = false;
        for kind in TriggerKind::ALL {
            changed |= self.ensure_created(SyncObject::Trigger(kind), overwrite)?;
        }
        Ok(changed)
    }

    /// Makes sure no trigger kind is present.
    pub fn ensure_triggers_absent(&mut self) -> SyncResult<bool> {
        let mut changed = false;
        for kind in TriggerKind::ALL {
            changed |= self.ensure_absent(SyncObject::Trigger(kind))?;
        }
        Ok(changed)
    }

    /// Makes sure every applicable stored procedure kind is present.
    ///
    /// Kinds that need a filter are skipped when the table has none. With
    /// `overwrite`, all existing procedures are dropped before any is created.
    pub fn ensure_procedures_created(&mut self, overwrite: bool) -> SyncResult<bool> {
        self.check_preconditions(SyncObject::StoredProcedure(ProcedureKind::SelectChanges))?;

        let mut changed = false;
        if overwrite {
            for kind in ProcedureKind::ALL {
                let object = SyncObject::StoredProcedure(kind);
                if self.exists(object)? {
                    changed |= self.drop_with(object, true)?;
                }
            }
        }
        for kind in ProcedureKind::ALL {
            changed |= self.ensure_created(SyncObject::StoredProcedure(kind), false)?;
        }
        Ok(changed)
    }

    /// Makes sure no stored procedure kind is present.
    pub fn ensure_procedures_absent(&mut self) -> SyncResult<bool> {
        let mut changed = false;
        for kind in ProcedureKind::ALL {
            changed |= self.ensure_absent(SyncObject::StoredProcedure(kind))?;
        }
        Ok(changed)
    }

    fn ensure_schema(&mut self) -> SyncResult<()> {
        if self.table.name.schema.is_none() {
            return Ok(());
        }
        if !self.exists(SyncObject::Schema)? {
            self.create_with(SyncObject::Schema, false)?;
        }
        Ok(())
    }

    fn create_with(&mut self, object: SyncObject, overwrite: bool) -> SyncResult<bool> {
        self.check_preconditions(object)?;
        let Some(command) = self.builder.create_command(object, self.filter) else {
            tracing::debug!(table = %self.table.name, %object, "no create command, skipping");
            return Ok(false);
        };
        let command = match self.interceptors.creating(self.table, object, command) {
            CommandOutcome::Continue(command) => command,
            CommandOutcome::Cancel => {
                tracing::debug!(table = %self.table.name, %object, "creation cancelled by interceptor");
                return Ok(false);
            }
        };

        self.connection
            .execute_non_query(&command)
            .map_err(|e| e.with_context(self.context(object, overwrite)))?;
        tracing::debug!(table = %self.table.name, %object, "created");
        self.interceptors.created(self.table, object, &command);
        Ok(true)
    }

    fn drop_with(&mut self, object: SyncObject, overwrite: bool) -> SyncResult<bool> {
        let Some(command) = self.builder.drop_command(object, self.filter) else {
            tracing::debug!(table = %self.table.name, %object, "no drop command, skipping");
            return Ok(false);
        };
        let command = match self.interceptors.dropping(self.table, object, command) {
            CommandOutcome::Continue(command) => command,
            CommandOutcome::Cancel => {
                tracing::debug!(table = %self.table.name, %object, "drop cancelled by interceptor");
                return Ok(false);
            }
        };

        self.connection
            .execute_non_query(&command)
            .map_err(|e| e.with_context(self.context(object, overwrite)))?;
        tracing::debug!(table = %self.table.name, %object, "dropped");
        self.interceptors.dropped(self.table, object, &command);
        Ok(true)
    }

    fn context(&self, object: SyncObject, overwrite: bool) -> ErrorContext {
        ErrorContext::new(&self.table.name, object, overwrite)
    }
}
