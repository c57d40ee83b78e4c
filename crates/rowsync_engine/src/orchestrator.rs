//! Orchestration driver.
//!
//! The [`Orchestrator`] runs provisioning passes over a whole scope or a
//! single table. Each pass:
//!
//! 1. Returns `false` straight away for a scope without tables or columns
//! 2. Acquires a scoped connection for its stage
//! 3. Orders the tables (dependency order for tables, declaration order
//!    otherwise)
//! 4. Runs the per-table state machine, accumulating whether anything changed
//! 5. Commits
//!
//! A failure anywhere drops the connection without commit, which rolls the
//! whole pass back.

use crate::apply::{ApplyStats, BatchApplier};
use crate::cache::CommandCache;
use crate::config::SyncOptions;
use crate::error::SyncResult;
use crate::interceptor::Interceptors;
use crate::provider::SyncProvider;
use crate::provision::ObjectProvisioner;
use crate::scoped::{ScopedConnection, SyncStage, TransactionMode};
use rowsync_batch::{serializer_for_key, BatchInfo, BatchWriter};
use rowsync_core::{
    CancellationToken, ProcedureKind, ScopeInfo, SyncObject, SyncTable, TableName, TriggerKind,
};

/// Which objects a provisioning pass covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProvisionFlags {
    /// The tables themselves.
    pub table: bool,
    /// Tracking tables.
    pub tracking_table: bool,
    /// Insert, update and delete triggers.
    pub triggers: bool,
    /// Stored procedures.
    pub stored_procedures: bool,
}

impl ProvisionFlags {
    /// Every object.
    pub const ALL: Self = Self {
        table: true,
        tracking_table: true,
        triggers: true,
        stored_procedures: true,
    };

    /// Only the change tracking objects, leaving user tables alone.
    pub const TRACKING: Self = Self {
        table: false,
        tracking_table: true,
        triggers: true,
        stored_procedures: true,
    };

    /// No object.
    pub const NONE: Self = Self {
        table: false,
        tracking_table: false,
        triggers: false,
        stored_procedures: false,
    };

    /// Returns true if no object is selected.
    pub fn is_empty(&self) -> bool {
        *self == Self::NONE
    }
}

impl Default for ProvisionFlags {
    fn default() -> Self {
        Self::ALL
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TableOrder {
    Declaration,
    Dependency,
    ReverseDependency,
}

/// Drives provisioning, deprovisioning and change application for one scope.
///
/// # Example
///
/// ```rust,ignore
/// let orchestrator = Orchestrator::new(provider, scope)
///     .with_options(SyncOptions::new("/var/sync"))
///     .with_interceptors(Interceptors::new().on_stage_completed(|stage| println!("{stage}")));
///
/// orchestrator.provision(ProvisionFlags::ALL, false)?;
/// ```
pub struct Orchestrator<P: SyncProvider> {
    provider: P,
    scope: ScopeInfo,
    options: SyncOptions,
    interceptors: Interceptors,
    cache: CommandCache,
    cancellation: CancellationToken,
}

impl<P: SyncProvider> Orchestrator<P> {
    /// Creates an orchestrator for `scope`.
    pub fn new(provider: P, scope: ScopeInfo) -> Self {
        Self {
            provider,
            scope,
            options: SyncOptions::default(),
            interceptors: Interceptors::new(),
            cache: CommandCache::new(),
            cancellation: CancellationToken::new(),
        }
    }

    /// Sets the options.
    #[must_use]
    pub fn with_options(mut self, options: SyncOptions) -> Self {
        self.options = options;
        self
    }

    /// Sets the interception hooks.
    #[must_use]
    pub fn with_interceptors(mut self, interceptors: Interceptors) -> Self {
        self.interceptors = interceptors;
        self
    }

    /// Sets the cancellation token.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    /// Returns the provider.
    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Returns the scope.
    pub fn scope(&self) -> &ScopeInfo {
        &self.scope
    }

    /// Returns the options.
    pub fn options(&self) -> &SyncOptions {
        &self.options
    }

    /// Returns the session command cache.
    pub fn cache(&self) -> &CommandCache {
        &self.cache
    }

    /// Returns the cancellation token.
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    /// Requests cancellation of the running operation.
    pub fn cancel(&self) {
        self.cancellation.cancel();
    }

    // Scope-level passes.

    /// Creates every table, parents first.
    pub fn create_tables(&self, overwrite: bool) -> SyncResult<bool> {
        self.for_each_table(SyncStage::Provisioning, TableOrder::Dependency, |p| {
            p.ensure_created(SyncObject::Table, overwrite)
        })
    }

    /// Drops every table, children first.
    pub fn drop_tables(&self) -> SyncResult<bool> {
        self.for_each_table(SyncStage::Deprovisioning, TableOrder::ReverseDependency, |p| {
            p.ensure_absent(SyncObject::Table)
        })
    }

    /// Creates every tracking table.
    pub fn create_tracking_tables(&self, overwrite: bool) -> SyncResult<bool> {
        self.for_each_table(SyncStage::Provisioning, TableOrder::Declaration, |p| {
            p.ensure_created(SyncObject::TrackingTable, overwrite)
        })
    }

    /// Drops every tracking table.
    pub fn drop_tracking_tables(&self) -> SyncResult<bool> {
        self.for_each_table(SyncStage::Deprovisioning, TableOrder::Declaration, |p| {
            p.ensure_absent(SyncObject::TrackingTable)
        })
    }

    /// Creates every trigger of every table.
    pub fn create_triggers(&self, overwrite: bool) -> SyncResult<bool> {
        self.for_each_table(SyncStage::Provisioning, TableOrder::Declaration, |p| {
            p.ensure_triggers_created(overwrite)
        })
    }

    /// Drops every trigger of every table.
    pub fn drop_triggers(&self) -> SyncResult<bool> {
        self.for_each_table(SyncStage::Deprovisioning, TableOrder::Declaration, |p| {
            p.ensure_triggers_absent()
        })
    }

    /// Creates every applicable stored procedure of every table.
    pub fn create_stored_procedures(&self, overwrite: bool) -> SyncResult<bool> {
        self.for_each_table(SyncStage::Provisioning, TableOrder::Declaration, |p| {
            self.cache.invalidate_table(&p.table().name);
            p.ensure_procedures_created(overwrite)
        })
    }

    /// Drops every stored procedure of every table.
    pub fn drop_stored_procedures(&self) -> SyncResult<bool> {
        self.for_each_table(SyncStage::Deprovisioning, TableOrder::Declaration, |p| {
            self.cache.invalidate_table(&p.table().name);
            p.ensure_procedures_absent()
        })
    }

    /// Creates the objects selected by `flags` for every table, parents first.
    pub fn provision(&self, flags: ProvisionFlags, overwrite: bool) -> SyncResult<bool> {
        if flags.is_empty() {
            return Ok(false);
        }
        self.for_each_table(SyncStage::Provisioning, TableOrder::Dependency, |p| {
            let mut changed = false;
            if flags.table {
                changed |= p.ensure_created(SyncObject::Table, overwrite)?;
            }
            if flags.tracking_table {
                changed |= p.ensure_created(SyncObject::TrackingTable, overwrite)?;
            }
            if flags.triggers {
                changed |= p.ensure_triggers_created(overwrite)?;
            }
            if flags.stored_procedures {
                self.cache.invalidate_table(&p.table().name);
                changed |= p.ensure_procedures_created(overwrite)?;
            }
            Ok(changed)
        })
    }

    /// Drops the objects selected by `flags` for every table, children first.
    pub fn deprovision(&self, flags: ProvisionFlags) -> SyncResult<bool> {
        if flags.is_empty() {
            return Ok(false);
        }
        self.for_each_table(SyncStage::Deprovisioning, TableOrder::ReverseDependency, |p| {
            let mut changed = false;
            if flags.stored_procedures {
                self.cache.invalidate_table(&p.table().name);
                changed |= p.ensure_procedures_absent()?;
            }
            if flags.triggers {
                changed |= p.ensure_triggers_absent()?;
            }
            if flags.tracking_table {
                changed |= p.ensure_absent(SyncObject::TrackingTable)?;
            }
            if flags.table {
                changed |= p.ensure_absent(SyncObject::Table)?;
            }
            Ok(changed)
        })
    }

    // Single-table operations.

    /// Creates the schema of `table`.
    pub fn create_schema(&self, table: &TableName) -> SyncResult<bool> {
        self.on_table(table, SyncStage::Provisioning, |p| {
            p.ensure_created(SyncObject::Schema, false)
        })
    }

    /// Returns true if the schema of `table` exists.
    pub fn schema_exists(&self, table: &TableName) -> SyncResult<bool> {
        self.exists(table, SyncObject::Schema)
    }

    /// Creates `table`.
    pub fn create_table(&self, table: &TableName, overwrite: bool) -> SyncResult<bool> {
        self.on_table(table, SyncStage::Provisioning, |p| {
            p.ensure_created(SyncObject::Table, overwrite)
        })
    }

    /// Drops `table`.
    pub fn drop_table(&self, table: &TableName) -> SyncResult<bool> {
        self.on_table(table, SyncStage::Deprovisioning, |p| {
            p.ensure_absent(SyncObject::Table)
        })
    }

    /// Returns true if `table` exists.
    pub fn table_exists(&self, table: &TableName) -> SyncResult<bool> {
        self.exists(table, SyncObject::Table)
    }

    /// Creates the tracking table of `table`.
    pub fn create_tracking_table(&self, table: &TableName, overwrite: bool) -> SyncResult<bool> {
        self.on_table(table, SyncStage::Provisioning, |p| {
            p.ensure_created(SyncObject::TrackingTable, overwrite)
        })
    }

    /// Drops the tracking table of `table`.
    pub fn drop_tracking_table(&self, table: &TableName) -> SyncResult<bool> {
        self.on_table(table, SyncStage::Deprovisioning, |p| {
            p.ensure_absent(SyncObject::TrackingTable)
        })
    }

    /// Returns true if the tracking table of `table` exists.
    pub fn tracking_table_exists(&self, table: &TableName) -> SyncResult<bool> {
        self.exists(table, SyncObject::TrackingTable)
    }

    /// Creates one trigger of `table`.
    pub fn create_trigger(&self, table: &TableName, kind: TriggerKind, overwrite: bool) -> SyncResult<bool> {
        self.on_table(table, SyncStage::Provisioning, |p| {
            p.ensure_created(SyncObject::Trigger(kind), overwrite)
        })
    }

    /// Drops one trigger of `table`.
    pub fn drop_trigger(&self, table: &TableName, kind: TriggerKind) -> SyncResult<bool> {
        self.on_table(table, SyncStage::Deprovisioning, |p| {
            p.ensure_absent(SyncObject::Trigger(kind))
        })
    }

    /// Returns true if one trigger of `table` exists.
    pub fn trigger_exists(&self, table: &TableName, kind: TriggerKind) -> SyncResult<bool> {
        self.exists(table, SyncObject::Trigger(kind))
    }

    /// Creates one stored procedure of `table`.
    pub fn create_stored_procedure(
        &self,
        table: &TableName,
        kind: ProcedureKind,
        overwrite: bool,
    ) -> SyncResult<bool> {
        self.on_table(table, SyncStage::Provisioning, |p| {
            self.cache.invalidate_table(&p.table().name);
            p.ensure_created(SyncObject::StoredProcedure(kind), overwrite)
        })
    }

    /// Drops one stored procedure of `table`.
    pub fn drop_stored_procedure(&self, table: &TableName, kind: ProcedureKind) -> SyncResult<bool> {
        self.on_table(table, SyncStage::Deprovisioning, |p| {
            self.cache.invalidate_table(&p.table().name);
            p.ensure_absent(SyncObject::StoredProcedure(kind))
        })
    }

    /// Returns true if one stored procedure of `table` exists.
    pub fn stored_procedure_exists(&self, table: &TableName, kind: ProcedureKind) -> SyncResult<bool> {
        self.exists(table, SyncObject::StoredProcedure(kind))
    }

    // Batches.

    /// Starts a new batch under the configured batch directory.
    pub fn create_batch_writer(&self) -> SyncResult<BatchWriter> {
        self.options.validate()?;
        let serializer = serializer_for_key(&self.options.serializer_key)?;
        let writer = BatchWriter::create(
            &self.options.batch_directory,
            serializer,
            self.options.batch_size_bytes,
        )?
        .with_cancellation(self.cancellation.clone());
        Ok(writer)
    }

    /// Applies `batch` in one transaction.
    ///
    /// The batch directory is removed afterwards when the options ask for
    /// it. A failed apply leaves the directory in place.
    pub fn apply_changes(&self, batch: &BatchInfo) -> SyncResult<ApplyStats> {
        if !self.scope.is_provisionable() {
            return Ok(ApplyStats::default());
        }

        let stage = SyncStage::ChangesApplying;
        self.interceptors.stage_starting(stage);
        let mut connection = ScopedConnection::acquire(
            &self.provider,
            TransactionMode::WithTransaction,
            stage,
            &self.cancellation,
        )?;

        let stats = BatchApplier::new(&self.scope.schema, &self.cache, &self.interceptors)
            .with_resolution(self.options.conflict_resolution)
            .apply(&self.provider, &mut connection, batch)?;
        connection.commit()?;
        self.interceptors.stage_completed(stage);

        if self.options.cleanup_batch_directory {
            batch.try_remove_directory();
        }
        Ok(stats)
    }

    // Dispatch.

    fn for_each_table<F>(&self, stage: SyncStage, order: TableOrder, step: F) -> SyncResult<bool>
    where
        F: FnMut(&mut ObjectProvisioner<'_, P::Connection, P::Builder>) -> SyncResult<bool>,
    {
        if !self.scope.is_provisionable() {
            return Ok(false);
        }
        let tables: Vec<&SyncTable> = match order {
            TableOrder::Declaration => self.scope.schema.tables.iter().collect(),
            TableOrder::Dependency => self.scope.schema.tables_by_dependency()?,
            TableOrder::ReverseDependency => {
                let mut tables = self.scope.schema.tables_by_dependency()?;
                tables.reverse();
                tables
            }
        };
        self.run(stage, self.options.provisioning_mode, &tables, step)
    }

    fn on_table<F>(&self, table: &TableName, stage: SyncStage, step: F) -> SyncResult<bool>
    where
        F: FnMut(&mut ObjectProvisioner<'_, P::Connection, P::Builder>) -> SyncResult<bool>,
    {
        if !self.scope.is_provisionable() {
            return Ok(false);
        }
        let table = self.scope.schema.require_table(table)?;
        self.run(stage, self.options.provisioning_mode, &[table], step)
    }

    fn exists(&self, table: &TableName, object: SyncObject) -> SyncResult<bool> {
        if !self.scope.is_provisionable() {
            return Ok(false);
        }
        let table = self.scope.schema.require_table(table)?;
        let mut connection = ScopedConnection::acquire(
            &self.provider,
            TransactionMode::NoTransaction,
            SyncStage::Provisioning,
            &self.cancellation,
        )?;
        let builder = self.provider.table_builder(table);
        let filter = self.scope.schema.filter_for(&table.name);
        let exists = ObjectProvisioner::new(table, filter, &builder, &mut connection, &self.interceptors)
            .exists(object)?;
        connection.commit()?;
        Ok(exists)
    }

    fn run<F>(&self, stage: SyncStage, mode: TransactionMode, tables: &[&SyncTable], mut step: F) -> SyncResult<bool>
    where
        F: FnMut(&mut ObjectProvisioner<'_, P::Connection, P::Builder>) -> SyncResult<bool>,
    {
        self.interceptors.stage_starting(stage);
        let mut connection = ScopedConnection::acquire(&self.provider, mode, stage, &self.cancellation)?;

        let mut changed = false;
        for table in tables {
            connection.check_cancelled()?;
            let builder = self.provider.table_builder(table);
            let filter = self.scope.schema.filter_for(&table.name);
            let mut provisioner =
                ObjectProvisioner::new(table, filter, &builder, &mut connection, &self.interceptors);
            changed |= step(&mut provisioner)?;
        }

        connection.commit()?;
        self.interceptors.stage_completed(stage);
        tracing::info!(scope = %self.scope.name, %stage, tables = tables.len(), changed, "pass completed");
        Ok(changed)
    }
}
