//! Interception hooks.
//!
//! Hooks are registered once when the orchestrator is built and are
//! immutable afterwards. "Creating" and "dropping" hooks see the command
//! about to run and decide what happens next through a [`CommandOutcome`];
//! the other hooks are notifications.

use crate::apply::ApplyConflict;
use crate::provider::DbCommand;
use crate::scoped::SyncStage;
use rowsync_core::{SyncObject, SyncTable};
use std::fmt;

/// What to do with a command after a "creating" or "dropping" hook ran.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandOutcome {
    /// Execute this command, which may differ from the one proposed.
    Continue(DbCommand),
    /// Skip execution. The operation reports that nothing changed.
    Cancel,
}

type CommandHook = Box<dyn Fn(&SyncTable, SyncObject, DbCommand) -> CommandOutcome + Send + Sync>;
type NotifyHook = Box<dyn Fn(&SyncTable, SyncObject, &DbCommand) + Send + Sync>;
type StageHook = Box<dyn Fn(SyncStage) + Send + Sync>;
type ConflictHook = Box<dyn Fn(&ApplyConflict<'_>) + Send + Sync>;

/// Registry of interception hooks.
///
/// Several hooks may be registered for the same event; they run in
/// registration order. For command hooks each one receives the command
/// returned by the previous one, and the first `Cancel` wins.
///
/// # Example
///
/// ```rust,ignore
/// let interceptors = Interceptors::new()
///     .on_creating(|table, object, command| {
///         tracing::info!(%object, table = %table.name, "creating");
///         CommandOutcome::Continue(command)
///     })
///     .on_stage_completed(|stage| println!("{stage} done"));
/// ```
#[derive(Default)]
pub struct Interceptors {
    creating: Vec<CommandHook>,
    created: Vec<NotifyHook>,
    dropping: Vec<CommandHook>,
    dropped: Vec<NotifyHook>,
    stage_starting: Vec<StageHook>,
    stage_completed: Vec<StageHook>,
    apply_conflict: Vec<ConflictHook>,
}

impl Interceptors {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs before an object is created.
    #[must_use]
    pub fn on_creating<F>(mut self, hook: F) -> Self
    where
        F: Fn(&SyncTable, SyncObject, DbCommand) -> CommandOutcome + Send + Sync + 'static,
    {
        self.creating.push(Box::new(hook));
        self
    }

    /// Runs after an object was created.
    #[must_use]
    pub fn on_created<F>(mut self, hook: F) -> Self
    where
        F: Fn(&SyncTable, SyncObject, &DbCommand) + Send + Sync + 'static,
    {
        self.created.push(Box::new(hook));
        self
    }

    /// Runs before an object is dropped.
    #[must_use]
    pub fn on_dropping<F>(mut self, hook: F) -> Self
    where
        F: Fn(&SyncTable, SyncObject, DbCommand) -> CommandOutcome + Send + Sync + 'static,
    {
        self.dropping.push(Box::new(hook));
        self
    }

    /// Runs after an object was dropped.
    #[must_use]
    pub fn on_dropped<F>(mut self, hook: F) -> Self
    where
        F: Fn(&SyncTable, SyncObject, &DbCommand) + Send + Sync + 'static,
    {
        self.dropped.push(Box::new(hook));
        self
    }

    /// Runs when a stage starts.
    #[must_use]
    pub fn on_stage_starting<F>(mut self, hook: F) -> Self
    where
        F: Fn(SyncStage) + Send + Sync + 'static,
    {
        self.stage_starting.push(Box::new(hook));
        self
    }

    /// Runs after a stage completed successfully.
    #[must_use]
    pub fn on_stage_completed<F>(mut self, hook: F) -> Self
    where
        F: Fn(SyncStage) + Send + Sync + 'static,
    {
        self.stage_completed.push(Box::new(hook));
        self
    }

    /// Runs for every row conflict met while applying changes.
    #[must_use]
    pub fn on_apply_conflict<F>(mut self, hook: F) -> Self
    where
        F: Fn(&ApplyConflict<'_>) + Send + Sync + 'static,
    {
        self.apply_conflict.push(Box::new(hook));
        self
    }

    pub(crate) fn creating(&self, table: &SyncTable, object: SyncObject, command: DbCommand) -> CommandOutcome {
        chain(&self.creating, table, object, command)
    }

    pub(crate) fn created(&self, table: &SyncTable, object: SyncObject, command: &DbCommand) {
        for hook in &self.created {
            hook(table, object, command);
        }
    }

    pub(crate) fn dropping(&self, table: &SyncTable, object: SyncObject, command: DbCommand) -> CommandOutcome {
        chain(&self.dropping, table, object, command)
    }

    pub(crate) fn dropped(&self, table: &SyncTable, object: SyncObject, command: &DbCommand) {
        for hook in &self.dropped {
            hook(table, object, command);
        }
    }

    pub(crate) fn stage_starting(&self, stage: SyncStage) {
        for hook in &self.stage_starting {
            hook(stage);
        }
    }

    pub(crate) fn stage_completed(&self, stage: SyncStage) {
        for hook in &self.stage_completed {
            hook(stage);
        }
    }

    pub(crate) fn apply_conflict(&self, conflict: &ApplyConflict<'_>) {
        for hook in &self.apply_conflict {
            hook(conflict);
        }
    }
}

fn chain(hooks: &[CommandHook], table: &SyncTable, object: SyncObject, command: DbCommand) -> CommandOutcome {
    let mut command = command;
    for hook in hooks {
        match hook(table, object, command) {
            CommandOutcome::Continue(next) => command = next,
            CommandOutcome::Cancel => return CommandOutcome::Cancel,
        }
    }
    CommandOutcome::Continue(command)
}

impl fmt::Debug for Interceptors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Interceptors")
            .field("creating", &self.creating.len())
            .field("created", &self.created.len())
            .field("dropping", &self.dropping.len())
            .field("dropped", &self.dropped.len())
            .field("stage_starting", &self.stage_starting.len())
            .field("stage_completed", &self.stage_completed.len())
            .field("apply_conflict", &self.apply_conflict.len())
            .finish()
    }
}
