//! # RowSync Engine
//!
//! Provisioning, orchestration and change application for RowSync.
//!
//! This crate provides:
//! - Provider interfaces consumed from database specific crates
//! - A scoped connection guard that rolls back unless committed
//! - The per-table provisioning state machine
//! - The orchestrator running provisioning passes over a scope
//! - The batch applier with conflict resolution
//! - Interception hooks, a session command cache and options
//!
//! ## Architecture
//!
//! The engine never writes SQL. A [`SyncProvider`] supplies connections and
//! per-table [`TableBuilder`]s, and the engine decides which commands to run
//! and in which order:
//! 1. Existence is queried before every create or drop
//! 2. Tables are created parents first and dropped children first
//! 3. A pass runs in one transaction and rolls back as a whole on failure
//!
//! ## Key Invariants
//!
//! - Table-scoped objects need columns and a primary key; this is checked
//!   before any command runs
//! - Provisioning is idempotent: a second pass without overwrite changes nothing
//! - A builder without a command for an object means "not applicable"
//! - Cancellation is checked before every database round trip

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod apply;
mod cache;
mod config;
mod error;
mod interceptor;
mod orchestrator;
mod provider;
mod provision;
mod scoped;

pub use apply::{ApplyConflict, ApplyStats, BatchApplier, ConflictResolution, FORCE_WRITE_PARAMETER};
pub use cache::CommandCache;
pub use config::{SyncOptions, DEFAULT_BATCH_SIZE_BYTES};
pub use error::{DbError, ErrorContext, SyncError, SyncErrorKind, SyncResult};
pub use interceptor::{CommandOutcome, Interceptors};
pub use orchestrator::{Orchestrator, ProvisionFlags};
pub use provider::{DbCommand, DbConnection, DbParameter, SyncProvider, TableBuilder};
pub use provision::ObjectProvisioner;
pub use scoped::{ScopedConnection, SyncStage, TransactionMode};
