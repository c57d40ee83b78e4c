//! # RowSync Core
//!
//! Shared model types for RowSync.
//!
//! This crate provides:
//! - Table identity with case-insensitive matching (`TableName`)
//! - The sync schema (`SyncSet`, `SyncTable`, `SyncColumn`, `SyncRelation`, `SyncFilter`)
//! - Dependency ordering of tables derived from relations
//! - Provisionable object kinds (`SyncObject`, `TriggerKind`, `ProcedureKind`)
//! - Row values and row states carried in batch parts
//! - A cooperative cancellation token
//!
//! This is a pure model crate with no I/O operations.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod cancel;
mod error;
mod name;
mod object;
mod row;
mod schema;
mod scope;

pub use cancel::CancellationToken;
pub use error::{SchemaError, SchemaResult};
pub use name::TableName;
pub use object::{ProcedureKind, SyncObject, TriggerKind};
pub use row::{RowState, RowValue, SyncRow};
pub use schema::{SyncColumn, SyncFilter, SyncRelation, SyncSet, SyncTable};
pub use scope::{ScopeInfo, DEFAULT_SCOPE_NAME};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
