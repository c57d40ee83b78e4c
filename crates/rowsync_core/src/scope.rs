//! Scope information.

use crate::schema::SyncSet;
use serde::{Deserialize, Serialize};

/// Default scope name used when the caller does not name one.
pub const DEFAULT_SCOPE_NAME: &str = "DefaultScope";

/// A named group of tables synchronized together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeInfo {
    /// Scope name.
    pub name: String,
    /// Schema of every table in the scope.
    pub schema: SyncSet,
    /// Version of the provisioned objects.
    pub version: String,
    /// Watermark of the last successful sync, if any.
    pub last_sync_timestamp: Option<i64>,
}

impl ScopeInfo {
    /// Creates a scope over `schema`.
    pub fn new(name: impl Into<String>, schema: SyncSet) -> Self {
        Self {
            name: name.into(),
            schema,
            version: env!("CARGO_PKG_VERSION").to_string(),
            last_sync_timestamp: None,
        }
    }

    /// Creates the default scope over `schema`.
    pub fn with_default_name(schema: SyncSet) -> Self {
        Self::new(DEFAULT_SCOPE_NAME, schema)
    }

    /// Returns true if the scope has tables with columns to provision.
    pub fn is_provisionable(&self) -> bool {
        self.schema.has_tables() && self.schema.has_columns()
    }
}
