//! # RowSync Testkit
//!
//! Test utilities for RowSync.
//!
//! This crate provides:
//! - An in-memory database and provider with a spy command log,
//!   transactional staging, failure and conflict injection
//! - Schema fixtures (the customers / orders / line items scope)
//! - Property-based test generators using proptest
//!
//! ## Usage
//!
//! ```rust,ignore
//! use rowsync_testkit::prelude::*;
//!
//! #[test]
//! fn provisions_tables() {
//!     let test = TestOrchestrator::sales();
//!     assert!(test.create_tables(false).unwrap());
//!     assert!(test.db.has_object(&customers_name(), SyncObject::Table));
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod memory;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::memory::*;
}

pub use fixtures::*;
pub use generators::*;
pub use memory::*;
