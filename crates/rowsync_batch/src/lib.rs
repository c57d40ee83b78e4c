//! # RowSync Batch
//!
//! Batch part files and batch manifests for RowSync.
//!
//! Change sets that do not fit in memory are split into bounded part files
//! stored in a per-run directory. This crate provides:
//! - `BatchPartInfo`, the descriptor of one part file
//! - `BatchInfo`, the manifest of a whole batch (`summary.json`)
//! - The deterministic part file naming scheme and directory lifecycle
//! - JSON and CBOR part serializers
//! - `BatchWriter`, which partitions a row stream into parts
//!
//! ## Key Invariants
//!
//! - Part indices are unique within a batch and never exceed four digits
//! - Parts of one table are consumed in ascending index order
//! - Exactly one part, the one with the highest index, is flagged as last
//! - Part files are written once and never rewritten
//! - Directory cleanup is best effort and never fails the caller

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod info;
pub mod layout;
mod part;
mod serializer;
mod writer;

pub use error::{BatchError, BatchResult};
pub use info::BatchInfo;
pub use layout::{generate_new_file_name, SUMMARY_FILE};
pub use part::BatchPartInfo;
pub use serializer::{
    serializer_for_key, BatchPartContent, BatchSerializer, CborSerializer, JsonSerializer,
    DEFAULT_SERIALIZER_KEY,
};
pub use writer::BatchWriter;
