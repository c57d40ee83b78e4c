//! Configuration for the sync engine.

use crate::apply::ConflictResolution;
use crate::error::{SyncError, SyncResult};
use crate::scoped::TransactionMode;
use rowsync_batch::{serializer_for_key, DEFAULT_SERIALIZER_KEY};
use std::path::PathBuf;

/// Default upper bound of a batch part, in estimated bytes.
pub const DEFAULT_BATCH_SIZE_BYTES: usize = 5 * 1024 * 1024;

/// Options of a sync session.
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Root directory under which batch directories are created.
    pub batch_directory: PathBuf,
    /// Upper bound of a batch part in estimated bytes. Zero disables splitting.
    pub batch_size_bytes: usize,
    /// Key of the serializer used for new batches.
    pub serializer_key: String,
    /// How row conflicts are resolved when applying changes.
    pub conflict_resolution: ConflictResolution,
    /// Whether a batch directory is deleted after it was applied.
    pub cleanup_batch_directory: bool,
    /// Transaction mode of provisioning and deprovisioning passes.
    pub provisioning_mode: TransactionMode,
}

impl SyncOptions {
    /// Creates options with batches stored under `batch_directory`.
    pub fn new(batch_directory: impl Into<PathBuf>) -> Self {
        Self {
            batch_directory: batch_directory.into(),
            batch_size_bytes: DEFAULT_BATCH_SIZE_BYTES,
            serializer_key: DEFAULT_SERIALIZER_KEY.to_string(),
            conflict_resolution: ConflictResolution::default(),
            cleanup_batch_directory: true,
            provisioning_mode: TransactionMode::WithTransaction,
        }
    }

    /// Sets the batch part size.
    #[must_use]
    pub fn with_batch_size_bytes(mut self, size: usize) -> Self {
        self.batch_size_bytes = size;
        self
    }

    /// Sets the serializer key.
    #[must_use]
    pub fn with_serializer_key(mut self, key: impl Into<String>) -> Self {
        self.serializer_key = key.into();
        self
    }

    /// Sets the conflict resolution policy.
    #[must_use]
    pub fn with_conflict_resolution(mut self, resolution: ConflictResolution) -> Self {
        self.conflict_resolution = resolution;
        self
    }

    /// Sets whether applied batch directories are deleted.
    #[must_use]
    pub fn with_cleanup_batch_directory(mut self, cleanup: bool) -> Self {
        self.cleanup_batch_directory = cleanup;
        self
    }

    /// Sets the provisioning transaction mode.
    #[must_use]
    pub fn with_provisioning_mode(mut self, mode: TransactionMode) -> Self {
        self.provisioning_mode = mode;
        self
    }

    /// Checks that the options can be used.
    pub fn validate(&self) -> SyncResult<()> {
        if self.batch_directory.as_os_str().is_empty() {
            return Err(SyncError::configuration("batch directory is empty"));
        }
        serializer_for_key(&self.serializer_key)
            .map_err(|e| SyncError::configuration(e.to_string()))?;
        Ok(())
    }
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self::new(std::env::temp_dir().join("rowsync"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SyncErrorKind;

    #[test]
    fn builder() {
        let options = SyncOptions::new("/var/sync")
            .with_batch_size_bytes(1024)
            .with_serializer_key("cbor")
            .with_conflict_resolution(ConflictResolution::ClientWins)
            .with_cleanup_batch_directory(false)
            .with_provisioning_mode(TransactionMode::NoTransaction);

        assert_eq!(options.batch_directory, PathBuf::from("/var/sync"));
        assert_eq!(options.batch_size_bytes, 1024);
        assert_eq!(options.serializer_key, "cbor");
        assert_eq!(options.conflict_resolution, ConflictResolution::ClientWins);
        assert!(!options.cleanup_batch_directory);
        assert_eq!(options.provisioning_mode, TransactionMode::NoTransaction);
        assert!(options.validate().is_ok());
    }

    #[test]
    fn defaults() {
        let options = SyncOptions::default();
        assert_eq!(options.batch_size_bytes, DEFAULT_BATCH_SIZE_BYTES);
        assert_eq!(options.serializer_key, "json");
        assert_eq!(options.conflict_resolution, ConflictResolution::ServerWins);
        assert!(options.cleanup_batch_directory);
        assert_eq!(options.provisioning_mode, TransactionMode::WithTransaction);
    }

    #[test]
    fn unknown_serializer_is_rejected() {
        let err = SyncOptions::default()
            .with_serializer_key("xml")
            .validate()
            .unwrap_err();
        assert_eq!(err.kind(), SyncErrorKind::Configuration);
    }

    #[test]
    fn empty_directory_is_rejected() {
        assert!(SyncOptions::new("").validate().is_err());
    }
}
