//! Batch manifest.

use crate::error::{BatchError, BatchResult};
use crate::layout::{self, SUMMARY_FILE, SUMMARY_TEMP};
use crate::part::BatchPartInfo;
use crate::serializer::{serializer_for_key, BatchPartContent, BatchSerializer, DEFAULT_SERIALIZER_KEY};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, Write};
use std::path::{Path, PathBuf};

/// Manifest of one batch: the directory holding its part files and a
/// descriptor for every part.
///
/// The manifest is persisted as `summary.json` next to the parts:
///
/// ```json
/// { "dirname": "...", "dir": "/tmp/batches", "ts": 42, "count": 8, "ser": "json",
///   "parts": [{ "file": "Customers_0000_ab12.json", "index": 0, "last": true,
///               "rc": 8, "tn": "Customers", "ts": "dbo", "state": 1 }] }
/// ```
///
/// # Invariants
///
/// - Part indices are unique within a batch
/// - After [`BatchInfo::ensure_last_batch`], exactly the part with the highest
///   index is flagged as last
/// - File paths are always resolved through [`BatchInfo::directory_full_path`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchInfo {
    /// Name of the batch directory.
    #[serde(rename = "dirname")]
    pub directory_name: String,
    /// Directory that contains the batch directory.
    #[serde(rename = "dir")]
    pub directory_root: PathBuf,
    /// Source watermark the batch was selected at.
    #[serde(rename = "ts", default)]
    pub timestamp: i64,
    /// Part descriptors.
    #[serde(default)]
    pub parts: Vec<BatchPartInfo>,
    /// Total number of rows, stored independently of the parts.
    #[serde(rename = "count")]
    pub rows_count: u32,
    /// Key of the serializer the parts were written with.
    #[serde(rename = "ser", default, skip_serializing_if = "Option::is_none")]
    pub serializer_key: Option<String>,
}

impl BatchInfo {
    /// Creates an empty batch under `directory_root` with a fresh directory name.
    ///
    /// Nothing is created on disk.
    pub fn new(directory_root: impl Into<PathBuf>, serializer_key: Option<String>) -> Self {
        Self::with_directory_name(directory_root, layout::new_directory_name(), serializer_key)
    }

    /// Creates an empty batch with an explicit directory name.
    pub fn with_directory_name(
        directory_root: impl Into<PathBuf>,
        directory_name: impl Into<String>,
        serializer_key: Option<String>,
    ) -> Self {
        Self {
            directory_name: directory_name.into(),
            directory_root: directory_root.into(),
            timestamp: 0,
            parts: Vec::new(),
            rows_count: 0,
            serializer_key,
        }
    }

    /// Returns the full path of the batch directory.
    #[must_use]
    pub fn directory_full_path(&self) -> PathBuf {
        self.directory_root.join(&self.directory_name)
    }

    /// Returns the full path of a part file.
    #[must_use]
    pub fn part_path(&self, part: &BatchPartInfo) -> PathBuf {
        self.directory_full_path().join(&part.file_name)
    }

    /// Returns a new part file path and name. The file is not created.
    ///
    /// # Errors
    ///
    /// Returns `IndexOverflow` when `index` needs more than four digits.
    pub fn new_part_path(
        &self,
        table_name: &str,
        index: u32,
        extension: &str,
        info: &str,
    ) -> BatchResult<(PathBuf, String)> {
        let file_name = layout::generate_new_file_name(index, table_name, extension, info)?;
        Ok((self.directory_full_path().join(&file_name), file_name))
    }

    /// Appends a part descriptor. Call [`BatchInfo::ensure_last_batch`] afterwards.
    pub fn add_part(&mut self, part: BatchPartInfo) {
        self.parts.push(part);
    }

    /// Returns the index the next part should use.
    pub fn next_part_index(&self) -> u32 {
        self.parts.iter().map(|p| p.index.saturating_add(1)).max().unwrap_or(0)
    }

    /// Returns true if any part holds at least one row.
    pub fn has_data(&self) -> bool {
        self.parts.iter().any(|p| p.rows_count > 0)
    }

    /// Returns true if any part of the given table holds at least one row.
    pub fn has_table_data(&self, table_name: &str, schema_name: Option<&str>) -> bool {
        self.parts
            .iter()
            .filter(|p| p.is_for_table(table_name, schema_name))
            .any(|p| p.rows_count > 0)
    }

    /// Returns the non-empty parts of a table, in ascending index order.
    ///
    /// Parts of one table must be applied in this order. An unknown table
    /// yields an empty iterator.
    pub fn parts_for_table<'a>(
        &'a self,
        table_name: &'a str,
        schema_name: Option<&'a str>,
    ) -> impl Iterator<Item = &'a BatchPartInfo> + 'a {
        let mut parts: Vec<&BatchPartInfo> = self
            .parts
            .iter()
            .filter(|p| p.rows_count > 0 && p.is_for_table(table_name, schema_name))
            .collect();
        parts.sort_by_key(|p| p.index);
        parts.into_iter()
    }

    /// Flags the part with the highest index as the last one, and clears the
    /// flag everywhere else. Recomputes from scratch on every call.
    pub fn ensure_last_batch(&mut self) {
        let Some(max_index) = self.parts.iter().map(|p| p.index).max() else {
            return;
        };
        for part in &mut self.parts {
            part.is_last_batch = part.index == max_index;
        }
    }

    /// Returns the sum of the part row counts.
    pub fn parts_rows_count(&self) -> u32 {
        self.parts
            .iter()
            .fold(0u32, |acc, p| acc.saturating_add(p.rows_count))
    }

    /// Makes `rows_count` agree with the parts.
    ///
    /// Returns false if the stored count disagreed. The sum over parts is
    /// authoritative.
    pub fn reconcile_rows_count(&mut self) -> bool {
        let sum = self.parts_rows_count();
        if sum == self.rows_count {
            return true;
        }
        tracing::warn!(
            directory = %self.directory_name,
            stored = self.rows_count,
            computed = sum,
            "batch row count does not match its parts, using the part sum"
        );
        self.rows_count = sum;
        false
    }

    /// Returns the serializer that reads this batch's parts.
    pub fn serializer(&self) -> BatchResult<Box<dyn BatchSerializer>> {
        serializer_for_key(self.serializer_key.as_deref().unwrap_or(DEFAULT_SERIALIZER_KEY))
    }

    /// Reads the contents of a part.
    pub fn read_part(&self, part: &BatchPartInfo) -> BatchResult<BatchPartContent> {
        self.serializer()?.read_part(&self.part_path(part))
    }

    /// Saves the manifest as `summary.json` in the batch directory.
    ///
    /// Uses write-then-rename so a reader never sees a partial manifest.
    pub fn save_summary(&self) -> BatchResult<PathBuf> {
        let dir = self.directory_full_path();
        fs::create_dir_all(&dir)?;

        let temp_path = dir.join(SUMMARY_TEMP);
        let summary_path = dir.join(SUMMARY_FILE);

        let data = serde_json::to_vec_pretty(self)?;
        let mut file = File::create(&temp_path)?;
        file.write_all(&data)?;
        file.sync_all()?;
        drop(file);

        fs::rename(&temp_path, &summary_path)?;
        Ok(summary_path)
    }

    /// Loads the manifest of the batch directory at `dir`.
    ///
    /// The directory may have been moved since it was written: the root and
    /// name are taken from `dir`, not from the manifest. The stored row count
    /// is reconciled with the parts.
    pub fn load_summary(dir: &Path) -> BatchResult<Self> {
        let summary_path = dir.join(SUMMARY_FILE);
        if !summary_path.exists() {
            return Err(BatchError::invalid_manifest(format!(
                "no {SUMMARY_FILE} in {}",
                dir.display()
            )));
        }

        let reader = BufReader::new(File::open(&summary_path)?);
        let mut info: BatchInfo = serde_json::from_reader(reader)?;

        let name = dir
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| BatchError::invalid_manifest("batch directory has no name"))?;
        if name != info.directory_name {
            tracing::debug!(
                recorded = %info.directory_name,
                actual = name,
                "batch directory was renamed"
            );
        }
        info.directory_name = name.to_string();
        info.directory_root = dir.parent().map(Path::to_path_buf).unwrap_or_default();

        info.reconcile_rows_count();
        Ok(info)
    }

    /// Deletes the batch directory and everything in it.
    ///
    /// Failures are ignored: cleanup is advisory and nothing depends on it.
    pub fn try_remove_directory(&self) {
        layout::try_remove_dir(&self.directory_full_path());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rowsync_core::{RowState, TableName};

    fn part(table: &str, index: u32, rows: u32) -> BatchPartInfo {
        BatchPartInfo::new(
            format!("{table}_{index:04}.json"),
            index,
            &TableName::new(table),
            RowState::Modified,
            rows,
        )
    }

    fn info_with(parts: Vec<BatchPartInfo>) -> BatchInfo {
        let mut info = BatchInfo::with_directory_name("/tmp/batches", "run", None);
        for p in parts {
            info.add_part(p);
        }
        info
    }

    #[test]
    fn full_path_joins_root_and_name() {
        let info = BatchInfo::with_directory_name("/tmp/batches", "run1", None);
        assert_eq!(info.directory_full_path(), PathBuf::from("/tmp/batches/run1"));
    }

    #[test]
    fn new_part_path_does_not_create_file() {
        let dir = tempfile::tempdir().unwrap();
        let info = BatchInfo::new(dir.path(), None);
        let (path, name) = info.new_part_path("Customers", 1, "json", "").unwrap();
        assert!(name.starts_with("Customers_0001_"));
        assert_eq!(path, info.directory_full_path().join(&name));
        assert!(!path.exists());
    }

    #[test]
    fn last_batch_follows_max_index() {
        let mut info = info_with(vec![part("T", 0, 1), part("T", 2, 1), part("T", 1, 1)]);
        info.ensure_last_batch();
        let last: Vec<u32> = info.parts.iter().filter(|p| p.is_last_batch).map(|p| p.index).collect();
        assert_eq!(last, vec![2]);

        info.add_part(part("T", 3, 1));
        info.ensure_last_batch();
        info.ensure_last_batch();
        let last: Vec<u32> = info.parts.iter().filter(|p| p.is_last_batch).map(|p| p.index).collect();
        assert_eq!(last, vec![3]);
    }

    #[test]
    fn ensure_last_batch_on_empty_is_noop() {
        let mut info = info_with(vec![]);
        info.ensure_last_batch();
        assert!(info.parts.is_empty());
    }

    #[test]
    fn parts_for_table_filters_and_orders() {
        let info = info_with(vec![part("T2", 2, 3), part("T1", 1, 0), part("T1", 0, 5)]);

        let t1: Vec<u32> = info.parts_for_table("T1", None).map(|p| p.index).collect();
        assert_eq!(t1, vec![0]);

        assert_eq!(info.parts_for_table("T3", None).count(), 0);
    }

    #[test]
    fn parts_for_table_ascending() {
        let info = info_with(vec![part("T1", 5, 1), part("T1", 1, 1), part("T1", 3, 1)]);
        let indices: Vec<u32> = info.parts_for_table("t1", Some("")).map(|p| p.index).collect();
        assert_eq!(indices, vec![1, 3, 5]);
    }

    #[test]
    fn has_data_semantics() {
        assert!(!info_with(vec![]).has_data());
        assert!(!info_with(vec![part("T1", 0, 0)]).has_data());

        let info = info_with(vec![part("T1", 0, 0), part("T2", 1, 4)]);
        assert!(info.has_data());
        assert!(!info.has_table_data("T1", Some("")));
        assert!(info.has_table_data("t2", Some("")));
        assert!(!info.has_table_data("T3", None));
    }

    #[test]
    fn next_part_index() {
        assert_eq!(info_with(vec![]).next_part_index(), 0);
        assert_eq!(info_with(vec![part("T", 0, 1), part("T", 4, 1)]).next_part_index(), 5);
    }

    #[test]
    fn next_part_index_saturates() {
        let info = info_with(vec![part("T", 3, 1), part("T", u32::MAX, 1)]);
        assert_eq!(info.next_part_index(), u32::MAX);
    }

    #[test]
    fn reconcile_uses_part_sum() {
        let mut info = info_with(vec![part("T", 0, 2), part("T", 1, 3)]);
        info.rows_count = 99;
        assert!(!info.reconcile_rows_count());
        assert_eq!(info.rows_count, 5);
        assert!(info.reconcile_rows_count());
    }

    #[test]
    fn summary_requires_count() {
        let json = r#"{ "dirname": "run", "dir": "/tmp", "ts": 1, "parts": [] }"#;
        assert!(serde_json::from_str::<BatchInfo>(json).is_err());
    }

    #[test]
    fn remove_directory_swallows_errors() {
        let info = BatchInfo::with_directory_name("/nonexistent/root", "run", None);
        info.try_remove_directory();
    }

    #[test]
    fn remove_directory_keeps_a_file_in_its_place() {
        let root = tempfile::tempdir().unwrap();
        std::fs::write(root.path().join("run"), b"not a batch").unwrap();
        let info = BatchInfo::with_directory_name(root.path(), "run", None);

        info.try_remove_directory();
        assert!(root.path().join("run").is_file());
    }
}
