//! Producer side of a batch: splits a change stream into part files.

use crate::error::{BatchError, BatchResult};
use crate::info::BatchInfo;
use crate::part::BatchPartInfo;
use crate::serializer::{BatchPartContent, BatchSerializer};
use rowsync_core::{CancellationToken, RowState, SyncRow, TableName};
use std::fs;
use std::path::PathBuf;

/// Rows waiting to be flushed into the next part.
struct PendingPart {
    table: TableName,
    columns: Vec<String>,
    state: RowState,
    rows: Vec<SyncRow>,
    size: usize,
}

/// Writes selected changes into a fresh batch directory.
///
/// Rows are buffered per table and row state. A part is flushed when the
/// table or the state changes, or when the next row would push the part over
/// the configured size. Part indices are global to the batch and increase by
/// one per part.
///
/// # Example
///
/// ```rust,ignore
/// let mut writer = BatchWriter::create("/var/sync/batches", Box::new(JsonSerializer), 64 * 1024)?;
/// writer.add_rows(&customers, &columns, rows)?;
/// let info = writer.finish()?;
/// ```
pub struct BatchWriter {
    info: BatchInfo,
    serializer: Box<dyn BatchSerializer>,
    batch_size_bytes: usize,
    pending: Option<PendingPart>,
    cancellation: CancellationToken,
}

impl BatchWriter {
    /// Creates the batch directory under `root` and returns a writer for it.
    ///
    /// A `batch_size_bytes` of zero disables splitting: each table and state
    /// goes into a single part.
    pub fn create(
        root: impl Into<PathBuf>,
        serializer: Box<dyn BatchSerializer>,
        batch_size_bytes: usize,
    ) -> BatchResult<Self> {
        let info = BatchInfo::new(root, Some(serializer.key().to_string()));
        fs::create_dir_all(info.directory_full_path())?;
        tracing::debug!(directory = %info.directory_full_path().display(), "batch directory created");

        Ok(Self {
            info,
            serializer,
            batch_size_bytes,
            pending: None,
            cancellation: CancellationToken::new(),
        })
    }

    /// Sets the source watermark recorded in the manifest.
    #[must_use]
    pub fn with_timestamp(mut self, timestamp: i64) -> Self {
        self.info.timestamp = timestamp;
        self
    }

    /// Sets the token checked before every part write.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    /// Returns the manifest built so far.
    pub fn info(&self) -> &BatchInfo {
        &self.info
    }

    /// Adds one row of `table`.
    pub fn add_row(&mut self, table: &TableName, columns: &[String], row: SyncRow) -> BatchResult<()> {
        let switch = self
            .pending
            .as_ref()
            .is_some_and(|p| &p.table != table || p.state != row.state);
        if switch {
            self.flush()?;
        }

        let size = row.estimated_size();
        let full = self.pending.as_ref().is_some_and(|p| {
            self.batch_size_bytes > 0 && !p.rows.is_empty() && p.size + size > self.batch_size_bytes
        });
        if full {
            self.flush()?;
        }

        let pending = self.pending.get_or_insert_with(|| PendingPart {
            table: table.clone(),
            columns: columns.to_vec(),
            state: row.state,
            rows: Vec::new(),
            size: 0,
        });
        pending.size += size;
        pending.rows.push(row);
        Ok(())
    }

    /// Adds every row of `rows` for `table`.
    pub fn add_rows<I>(&mut self, table: &TableName, columns: &[String], rows: I) -> BatchResult<()>
    where
        I: IntoIterator<Item = SyncRow>,
    {
        for row in rows {
            self.add_row(table, columns, row)?;
        }
        Ok(())
    }

    /// Writes the buffered rows, if any, as a new part.
    pub fn flush(&mut self) -> BatchResult<()> {
        let Some(pending) = self.pending.take() else {
            return Ok(());
        };
        if pending.rows.is_empty() {
            return Ok(());
        }
        if self.cancellation.is_cancelled() {
            return Err(BatchError::Cancelled);
        }

        let index = self.info.next_part_index();
        let (path, file_name) = self.info.new_part_path(
            &pending.table.name,
            index,
            self.serializer.extension(),
            "",
        )?;

        let rows_count = u32::try_from(pending.rows.len()).unwrap_or(u32::MAX);
        let content =
            BatchPartContent::new(&pending.table, pending.columns, pending.state, pending.rows);
        self.serializer.write_part(&path, &content)?;

        tracing::debug!(
            table = %pending.table,
            index,
            rows = rows_count,
            file = %file_name,
            "batch part written"
        );

        self.info.add_part(BatchPartInfo::new(
            file_name,
            index,
            &pending.table,
            pending.state,
            rows_count,
        ));
        self.info.rows_count = self.info.rows_count.saturating_add(rows_count);
        Ok(())
    }

    /// Flushes the last part, finalizes the manifest and saves it.
    pub fn finish(mut self) -> BatchResult<BatchInfo> {
        self.flush()?;
        self.info.ensure_last_batch();
        self.info.save_summary()?;

        tracing::info!(
            directory = %self.info.directory_name,
            parts = self.info.parts.len(),
            rows = self.info.rows_count,
            "batch completed"
        );
        Ok(self.info)
    }

    /// Discards the batch and deletes its directory.
    pub fn abort(self) {
        self.info.try_remove_directory();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serializer::JsonSerializer;
    use rowsync_core::RowValue;

    fn columns() -> Vec<String> {
        vec!["Id".into()]
    }

    fn int_row(v: i64) -> SyncRow {
        // 1 byte of state + 8 bytes of value
        SyncRow::modified(vec![RowValue::Int(v)])
    }

    #[test]
    fn splits_by_size() {
        let dir = tempfile::tempdir().unwrap();
        let table = TableName::new("T");
        let mut writer = BatchWriter::create(dir.path(), Box::new(JsonSerializer), 20).unwrap();
        writer.add_rows(&table, &columns(), (0..5).map(int_row)).unwrap();
        let info = writer.finish().unwrap();

        let counts: Vec<u32> = info.parts.iter().map(|p| p.rows_count).collect();
        assert_eq!(counts, vec![2, 2, 1]);
        assert_eq!(info.rows_count, 5);
        assert!(info.parts[2].is_last_batch);
    }

    #[test]
    fn oversized_row_gets_its_own_part() {
        let dir = tempfile::tempdir().unwrap();
        let table = TableName::new("T");
        let mut writer = BatchWriter::create(dir.path(), Box::new(JsonSerializer), 4).unwrap();
        writer.add_rows(&table, &columns(), (0..2).map(int_row)).unwrap();
        let info = writer.finish().unwrap();
        assert_eq!(info.parts.len(), 2);
    }

    #[test]
    fn state_change_starts_new_part() {
        let dir = tempfile::tempdir().unwrap();
        let table = TableName::new("T");
        let mut writer = BatchWriter::create(dir.path(), Box::new(JsonSerializer), 0).unwrap();
        writer.add_row(&table, &columns(), int_row(1)).unwrap();
        writer
            .add_row(&table, &columns(), SyncRow::deleted(vec![RowValue::Int(2)]))
            .unwrap();
        let info = writer.finish().unwrap();

        let states: Vec<RowState> = info.parts.iter().map(|p| p.state).collect();
        assert_eq!(states, vec![RowState::Modified, RowState::Deleted]);
    }

    #[test]
    fn empty_batch_has_no_parts() {
        let dir = tempfile::tempdir().unwrap();
        let writer = BatchWriter::create(dir.path(), Box::new(JsonSerializer), 0).unwrap();
        let info = writer.finish().unwrap();
        assert!(info.parts.is_empty());
        assert!(!info.has_data());
        assert!(info.directory_full_path().join(crate::SUMMARY_FILE).exists());
    }

    #[test]
    fn cancelled_writer_stops_at_flush() {
        let dir = tempfile::tempdir().unwrap();
        let token = CancellationToken::new();
        let mut writer = BatchWriter::create(dir.path(), Box::new(JsonSerializer), 0)
            .unwrap()
            .with_cancellation(token.clone());
        writer.add_row(&TableName::new("T"), &columns(), int_row(1)).unwrap();
        token.cancel();
        assert!(matches!(writer.flush(), Err(BatchError::Cancelled)));
    }

    #[test]
    fn abort_removes_directory() {
        let dir = tempfile::tempdir().unwrap();
        let writer = BatchWriter::create(dir.path(), Box::new(JsonSerializer), 0).unwrap();
        let path = writer.info().directory_full_path();
        assert!(path.exists());
        writer.abort();
        assert!(!path.exists());
    }
}
