//! Applying batches against the in-memory database.

use proptest::prelude::*;
use rowsync_core::{RowState, RowValue, SyncObject, SyncRow, SyncTable, TableName};
use rowsync_engine::{
    ConflictResolution, Interceptors, ProvisionFlags, SyncError, SyncOptions, SyncStage,
    FORCE_WRITE_PARAMETER,
};
use rowsync_testkit::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn provisioned() -> TestOrchestrator {
    let test = TestOrchestrator::sales();
    test.provision(ProvisionFlags::ALL, false).unwrap();
    test.db.clear_log();
    test
}

fn customer_name(test: &TestOrchestrator, id: i64) -> Option<RowValue> {
    test.db
        .row(&customers_name(), &[RowValue::Int(id)])
        .and_then(|row| row.into_iter().find(|(c, _)| c == "Name").map(|(_, v)| v))
}

#[test]
fn applies_rows_of_every_table() {
    let test = provisioned();
    let root = temp_batch_root();
    let batch = write_batch(
        root.path(),
        0,
        &[
            (customers(), vec![customer_row(1, "Ada"), customer_row(2, "Linus")]),
            (orders(), vec![order_row(10, 1), order_row(11, 2), order_row(12, 2)]),
        ],
    );

    let stats = test.apply_changes(&batch).unwrap();
    assert_eq!(stats.parts, 2);
    assert_eq!(stats.applied, 5);
    assert_eq!(stats.conflicts, 0);
    assert_eq!(test.db.row_count(&customers_name()), 2);
    assert_eq!(test.db.row_count(&orders_name()), 3);
    assert_eq!(customer_name(&test, 1), Some(RowValue::from("Ada")));
    assert_eq!(test.db.log().last().map(String::as_str), Some("COMMIT"));
}

#[test]
fn parents_are_written_before_children() {
    let test = provisioned();
    let root = temp_batch_root();
    // Children first in the batch.
    let batch = write_batch(
        root.path(),
        0,
        &[
            (orders(), vec![order_row(10, 1)]),
            (customers(), vec![customer_row(1, "Ada")]),
        ],
    );

    test.apply_changes(&batch).unwrap();
    let executed = test.db.executed();
    assert_eq!(executed[0], "UPDATE_ROW dbo.Customers CustomerID");
    assert_eq!(executed[1], "UPDATE_ROW dbo.Orders OrderID");
}

#[test]
fn later_parts_win() {
    let test = provisioned();
    let root = temp_batch_root();
    let batch = write_batch(
        root.path(),
        1,
        &[(customers(), vec![customer_row(1, "first"), customer_row(1, "second")])],
    );
    assert_eq!(batch.parts.len(), 2);

    let stats = test.apply_changes(&batch).unwrap();
    assert_eq!(stats.parts, 2);
    assert_eq!(test.db.row_count(&customers_name()), 1);
    assert_eq!(customer_name(&test, 1), Some(RowValue::from("second")));
}

fn seed_customer(test: &TestOrchestrator, id: i64, name: &str) {
    test.db.seed_row(
        &customers_name(),
        &[RowValue::Int(id)],
        vec![("CustomerID".into(), RowValue::Int(id)), ("Name".into(), RowValue::from(name))],
    );
}

#[test]
fn leading_deletes_run_children_first() {
    let test = provisioned();
    seed_customer(&test, 1, "old");
    test.db.seed_row(
        &orders_name(),
        &[RowValue::Int(10)],
        vec![("OrderID".into(), RowValue::Int(10))],
    );
    let root = temp_batch_root();
    let batch = write_batch(
        root.path(),
        0,
        &[
            (customers(), vec![deleted_customer_row(1)]),
            (orders(), vec![SyncRow::deleted(vec![RowValue::Int(10), RowValue::Null, RowValue::Null])]),
            (customers(), vec![customer_row(2, "new")]),
        ],
    );

    let stats = test.apply_changes(&batch).unwrap();
    assert_eq!(stats.applied, 3);
    assert_eq!(stats.conflicts, 0);
    assert_eq!(
        test.db.executed(),
        vec![
            "DELETE_ROW dbo.Orders OrderID",
            "DELETE_ROW dbo.Customers CustomerID",
            "UPDATE_ROW dbo.Customers CustomerID"
        ]
    );
    assert!(customer_name(&test, 1).is_none());
    assert_eq!(test.db.row_count(&orders_name()), 0);
    assert_eq!(customer_name(&test, 2), Some(RowValue::from("new")));
}

#[test]
fn delete_after_update_of_the_same_key_wins() {
    let test = provisioned();
    let root = temp_batch_root();
    let batch = write_batch(
        root.path(),
        0,
        &[(customers(), vec![customer_row(1, "Ada"), deleted_customer_row(1)])],
    );
    let states: Vec<(u32, RowState)> = batch.parts.iter().map(|p| (p.index, p.state)).collect();
    assert_eq!(states, vec![(0, RowState::Modified), (1, RowState::Deleted)]);

    let stats = test.apply_changes(&batch).unwrap();
    assert_eq!(stats.parts, 2);
    assert_eq!(stats.applied, 2);
    assert_eq!(stats.conflicts, 0);
    assert_eq!(
        test.db.executed(),
        vec![
            "UPDATE_ROW dbo.Customers CustomerID",
            "DELETE_ROW dbo.Customers CustomerID"
        ]
    );
    assert!(test.db.row(&customers_name(), &[RowValue::Int(1)]).is_none());
}

#[test]
fn update_after_delete_of_the_same_key_wins() {
    let test = provisioned();
    seed_customer(&test, 1, "old");
    let root = temp_batch_root();
    let batch = write_batch(
        root.path(),
        0,
        &[(
            customers(),
            vec![deleted_customer_row(1), customer_row(1, "back"), deleted_customer_row(1), customer_row(1, "again")],
        )],
    );
    assert_eq!(batch.parts.len(), 4);

    let stats = test.apply_changes(&batch).unwrap();
    assert_eq!(stats.parts, 4);
    assert_eq!(stats.conflicts, 0);
    assert_eq!(customer_name(&test, 1), Some(RowValue::from("again")));
}

#[test]
fn snapshot_rows_are_upserted() {
    let test = provisioned();
    let root = temp_batch_root();
    let snapshot = SyncRow {
        state: RowState::None,
        values: vec![RowValue::Int(7), RowValue::from("Grace")],
    };
    let batch = write_batch(root.path(), 0, &[(customers(), vec![snapshot])]);
    assert_eq!(batch.parts[0].state, RowState::None);

    let stats = test.apply_changes(&batch).unwrap();
    assert_eq!(stats.parts, 1);
    assert_eq!(stats.applied, 1);
    assert_eq!(test.db.executed(), vec!["UPDATE_ROW dbo.Customers CustomerID"]);
    assert_eq!(customer_name(&test, 7), Some(RowValue::from("Grace")));
}

#[test]
fn tables_outside_the_scope_are_skipped() {
    let test = provisioned();
    let audit = SyncTable::new(TableName::with_schema("Audit", "dbo")).with_primary_key("AuditID", "int");
    let root = temp_batch_root();
    let batch = write_batch(
        root.path(),
        0,
        &[
            (audit, vec![SyncRow::modified(vec![RowValue::Int(1)])]),
            (customers(), vec![customer_row(1, "Ada")]),
        ],
    );

    let stats = test.apply_changes(&batch).unwrap();
    assert_eq!(stats.parts, 1);
    assert_eq!(stats.applied, 1);
    assert!(test.db.executed().iter().all(|c| !c.contains("Audit")));
}

#[test]
fn server_wins_forces_conflicting_rows() {
    let test = provisioned();
    test.db.inject_conflict(&customers_name(), &[RowValue::Int(2)]);
    let conflicts = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&conflicts);
    let orchestrator = test.orchestrator.with_interceptors(Interceptors::new().on_apply_conflict(
        move |conflict| {
            assert_eq!(conflict.resolution, ConflictResolution::ServerWins);
            assert_eq!(conflict.row.values[0], RowValue::Int(2));
            counter.fetch_add(1, Ordering::SeqCst);
        },
    ));
    let root = temp_batch_root();
    let batch = write_batch(
        root.path(),
        0,
        &[(customers(), vec![customer_row(1, "Ada"), customer_row(2, "Linus")])],
    );

    let stats = orchestrator.apply_changes(&batch).unwrap();
    assert_eq!(stats.applied, 2);
    assert_eq!(stats.conflicts, 1);
    assert_eq!(stats.forced, 1);
    assert_eq!(stats.skipped, 0);
    assert_eq!(conflicts.load(Ordering::SeqCst), 1);
    assert_eq!(test.db.row_count(&customers_name()), 2);
    assert_eq!(test.db.executed().len(), 3);
}

#[test]
fn client_wins_keeps_the_local_row() {
    let test = provisioned();
    test.db.seed_row(
        &customers_name(),
        &[RowValue::Int(2)],
        vec![("CustomerID".into(), RowValue::Int(2)), ("Name".into(), RowValue::from("local"))],
    );
    test.db.inject_conflict(&customers_name(), &[RowValue::Int(2)]);
    let orchestrator = test.orchestrator.with_options(
        SyncOptions::default().with_conflict_resolution(ConflictResolution::ClientWins),
    );
    let root = temp_batch_root();
    let batch = write_batch(root.path(), 0, &[(customers(), vec![customer_row(2, "remote")])]);

    let stats = orchestrator.apply_changes(&batch).unwrap();
    assert_eq!(stats.applied, 0);
    assert_eq!(stats.conflicts, 1);
    assert_eq!(stats.skipped, 1);
    assert_eq!(
        test.db
            .row(&customers_name(), &[RowValue::Int(2)])
            .and_then(|row| row.into_iter().find(|(c, _)| c == "Name").map(|(_, v)| v)),
        Some(RowValue::from("local"))
    );
}

#[test]
fn failed_apply_rolls_back_and_keeps_the_batch() {
    let test = provisioned();
    test.db.fail_on("UPDATE_ROW dbo.Orders");
    let completed = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&completed);
    let orchestrator = test
        .orchestrator
        .with_interceptors(Interceptors::new().on_stage_completed(move |stage| {
            if stage == SyncStage::ChangesApplying {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        }));
    let root = temp_batch_root();
    let batch = write_batch(
        root.path(),
        0,
        &[
            (customers(), vec![customer_row(1, "Ada")]),
            (orders(), vec![order_row(10, 1)]),
        ],
    );

    let err = orchestrator.apply_changes(&batch).unwrap_err();
    match err {
        SyncError::Execution { context, .. } => {
            assert_eq!(context.table.as_deref(), Some("Orders"));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(test.db.row_count(&customers_name()), 0);
    assert_eq!(test.db.log().last().map(String::as_str), Some("ROLLBACK"));
    assert_eq!(completed.load(Ordering::SeqCst), 0);
    assert!(batch.directory_full_path().exists());
}

#[test]
fn applied_batch_directory_is_removed() {
    let test = provisioned();
    let root = temp_batch_root();
    let batch = write_batch(root.path(), 0, &[(customers(), vec![customer_row(1, "Ada")])]);
    assert!(batch.directory_full_path().exists());

    test.apply_changes(&batch).unwrap();
    assert!(!batch.directory_full_path().exists());
}

#[test]
fn batch_writer_follows_the_options() {
    let test = provisioned();
    let root = temp_batch_root();
    let orchestrator = test.orchestrator.with_options(
        SyncOptions::new(root.path())
            .with_serializer_key("cbor")
            .with_batch_size_bytes(1),
    );

    let mut writer = orchestrator.create_batch_writer().unwrap();
    writer
        .add_rows(
            &customers_name(),
            &column_names(&customers()),
            vec![customer_row(1, "Ada"), customer_row(2, "Linus")],
        )
        .unwrap();
    let batch = writer.finish().unwrap();
    assert_eq!(batch.serializer_key.as_deref(), Some("cbor"));
    assert_eq!(batch.parts.len(), 2);
    assert!(batch.directory_full_path().starts_with(root.path()));

    let stats = orchestrator.apply_changes(&batch).unwrap();
    assert_eq!(stats.applied, 2);
    assert_eq!(test.db.row_count(&customers_name()), 2);
}

#[test]
fn invalid_options_are_rejected() {
    let test = provisioned();
    let orchestrator = test
        .orchestrator
        .with_options(SyncOptions::default().with_serializer_key("xml"));

    let err = orchestrator.create_batch_writer().err().unwrap();
    assert_eq!(err.kind(), rowsync_engine::SyncErrorKind::Configuration);
}

#[test]
fn cleanup_can_be_disabled() {
    let test = provisioned();
    let orchestrator = test
        .orchestrator
        .with_options(SyncOptions::default().with_cleanup_batch_directory(false));
    let root = temp_batch_root();
    let batch = write_batch(root.path(), 0, &[(customers(), vec![customer_row(1, "Ada")])]);

    orchestrator.apply_changes(&batch).unwrap();
    assert!(batch.directory_full_path().exists());
}

#[test]
fn missing_table_fails_the_apply() {
    let test = TestOrchestrator::sales();
    let root = temp_batch_root();
    let batch = write_batch(root.path(), 0, &[(customers(), vec![customer_row(1, "Ada")])]);

    let err = test.apply_changes(&batch).unwrap_err();
    assert!(matches!(err, SyncError::Execution { .. }));
    assert!(!test.db.has_object(&customers_name(), SyncObject::Table));
}

#[test]
fn missing_row_procedure_is_a_configuration_error() {
    let provider = MemoryProvider::default().without(SyncObject::StoredProcedure(
        rowsync_core::ProcedureKind::UpdateRow,
    ));
    let test = TestOrchestrator::with_provider(provider, sales_scope());
    test.create_tables(false).unwrap();
    let root = temp_batch_root();
    let batch = write_batch(root.path(), 0, &[(customers(), vec![customer_row(1, "Ada")])]);

    let err = test.apply_changes(&batch).unwrap_err();
    assert!(matches!(err, SyncError::Configuration(_)));
}

#[test]
fn row_commands_are_cached_per_table() {
    let test = provisioned();
    let root = temp_batch_root();
    let first = write_batch(root.path(), 0, &[(customers(), vec![customer_row(1, "Ada")])]);
    test.apply_changes(&first).unwrap();
    assert_eq!(test.cache().len(), 1);

    test.create_stored_procedure(&customers_name(), rowsync_core::ProcedureKind::UpdateRow, true)
        .unwrap();
    assert!(test.cache().is_empty());
}

#[test]
fn cancelled_apply_runs_nothing() {
    let test = provisioned();
    let root = temp_batch_root();
    let batch = write_batch(root.path(), 0, &[(customers(), vec![customer_row(1, "Ada")])]);
    test.cancel();

    let err = test.apply_changes(&batch).unwrap_err();
    assert!(matches!(
        err,
        SyncError::Cancelled {
            stage: SyncStage::ChangesApplying
        }
    ));
    assert!(test.db.executed().is_empty());
}

#[test]
fn force_parameter_is_not_stored() {
    let test = provisioned();
    let root = temp_batch_root();
    let batch = write_batch(root.path(), 0, &[(customers(), vec![customer_row(1, "Ada")])]);
    test.apply_changes(&batch).unwrap();

    let row = test.db.row(&customers_name(), &[RowValue::Int(1)]).unwrap();
    assert!(row.iter().all(|(c, _)| c != FORCE_WRITE_PARAMETER));
    assert_eq!(row.len(), 2);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn every_generated_row_lands(rows in customer_rows_strategy(40), size in 0usize..256) {
        let test = provisioned();
        let root = temp_batch_root();
        let expected: Vec<SyncRow> = rows.clone();
        let batch = write_batch(root.path(), size, &[(customers(), rows)]);

        let stats = test.apply_changes(&batch).unwrap();
        prop_assert_eq!(stats.applied, expected.len() as u64);
        prop_assert_eq!(test.db.row_count(&customers_name()), expected.len());
        for row in &expected {
            let stored = test.db.row(&customers_name(), &row.values[..1]).unwrap();
            prop_assert_eq!(&stored[1].1, &row.values[1]);
        }
    }
}
