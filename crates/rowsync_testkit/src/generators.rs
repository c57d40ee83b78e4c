//! Property-based test generators using proptest.
//!
//! Floats are left out of the value strategies: not every part format
//! round-trips them bit for bit.

use proptest::prelude::*;
use rowsync_core::{RowState, RowValue, SyncRow, TableName};

/// Strategy for generating scalar row values.
pub fn row_value_strategy() -> impl Strategy<Value = RowValue> {
    prop_oneof![
        Just(RowValue::Null),
        any::<bool>().prop_map(RowValue::Bool),
        any::<i64>().prop_map(RowValue::Int),
        "[a-zA-Z0-9 ]{0,32}".prop_map(RowValue::Text),
        prop::collection::vec(any::<u8>(), 0..32).prop_map(RowValue::Bytes),
    ]
}

/// Strategy for generating valid table names, with or without a schema.
pub fn table_name_strategy() -> impl Strategy<Value = TableName> {
    (
        prop::string::string_regex("[A-Z][a-zA-Z0-9]{0,15}").expect("Invalid regex"),
        prop::option::of(prop::string::string_regex("[a-z]{1,8}").expect("Invalid regex")),
    )
        .prop_map(|(name, schema)| match schema {
            Some(schema) => TableName::with_schema(name, schema),
            None => TableName::new(name),
        })
}

/// Strategy for generating rows of `width` values in `state`.
pub fn sync_row_strategy(width: usize, state: RowState) -> impl Strategy<Value = SyncRow> {
    prop::collection::vec(row_value_strategy(), width).prop_map(move |values| SyncRow { state, values })
}

/// Strategy for generating modified customer rows with unique ids.
///
/// Rows follow the column order of the customers fixture.
pub fn customer_rows_strategy(max_rows: usize) -> impl Strategy<Value = Vec<SyncRow>> {
    prop::collection::btree_map(1i64..100_000, "[a-zA-Z ]{1,24}", 1..max_rows.max(2)).prop_map(
        |rows| {
            rows.into_iter()
                .map(|(id, name)| SyncRow::modified(vec![RowValue::Int(id), RowValue::Text(name)]))
                .collect()
        },
    )
}
