//! Schema fixtures and batch helpers.
//!
//! The sales fixture has three tables where `Orders` references `Customers`
//! and `LineItems` references `Orders`. Tables are declared children first
//! so that dependency ordering is visible in tests.

use crate::memory::{MemoryDatabase, MemoryProvider};
use rowsync_batch::{BatchInfo, BatchWriter, JsonSerializer};
use rowsync_core::{
    RowValue, ScopeInfo, SyncColumn, SyncFilter, SyncRelation, SyncRow, SyncSet, SyncTable,
    TableName,
};
use rowsync_engine::Orchestrator;
use std::path::Path;
use tempfile::TempDir;

/// Name of the customers table.
pub fn customers_name() -> TableName {
    TableName::with_schema("Customers", "dbo")
}

/// Name of the orders table.
pub fn orders_name() -> TableName {
    TableName::with_schema("Orders", "dbo")
}

/// Name of the line items table.
pub fn line_items_name() -> TableName {
    TableName::with_schema("LineItems", "dbo")
}

/// `dbo.Customers(CustomerID, Name)`.
pub fn customers() -> SyncTable {
    SyncTable::new(customers_name())
        .with_primary_key("CustomerID", "int")
        .with_column(SyncColumn::new("Name", "nvarchar(100)"))
}

/// `dbo.Orders(OrderID, CustomerID, OrderDate)`.
pub fn orders() -> SyncTable {
    SyncTable::new(orders_name())
        .with_primary_key("OrderID", "int")
        .with_column(SyncColumn::new("CustomerID", "int"))
        .with_column(SyncColumn::new("OrderDate", "datetime").nullable())
}

/// `dbo.LineItems(LineItemID, OrderID, Quantity)`.
pub fn line_items() -> SyncTable {
    SyncTable::new(line_items_name())
        .with_primary_key("LineItemID", "int")
        .with_column(SyncColumn::new("OrderID", "int"))
        .with_column(SyncColumn::new("Quantity", "int"))
}

/// The three sales tables with their relations, declared children first.
pub fn sales_schema() -> SyncSet {
    SyncSet::new()
        .with_table(line_items())
        .with_table(customers())
        .with_table(orders())
        .with_relation(SyncRelation::new(
            "FK_Orders_Customers",
            orders_name(),
            "CustomerID",
            customers_name(),
            "CustomerID",
        ))
        .with_relation(SyncRelation::new(
            "FK_LineItems_Orders",
            line_items_name(),
            "OrderID",
            orders_name(),
            "OrderID",
        ))
}

/// The default scope over [`sales_schema`].
pub fn sales_scope() -> ScopeInfo {
    ScopeInfo::with_default_name(sales_schema())
}

/// [`sales_scope`] with a filter on `Orders` by customer.
pub fn filtered_sales_scope() -> ScopeInfo {
    let schema = sales_schema().with_filter(SyncFilter::new(orders_name(), vec!["CustomerID".into()]));
    ScopeInfo::new("FilteredScope", schema)
}

/// A table without any column.
pub fn table_without_columns() -> SyncTable {
    SyncTable::new(TableName::with_schema("Empty", "dbo"))
}

/// A table with columns but no primary key.
pub fn table_without_primary_key() -> SyncTable {
    SyncTable::new(TableName::with_schema("Heap", "dbo"))
        .with_column(SyncColumn::new("Value", "int"))
}

/// Returns the column names of `table`.
pub fn column_names(table: &SyncTable) -> Vec<String> {
    table.columns.iter().map(|c| c.name.clone()).collect()
}

/// A modified customer row.
pub fn customer_row(id: i64, name: &str) -> SyncRow {
    SyncRow::modified(vec![RowValue::Int(id), RowValue::from(name)])
}

/// A deleted customer row.
pub fn deleted_customer_row(id: i64) -> SyncRow {
    SyncRow::deleted(vec![RowValue::Int(id), RowValue::Null])
}

/// A modified order row.
pub fn order_row(id: i64, customer_id: i64) -> SyncRow {
    SyncRow::modified(vec![RowValue::Int(id), RowValue::Int(customer_id), RowValue::Null])
}

/// An orchestrator over a fresh in-memory database.
pub struct TestOrchestrator {
    /// The orchestrator.
    pub orchestrator: Orchestrator<MemoryProvider>,
    /// The database behind it.
    pub db: MemoryDatabase,
}

impl TestOrchestrator {
    /// Creates an orchestrator for `scope`.
    pub fn new(scope: ScopeInfo) -> Self {
        Self::with_provider(MemoryProvider::default(), scope)
    }

    /// Creates an orchestrator for `scope` over `provider`.
    pub fn with_provider(provider: MemoryProvider, scope: ScopeInfo) -> Self {
        let db = provider.database().clone();
        Self {
            orchestrator: Orchestrator::new(provider, scope),
            db,
        }
    }

    /// Creates an orchestrator over the sales scope.
    pub fn sales() -> Self {
        Self::new(sales_scope())
    }
}

impl std::ops::Deref for TestOrchestrator {
    type Target = Orchestrator<MemoryProvider>;

    fn deref(&self) -> &Self::Target {
        &self.orchestrator
    }
}

/// Creates a temporary root for batch directories.
pub fn temp_batch_root() -> TempDir {
    TempDir::new().expect("Failed to create temp directory")
}

/// Writes one JSON batch under `root` from `(table, rows)` pairs.
pub fn write_batch(root: &Path, batch_size_bytes: usize, tables: &[(SyncTable, Vec<SyncRow>)]) -> BatchInfo {
    let mut writer = BatchWriter::create(root, Box::new(JsonSerializer), batch_size_bytes)
        .expect("Failed to create batch writer");
    for (table, rows) in tables {
        writer
            .add_rows(&table.name, &column_names(table), rows.iter().cloned())
            .expect("Failed to add rows");
    }
    writer.finish().expect("Failed to finish batch")
}
