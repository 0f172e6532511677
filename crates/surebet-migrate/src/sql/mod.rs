//! SQL text generation for catalogued tables.
//!
//! Every builder takes a [`TableDescriptor`], so identifiers in statement text
//! can only come from the validated catalog.

pub mod identifier;

use crate::catalog::{Catalog, TableDescriptor};
use crate::value::SqlValue;
use identifier::{quote_list, quote_pg};

/// `DROP TABLE IF EXISTS ... CASCADE`.
pub fn drop_table(table: &TableDescriptor) -> String {
    format!("DROP TABLE IF EXISTS {} CASCADE;", table.name)
}

/// `CREATE TABLE IF NOT EXISTS` block with columns, keys and defaults.
pub fn create_table(table: &TableDescriptor) -> String {
    let columns: Vec<String> = table
        .columns
        .iter()
        .map(|c| format!("  {}", c.definition()))
        .collect();
    format!(
        "CREATE TABLE IF NOT EXISTS {} (\n{}\n);",
        table.name,
        columns.join(",\n")
    )
}

/// `CREATE INDEX IF NOT EXISTS` statements for a table's secondary indexes.
pub fn create_indexes(table: &TableDescriptor) -> Vec<String> {
    table
        .indexes
        .iter()
        .map(|idx| {
            format!(
                "CREATE INDEX IF NOT EXISTS {} ON {}({});",
                idx.name, table.name, idx.column
            )
        })
        .collect()
}

/// Drop statements for every table, children first.
pub fn drop_block(catalog: &Catalog) -> String {
    catalog
        .drop_order()
        .map(drop_table)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Index statements for every table.
///
/// Emitted in the order the source application declares them: the session
/// expiry index first, then foreign-key lookups from the leaf tables inward.
pub fn index_block(catalog: &Catalog) -> String {
    catalog
        .drop_order()
        .flat_map(create_indexes)
        .collect::<Vec<_>>()
        .join("\n")
}

/// The full destructive provisioning script: drops, creates, indexes.
pub fn schema_script(catalog: &Catalog) -> String {
    let creates: Vec<String> = catalog.tables().iter().map(create_table).collect();
    format!(
        "{}\n\n{}\n\n{}\n",
        drop_block(catalog),
        creates.join("\n\n"),
        index_block(catalog)
    )
}

/// Read every row with an explicit column list, ordered by primary key.
pub fn select_all(table: &TableDescriptor) -> String {
    let mut sql = format!(
        "SELECT {} FROM {}",
        quote_list(table.column_names()),
        quote_pg(table.name)
    );
    if let Some(pk) = table.primary_key() {
        sql.push_str(&format!(" ORDER BY {}", quote_pg(pk.name)));
    }
    sql
}

/// Exact row count.
pub fn count_rows(table: &TableDescriptor) -> String {
    format!("SELECT COUNT(*) FROM {}", quote_pg(table.name))
}

/// Tables in the connection's current schema.
pub const LIST_TABLES: &str = "SELECT table_name::text FROM information_schema.tables \
     WHERE table_schema = current_schema() AND table_type = 'BASE TABLE' \
     ORDER BY table_name";

/// Single-row parameterized insert that skips rows whose key already exists.
pub fn insert_row(table: &TableDescriptor) -> String {
    let placeholders: Vec<String> = (1..=table.columns.len())
        .map(|i| format!("${}", i))
        .collect();
    format!(
        "INSERT INTO {} ({}) VALUES ({}) ON CONFLICT DO NOTHING",
        quote_pg(table.name),
        quote_list(table.column_names()),
        placeholders.join(", ")
    )
}

/// Single-row insert with literal values, for exported scripts.
pub fn insert_row_literal(table: &TableDescriptor, row: &[SqlValue]) -> String {
    let values: Vec<String> = row.iter().map(SqlValue::to_literal).collect();
    format!(
        "INSERT INTO {} ({}) VALUES ({}) ON CONFLICT DO NOTHING;",
        quote_pg(table.name),
        quote_list(table.column_names()),
        values.join(", ")
    )
}
