//! Offline export of the source database as a replayable SQL script.
//!
//! Nothing here opens a target connection. The script recreates the schema
//! and loads every row with literal `INSERT ... ON CONFLICT DO NOTHING`
//! statements, all inside one transaction.

use std::fmt::Write as _;
use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::catalog::{Catalog, TableDescriptor};
use crate::connection::SourceReader;
use crate::error::Result;
use crate::orchestrator::RunSettings;
use crate::sql;
use crate::value::{check_row_shape, Row};

/// Suggested download name for an exported script.
pub const EXPORT_FILE_NAME: &str = "supabase_migration.sql";

/// Content type for an exported script.
pub const EXPORT_CONTENT_TYPE: &str = "application/sql";

/// Row count for one table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableCount {
    pub name: String,
    pub count: i64,
}

/// Preview of what an export would contain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportStats {
    pub tables: Vec<TableCount>,
    pub total_records: i64,
}

/// Reads the source and renders scripts or counts.
pub struct Exporter {
    catalog: Arc<Catalog>,
    source: Arc<dyn SourceReader>,
    settings: RunSettings,
}

impl Exporter {
    pub fn new(catalog: Arc<Catalog>, source: Arc<dyn SourceReader>, settings: RunSettings) -> Self {
        Self {
            catalog,
            source,
            settings,
        }
    }

    /// Row counts per table, without reading any rows.
    pub async fn get_stats(&self) -> Result<ExportStats> {
        let mut tables = Vec::with_capacity(self.catalog.len());
        for table in self.catalog.tables() {
            let count = self.source.count_rows(table).await?;
            tables.push(TableCount {
                name: table.name.to_string(),
                count,
            });
        }
        let total_records = tables.iter().map(|t| t.count).sum();
        Ok(ExportStats {
            tables,
            total_records,
        })
    }

    /// Render the full script.
    ///
    /// Every table is read before anything is rendered, so a read failure
    /// returns an error and never a truncated script.
    pub async fn export_sql(&self) -> Result<String> {
        if self.settings.check_drift {
            let live = self.source.list_tables().await?;
            self.catalog.check_drift(&live, &self.settings.ignore_tables)?;
        }

        let mut data: Vec<(&TableDescriptor, Vec<Row>)> = Vec::with_capacity(self.catalog.len());
        for table in self.catalog.tables() {
            let rows = self.source.fetch_rows(table).await?;
            for row in &rows {
                check_row_shape(table, row)?;
            }
            debug!("Export read {} rows from {}", rows.len(), table.name);
            data.push((table, rows));
        }

        let script = render_script(&self.catalog, &data);
        let total: usize = data.iter().map(|(_, rows)| rows.len()).sum();
        info!(
            "Exported {} records from {} tables ({} bytes)",
            total,
            data.len(),
            script.len()
        );
        Ok(script)
    }
}

fn render_script(catalog: &Catalog, data: &[(&TableDescriptor, Vec<Row>)]) -> String {
    let mut out = String::new();
    let total: usize = data.iter().map(|(_, rows)| rows.len()).sum();

    // Writing into a String cannot fail.
    let _ = writeln!(out, "-- Surebet tracker database export");
    let _ = writeln!(
        out,
        "-- Generated: {}",
        Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
    );
    let _ = writeln!(out, "-- Source tables:");
    for (table, rows) in data {
        let _ = writeln!(out, "--   {}: {} rows", table.name, rows.len());
    }
    let _ = writeln!(out, "-- Total records: {}", total);
    let _ = writeln!(out, "--");
    let _ = writeln!(out, "-- WARNING: drops and recreates every table listed above.");
    out.push('\n');

    out.push_str("BEGIN;\n\n");
    out.push_str(&sql::drop_block(catalog));
    out.push_str("\n\n");

    for (table, rows) in data {
        let _ = writeln!(out, "-- {}", table.name);
        out.push_str(&sql::create_table(table));
        out.push('\n');
        for row in rows {
            out.push_str(&sql::insert_row_literal(table, row));
            out.push('\n');
        }
        out.push('\n');
    }

    out.push_str(&sql::index_block(catalog));
    out.push_str("\n\nCOMMIT;\n");
    out
}
