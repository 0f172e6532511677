//! Row-by-row table copy from the source to a target.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info};

use crate::catalog::TableDescriptor;
use crate::connection::{SourceReader, TargetWriter};
use crate::error::{MigrateError, Result};
use crate::value::check_row_shape;

/// Copies one table at a time from the shared source.
pub struct TableCopier {
    source: Arc<dyn SourceReader>,
}

impl TableCopier {
    pub fn new(source: Arc<dyn SourceReader>) -> Self {
        Self { source }
    }

    /// Copy every source row of `table` into the target.
    ///
    /// Returns the number of source rows processed. Rows whose primary key is
    /// already present on the target are skipped but still counted. The first
    /// failing insert aborts the table; rows inserted before it stay.
    pub async fn copy_table(&self, table: &TableDescriptor, target: &dyn TargetWriter) -> Result<i64> {
        let started = Instant::now();
        let rows = self.source.fetch_rows(table).await?;

        if rows.is_empty() {
            info!("{}: no rows", table.name);
            return Ok(0);
        }

        let mut inserted: u64 = 0;
        for row in &rows {
            check_row_shape(table, row)?;
            inserted += target
                .insert_row(table, row)
                .await
                .map_err(|e| MigrateError::transfer(table.name, e.to_string()))?;
        }

        let processed = rows.len() as u64;
        debug!(
            "{}: {} inserted, {} skipped as already present",
            table.name,
            inserted,
            processed.saturating_sub(inserted)
        );
        info!(
            "{}: copied {} rows in {:.2}s",
            table.name,
            processed,
            started.elapsed().as_secs_f64()
        );

        Ok(processed as i64)
    }
}
