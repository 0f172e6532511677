//! Destructive target schema provisioning.

use tracing::{debug, info};

use crate::catalog::Catalog;
use crate::connection::TargetWriter;
use crate::error::{MigrateError, Result};
use crate::sql;

/// Drops and recreates the catalogued tables on a target.
#[derive(Debug, Clone)]
pub struct SchemaProvisioner {
    script: String,
}

impl SchemaProvisioner {
    pub fn new(catalog: &Catalog) -> Self {
        Self {
            script: sql::schema_script(catalog),
        }
    }

    /// The exact DDL sent to the target.
    pub fn script(&self) -> &str {
        &self.script
    }

    /// Run the script as a single batch.
    ///
    /// Any existing data in the catalogued tables is lost. There is no
    /// rollback of statements that ran before a failure.
    pub async fn provision(&self, target: &dyn TargetWriter) -> Result<()> {
        debug!("Provisioning target schema ({} bytes of DDL)", self.script.len());
        target
            .execute_script(&self.script)
            .await
            .map_err(|e| MigrateError::Schema(e.to_string()))?;
        info!("Target schema recreated");
        Ok(())
    }
}
