//! Entry points used by the operator-facing surface.

use std::sync::Arc;

use tracing::info;

use crate::catalog::Catalog;
use crate::config::Config;
use crate::connection::{
    describe_endpoint, ConnectionCheck, ConnectionManager, PgSource, SourceReader, TargetConnector,
};
use crate::error::Result;
use crate::export::{ExportStats, Exporter};
use crate::orchestrator::{MigrationResult, Orchestrator, RunSettings};

/// Migration service: connection checks, live migrations and SQL exports
/// against one long-lived source.
pub struct MigrationService {
    connections: Arc<ConnectionManager>,
    orchestrator: Orchestrator,
    exporter: Exporter,
}

impl MigrationService {
    /// Wire the service from configuration. The source pool is created here
    /// and shared by every later operation.
    pub fn from_config(config: &Config) -> Result<Self> {
        config.validate()?;
        let source = PgSource::new(
            &config.source.url,
            config.source.ssl_mode,
            config.source.max_connections,
        )?;
        info!(
            "Source configured: {} (ssl_mode={})",
            describe_endpoint(&config.source.url),
            config.source.ssl_mode
        );
        Ok(Self::new(
            Catalog::surebet(),
            Arc::new(source),
            Arc::new(config.target.connector()),
            config.migration.run_settings(),
        ))
    }

    /// Wire the service from explicit parts.
    pub fn new(
        catalog: Catalog,
        source: Arc<dyn SourceReader>,
        connector: Arc<dyn TargetConnector>,
        settings: RunSettings,
    ) -> Self {
        let catalog = Arc::new(catalog);
        let connections = Arc::new(ConnectionManager::new(source.clone(), connector));
        let orchestrator = Orchestrator::new(catalog.clone(), connections.clone(), settings.clone());
        let exporter = Exporter::new(catalog, source, settings);
        Self {
            connections,
            orchestrator,
            exporter,
        }
    }

    /// Check that a target accepts connections.
    pub async fn test_connection(&self, target_url: &str) -> ConnectionCheck {
        self.connections.test_connection(target_url).await
    }

    /// Recreate the schema on a target and copy all data into it.
    pub async fn execute_migration(&self, target_url: &str) -> MigrationResult {
        self.orchestrator.execute(target_url).await
    }

    /// The run coordinator behind [`Self::execute_migration`].
    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    /// Row counts an export would contain.
    pub async fn export_stats(&self) -> Result<ExportStats> {
        self.exporter.get_stats().await
    }

    /// The source database as a replayable SQL script.
    pub async fn export_sql(&self) -> Result<String> {
        self.exporter.export_sql().await
    }
}
