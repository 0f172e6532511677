//! PostgreSQL source and target backed by deadpool-postgres.

use std::time::Duration;

use async_trait::async_trait;
use deadpool_postgres::{Manager, ManagerConfig, Pool, PoolError, RecyclingMethod, Runtime};
use tokio_postgres::config::SslMode as PgSslMode;
use tokio_postgres::types::ToSql;
use tokio_postgres::Config as PgConfig;
use tracing::{debug, warn};

use super::tls::{SslMode, TlsBuilder};
use super::{SourceReader, TargetConnector, TargetWriter};
use crate::catalog::TableDescriptor;
use crate::error::{driver_message, MigrateError, Result};
use crate::sql;
use crate::value::{Row, SqlValue};

/// Default time allowed to establish a single connection.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

fn build_pool(
    url: &str,
    ssl_mode: SslMode,
    max_size: usize,
    connect_timeout: Duration,
    context: &str,
) -> Result<Pool> {
    let mut pg_config: PgConfig = url
        .parse()
        .map_err(|e: tokio_postgres::Error| {
            MigrateError::Config(format!("Invalid connection string: {}", e))
        })?;

    pg_config.keepalives(true);
    pg_config.keepalives_idle(Duration::from_secs(30));
    pg_config.connect_timeout(connect_timeout);
    // The configured mode wins over any sslmode in the URL.
    pg_config.ssl_mode(if ssl_mode.requires_tls() {
        PgSslMode::Require
    } else {
        PgSslMode::Disable
    });

    let mgr_config = ManagerConfig {
        recycling_method: RecyclingMethod::Fast,
    };

    let mgr = match TlsBuilder::new(ssl_mode).build()? {
        Some(tls) => Manager::from_config(pg_config, tls, mgr_config),
        None => {
            warn!("PostgreSQL TLS is disabled. Credentials will be transmitted in plaintext.");
            Manager::from_config(pg_config, tokio_postgres::NoTls, mgr_config)
        }
    };

    Pool::builder(mgr)
        .max_size(max_size.max(1))
        .runtime(Runtime::Tokio1)
        .create_timeout(Some(connect_timeout))
        .wait_timeout(Some(connect_timeout))
        .build()
        .map_err(|e| MigrateError::pool(e, context))
}

/// Message for a pool checkout failure. Backend errors carry the server's
/// own text (bad password, unknown database) instead of "db error".
fn pool_message(e: PoolError) -> String {
    match e {
        PoolError::Backend(pg) => driver_message(&pg),
        other => other.to_string(),
    }
}

/// The application's own database, read for migrations and exports.
pub struct PgSource {
    pool: Pool,
}

impl PgSource {
    /// Build the source pool. Connections open lazily on first use.
    pub fn new(url: &str, ssl_mode: SslMode, max_connections: usize) -> Result<Self> {
        let pool = build_pool(
            url,
            ssl_mode,
            max_connections,
            DEFAULT_CONNECT_TIMEOUT,
            "creating PostgreSQL source pool",
        )?;
        Ok(Self { pool })
    }

    async fn client(&self, context: &str) -> Result<deadpool_postgres::Object> {
        self.pool
            .get()
            .await
            .map_err(|e| MigrateError::source_pool(pool_message(e), context))
    }
}

#[async_trait]
impl SourceReader for PgSource {
    async fn fetch_rows(&self, table: &TableDescriptor) -> Result<Vec<Row>> {
        let client = self.client("reading source table").await?;
        let rows = client
            .query(sql::select_all(table).as_str(), &[])
            .await
            .map_err(MigrateError::Source)?;

        let mut out = Vec::with_capacity(rows.len());
        for row in &rows {
            let mut values = Vec::with_capacity(table.columns.len());
            for (idx, column) in table.columns.iter().enumerate() {
                let value = SqlValue::from_row(row, idx, column)
                    .map_err(|e| MigrateError::decode(table.name, column.name, &e))?;
                values.push(value);
            }
            out.push(values);
        }
        debug!("Fetched {} rows from {}", out.len(), table.name);
        Ok(out)
    }

    async fn count_rows(&self, table: &TableDescriptor) -> Result<i64> {
        let client = self.client("counting source rows").await?;
        let row = client
            .query_one(sql::count_rows(table).as_str(), &[])
            .await
            .map_err(MigrateError::Source)?;
        row.try_get::<_, i64>(0).map_err(MigrateError::Source)
    }

    async fn list_tables(&self) -> Result<Vec<String>> {
        let client = self.client("listing source tables").await?;
        let rows = client
            .query(sql::LIST_TABLES, &[])
            .await
            .map_err(MigrateError::Source)?;
        rows.iter()
            .map(|r| r.try_get::<_, String>(0).map_err(MigrateError::Source))
            .collect()
    }
}

/// An opened target pool.
pub struct PgTarget {
    pool: Pool,
}

impl PgTarget {
    async fn client(&self, context: &str) -> Result<deadpool_postgres::Object> {
        self.pool
            .get()
            .await
            .map_err(|e| MigrateError::pool(pool_message(e), context))
    }
}

#[async_trait]
impl TargetWriter for PgTarget {
    async fn execute_script(&self, script: &str) -> Result<()> {
        let client = self.client("running target script").await?;
        client
            .batch_execute(script)
            .await
            .map_err(MigrateError::Target)
    }

    async fn insert_row(&self, table: &TableDescriptor, row: &[SqlValue]) -> Result<u64> {
        let client = self.client("inserting target row").await?;
        let stmt = client
            .prepare_cached(&sql::insert_row(table))
            .await
            .map_err(MigrateError::Target)?;

        let params: Vec<Box<dyn ToSql + Sync + Send>> = row.iter().map(SqlValue::to_param).collect();
        let refs: Vec<&(dyn ToSql + Sync)> = params
            .iter()
            .map(|p| p.as_ref() as &(dyn ToSql + Sync))
            .collect();

        client
            .execute(&stmt, &refs)
            .await
            .map_err(MigrateError::Target)
    }

    fn close(&self) {
        self.pool.close();
    }
}

/// Opens [`PgTarget`] pools.
#[derive(Debug, Clone)]
pub struct PgConnector {
    ssl_mode: SslMode,
    max_connections: usize,
    connect_timeout: Duration,
}

impl PgConnector {
    pub fn new(ssl_mode: SslMode, max_connections: usize, connect_timeout: Duration) -> Self {
        Self {
            ssl_mode,
            max_connections,
            connect_timeout,
        }
    }
}

impl Default for PgConnector {
    fn default() -> Self {
        Self::new(SslMode::default(), 4, DEFAULT_CONNECT_TIMEOUT)
    }
}

#[async_trait]
impl TargetConnector for PgConnector {
    async fn connect(&self, url: &str) -> Result<Box<dyn TargetWriter>> {
        let pool = build_pool(
            url,
            self.ssl_mode,
            self.max_connections,
            self.connect_timeout,
            "creating PostgreSQL target pool",
        )?;

        let ping = async {
            let client = pool
                .get()
                .await
                .map_err(|e| {
                    MigrateError::pool(pool_message(e), "testing PostgreSQL target connection")
                })?;
            client
                .simple_query("SELECT 1")
                .await
                .map_err(MigrateError::Target)?;
            Ok::<_, MigrateError>(())
        };

        if let Err(e) = ping.await {
            pool.close();
            return Err(e);
        }

        Ok(Box::new(PgTarget { pool }))
    }
}
