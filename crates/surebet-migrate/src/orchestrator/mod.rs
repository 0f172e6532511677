//! Migration orchestrator - main workflow coordinator.
//!
//! One run moves through `idle -> target-connecting -> schema-provisioning ->
//! copying(i/N) -> aggregating -> released`. Fatal errors (bad target,
//! drift, DDL failure, timeout) stop the run with no table results; a failing
//! table is recorded and the next table is still attempted.

mod result;

pub use result::{MigrationResult, RunOutcome, TableResult, TableStatus};

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::catalog::Catalog;
use crate::connection::{require_url, target_key, ConnectionManager};
use crate::copier::TableCopier;
use crate::error::{MigrateError, Result};
use crate::schema::SchemaProvisioner;

/// Knobs for a migration run.
#[derive(Debug, Clone)]
pub struct RunSettings {
    /// Compare the live source tables with the catalog before touching the target.
    pub check_drift: bool,
    /// Source tables that are expected to exist outside the catalog.
    pub ignore_tables: Vec<String>,
    /// Upper bound on a whole run.
    pub run_timeout: Option<Duration>,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            check_drift: true,
            ignore_tables: Vec::new(),
            run_timeout: None,
        }
    }
}

/// Run phases, logged as the run advances.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Idle,
    TargetConnecting,
    SchemaProvisioning,
    Copying { index: usize, total: usize },
    Aggregating,
    Released,
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunPhase::Idle => f.write_str("idle"),
            RunPhase::TargetConnecting => f.write_str("target-connecting"),
            RunPhase::SchemaProvisioning => f.write_str("schema-provisioning"),
            RunPhase::Copying { index, total } => write!(f, "copying({}/{})", index, total),
            RunPhase::Aggregating => f.write_str("aggregating"),
            RunPhase::Released => f.write_str("released"),
        }
    }
}

/// Migration orchestrator.
pub struct Orchestrator {
    catalog: Arc<Catalog>,
    connections: Arc<ConnectionManager>,
    provisioner: SchemaProvisioner,
    copier: TableCopier,
    settings: RunSettings,
    target_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl Orchestrator {
    pub fn new(
        catalog: Arc<Catalog>,
        connections: Arc<ConnectionManager>,
        settings: RunSettings,
    ) -> Self {
        let provisioner = SchemaProvisioner::new(&catalog);
        let copier = TableCopier::new(connections.source().clone());
        Self {
            catalog,
            connections,
            provisioner,
            copier,
            settings,
            target_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn settings(&self) -> &RunSettings {
        &self.settings
    }

    /// Recreate the schema on `target_url` and copy every catalogued table.
    ///
    /// Never fails: every problem is reported inside the result. Runs against
    /// the same target database are serialized.
    pub async fn execute(&self, target_url: &str) -> MigrationResult {
        let run_id = Uuid::new_v4();
        let started = Instant::now();

        let url = match require_url(target_url) {
            Ok(url) => url,
            Err(e) => {
                error!("Migration run {} rejected: {}", run_id, e);
                return MigrationResult::from_error(&e);
            }
        };

        let key = target_key(url);
        let lock = self.target_lock(&key).await;
        let serialized = match lock.try_lock() {
            Ok(guard) => guard,
            Err(_) => {
                info!("Another migration is running against this target, waiting");
                lock.lock().await
            }
        };

        info!("Starting migration run: {}", run_id);
        let run = self.run(run_id, url);
        let result = match self.settings.run_timeout {
            Some(limit) => match tokio::time::timeout(limit, run).await {
                Ok(result) => result,
                Err(_) => {
                    // The lease was dropped with the cancelled future.
                    let e = MigrateError::Timeout(limit.as_secs());
                    error!("Migration run {} failed: {}", run_id, e);
                    MigrationResult::from_error(&e)
                }
            },
            None => run.await,
        };

        drop(serialized);
        self.release_target_lock(&key, lock).await;

        info!(
            "Migration run {} finished in {:.2}s: success={}, tables={}, records={}",
            run_id,
            started.elapsed().as_secs_f64(),
            result.success,
            result.tables.len(),
            result.total_records
        );
        result
    }

    async fn run(&self, run_id: Uuid, url: &str) -> MigrationResult {
        self.transition(run_id, RunPhase::Idle);
        if let Err(e) = self.preflight().await {
            error!("Migration run {} aborted before connecting: {}", run_id, e);
            return MigrationResult::from_error(&e);
        }

        self.transition(run_id, RunPhase::TargetConnecting);
        let target = match self.connections.acquire_target(url).await {
            Ok(lease) => lease,
            Err(e) => {
                error!("Migration run {} could not connect to target: {}", run_id, e);
                return MigrationResult::from_error(&e);
            }
        };

        self.transition(run_id, RunPhase::SchemaProvisioning);
        if let Err(e) = self.provisioner.provision(&*target).await {
            error!("Migration run {} failed: {}", run_id, e);
            return MigrationResult::from_error(&e);
        }

        let total = self.catalog.len();
        let mut tables = Vec::with_capacity(total);
        for (i, table) in self.catalog.tables().iter().enumerate() {
            self.transition(run_id, RunPhase::Copying { index: i + 1, total });
            match self.copier.copy_table(table, &*target).await {
                Ok(count) => tables.push(TableResult::success(table.name, count)),
                Err(e) => {
                    warn!("{}: failed - {}", table.name, e);
                    tables.push(TableResult::failed(table.name, e.to_string()));
                }
            }
        }

        self.transition(run_id, RunPhase::Aggregating);
        let result = MigrationResult::from_tables(tables);

        target.release();
        self.transition(run_id, RunPhase::Released);

        if result.success {
            info!("Migrated {} records across {} tables", result.total_records, total);
        } else {
            let failed: Vec<&str> = result.failed_tables().map(|t| t.name()).collect();
            warn!("Migration finished with failed tables: {}", failed.join(", "));
        }
        result
    }

    async fn preflight(&self) -> Result<()> {
        if !self.settings.check_drift {
            debug!("Drift check disabled");
            return Ok(());
        }
        let live = self.connections.source().list_tables().await?;
        self.catalog.check_drift(&live, &self.settings.ignore_tables)
    }

    async fn target_lock(&self, key: &str) -> Arc<Mutex<()>> {
        let mut locks = self.target_locks.lock().await;
        locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Forget a target's lock once no run holds or waits on it.
    ///
    /// Waiters clone the lock while holding the map, so a strong count of
    /// one under the map guard means nobody else can reach it.
    async fn release_target_lock(&self, key: &str, lock: Arc<Mutex<()>>) {
        let mut locks = self.target_locks.lock().await;
        drop(lock);
        if locks.get(key).is_some_and(|l| Arc::strong_count(l) == 1) {
            locks.remove(key);
        }
    }

    /// Number of targets with a run in progress or waiting.
    pub async fn active_targets(&self) -> usize {
        self.target_locks.lock().await.len()
    }

    fn transition(&self, run_id: Uuid, phase: RunPhase) {
        debug!("[{}] -> {}", run_id, phase);
    }
}
