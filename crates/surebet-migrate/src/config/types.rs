//! Configuration type definitions.

use serde::{Deserialize, Serialize};

use super::redact_url;
use crate::connection::SslMode;

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// The application's own database.
    #[serde(default)]
    pub source: SourceConfig,

    /// Settings applied to every target connection string.
    #[serde(default)]
    pub target: TargetConfig,

    /// Migration behavior configuration.
    #[serde(default)]
    pub migration: MigrationConfig,
}

/// Source database configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Connection string. Usually supplied through `DATABASE_URL`.
    #[serde(default)]
    pub url: String,

    /// SSL mode (default: "verify-full").
    #[serde(default)]
    pub ssl_mode: SslMode,

    /// Pool size (default: 4).
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            ssl_mode: SslMode::default(),
            max_connections: default_max_connections(),
        }
    }
}

impl std::fmt::Debug for SourceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceConfig")
            .field("url", &redact_url(&self.url))
            .field("ssl_mode", &self.ssl_mode)
            .field("max_connections", &self.max_connections)
            .finish()
    }
}

/// Target connection settings. The connection string itself is supplied per
/// operation and never stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetConfig {
    /// SSL mode (default: "verify-full").
    #[serde(default)]
    pub ssl_mode: SslMode,

    /// Pool size per run (default: 4).
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,

    /// Seconds allowed to establish a connection (default: 10).
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            ssl_mode: SslMode::default(),
            max_connections: default_max_connections(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

/// Migration behavior configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationConfig {
    /// Refuse to run when the source has tables the catalog does not know
    /// about, or lacks ones it does (default: true).
    #[serde(default = "default_true")]
    pub check_drift: bool,

    /// Source tables the drift check should ignore.
    #[serde(default)]
    pub ignore_tables: Vec<String>,

    /// Abort a run that takes longer than this many seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_timeout_secs: Option<u64>,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            check_drift: true,
            ignore_tables: Vec::new(),
            run_timeout_secs: None,
        }
    }
}

fn default_max_connections() -> usize {
    4
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_true() -> bool {
    true
}
