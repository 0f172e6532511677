//! Outcome records returned to callers of a migration run.

use serde::{Deserialize, Serialize};

use crate::error::{MigrateError, EXIT_TARGET_ERROR, EXIT_TRANSFER_ERROR};

/// Per-table status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TableStatus {
    Success,
    Error,
}

/// What happened to one table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableResult {
    name: String,
    count: i64,
    status: TableStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl TableResult {
    pub fn success(name: impl Into<String>, count: i64) -> Self {
        Self {
            name: name.into(),
            count: count.max(0),
            status: TableStatus::Success,
            error: None,
        }
    }

    pub fn failed(name: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            count: 0,
            status: TableStatus::Error,
            error: Some(error.into()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn count(&self) -> i64 {
        self.count
    }

    pub fn status(&self) -> TableStatus {
        self.status
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_success(&self) -> bool {
        self.status == TableStatus::Success
    }
}

/// How a run ended, for callers that need more than a boolean.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every table copied.
    FullSuccess,
    /// Schema was recreated but at least one table failed.
    PartialFailure,
    /// Nothing was copied because of a fatal error.
    TotalFailure,
}

/// Result of one migration run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationResult {
    pub success: bool,
    pub tables: Vec<TableResult>,
    pub total_records: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Exit code of the error that stopped the run, if it was fatal.
    #[serde(skip)]
    fatal_code: Option<u8>,
}

impl MigrationResult {
    /// Aggregate per-table results.
    pub fn from_tables(tables: Vec<TableResult>) -> Self {
        let success = tables.iter().all(TableResult::is_success);
        let total_records = tables.iter().map(TableResult::count).sum();
        Self {
            success,
            tables,
            total_records,
            error: None,
            fatal_code: None,
        }
    }

    /// A run that stopped before any table was attempted.
    pub fn fatal(error: impl Into<String>) -> Self {
        Self {
            success: false,
            tables: Vec::new(),
            total_records: 0,
            error: Some(error.into()),
            fatal_code: None,
        }
    }

    /// A fatal run that remembers which category of error stopped it.
    pub fn from_error(error: &MigrateError) -> Self {
        Self {
            fatal_code: Some(error.exit_code()),
            ..Self::fatal(error.to_string())
        }
    }

    pub fn failed_tables(&self) -> impl Iterator<Item = &TableResult> {
        self.tables.iter().filter(|t| !t.is_success())
    }

    pub fn outcome(&self) -> RunOutcome {
        if self.error.is_some() {
            RunOutcome::TotalFailure
        } else if self.success {
            RunOutcome::FullSuccess
        } else {
            RunOutcome::PartialFailure
        }
    }

    /// Process exit code for this run.
    ///
    /// A fatal run uses the code of the error that stopped it; a fatal
    /// result built from a bare message is treated as a target failure.
    pub fn exit_code(&self) -> u8 {
        match self.outcome() {
            RunOutcome::FullSuccess => 0,
            RunOutcome::PartialFailure => EXIT_TRANSFER_ERROR,
            RunOutcome::TotalFailure => self.fatal_code.unwrap_or(EXIT_TARGET_ERROR),
        }
    }
}
