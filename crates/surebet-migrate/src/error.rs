//! Error types for the migration library.

use thiserror::Error;

/// Process exit codes, grouped by failure category.
pub const EXIT_CONFIG_ERROR: u8 = 1;
pub const EXIT_SOURCE_ERROR: u8 = 2;
pub const EXIT_TARGET_ERROR: u8 = 3;
pub const EXIT_SCHEMA_ERROR: u8 = 4;
pub const EXIT_TRANSFER_ERROR: u8 = 5;
pub const EXIT_TIMEOUT: u8 = 6;
pub const EXIT_IO_ERROR: u8 = 7;

/// Main error type for migration operations.
#[derive(Error, Debug)]
pub enum MigrateError {
    /// Configuration error (invalid YAML, missing fields, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Source database query error
    #[error("Source database error: {}", driver_message(.0))]
    Source(#[source] tokio_postgres::Error),

    /// Target database connection or query error
    #[error("Target database error: {}", driver_message(.0))]
    Target(#[source] tokio_postgres::Error),

    /// Connection pool error with context
    #[error("Pool error: {message}\n  Context: {context}")]
    Pool { message: String, context: String },

    /// The source pool could not hand out a connection
    #[error("Source connection error: {message}\n  Context: {context}")]
    SourcePool { message: String, context: String },

    /// A source value could not be decoded as its catalogued type
    #[error("Cannot decode {table}.{column}: {message}")]
    Decode {
        table: String,
        column: String,
        message: String,
    },

    /// TLS setup failed
    #[error("TLS error: {0}")]
    Tls(String),

    /// The table catalog violates its own ordering or naming rules
    #[error("Catalog error: {0}")]
    Catalog(String),

    /// The live source schema no longer matches the table catalog
    #[error("Configuration drift: {0}")]
    Drift(String),

    /// Target DDL script failed
    #[error("Schema provisioning failed: {0}")]
    Schema(String),

    /// Data transfer failed for a specific table
    #[error("Transfer failed for table {table}: {message}")]
    Transfer { table: String, message: String },

    /// A fetched row does not line up with the table's column list
    #[error("Row shape mismatch in {table}: expected {expected} columns, got {actual}")]
    RowShape {
        table: String,
        expected: usize,
        actual: usize,
    },

    /// The whole run exceeded its time budget
    #[error("Migration timed out after {0}s")]
    Timeout(u64),

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl MigrateError {
    /// Create a Pool error with context about where it occurred
    pub fn pool(message: impl std::fmt::Display, context: impl Into<String>) -> Self {
        MigrateError::Pool {
            message: message.to_string(),
            context: context.into(),
        }
    }

    /// Create a SourcePool error with context about where it occurred
    pub fn source_pool(message: impl std::fmt::Display, context: impl Into<String>) -> Self {
        MigrateError::SourcePool {
            message: message.to_string(),
            context: context.into(),
        }
    }

    /// Create a Decode error for one source column
    pub fn decode(table: &str, column: &str, cause: &tokio_postgres::Error) -> Self {
        MigrateError::Decode {
            table: table.to_string(),
            column: column.to_string(),
            message: driver_message(cause),
        }
    }

    /// Create a Transfer error
    pub fn transfer(table: impl Into<String>, message: impl Into<String>) -> Self {
        MigrateError::Transfer {
            table: table.into(),
            message: message.into(),
        }
    }

    /// Exit code for the CLI.
    pub fn exit_code(&self) -> u8 {
        match self {
            MigrateError::Config(_)
            | MigrateError::Catalog(_)
            | MigrateError::Drift(_)
            | MigrateError::Yaml(_)
            | MigrateError::Json(_) => EXIT_CONFIG_ERROR,
            MigrateError::Source(_)
            | MigrateError::SourcePool { .. }
            | MigrateError::Decode { .. } => EXIT_SOURCE_ERROR,
            MigrateError::Target(_) | MigrateError::Pool { .. } | MigrateError::Tls(_) => {
                EXIT_TARGET_ERROR
            }
            MigrateError::Schema(_) => EXIT_SCHEMA_ERROR,
            MigrateError::Transfer { .. } | MigrateError::RowShape { .. } => EXIT_TRANSFER_ERROR,
            MigrateError::Timeout(_) => EXIT_TIMEOUT,
            MigrateError::Io(_) => EXIT_IO_ERROR,
        }
    }

    /// Format error with full details including error chain
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

/// The server's message for a driver error.
///
/// `tokio_postgres::Error` displays only its kind ("db error"). The text a
/// caller can act on is in the attached `DbError`, or further down the
/// `source()` chain for decode and connection failures.
pub fn driver_message(e: &tokio_postgres::Error) -> String {
    match e.as_db_error() {
        Some(db) => match db.detail() {
            Some(detail) => format!("{} ({})", db.message(), detail),
            None => db.message().to_string(),
        },
        None => error_chain(e),
    }
}

/// An error and its causes joined with `": "`.
///
/// A cause is skipped when the text so far already contains it, since some
/// errors repeat their source in their own `Display`.
pub fn error_chain(e: &(dyn std::error::Error + 'static)) -> String {
    let mut message = e.to_string();
    let mut source = e.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !text.is_empty() && !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = cause.source();
    }
    message
}

/// Result type alias for migration operations.
pub type Result<T> = std::result::Result<T, MigrateError>;
