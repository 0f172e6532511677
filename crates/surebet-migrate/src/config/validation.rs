//! Configuration validation.

use super::Config;
use crate::error::{MigrateError, Result};
use crate::sql::identifier::validate_identifier;

/// Validate the configuration.
pub fn validate(config: &Config) -> Result<()> {
    if config.source.url.trim().is_empty() {
        return Err(MigrateError::Config(
            "source.url is required (set DATABASE_URL)".into(),
        ));
    }
    if config.source.max_connections == 0 {
        return Err(MigrateError::Config(
            "source.max_connections must be at least 1".into(),
        ));
    }

    if config.target.max_connections == 0 {
        return Err(MigrateError::Config(
            "target.max_connections must be at least 1".into(),
        ));
    }
    if config.target.connect_timeout_secs == 0 {
        return Err(MigrateError::Config(
            "target.connect_timeout_secs must be at least 1".into(),
        ));
    }

    if let Some(0) = config.migration.run_timeout_secs {
        return Err(MigrateError::Config(
            "migration.run_timeout_secs must be at least 1".into(),
        ));
    }
    for name in &config.migration.ignore_tables {
        validate_identifier(name).map_err(|e| {
            MigrateError::Config(format!("migration.ignore_tables: {}", e))
        })?;
    }

    Ok(())
}
