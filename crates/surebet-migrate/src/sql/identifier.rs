//! Identifier validation and quoting.
//!
//! Table, column and index names cannot be bound as statement parameters, so
//! they are interpolated into SQL text. Every identifier that reaches a
//! statement comes from the static table catalog and is checked here first:
//!
//! 1. non-empty and free of NUL bytes
//! 2. at most 63 bytes (PostgreSQL's `NAMEDATALEN - 1`)
//! 3. lowercase ASCII letters, digits and underscores, not starting with a digit
//!
//! Anything else is rejected rather than escaped, so a future change that lets
//! external input reach the catalog fails loudly instead of producing SQL.

use crate::error::{MigrateError, Result};

/// Maximum identifier length accepted by PostgreSQL without truncation.
pub const MAX_IDENTIFIER_LENGTH: usize = 63;

/// Validate an identifier against the allow-list rules.
pub fn validate_identifier(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(MigrateError::Catalog(
            "Identifier cannot be empty".to_string(),
        ));
    }

    if name.contains('\0') {
        return Err(MigrateError::Catalog(format!(
            "SECURITY: Identifier contains null byte (possible injection attempt): {:?}",
            name
        )));
    }

    if name.len() > MAX_IDENTIFIER_LENGTH {
        return Err(MigrateError::Catalog(format!(
            "Identifier exceeds maximum length of {} bytes (got {} bytes): {:?}",
            MAX_IDENTIFIER_LENGTH,
            name.len(),
            name
        )));
    }

    let mut chars = name.chars();
    let first_ok = chars
        .next()
        .map(|c| c.is_ascii_lowercase() || c == '_')
        .unwrap_or(false);
    let rest_ok = chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');

    if !first_ok || !rest_ok {
        return Err(MigrateError::Catalog(format!(
            "Identifier must match [a-z_][a-z0-9_]*: {:?}",
            name
        )));
    }

    Ok(())
}

/// Quote a PostgreSQL identifier.
///
/// Callers pass catalog names that were validated when the catalog was built,
/// so this only wraps and escapes.
pub fn quote_pg(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Quote and comma-join a list of identifiers.
pub fn quote_list<'a>(names: impl IntoIterator<Item = &'a str>) -> String {
    names
        .into_iter()
        .map(quote_pg)
        .collect::<Vec<_>>()
        .join(", ")
}
