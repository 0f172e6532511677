//! Table catalog for explicit dependency injection.
//!
//! The [`Catalog`] is the fixed allow-list of tables the service may create,
//! read and write. It is constructed once, validated, and handed to the
//! schema provisioner, copier, orchestrator and exporter; nothing reads table
//! names from anywhere else.

mod schema;
mod tables;

pub use schema::{ColumnDescriptor, ColumnType, IndexDescriptor, TableDescriptor};
pub use tables::{
    ACCOUNT_HOLDERS, BETS, BETTING_HOUSES, SESSION, SUREBET_SETS, SUREBET_TABLES, USERS,
};

use std::collections::{BTreeSet, HashMap};

use crate::error::{MigrateError, Result};
use crate::sql::identifier::validate_identifier;

/// Validated, dependency-ordered list of migratable tables.
#[derive(Debug, Clone)]
pub struct Catalog {
    tables: Vec<TableDescriptor>,
}

impl Catalog {
    /// The surebet tracker's six tables.
    pub fn surebet() -> Self {
        // Checked by `test_surebet_catalog_is_valid`.
        Self {
            tables: SUREBET_TABLES.to_vec(),
        }
    }

    /// Build a catalog, enforcing ordering and naming invariants.
    pub fn new(tables: Vec<TableDescriptor>) -> Result<Self> {
        let catalog = Self { tables };
        catalog.validate()?;
        Ok(catalog)
    }

    /// Tables in dependency (copy) order.
    pub fn tables(&self) -> &[TableDescriptor] {
        &self.tables
    }

    /// Look up a table by name.
    pub fn table(&self, name: &str) -> Option<&TableDescriptor> {
        self.tables.iter().find(|t| t.name == name)
    }

    /// Tables in strict reverse dependency order, for dropping.
    pub fn drop_order(&self) -> impl Iterator<Item = &TableDescriptor> {
        self.tables.iter().rev()
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Check every invariant the copy order relies on.
    pub fn validate(&self) -> Result<()> {
        if self.tables.is_empty() {
            return Err(MigrateError::Catalog("catalog has no tables".into()));
        }

        let mut order_of: HashMap<&str, u32> = HashMap::new();
        let mut last_order: Option<u32> = None;

        for table in &self.tables {
            validate_identifier(table.name)?;

            if order_of.contains_key(table.name) {
                return Err(MigrateError::Catalog(format!(
                    "table {} is listed twice",
                    table.name
                )));
            }

            if let Some(prev) = last_order {
                if table.dependency_order <= prev {
                    return Err(MigrateError::Catalog(format!(
                        "table {} has dependency order {} which does not follow {}",
                        table.name, table.dependency_order, prev
                    )));
                }
            }

            let pk_count = table.columns.iter().filter(|c| c.primary_key).count();
            if pk_count != 1 {
                return Err(MigrateError::Catalog(format!(
                    "table {} must declare exactly one primary key column (found {})",
                    table.name, pk_count
                )));
            }

            let mut seen_columns = BTreeSet::new();
            for column in table.columns {
                validate_identifier(column.name)?;
                if !seen_columns.insert(column.name) {
                    return Err(MigrateError::Catalog(format!(
                        "column {}.{} is declared twice",
                        table.name, column.name
                    )));
                }

                if let Some(parent) = column.references {
                    match order_of.get(parent) {
                        Some(parent_order) if *parent_order < table.dependency_order => {}
                        Some(_) | None => {
                            return Err(MigrateError::Catalog(format!(
                                "{}.{} references {} which is not listed before it",
                                table.name, column.name, parent
                            )));
                        }
                    }
                }
            }

            for index in table.indexes {
                validate_identifier(index.name)?;
                if !seen_columns.contains(index.column) {
                    return Err(MigrateError::Catalog(format!(
                        "index {} targets unknown column {}.{}",
                        index.name, table.name, index.column
                    )));
                }
            }

            order_of.insert(table.name, table.dependency_order);
            last_order = Some(table.dependency_order);
        }

        Ok(())
    }

    /// Compare the catalog with the tables that actually exist on the source.
    ///
    /// A live table that is neither catalogued nor ignored would silently be
    /// left behind, and a catalogued table missing from the source cannot be
    /// copied, so both are reported as drift before any DDL runs.
    pub fn check_drift<S: AsRef<str>>(&self, live_tables: &[S], ignored: &[String]) -> Result<()> {
        let live: BTreeSet<&str> = live_tables.iter().map(|t| t.as_ref()).collect();
        let known: BTreeSet<&str> = self.tables.iter().map(|t| t.name).collect();

        let unknown: Vec<&str> = live
            .iter()
            .copied()
            .filter(|t| !known.contains(t) && !ignored.iter().any(|i| i == t))
            .collect();
        let missing: Vec<&str> = known
            .iter()
            .copied()
            .filter(|t| !live.contains(t))
            .collect();

        if unknown.is_empty() && missing.is_empty() {
            return Ok(());
        }

        let mut parts = Vec::new();
        if !unknown.is_empty() {
            parts.push(format!(
                "source tables not in the migration catalog: {}",
                unknown.join(", ")
            ));
        }
        if !missing.is_empty() {
            parts.push(format!(
                "catalog tables missing from the source: {}",
                missing.join(", ")
            ));
        }
        Err(MigrateError::Drift(parts.join("; ")))
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::surebet()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_surebet_catalog_is_valid() {
        Catalog::surebet().validate().unwrap();
    }

    #[test]
    fn test_surebet_order() {
        let names: Vec<_> = Catalog::surebet().tables().iter().map(|t| t.name).collect();
        assert_eq!(
            names,
            vec![
                "users",
                "account_holders",
                "betting_houses",
                "surebet_sets",
                "bets",
                "session"
            ]
        );
        let orders: Vec<_> = Catalog::surebet()
            .tables()
            .iter()
            .map(|t| t.dependency_order)
            .collect();
        assert_eq!(orders, vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_every_parent_has_lower_order() {
        let catalog = Catalog::surebet();
        for table in catalog.tables() {
            for parent in table.parents() {
                let parent = catalog.table(parent).unwrap();
                assert!(
                    table.dependency_order > parent.dependency_order,
                    "{} must come after {}",
                    table.name,
                    parent.name
                );
            }
        }
        let bets = catalog.table("bets").unwrap();
        let parents: Vec<_> = bets.parents().collect();
        assert_eq!(parents, vec!["surebet_sets", "betting_houses"]);
    }

    #[test]
    fn test_drop_order_is_reverse() {
        let names: Vec<_> = Catalog::surebet().drop_order().map(|t| t.name).collect();
        assert_eq!(
            names,
            vec![
                "session",
                "bets",
                "surebet_sets",
                "betting_houses",
                "account_holders",
                "users"
            ]
        );
    }

    #[test]
    fn test_rejects_child_before_parent() {
        let err = Catalog::new(vec![
            TableDescriptor {
                dependency_order: 1,
                ..ACCOUNT_HOLDERS
            },
            TableDescriptor {
                dependency_order: 2,
                ..USERS
            },
        ])
        .unwrap_err();
        assert!(err.to_string().contains("references users"));
    }

    #[test]
    fn test_rejects_non_increasing_order() {
        let err = Catalog::new(vec![
            USERS,
            TableDescriptor {
                dependency_order: 1,
                ..ACCOUNT_HOLDERS
            },
        ])
        .unwrap_err();
        assert!(matches!(err, MigrateError::Catalog(_)));
    }

    #[test]
    fn test_rejects_duplicate_table() {
        let err = Catalog::new(vec![
            USERS,
            TableDescriptor {
                dependency_order: 2,
                ..USERS
            },
        ])
        .unwrap_err();
        assert!(err.to_string().contains("listed twice"));
    }

    #[test]
    fn test_rejects_unsafe_table_name() {
        let err = Catalog::new(vec![TableDescriptor {
            name: "users; drop table bets",
            ..USERS
        }])
        .unwrap_err();
        assert!(matches!(err, MigrateError::Catalog(_)));
    }

    #[test]
    fn test_rejects_empty_catalog() {
        assert!(Catalog::new(Vec::new()).is_err());
    }

    #[test]
    fn test_drift_none() {
        let catalog = Catalog::surebet();
        let live: Vec<&str> = catalog.tables().iter().map(|t| t.name).collect();
        assert!(catalog.check_drift(&live, &[]).is_ok());
    }

    #[test]
    fn test_drift_unknown_table() {
        let catalog = Catalog::surebet();
        let mut live: Vec<&str> = catalog.tables().iter().map(|t| t.name).collect();
        live.push("bookmaker_limits");
        let err = catalog.check_drift(&live, &[]).unwrap_err();
        assert!(matches!(err, MigrateError::Drift(_)));
        assert!(err.to_string().contains("bookmaker_limits"));
    }

    #[test]
    fn test_drift_ignored_table() {
        let catalog = Catalog::surebet();
        let mut live: Vec<&str> = catalog.tables().iter().map(|t| t.name).collect();
        live.push("__drizzle_migrations");
        assert!(catalog
            .check_drift(&live, &["__drizzle_migrations".to_string()])
            .is_ok());
    }

    #[test]
    fn test_drift_missing_table() {
        let catalog = Catalog::surebet();
        let live = vec!["users", "bets"];
        let err = catalog.check_drift(&live, &[]).unwrap_err();
        assert!(err.to_string().contains("missing from the source"));
        assert!(err.to_string().contains("session"));
    }
}
