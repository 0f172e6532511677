//! Static schema descriptors for migratable tables.
//!
//! Descriptors are `const`-constructible so the built-in table list lives in
//! read-only data and every identifier is known at compile time.

use serde::Serialize;

/// Column type as declared on the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    Varchar,
    Text,
    Numeric { precision: u8, scale: u8 },
    Boolean,
    /// `TIMESTAMP`, optionally with explicit fractional precision.
    Timestamp { precision: Option<u8> },
    Json,
}

impl ColumnType {
    /// DDL spelling of the type.
    pub fn sql_type(&self) -> String {
        match self {
            ColumnType::Varchar => "VARCHAR".to_string(),
            ColumnType::Text => "TEXT".to_string(),
            ColumnType::Numeric { precision, scale } => {
                format!("DECIMAL({},{})", precision, scale)
            }
            ColumnType::Boolean => "BOOLEAN".to_string(),
            ColumnType::Timestamp { precision: None } => "TIMESTAMP".to_string(),
            ColumnType::Timestamp {
                precision: Some(p),
            } => format!("TIMESTAMP({})", p),
            ColumnType::Json => "JSON".to_string(),
        }
    }
}

/// One column of a table descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnDescriptor {
    pub name: &'static str,
    pub ty: ColumnType,
    pub nullable: bool,
    pub primary_key: bool,
    pub unique: bool,
    /// SQL default expression, emitted verbatim.
    pub default: Option<&'static str>,
    /// Parent table referenced through its `id` column.
    pub references: Option<&'static str>,
}

impl ColumnDescriptor {
    pub const fn new(name: &'static str, ty: ColumnType) -> Self {
        Self {
            name,
            ty,
            nullable: true,
            primary_key: false,
            unique: false,
            default: None,
            references: None,
        }
    }

    pub const fn not_null(self) -> Self {
        Self {
            nullable: false,
            ..self
        }
    }

    pub const fn primary_key(self) -> Self {
        Self {
            primary_key: true,
            ..self
        }
    }

    pub const fn unique(self) -> Self {
        Self {
            unique: true,
            ..self
        }
    }

    pub const fn default(self, expr: &'static str) -> Self {
        Self {
            default: Some(expr),
            ..self
        }
    }

    pub const fn references(self, table: &'static str) -> Self {
        Self {
            references: Some(table),
            ..self
        }
    }

    /// Column definition as it appears inside `CREATE TABLE`.
    pub fn definition(&self) -> String {
        let mut def = format!("{} {}", self.name, self.ty.sql_type());
        if !self.nullable && !self.primary_key {
            def.push_str(" NOT NULL");
        }
        if self.primary_key {
            if !self.nullable {
                def.push_str(" NOT NULL");
            }
            def.push_str(" PRIMARY KEY");
        }
        if self.unique {
            def.push_str(" UNIQUE");
        }
        if let Some(default) = self.default {
            def.push_str(" DEFAULT ");
            def.push_str(default);
        }
        if let Some(parent) = self.references {
            def.push_str(&format!(" REFERENCES {}(id)", parent));
        }
        def
    }
}

/// Secondary index on a single column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexDescriptor {
    pub name: &'static str,
    pub column: &'static str,
}

/// One migratable table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableDescriptor {
    pub name: &'static str,
    /// Position in the copy sequence; parents always have a lower value.
    pub dependency_order: u32,
    pub columns: &'static [ColumnDescriptor],
    pub indexes: &'static [IndexDescriptor],
}

impl TableDescriptor {
    /// Column names in declaration order.
    pub fn column_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.columns.iter().map(|c| c.name)
    }

    /// The single primary-key column, if declared.
    pub fn primary_key(&self) -> Option<&ColumnDescriptor> {
        self.columns.iter().find(|c| c.primary_key)
    }

    /// Tables this one references by foreign key.
    pub fn parents(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.columns.iter().filter_map(|c| c.references)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sql_types() {
        assert_eq!(
            ColumnType::Numeric {
                precision: 10,
                scale: 2
            }
            .sql_type(),
            "DECIMAL(10,2)"
        );
        assert_eq!(
            ColumnType::Timestamp { precision: Some(6) }.sql_type(),
            "TIMESTAMP(6)"
        );
        assert_eq!(ColumnType::Timestamp { precision: None }.sql_type(), "TIMESTAMP");
    }

    #[test]
    fn test_column_definition_variants() {
        let id = ColumnDescriptor::new("id", ColumnType::Varchar)
            .primary_key()
            .default("gen_random_uuid()");
        assert_eq!(id.definition(), "id VARCHAR PRIMARY KEY DEFAULT gen_random_uuid()");

        let sid = ColumnDescriptor::new("sid", ColumnType::Varchar)
            .not_null()
            .primary_key();
        assert_eq!(sid.definition(), "sid VARCHAR NOT NULL PRIMARY KEY");

        let email = ColumnDescriptor::new("email", ColumnType::Text)
            .not_null()
            .unique();
        assert_eq!(email.definition(), "email TEXT NOT NULL UNIQUE");

        let fk = ColumnDescriptor::new("user_id", ColumnType::Varchar).references("users");
        assert_eq!(fk.definition(), "user_id VARCHAR REFERENCES users(id)");
    }
}
