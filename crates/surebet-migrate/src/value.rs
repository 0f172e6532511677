//! Row values moved between databases.
//!
//! A row is positionally aligned with its table descriptor's column list.
//! Values are decoded by the declared column type rather than inferred from
//! what the driver returns, so a NULL still knows which SQL type it binds as.

use std::error::Error;

use bytes::{BufMut, BytesMut};
use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use tokio_postgres::types::{to_sql_checked, FromSql, IsNull, ToSql, Type};

use crate::catalog::{ColumnDescriptor, ColumnType, TableDescriptor};
use crate::error::{MigrateError, Result};

/// One row, in catalog column order.
pub type Row = Vec<SqlValue>;

/// Timestamp layout used in literals (microsecond precision, like `TIMESTAMP(6)`).
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

// NUMERIC binary sign words (int16 after ndigits and weight).
const NUMERIC_NAN: u16 = 0xC000;
const NUMERIC_PINF: u16 = 0xD000;
const NUMERIC_NINF: u16 = 0xF000;

/// A NUMERIC or TIMESTAMP value with no finite representation.
///
/// rust_decimal has no NaN and chrono has no infinity, but PostgreSQL
/// stores both in these columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NonFinite {
    NaN,
    Infinity,
    NegativeInfinity,
}

impl NonFinite {
    /// Input text accepted by both `numeric` and `timestamp`.
    pub fn as_str(self) -> &'static str {
        match self {
            NonFinite::NaN => "NaN",
            NonFinite::Infinity => "Infinity",
            NonFinite::NegativeInfinity => "-Infinity",
        }
    }
}

/// SQL value enum for type-safe row handling.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null(ColumnType),
    Text(String),
    Decimal(Decimal),
    Bool(bool),
    Timestamp(NaiveDateTime),
    Json(serde_json::Value),
    /// NaN or an infinity, tagged with the column type it came from.
    NonFinite(NonFinite, ColumnType),
}

impl SqlValue {
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null(_))
    }

    /// Decode column `idx` of a driver row according to its descriptor.
    pub fn from_row(
        row: &tokio_postgres::Row,
        idx: usize,
        column: &ColumnDescriptor,
    ) -> std::result::Result<Self, tokio_postgres::Error> {
        let value = match column.ty {
            ColumnType::Varchar | ColumnType::Text => {
                row.try_get::<_, Option<String>>(idx)?.map(SqlValue::Text)
            }
            ColumnType::Numeric { .. } => row
                .try_get::<_, Option<WireNumeric>>(idx)?
                .map(|w| match w.0 {
                    Ok(d) => SqlValue::Decimal(d),
                    Err(v) => SqlValue::NonFinite(v, column.ty),
                }),
            ColumnType::Boolean => row.try_get::<_, Option<bool>>(idx)?.map(SqlValue::Bool),
            ColumnType::Timestamp { .. } => row
                .try_get::<_, Option<WireTimestamp>>(idx)?
                .map(|w| match w.0 {
                    Ok(ts) => SqlValue::Timestamp(ts),
                    Err(v) => SqlValue::NonFinite(v, column.ty),
                }),
            ColumnType::Json => row
                .try_get::<_, Option<serde_json::Value>>(idx)?
                .map(SqlValue::Json),
        };
        Ok(value.unwrap_or(SqlValue::Null(column.ty)))
    }

    /// Convert to a boxed bind parameter.
    ///
    /// NULLs are bound with the Rust type matching their column so the
    /// driver's type check accepts them.
    pub fn to_param(&self) -> Box<dyn ToSql + Sync + Send> {
        match self {
            SqlValue::Null(ty) => match ty {
                ColumnType::Varchar | ColumnType::Text => Box::new(None::<String>),
                ColumnType::Numeric { .. } => Box::new(None::<Decimal>),
                ColumnType::Boolean => Box::new(None::<bool>),
                ColumnType::Timestamp { .. } => Box::new(None::<NaiveDateTime>),
                ColumnType::Json => Box::new(None::<serde_json::Value>),
            },
            SqlValue::Text(s) => Box::new(s.clone()),
            SqlValue::Decimal(d) => Box::new(*d),
            SqlValue::Bool(b) => Box::new(*b),
            SqlValue::Timestamp(ts) => Box::new(*ts),
            SqlValue::Json(v) => Box::new(v.clone()),
            SqlValue::NonFinite(v, _) => Box::new(NonFiniteParam(*v)),
        }
    }

    /// Render as a SQL literal for a standalone script.
    pub fn to_literal(&self) -> String {
        match self {
            SqlValue::Null(_) => "NULL".to_string(),
            SqlValue::Text(s) => quote_literal(s),
            SqlValue::Decimal(d) => format!("{}::numeric", d),
            SqlValue::Bool(b) => if *b { "TRUE" } else { "FALSE" }.to_string(),
            SqlValue::Timestamp(ts) => {
                format!("'{}'::timestamp", ts.format(TIMESTAMP_FORMAT))
            }
            SqlValue::Json(v) => format!("{}::json", quote_literal(&v.to_string())),
            SqlValue::NonFinite(v, ColumnType::Timestamp { .. }) => {
                format!("'{}'::timestamp", v.as_str())
            }
            SqlValue::NonFinite(v, _) => format!("'{}'::numeric", v.as_str()),
        }
    }
}

/// NUMERIC decoded through rust_decimal, keeping NaN and the infinities.
#[derive(Debug)]
struct WireNumeric(std::result::Result<Decimal, NonFinite>);

impl<'a> FromSql<'a> for WireNumeric {
    fn from_sql(
        ty: &Type,
        raw: &'a [u8],
    ) -> std::result::Result<Self, Box<dyn Error + Sync + Send>> {
        let sign = raw
            .get(4..6)
            .map(|b| u16::from_be_bytes([b[0], b[1]]))
            .ok_or("invalid NUMERIC header")?;
        let special = match sign {
            NUMERIC_NAN => Some(NonFinite::NaN),
            NUMERIC_PINF => Some(NonFinite::Infinity),
            NUMERIC_NINF => Some(NonFinite::NegativeInfinity),
            _ => None,
        };
        match special {
            Some(v) => Ok(Self(Err(v))),
            None => <Decimal as FromSql>::from_sql(ty, raw).map(|d| Self(Ok(d))),
        }
    }

    fn accepts(ty: &Type) -> bool {
        *ty == Type::NUMERIC
    }
}

/// TIMESTAMP decoded through chrono, keeping `infinity` and `-infinity`.
#[derive(Debug)]
struct WireTimestamp(std::result::Result<NaiveDateTime, NonFinite>);

impl<'a> FromSql<'a> for WireTimestamp {
    fn from_sql(
        ty: &Type,
        raw: &'a [u8],
    ) -> std::result::Result<Self, Box<dyn Error + Sync + Send>> {
        let micros = <[u8; 8]>::try_from(raw)
            .map(i64::from_be_bytes)
            .map_err(|_| "invalid TIMESTAMP length")?;
        match micros {
            i64::MAX => Ok(Self(Err(NonFinite::Infinity))),
            i64::MIN => Ok(Self(Err(NonFinite::NegativeInfinity))),
            _ => <NaiveDateTime as FromSql>::from_sql(ty, raw).map(|ts| Self(Ok(ts))),
        }
    }

    fn accepts(ty: &Type) -> bool {
        *ty == Type::TIMESTAMP
    }
}

/// Binds a [`NonFinite`] in the binary layout of the parameter's type.
#[derive(Debug)]
struct NonFiniteParam(NonFinite);

impl ToSql for NonFiniteParam {
    fn to_sql(
        &self,
        ty: &Type,
        out: &mut BytesMut,
    ) -> std::result::Result<IsNull, Box<dyn Error + Sync + Send>> {
        if *ty == Type::NUMERIC {
            let sign = match self.0 {
                NonFinite::NaN => NUMERIC_NAN,
                NonFinite::Infinity => NUMERIC_PINF,
                NonFinite::NegativeInfinity => NUMERIC_NINF,
            };
            out.put_i16(0);
            out.put_i16(0);
            out.put_u16(sign);
            out.put_u16(0);
        } else {
            let micros = match self.0 {
                NonFinite::Infinity => i64::MAX,
                NonFinite::NegativeInfinity => i64::MIN,
                NonFinite::NaN => return Err("TIMESTAMP has no NaN".into()),
            };
            out.put_i64(micros);
        }
        Ok(IsNull::No)
    }

    fn accepts(ty: &Type) -> bool {
        *ty == Type::NUMERIC || *ty == Type::TIMESTAMP
    }

    to_sql_checked!();
}

/// Quote a string literal, doubling embedded single quotes.
///
/// Assumes `standard_conforming_strings = on` (the default since 9.1), where
/// backslashes inside `'...'` are literal.
pub fn quote_literal(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

/// Check a row lines up with its table's column list.
pub fn check_row_shape(table: &TableDescriptor, row: &Row) -> Result<()> {
    if row.len() != table.columns.len() {
        return Err(MigrateError::RowShape {
            table: table.name.to_string(),
            expected: table.columns.len(),
            actual: row.len(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{SESSION, USERS};
    use chrono::NaiveDate;
    use std::str::FromStr;

    fn ts(h: u32, m: u32, s: u32, micro: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 9)
            .unwrap()
            .and_hms_micro_opt(h, m, s, micro)
            .unwrap()
    }

    #[test]
    fn test_text_literal_escapes_quotes() {
        let v = SqlValue::Text("O'Neil's \"house\"".into());
        assert_eq!(v.to_literal(), "'O''Neil''s \"house\"'");
    }

    #[test]
    fn test_text_literal_keeps_backslash() {
        let v = SqlValue::Text(r"C:\temp".into());
        assert_eq!(v.to_literal(), r"'C:\temp'");
    }

    #[test]
    fn test_null_literal() {
        assert_eq!(SqlValue::Null(ColumnType::Text).to_literal(), "NULL");
        assert_eq!(SqlValue::Null(ColumnType::Boolean).to_literal(), "NULL");
    }

    #[test]
    fn test_decimal_literal_keeps_scale() {
        let v = SqlValue::Decimal(Decimal::from_str("12.50").unwrap());
        assert_eq!(v.to_literal(), "12.50::numeric");
        let v = SqlValue::Decimal(Decimal::from_str("-1.875").unwrap());
        assert_eq!(v.to_literal(), "-1.875::numeric");
    }

    #[test]
    fn test_timestamp_literal_is_canonical() {
        assert_eq!(
            SqlValue::Timestamp(ts(18, 5, 0, 0)).to_literal(),
            "'2024-03-09 18:05:00.000000'::timestamp"
        );
        assert_eq!(
            SqlValue::Timestamp(ts(7, 0, 1, 123456)).to_literal(),
            "'2024-03-09 07:00:01.123456'::timestamp"
        );
    }

    #[test]
    fn test_bool_literal() {
        assert_eq!(SqlValue::Bool(true).to_literal(), "TRUE");
        assert_eq!(SqlValue::Bool(false).to_literal(), "FALSE");
    }

    #[test]
    fn test_json_literal() {
        let v = SqlValue::Json(serde_json::json!({"user": "it's me"}));
        assert_eq!(v.to_literal(), r#"'{"user":"it''s me"}'::json"#);
    }

    fn numeric_header(sign: u16) -> Vec<u8> {
        let mut raw = vec![0, 0, 0, 0];
        raw.extend_from_slice(&sign.to_be_bytes());
        raw.extend_from_slice(&[0, 0]);
        raw
    }

    #[test]
    fn test_numeric_nan_and_infinities_decode() {
        let nan = WireNumeric::from_sql(&Type::NUMERIC, &numeric_header(NUMERIC_NAN)).unwrap();
        assert_eq!(nan.0, Err(NonFinite::NaN));
        let inf = WireNumeric::from_sql(&Type::NUMERIC, &numeric_header(NUMERIC_PINF)).unwrap();
        assert_eq!(inf.0, Err(NonFinite::Infinity));
        let ninf = WireNumeric::from_sql(&Type::NUMERIC, &numeric_header(NUMERIC_NINF)).unwrap();
        assert_eq!(ninf.0, Err(NonFinite::NegativeInfinity));
    }

    #[test]
    fn test_finite_numeric_still_decodes_as_decimal() {
        let value = Decimal::from_str("12.50").unwrap();
        let mut raw = BytesMut::new();
        value.to_sql(&Type::NUMERIC, &mut raw).unwrap();

        let decoded = WireNumeric::from_sql(&Type::NUMERIC, &raw).unwrap();
        assert_eq!(decoded.0, Ok(value));
        assert!(WireNumeric::from_sql(&Type::NUMERIC, &[0, 0]).is_err());
    }

    #[test]
    fn test_infinite_timestamps_decode() {
        let inf = WireTimestamp::from_sql(&Type::TIMESTAMP, &i64::MAX.to_be_bytes()).unwrap();
        assert_eq!(inf.0, Err(NonFinite::Infinity));
        let ninf = WireTimestamp::from_sql(&Type::TIMESTAMP, &i64::MIN.to_be_bytes()).unwrap();
        assert_eq!(ninf.0, Err(NonFinite::NegativeInfinity));

        let mut raw = BytesMut::new();
        ts(7, 0, 1, 123456).to_sql(&Type::TIMESTAMP, &mut raw).unwrap();
        let finite = WireTimestamp::from_sql(&Type::TIMESTAMP, &raw).unwrap();
        assert_eq!(finite.0, Ok(ts(7, 0, 1, 123456)));
    }

    #[test]
    fn test_non_finite_binds_in_wire_layout() {
        let mut raw = BytesMut::new();
        NonFiniteParam(NonFinite::NaN)
            .to_sql(&Type::NUMERIC, &mut raw)
            .unwrap();
        let back = WireNumeric::from_sql(&Type::NUMERIC, &raw).unwrap();
        assert_eq!(back.0, Err(NonFinite::NaN));

        let mut raw = BytesMut::new();
        NonFiniteParam(NonFinite::NegativeInfinity)
            .to_sql(&Type::TIMESTAMP, &mut raw)
            .unwrap();
        assert_eq!(&raw[..], &i64::MIN.to_be_bytes()[..]);

        let mut raw = BytesMut::new();
        assert!(NonFiniteParam(NonFinite::NaN)
            .to_sql(&Type::TIMESTAMP, &mut raw)
            .is_err());
    }

    #[test]
    fn test_non_finite_literals() {
        let numeric = ColumnType::Numeric {
            precision: 5,
            scale: 2,
        };
        assert_eq!(
            SqlValue::NonFinite(NonFinite::NaN, numeric).to_literal(),
            "'NaN'::numeric"
        );
        assert_eq!(
            SqlValue::NonFinite(NonFinite::Infinity, ColumnType::Timestamp { precision: None })
                .to_literal(),
            "'Infinity'::timestamp"
        );
        assert_eq!(
            SqlValue::NonFinite(NonFinite::NegativeInfinity, numeric).to_literal(),
            "'-Infinity'::numeric"
        );
    }

    #[test]
    fn test_row_shape() {
        let good: Row = vec![
            SqlValue::Text("sid-1".into()),
            SqlValue::Json(serde_json::json!({})),
            SqlValue::Timestamp(ts(0, 0, 0, 0)),
        ];
        assert!(check_row_shape(&SESSION, &good).is_ok());

        let short: Row = vec![SqlValue::Text("sid-1".into())];
        let err = check_row_shape(&SESSION, &short).unwrap_err();
        assert!(matches!(
            err,
            MigrateError::RowShape {
                expected: 3,
                actual: 1,
                ..
            }
        ));
        assert!(check_row_shape(&USERS, &good).is_err());
    }
}
