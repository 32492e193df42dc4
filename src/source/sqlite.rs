//! `SQLite`-backed data source.
//!
//! Wraps rusqlite behind the crate's column/value model. Declared column
//! types drive value decoding: `BOOL*` columns yield booleans, `DATE*` /
//! `TIME*` columns yield UTC timestamps, `*ARRAY*` / `JSON` columns carry a
//! JSON array in their text cells, everything else is a scalar.

use crate::config::SourceConfig;
use crate::source::{Column, Cursor, SqlType, Value};
use crate::{Error, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rusqlite::Connection;
use rusqlite::types::ValueRef;
use secrecy::SecretString;

/// Connection to a `SQLite` database.
pub struct SqliteConnection {
    conn: Connection,
}

impl SqliteConnection {
    /// Opens the database named by the connection URL.
    ///
    /// Accepted URL forms: a plain file path, `sqlite:<path>`, or
    /// `:memory:` (also the empty string) for an in-memory database.
    ///
    /// `SQLite` has no authentication; the credential is accepted for
    /// interface parity with other drivers and dropped unused.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Connection`] if the database cannot be opened.
    pub fn connect(config: &SourceConfig, _credential: Option<SecretString>) -> Result<Self> {
        let target = config
            .url
            .strip_prefix("sqlite://")
            .or_else(|| config.url.strip_prefix("sqlite:"))
            .unwrap_or(&config.url);

        let conn = if target.is_empty() || target == ":memory:" {
            Connection::open_in_memory()
        } else {
            Connection::open(target)
        }
        .map_err(|e| Error::Connection {
            url: config.url.clone(),
            cause: e.to_string(),
        })?;

        Ok(Self { conn })
    }

    /// Prepares a statement and captures its column metadata.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Query`] if the statement fails to prepare.
    pub fn prepare(&self, sql: &str) -> Result<SqliteStatement<'_>> {
        let stmt = self.conn.prepare(sql).map_err(|e| Error::Query {
            cause: e.to_string(),
        })?;

        let columns = stmt
            .columns()
            .iter()
            .map(|c| Column::new(c.name(), SqlType::from_decl(c.decl_type())))
            .collect();

        Ok(SqliteStatement { stmt, columns })
    }
}

/// A prepared statement plus its fixed column metadata.
pub struct SqliteStatement<'conn> {
    stmt: rusqlite::Statement<'conn>,
    columns: Vec<Column>,
}

impl SqliteStatement<'_> {
    /// Returns the result-set columns, ordinal-ordered.
    #[must_use]
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Executes the statement and returns a forward-only cursor.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Query`] if execution fails (including a statement
    /// that expects parameters; exports are parameterless).
    pub fn cursor(&mut self) -> Result<SqliteCursor<'_>> {
        let types: Vec<SqlType> = self.columns.iter().map(|c| c.sql_type).collect();
        let labels: Vec<String> = self.columns.iter().map(|c| c.label.clone()).collect();

        let rows = self.stmt.query([]).map_err(|e| Error::Query {
            cause: e.to_string(),
        })?;

        Ok(SqliteCursor {
            rows,
            types,
            labels,
        })
    }
}

/// Forward-only cursor over a `SQLite` result set.
pub struct SqliteCursor<'stmt> {
    rows: rusqlite::Rows<'stmt>,
    types: Vec<SqlType>,
    labels: Vec<String>,
}

impl Cursor for SqliteCursor<'_> {
    fn next_row(&mut self) -> Result<Option<Vec<Value>>> {
        let Some(row) = self.rows.next().map_err(|e| Error::Query {
            cause: e.to_string(),
        })?
        else {
            return Ok(None);
        };

        let mut values = Vec::with_capacity(self.types.len());
        for (idx, sql_type) in self.types.iter().enumerate() {
            let cell = row.get_ref(idx).map_err(|e| Error::Query {
                cause: e.to_string(),
            })?;
            values.push(decode(cell, *sql_type, &self.labels[idx])?);
        }
        Ok(Some(values))
    }
}

/// Decodes one cell per its declared column type.
fn decode(cell: ValueRef<'_>, sql_type: SqlType, label: &str) -> Result<Value> {
    let format_err = |cause: String| Error::Format {
        column: label.to_string(),
        cause,
    };

    match (sql_type, cell) {
        (_, ValueRef::Null) => Ok(Value::Null),

        (SqlType::Boolean, ValueRef::Integer(i)) => Ok(Value::Bool(i != 0)),
        (SqlType::Boolean, ValueRef::Text(t)) => match text(t, label)? {
            "true" | "TRUE" | "1" => Ok(Value::Bool(true)),
            "false" | "FALSE" | "0" => Ok(Value::Bool(false)),
            other => Err(format_err(format!("'{other}' is not a boolean"))),
        },

        (SqlType::Timestamp, ValueRef::Integer(i)) => DateTime::from_timestamp(i, 0)
            .map(Value::Timestamp)
            .ok_or_else(|| format_err(format!("{i} is out of timestamp range"))),
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        (SqlType::Timestamp, ValueRef::Real(f)) => {
            DateTime::from_timestamp(f.trunc() as i64, (f.fract().abs() * 1e9) as u32)
                .map(Value::Timestamp)
                .ok_or_else(|| format_err(format!("{f} is out of timestamp range")))
        }
        (SqlType::Timestamp, ValueRef::Text(t)) => {
            let raw = text(t, label)?;
            parse_timestamp(raw)
                .map(Value::Timestamp)
                .ok_or_else(|| format_err(format!("'{raw}' is not a timestamp")))
        }

        (SqlType::Array, ValueRef::Text(t)) => {
            let raw = text(t, label)?;
            let parsed: serde_json::Value = serde_json::from_str(raw)
                .map_err(|e| format_err(format!("array cell is not JSON: {e}")))?;
            match parsed {
                serde_json::Value::Array(items) => {
                    Ok(Value::Array(items.iter().map(json_to_value).collect()))
                }
                _ => Err(format_err("array cell is not a JSON array".to_string())),
            }
        }
        (SqlType::Array, _) => Err(format_err("array cell is not text".to_string())),

        (_, ValueRef::Integer(i)) => Ok(Value::Scalar(i.to_string())),
        (_, ValueRef::Real(f)) => Ok(Value::Scalar(f.to_string())),
        (_, ValueRef::Text(t)) => Ok(Value::Scalar(text(t, label)?.to_string())),
        (_, ValueRef::Blob(b)) => Ok(Value::Scalar(hex::encode(b))),
    }
}

/// Interprets a text cell as UTF-8.
fn text<'a>(bytes: &'a [u8], label: &str) -> Result<&'a str> {
    std::str::from_utf8(bytes).map_err(|e| Error::Format {
        column: label.to_string(),
        cause: format!("text cell is not UTF-8: {e}"),
    })
}

/// Parses the timestamp text forms `SQLite` commonly stores.
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    for pattern in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, pattern) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Converts a parsed JSON element into the value model.
fn json_to_value(json: &serde_json::Value) -> Value {
    match json {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(*b),
        serde_json::Value::Number(n) => Value::Scalar(n.to_string()),
        serde_json::Value::String(s) => Value::Scalar(s.clone()),
        serde_json::Value::Array(items) => Value::Array(items.iter().map(json_to_value).collect()),
        serde_json::Value::Object(_) => Value::Scalar(json.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Driver;

    fn memory_source() -> SqliteConnection {
        let config = SourceConfig {
            driver: Driver::Sqlite,
            url: ":memory:".to_string(),
            user: String::new(),
            password: None,
        };
        SqliteConnection::connect(&config, None).unwrap()
    }

    #[test]
    fn test_connect_in_memory_forms() {
        for url in ["", ":memory:", "sqlite::memory:"] {
            let config = SourceConfig {
                driver: Driver::Sqlite,
                url: url.to_string(),
                user: String::new(),
                password: None,
            };
            assert!(SqliteConnection::connect(&config, None).is_ok(), "url {url:?}");
        }
    }

    #[test]
    fn test_expression_columns_are_scalars() {
        let conn = memory_source();
        let stmt = conn.prepare("select 'foo bar' as TEST").unwrap();

        assert_eq!(stmt.columns().len(), 1);
        assert_eq!(stmt.columns()[0].label, "TEST");
        assert_eq!(stmt.columns()[0].sql_type, SqlType::Scalar);
    }

    #[test]
    fn test_declared_types_drive_decoding() {
        let conn = memory_source();
        conn.conn
            .execute_batch(
                "create table t (
                     flag BOOLEAN,
                     seen TIMESTAMP,
                     tags TEXT_ARRAY,
                     note TEXT
                 );
                 insert into t values (1, '2024-05-01 10:30:00', '[1,[2,3]]', 'plain');",
            )
            .unwrap();

        let mut stmt = conn.prepare("select flag, seen, tags, note from t").unwrap();
        let columns = stmt.columns().to_vec();
        assert_eq!(
            columns.iter().map(|c| c.sql_type).collect::<Vec<_>>(),
            vec![
                SqlType::Boolean,
                SqlType::Timestamp,
                SqlType::Array,
                SqlType::Scalar
            ]
        );

        let mut cursor = stmt.cursor().unwrap();
        let row = cursor.next_row().unwrap().unwrap();
        assert_eq!(row.len(), 4);

        assert_eq!(row[0], Value::Bool(true));
        assert!(matches!(row[1], Value::Timestamp(_)));
        assert_eq!(
            row[2],
            Value::Array(vec![
                Value::Scalar("1".to_string()),
                Value::Array(vec![
                    Value::Scalar("2".to_string()),
                    Value::Scalar("3".to_string())
                ]),
            ])
        );
        assert_eq!(row[3], Value::Scalar("plain".to_string()));

        assert!(cursor.next_row().unwrap().is_none());
    }

    #[test]
    fn test_null_cells_decode_to_null() {
        let conn = memory_source();
        let mut stmt = conn.prepare("select null as a, null as b").unwrap();
        let mut cursor = stmt.cursor().unwrap();
        let row = cursor.next_row().unwrap().unwrap();
        assert_eq!(row, vec![Value::Null, Value::Null]);
    }

    #[test]
    fn test_bad_array_cell_is_a_format_error() {
        let conn = memory_source();
        conn.conn
            .execute_batch(
                "create table t (tags JSON);
                 insert into t values ('not json at all');",
            )
            .unwrap();

        let mut stmt = conn.prepare("select tags from t").unwrap();
        let mut cursor = stmt.cursor().unwrap();
        let err = cursor.next_row().unwrap_err();
        assert!(matches!(err, Error::Format { .. }));
        assert!(err.to_string().contains("tags"));
    }

    #[test]
    fn test_parse_timestamp_forms() {
        assert!(parse_timestamp("2024-05-01 10:30:00").is_some());
        assert!(parse_timestamp("2024-05-01 10:30:00.125").is_some());
        assert!(parse_timestamp("2024-05-01T10:30:00+09:00").is_some());
        assert!(parse_timestamp("2024-05-01").is_some());
        assert!(parse_timestamp("yesterday").is_none());
    }

    #[test]
    fn test_blob_renders_as_hex() {
        let conn = memory_source();
        let mut stmt = conn.prepare("select x'deadbeef' as b").unwrap();
        let mut cursor = stmt.cursor().unwrap();
        let row = cursor.next_row().unwrap().unwrap();
        assert_eq!(row[0], Value::Scalar("deadbeef".to_string()));
    }
}
