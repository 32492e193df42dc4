//! Data source layer.
//!
//! Defines the column/value model the pipeline streams over and the
//! [`Cursor`] trait the driver backends implement. The column set is fixed
//! once the statement executes; every row has exactly one value per column.

pub mod sqlite;

pub use sqlite::{SqliteConnection, SqliteCursor, SqliteStatement};

use crate::Result;
use chrono::{DateTime, Utc};

/// One result-set column: ordinal-ordered, fixed for the life of an export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    /// The column label as reported by the data source.
    pub label: String,
    /// The declared type class.
    pub sql_type: SqlType,
}

impl Column {
    /// Creates a column.
    #[must_use]
    pub fn new(label: impl Into<String>, sql_type: SqlType) -> Self {
        Self {
            label: label.into(),
            sql_type,
        }
    }
}

/// Declared type classes the formatter dispatches on.
///
/// Everything that is not a boolean, timestamp or array is a scalar with a
/// canonical string form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SqlType {
    /// Boolean column.
    Boolean,
    /// Date, time or datetime column.
    Timestamp,
    /// Array-valued column (may nest).
    Array,
    /// Any other column.
    #[default]
    Scalar,
}

impl SqlType {
    /// Classifies a declared column type name.
    ///
    /// Matching is by substring over the uppercased declaration, so
    /// `BOOLEAN`, `TIMESTAMP WITH TIME ZONE` and `TEXT_ARRAY` all classify.
    /// Columns with no declaration (expressions) are scalars.
    #[must_use]
    pub fn from_decl(decl: Option<&str>) -> Self {
        let decl = decl.unwrap_or("").to_ascii_uppercase();
        if decl.contains("BOOL") {
            Self::Boolean
        } else if decl.contains("ARRAY") || decl.contains("JSON") {
            Self::Array
        } else if decl.contains("DATE") || decl.contains("TIME") {
            Self::Timestamp
        } else {
            Self::Scalar
        }
    }
}

/// A nullable typed column datum as reported by the data source.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// SQL NULL.
    Null,
    /// Boolean.
    Bool(bool),
    /// Point in time, normalized to UTC.
    Timestamp(DateTime<Utc>),
    /// Nested array of values.
    Array(Vec<Value>),
    /// Scalar carrying its canonical string representation.
    Scalar(String),
}

impl Value {
    /// Returns the type class matching this value's tag.
    ///
    /// Used when recursing into array elements, whose declared type is the
    /// element's own tag.
    #[must_use]
    pub const fn sql_type(&self) -> SqlType {
        match self {
            Self::Bool(_) => SqlType::Boolean,
            Self::Timestamp(_) => SqlType::Timestamp,
            Self::Array(_) => SqlType::Array,
            Self::Null | Self::Scalar(_) => SqlType::Scalar,
        }
    }
}

/// Forward-only iterator over query result rows.
///
/// Implementations pull one row per call and never retain rows after
/// yielding them; the pipeline owns the cursor exclusively for the run.
pub trait Cursor {
    /// Advances to the next row.
    ///
    /// Returns `Ok(None)` once the result set is exhausted. A yielded row
    /// always has one [`Value`] per column.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Query`] if the cursor fails to advance, or
    /// [`crate::Error::Format`] if a cell cannot be represented per its
    /// declared column type.
    fn next_row(&mut self) -> Result<Option<Vec<Value>>>;
}
