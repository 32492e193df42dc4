//! Row-value formatting.
//!
//! [`ValueFormatter`] turns one column value into its textual form. It is a
//! pure function of `(value, column, config)` with the rules applied in a
//! fixed priority order:
//!
//! 1. null: `[]` for array columns in bracket mode, otherwise the absent
//!    field
//! 2. configured timestamp pattern
//! 3. bracketed array rendering (recursive, unbounded depth)
//! 4. boolean as `1` / `0`
//! 5. canonical string representation
//!
//! The output distinguishes a genuinely absent field from the empty string:
//! [`FormattedField::Null`] carries the provenance the encoder needs to
//! render the null replacement and exempt it from content-triggered
//! quoting.

use crate::config::FormatterConfig;
use crate::source::{Column, SqlType, Value};

/// One formatted field, with null provenance preserved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormattedField {
    /// The absent field: rendered downstream as the configured null
    /// replacement, or as an empty field when none is configured.
    Null,
    /// Ordinary field text.
    Text(String),
}

impl FormattedField {
    /// Whether this field is the absent field.
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns the field text, if any.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Null => None,
            Self::Text(s) => Some(s),
        }
    }
}

/// Converts column values to their textual representation.
#[derive(Debug, Clone)]
pub struct ValueFormatter {
    config: FormatterConfig,
}

impl ValueFormatter {
    /// Creates a formatter from its configuration.
    #[must_use]
    pub const fn new(config: FormatterConfig) -> Self {
        Self { config }
    }

    /// Formats one value for its column.
    #[must_use]
    pub fn format(&self, value: &Value, column: &Column) -> FormattedField {
        self.format_typed(value, column.sql_type)
    }

    /// Formats a value against a declared type class.
    ///
    /// Array elements recurse through here with the element's own tag as
    /// its declared type.
    fn format_typed(&self, value: &Value, sql_type: SqlType) -> FormattedField {
        if matches!(value, Value::Null) {
            if sql_type == SqlType::Array && self.config.array_in_square_brackets {
                return FormattedField::Text("[]".to_string());
            }
            return FormattedField::Null;
        }

        if let (Some(format), Value::Timestamp(ts)) = (&self.config.timestamp_format, value) {
            return FormattedField::Text(format.apply(ts));
        }

        if self.config.array_in_square_brackets {
            if let Value::Array(items) = value {
                return FormattedField::Text(self.bracketed(items));
            }
        }

        if self.config.boolean_as_int {
            if let Value::Bool(b) = value {
                return FormattedField::Text(if *b { "1" } else { "0" }.to_string());
            }
        }

        FormattedField::Text(self.canonical(value))
    }

    /// Renders an array recursively as `[a,b,...]`.
    fn bracketed(&self, items: &[Value]) -> String {
        let parts: Vec<String> = items
            .iter()
            .map(|item| match self.format_typed(item, item.sql_type()) {
                FormattedField::Text(s) => s,
                FormattedField::Null => self
                    .config
                    .null_replacement
                    .clone()
                    .unwrap_or_default(),
            })
            .collect();
        format!("[{}]", parts.join(","))
    }

    /// Canonical string representation (rule 5).
    ///
    /// Timestamps render as UTC `%Y-%m-%d %H:%M:%S%.f`; arrays outside
    /// bracket mode as comma-joined element canonicals, null elements
    /// empty.
    fn canonical(&self, value: &Value) -> String {
        match value {
            Value::Null => String::new(),
            Value::Bool(b) => b.to_string(),
            Value::Timestamp(ts) => ts.format("%Y-%m-%d %H:%M:%S%.f").to_string(),
            Value::Scalar(s) => s.clone(),
            Value::Array(items) => items
                .iter()
                .map(|item| self.canonical(item))
                .collect::<Vec<_>>()
                .join(","),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{TimestampFormat, Timezone};
    use chrono::DateTime;

    fn scalar_column() -> Column {
        Column::new("c", SqlType::Scalar)
    }

    fn array_column() -> Column {
        Column::new("c", SqlType::Array)
    }

    #[test]
    fn test_null_without_replacement_is_absent() {
        let formatter = ValueFormatter::new(FormatterConfig::default());
        assert_eq!(
            formatter.format(&Value::Null, &scalar_column()),
            FormattedField::Null
        );
    }

    #[test]
    fn test_null_array_column_renders_empty_brackets() {
        let config = FormatterConfig {
            array_in_square_brackets: true,
            ..FormatterConfig::default()
        };
        let formatter = ValueFormatter::new(config);

        assert_eq!(
            formatter.format(&Value::Null, &array_column()),
            FormattedField::Text("[]".to_string())
        );
        // A non-array column still yields the absent field.
        assert_eq!(
            formatter.format(&Value::Null, &scalar_column()),
            FormattedField::Null
        );
    }

    #[test]
    fn test_null_array_column_without_bracket_mode_is_absent() {
        let formatter = ValueFormatter::new(FormatterConfig::default());
        assert_eq!(
            formatter.format(&Value::Null, &array_column()),
            FormattedField::Null
        );
    }

    #[test]
    fn test_boolean_as_int() {
        let config = FormatterConfig {
            boolean_as_int: true,
            ..FormatterConfig::default()
        };
        let formatter = ValueFormatter::new(config);

        let column = Column::new("c", SqlType::Boolean);
        assert_eq!(
            formatter.format(&Value::Bool(true), &column),
            FormattedField::Text("1".to_string())
        );
        assert_eq!(
            formatter.format(&Value::Bool(false), &column),
            FormattedField::Text("0".to_string())
        );
    }

    #[test]
    fn test_boolean_canonical_without_flag() {
        let formatter = ValueFormatter::new(FormatterConfig::default());
        let column = Column::new("c", SqlType::Boolean);
        assert_eq!(
            formatter.format(&Value::Bool(true), &column),
            FormattedField::Text("true".to_string())
        );
    }

    #[test]
    fn test_nested_array_brackets() {
        let config = FormatterConfig {
            array_in_square_brackets: true,
            ..FormatterConfig::default()
        };
        let formatter = ValueFormatter::new(config);

        let value = Value::Array(vec![
            Value::Scalar("1".to_string()),
            Value::Array(vec![
                Value::Scalar("2".to_string()),
                Value::Scalar("3".to_string()),
            ]),
        ]);
        assert_eq!(
            formatter.format(&value, &array_column()),
            FormattedField::Text("[1,[2,3]]".to_string())
        );
    }

    #[test]
    fn test_array_elements_apply_their_own_rules() {
        let config = FormatterConfig {
            array_in_square_brackets: true,
            boolean_as_int: true,
            null_replacement: Some("NA".to_string()),
            ..FormatterConfig::default()
        };
        let formatter = ValueFormatter::new(config);

        let value = Value::Array(vec![
            Value::Bool(true),
            Value::Null,
            Value::Scalar("x".to_string()),
        ]);
        assert_eq!(
            formatter.format(&value, &array_column()),
            FormattedField::Text("[1,NA,x]".to_string())
        );
    }

    #[test]
    fn test_array_canonical_without_bracket_mode() {
        let formatter = ValueFormatter::new(FormatterConfig::default());
        let value = Value::Array(vec![
            Value::Scalar("1".to_string()),
            Value::Scalar("2".to_string()),
        ]);
        assert_eq!(
            formatter.format(&value, &array_column()),
            FormattedField::Text("1,2".to_string())
        );
    }

    #[test]
    fn test_timestamp_pattern_takes_priority() {
        let config = FormatterConfig {
            timestamp_format: Some(
                TimestampFormat::new("%Y/%m/%d", Timezone::Utc).unwrap(),
            ),
            ..FormatterConfig::default()
        };
        let formatter = ValueFormatter::new(config);

        let ts = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let column = Column::new("c", SqlType::Timestamp);
        assert_eq!(
            formatter.format(&Value::Timestamp(ts), &column),
            FormattedField::Text("2023/11/14".to_string())
        );
    }

    #[test]
    fn test_timestamp_canonical_without_pattern() {
        let formatter = ValueFormatter::new(FormatterConfig::default());
        let ts = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let column = Column::new("c", SqlType::Timestamp);
        assert_eq!(
            formatter.format(&Value::Timestamp(ts), &column),
            FormattedField::Text("2023-11-14 22:13:20".to_string())
        );
    }

    #[test]
    fn test_formatting_is_pure() {
        let formatter = ValueFormatter::new(FormatterConfig::default());
        let value = Value::Scalar("same".to_string());
        let column = scalar_column();
        assert_eq!(
            formatter.format(&value, &column),
            formatter.format(&value, &column)
        );
    }
}
