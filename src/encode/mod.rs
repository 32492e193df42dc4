//! Delimited text encoding.
//!
//! [`DelimitedEncoder`] serializes one formatted row into a single line,
//! applying the quoting policy:
//!
//! - a field is quoted when `quote_all_columns` is set, OR when it is
//!   ordinary text containing the delimiter, the quote character, the
//!   escape character, a line terminator character or a backslash, or
//!   beginning with `[` (so bracketed array renderings are never ambiguous
//!   with quoting);
//! - the null replacement is exempt from content-triggered quoting: only
//!   a genuine absent field renders as the replacement, so text that merely
//!   equals the replacement still quotes by content;
//! - an absent field with no replacement configured is emitted fully
//!   empty, unquoted even under `quote_all_columns` (absent is
//!   distinguishable from the empty string);
//! - inside a quoted field, quote and escape characters are each preceded
//!   by the configured escape character.

use crate::config::EncoderConfig;
use crate::format::FormattedField;
use crate::source::Column;

/// Serializes rows into delimited text lines.
#[derive(Debug, Clone)]
pub struct DelimitedEncoder {
    config: EncoderConfig,
    null_replacement: Option<String>,
}

impl DelimitedEncoder {
    /// Creates an encoder.
    ///
    /// The null replacement is shared with the formatter's configuration;
    /// the encoder renders it for absent fields and exempts it from
    /// content-triggered quoting.
    #[must_use]
    pub const fn new(config: EncoderConfig, null_replacement: Option<String>) -> Self {
        Self {
            config,
            null_replacement,
        }
    }

    /// Encodes one row, including the configured line terminator.
    #[must_use]
    pub fn encode_row(&self, fields: &[FormattedField]) -> String {
        let mut line = String::new();
        for (idx, field) in fields.iter().enumerate() {
            if idx > 0 {
                line.push(self.config.delimiter);
            }
            self.push_field(&mut line, field);
        }
        line.push_str(&self.config.line_terminator);
        line
    }

    /// Encodes the header row of column labels.
    ///
    /// Labels follow the same quoting policy as ordinary text fields.
    #[must_use]
    pub fn encode_header(&self, columns: &[Column]) -> String {
        let fields: Vec<FormattedField> = columns
            .iter()
            .map(|c| FormattedField::Text(c.label.clone()))
            .collect();
        self.encode_row(&fields)
    }

    /// Appends one field, quoted and escaped per the policy.
    fn push_field(&self, out: &mut String, field: &FormattedField) {
        let (content, quoted) = match field {
            FormattedField::Null => match self.null_replacement.as_deref() {
                // Absent with no replacement: fully empty, never quoted.
                None => ("", false),
                // The sentinel is quoted only under quote-all.
                Some(replacement) => (replacement, self.config.quote_all_columns),
            },
            FormattedField::Text(text) => (
                text.as_str(),
                self.config.quote_all_columns || self.contains_special(text),
            ),
        };

        if quoted {
            out.push(self.config.quote_char);
            for c in content.chars() {
                if c == self.config.quote_char || c == self.config.escape_char {
                    out.push(self.config.escape_char);
                }
                out.push(c);
            }
            out.push(self.config.quote_char);
        } else {
            out.push_str(content);
        }
    }

    /// Whether text triggers quoting by content.
    fn contains_special(&self, text: &str) -> bool {
        text.starts_with('[')
            || text.chars().any(|c| {
                c == self.config.delimiter
                    || c == self.config.quote_char
                    || c == self.config.escape_char
                    || c == '\r'
                    || c == '\n'
                    || c == '\\'
            })
    }
}
