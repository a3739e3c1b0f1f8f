//! Diagnostic records produced from api-linter output.

use serde::{Deserialize, Serialize};

/// A 0-indexed source range.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Range {
    /// First line, 0-indexed.
    pub start_line: u32,
    /// First column, 0-indexed.
    pub start_column: u32,
    /// Last line, 0-indexed.
    pub end_line: u32,
    /// End column, 0-indexed.
    pub end_column: u32,
}

impl Range {
    /// Convert api-linter's 1-indexed `(line, column)` pairs.
    ///
    /// Every coordinate is shifted independently and clamped at zero, so a
    /// reported column of 0 on line 5 becomes `(4, 0)`, not `(3, ..)`.
    #[must_use]
    pub fn from_one_indexed(start: (i64, i64), end: (i64, i64)) -> Self {
        Self {
            start_line: to_zero_indexed(start.0),
            start_column: to_zero_indexed(start.1),
            end_line: to_zero_indexed(end.0),
            end_column: to_zero_indexed(end.1),
        }
    }
}

fn to_zero_indexed(value: i64) -> u32 {
    u32::try_from(value.saturating_sub(1).max(0)).unwrap_or(u32::MAX)
}

/// One problem reported by api-linter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticRecord {
    /// Human readable message.
    pub message: String,
    /// Rule identifier, e.g. `core::0131::http-method`.
    pub rule_id: String,
    /// Documentation page for the rule; the key for guidance lookups.
    pub rule_doc_uri: String,
    /// Where the problem is.
    pub range: Range,
    /// File path as reported by the tool.
    pub file_path: String,
    /// Replacement text suggested by the rule, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}
