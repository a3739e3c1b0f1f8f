//! Decode api-linter's JSON output into [`DiagnosticRecord`]s.
//!
//! api-linter prints one group per file:
//!
//! ```json
//! [{"file_path": "a.proto", "problems": [{
//!     "message": "...",
//!     "location": {"start_position": {"line_number": 5, "column_number": 1},
//!                  "end_position": {"line_number": 5, "column_number": 20}},
//!     "rule_id": "core::0131::http-method",
//!     "rule_doc_uri": "https://linter.aip.dev/131/http-method"
//! }]}]
//! ```
//!
//! Banners or warnings printed around the array are ignored.

use aipguard_core::{DiagnosticRecord, Error, Range, Result};
use serde::Deserialize;
use tracing::warn;

#[derive(Debug, Deserialize)]
struct FileResult {
    file_path: String,
    #[serde(default)]
    problems: Option<Vec<Problem>>,
}

#[derive(Debug, Deserialize)]
struct Problem {
    message: String,
    #[serde(default)]
    suggestion: Option<String>,
    #[serde(default)]
    location: Option<Location>,
    rule_id: String,
    rule_doc_uri: String,
}

#[derive(Debug, Default, Deserialize)]
struct Location {
    #[serde(default)]
    start_position: Position,
    #[serde(default)]
    end_position: Position,
}

#[derive(Debug, Default, Deserialize)]
struct Position {
    #[serde(default)]
    line_number: i64,
    #[serde(default)]
    column_number: i64,
}

/// Decode `stdout`, failing on missing or malformed payloads.
pub fn try_decode(stdout: &str) -> Result<Vec<DiagnosticRecord>> {
    let payload = json_array(stdout)
        .ok_or_else(|| Error::decode("no JSON array in api-linter output"))?;
    let groups: Vec<FileResult> =
        serde_json::from_str(payload).map_err(|e| Error::decode(e.to_string()))?;

    Ok(groups
        .into_iter()
        .flat_map(|group| {
            let file_path = group.file_path;
            group
                .problems
                .unwrap_or_default()
                .into_iter()
                .map(move |problem| {
                    let location = problem.location.unwrap_or_default();
                    DiagnosticRecord {
                        message: problem.message,
                        rule_id: problem.rule_id,
                        rule_doc_uri: problem.rule_doc_uri,
                        range: Range::from_one_indexed(
                            (
                                location.start_position.line_number,
                                location.start_position.column_number,
                            ),
                            (
                                location.end_position.line_number,
                                location.end_position.column_number,
                            ),
                        ),
                        file_path: file_path.clone(),
                        suggestion: problem.suggestion.filter(|s| !s.is_empty()),
                    }
                })
        })
        .collect())
}

/// Decode `stdout`, logging failures and returning no diagnostics instead.
pub fn decode(stdout: &str) -> Vec<DiagnosticRecord> {
    match try_decode(stdout) {
        Ok(records) => records,
        Err(e) => {
            warn!(error = %e, output_len = stdout.len(), "Ignoring undecodable api-linter output");
            Vec::new()
        }
    }
}

/// The text from the first `[` to the last `]`, if both exist in that order.
fn json_array(stdout: &str) -> Option<&str> {
    let trimmed = stdout.trim();
    let start = trimmed.find('[')?;
    let end = trimmed.rfind(']')?;
    (start < end).then(|| &trimmed[start..=end])
}
