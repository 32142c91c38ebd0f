//! Snapshot document parsing.
//!
//! A snapshot is either JSON `null` (the log has not loaded yet) or an array
//! of entries. Individual entries that fail to decode are skipped with a
//! warning; only a document that is neither `null` nor an array is an error.

use serde_json::Value;
use tracing::warn;

use super::ActionEntry;

/// Entries observed for one subject, or `None` while the log is still loading.
pub type Snapshot = Option<Vec<ActionEntry>>;

/// Reason a snapshot document could not be read.
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("snapshot is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("snapshot must be null or an array of entries, found {found}")]
    NotAnArray { found: &'static str },
}

/// Parse a snapshot document.
///
/// # Errors
///
/// Returns [`SnapshotError::Json`] for invalid JSON and
/// [`SnapshotError::NotAnArray`] when the top-level value is neither `null`
/// nor an array.
pub fn parse_snapshot(input: &str) -> Result<Snapshot, SnapshotError> {
    let doc: Value = serde_json::from_str(input)?;
    let items = match doc {
        Value::Null => return Ok(None),
        Value::Array(items) => items,
        other => {
            return Err(SnapshotError::NotAnArray {
                found: value_kind(&other),
            });
        }
    };

    let mut entries = Vec::with_capacity(items.len());
    for (index, item) in items.into_iter().enumerate() {
        match serde_json::from_value::<ActionEntry>(item) {
            Ok(entry) => entries.push(entry),
            Err(err) => warn!(index, error = %err, "skipping malformed snapshot entry"),
        }
    }
    Ok(Some(entries))
}

const fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
