//! Column label validation and identifier quoting for generated tables.

use crate::database::SinkError;
use std::collections::HashMap;

/// SQL type of every data column.
pub const COLUMN_TYPE: &str = "VARCHAR";

/// Rejects label sets that cannot become table columns.
///
/// Labels must be non-blank and unique ignoring case, since DuckDB
/// resolves identifiers case-insensitively. Positions in errors are 1-based.
pub fn validate_labels(labels: &[String]) -> Result<(), SinkError> {
    if labels.is_empty() {
        return Err(SinkError::NoColumns);
    }
    let mut seen = HashMap::<String, usize>::with_capacity(labels.len());
    for (index, label) in labels.iter().enumerate() {
        let position = index + 1;
        if label.trim().is_empty() {
            return Err(SinkError::BlankColumn { position });
        }
        if let Some(first) = seen.insert(label.to_lowercase(), position) {
            return Err(SinkError::DuplicateColumn {
                label: label.to_owned(),
                first,
                second: position,
            });
        }
    }
    Ok(())
}

/// Wraps an identifier in double quotes, doubling any quote inside it.
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Column list for `CREATE TABLE`, e.g. `"region" VARCHAR, "total" VARCHAR`.
pub(crate) fn column_definitions(labels: &[String]) -> String {
    labels
        .iter()
        .map(|label| format!("{} {COLUMN_TYPE}", quote_identifier(label)))
        .collect::<Vec<_>>()
        .join(", ")
}
