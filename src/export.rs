//! CSV export of a mirrored table.
//!
//! The header is the field list of the first row; later rows are read against
//! that header, so fields only they carry are dropped. Every data value is
//! quoted, embedded quotes are doubled and null or absent values become `""`.
//! Numbers and booleans are written as-is.
//!
//! Mirrored tables export the rows exactly as the backend sent them; only
//! client-side records fall back to their typed fields.

use crate::{
    error::{Error, Result},
    model::{Mirrored, Table},
    store::Snapshot,
};
use serde::Serialize;
use serde_json::{Map, Value};

/// Renders `rows` as CSV. An empty slice renders as an empty string.
///
/// # Errors
/// Returns [`Error::Serialization`] if a row does not serialize to a JSON
/// object.
pub fn to_csv<T: Serialize>(rows: &[T]) -> Result<String> {
    let objects = rows
        .iter()
        .map(|row| match serde_json::to_value(row) {
            Ok(Value::Object(fields)) => Ok(fields),
            Ok(other) => Err(Error::Serialization(format!(
                "CSV rows must be objects, got {other}"
            ))),
            Err(err) => Err(Error::Serialization(format!("Failed to encode row: {err}"))),
        })
        .collect::<Result<Vec<Map<String, Value>>>>()?;

    let Some(first) = objects.first() else {
        return Ok(String::new());
    };
    let header: Vec<&String> = first.keys().collect();

    let mut lines = Vec::with_capacity(objects.len() + 1);
    lines.push(
        header
            .iter()
            .map(|field| field.as_str())
            .collect::<Vec<_>>()
            .join(","),
    );
    for object in &objects {
        let cells: Vec<String> = header
            .iter()
            .map(|field| quote(&cell_text(object.get(field.as_str()))))
            .collect();
        lines.push(cells.join(","));
    }

    Ok(lines.join("\n"))
}

/// Exports one collection of `snapshot`.
///
/// # Errors
/// Propagates [`to_csv`] failures.
pub fn export_table(snapshot: &Snapshot, table: Table) -> Result<String> {
    match table {
        Table::Employees => export_records(snapshot.employees.as_slice()),
        Table::Apps => export_records(snapshot.apps.as_slice()),
        Table::Onboarding => export_records(snapshot.onboarding.as_slice()),
        Table::Activity => export_records(snapshot.activity.as_slice()),
    }
}

fn export_records<T: Mirrored>(records: &[T]) -> Result<String> {
    let rows = records
        .iter()
        .map(|record| {
            record
                .to_row()
                .map_err(|err| Error::Serialization(format!("Failed to encode row: {err}")))
        })
        .collect::<Result<Vec<Value>>>()?;
    to_csv(&rows)
}

/// Suggested download name, e.g. `employees-2024-03-10.csv`.
#[must_use]
pub fn file_name(table: Table, date: chrono::NaiveDate) -> String {
    format!("{}-{date}.csv", table.name())
}

fn cell_text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(text)) => text.clone(),
        Some(other) => other.to_string(),
    }
}

fn quote(text: &str) -> String {
    format!("\"{}\"", text.replace('"', "\"\""))
}
