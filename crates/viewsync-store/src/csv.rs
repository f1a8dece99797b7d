#![deny(unsafe_code)]

use std::path::Path;

use tracing::info;
use viewsync_model::{CellValue, DatasetSpec, FetchSpec};

use crate::error::IngestError;
use crate::memory::MemoryStore;

/// Reads a CSV file (first record is the header) into a new store table.
///
/// Returns the number of ingested rows.
pub fn load_csv_file(store: &MemoryStore, table: &str, path: &Path) -> Result<usize, IngestError> {
    let mut reader = csv::Reader::from_path(path).map_err(|e| csv_error(path, &e))?;
    let columns: Vec<String> = reader
        .headers()
        .map_err(|e| csv_error(path, &e))?
        .iter()
        .map(str::to_string)
        .collect();
    store.create_table(table, columns)?;

    let mut rows = 0usize;
    for record in reader.records() {
        let record = record.map_err(|e| csv_error(path, &e))?;
        let row: Vec<CellValue> = record.iter().map(infer_cell).collect();
        store.insert_row(table, row)?;
        rows += 1;
    }
    info!(table, rows, path = %path.display(), "csv ingested");
    Ok(rows)
}

/// Populates the store for every query-backed dataset spec, reading
/// `<table>.csv` from `dir`.
pub fn load_for_datasets(
    store: &MemoryStore,
    dir: &Path,
    datasets: &[DatasetSpec],
) -> Result<(), IngestError> {
    for spec in datasets {
        let FetchSpec::Query(table) = &spec.fetch else {
            continue;
        };
        let path = dir.join(format!("{table}.csv"));
        load_csv_file(store, table, &path)?;
    }
    Ok(())
}

/// Best-effort typing of a raw CSV field.
fn infer_cell(raw: &str) -> CellValue {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return CellValue::Missing;
    }
    if trimmed.eq_ignore_ascii_case("true") {
        return CellValue::Bool(true);
    }
    if trimmed.eq_ignore_ascii_case("false") {
        return CellValue::Bool(false);
    }
    if let Ok(int) = trimmed.parse::<i64>() {
        return CellValue::Int(int);
    }
    if let Ok(float) = trimmed.parse::<f64>() {
        return CellValue::Float(float);
    }
    CellValue::Text(trimmed.to_string())
}

fn csv_error(path: &Path, error: &dyn std::fmt::Display) -> IngestError {
    IngestError::Csv {
        path: path.to_path_buf(),
        message: error.to_string(),
    }
}
