//! CSV reading implementation.

use std::path::Path;

use crate::error::{IngestionError, IngestionResult};
use crate::types::{normalize_cell, RawTable};

/// Read a CSV file into a [`RawTable`].
///
/// Rules:
///
/// - CSV must have headers.
/// - Ragged rows are accepted and padded/truncated to the header width.
/// - At most `limit` data rows are read when a limit is given.
pub fn read_csv_from_path(path: impl AsRef<Path>, limit: Option<usize>) -> IngestionResult<RawTable> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)?;
    read_csv_from_reader(&mut rdr, limit)
}

/// Read CSV data from an existing CSV reader.
pub fn read_csv_from_reader<R: std::io::Read>(
    rdr: &mut csv::Reader<R>,
    limit: Option<usize>,
) -> IngestionResult<RawTable> {
    let headers = rdr.headers()?.clone();
    let columns: Vec<String> = headers.iter().map(|h| h.trim().to_owned()).collect();
    if columns.is_empty() || columns.iter().all(|c| c.is_empty()) {
        return Err(IngestionError::Malformed {
            message: "csv has no header row".to_string(),
        });
    }

    let mut rows: Vec<Vec<Option<String>>> = Vec::new();
    for result in rdr.records() {
        if limit.is_some_and(|n| rows.len() >= n) {
            break;
        }
        let record = result?;
        rows.push(record.iter().map(normalize_cell).collect());
    }

    Ok(RawTable::new(columns, rows))
}
