#![cfg(feature = "excel")]

use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader};

use crate::error::{IngestionError, IngestionResult};
use crate::types::{normalize_cell, RawTable};

/// Read the first sheet of an Excel document (`.xlsx`, `.xls`) into a [`RawTable`].
///
/// Behavior:
/// - Detects the first non-empty row as the header row
/// - Renders every cell as text; empty cells become `None`
/// - Reads at most `limit` data rows when a limit is given
pub fn read_excel_from_path(path: impl AsRef<Path>, limit: Option<usize>) -> IngestionResult<RawTable> {
    let mut workbook = open_workbook_auto(path)?;

    let sheet = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| IngestionError::Malformed {
            message: "workbook has no sheets".to_string(),
        })?;

    let range = workbook.worksheet_range(&sheet)?;
    read_sheet_range(&sheet, &range, limit)
}

fn read_sheet_range(
    sheet: &str,
    range: &calamine::Range<Data>,
    limit: Option<usize>,
) -> IngestionResult<RawTable> {
    let mut rows_iter = range
        .rows()
        .skip_while(|row| row.iter().all(|c| matches!(c, Data::Empty)));

    let header = rows_iter.next().ok_or_else(|| IngestionError::Malformed {
        message: format!("sheet '{sheet}' has no non-empty rows (no header row found)"),
    })?;
    let columns: Vec<String> = header.iter().map(|c| cell_to_string(c).trim().to_owned()).collect();

    let mut rows: Vec<Vec<Option<String>>> = Vec::new();
    for row in rows_iter {
        if limit.is_some_and(|n| rows.len() >= n) {
            break;
        }
        rows.push(row.iter().map(cell_to_text).collect());
    }

    Ok(RawTable::new(columns, rows))
}

fn cell_to_text(c: &Data) -> Option<String> {
    match c {
        Data::Empty => None,
        other => normalize_cell(&cell_to_string(other)),
    }
}

fn cell_to_string(c: &Data) -> String {
    match c {
        Data::String(s) => s.clone(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) => {
            if f.fract() == 0.0 && f.abs() < 1e15 {
                (*f as i64).to_string()
            } else {
                f.to_string()
            }
        }
        Data::Bool(b) => b.to_string(),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(ndt) => {
                if ndt.time() == chrono::NaiveTime::MIN {
                    ndt.format("%Y-%m-%d").to_string()
                } else {
                    ndt.format("%Y-%m-%d %H:%M:%S").to_string()
                }
            }
            None => dt.as_f64().to_string(),
        },
        Data::DateTimeIso(s) => s.clone(),
        Data::DurationIso(s) => s.clone(),
        Data::Error(e) => format!("{e:?}"),
        Data::Empty => String::new(),
    }
}
