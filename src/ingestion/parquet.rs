//! Parquet reading implementation.

use std::collections::HashMap;
use std::path::Path;

use parquet::file::reader::{ChunkReader, FileReader};
use parquet::file::serialized_reader::SerializedFileReader;
use parquet::record::Field;

use crate::error::{IngestionError, IngestionResult};
use crate::types::{normalize_cell, RawTable};

/// Read a Parquet file into a [`RawTable`].
///
/// Notes:
/// - Columns are the top-level schema fields, in schema order
/// - Uses the Parquet record API (`RowIter`) and renders each value as text
pub fn read_parquet_from_path(path: impl AsRef<Path>, limit: Option<usize>) -> IngestionResult<RawTable> {
    let reader = SerializedFileReader::try_from(path.as_ref())?;

    let columns = parquet_top_level_columns(&reader);
    if columns.is_empty() {
        return Err(IngestionError::Malformed {
            message: "parquet schema has no columns".to_string(),
        });
    }

    let mut rows: Vec<Vec<Option<String>>> = Vec::new();
    for row_res in reader.into_iter() {
        if limit.is_some_and(|n| rows.len() >= n) {
            break;
        }
        let row = row_res?;

        let map: HashMap<&str, &Field> = row
            .get_column_iter()
            .map(|(name, field)| (name.as_str(), field))
            .collect();

        let out_row = columns
            .iter()
            .map(|c| map.get(c.as_str()).and_then(|f| field_to_text(f)))
            .collect();
        rows.push(out_row);
    }

    Ok(RawTable::new(columns, rows))
}

fn parquet_top_level_columns<R: ChunkReader + 'static>(reader: &SerializedFileReader<R>) -> Vec<String> {
    reader
        .metadata()
        .file_metadata()
        .schema_descr()
        .root_schema()
        .get_fields()
        .iter()
        .map(|f| f.name().to_string())
        .collect()
}

fn field_to_text(f: &Field) -> Option<String> {
    match f {
        Field::Null => None,
        Field::Str(s) => normalize_cell(s),
        Field::TimestampMillis(ms) => chrono::DateTime::from_timestamp_millis(*ms)
            .map(|dt| dt.naive_utc().format("%Y-%m-%dT%H:%M:%S").to_string()),
        Field::TimestampMicros(us) => chrono::DateTime::from_timestamp_micros(*us)
            .map(|dt| dt.naive_utc().format("%Y-%m-%dT%H:%M:%S").to_string()),
        other => normalize_cell(&other.to_string()),
    }
}
