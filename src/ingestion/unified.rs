//! Unified reading entrypoint.
//!
//! Most callers should use [`read_table_from_path`], which reads a file into a [`RawTable`].
//!
//! - If [`ReadOptions::format`] is `None`, the format is inferred from the file extension.
//! - If [`ReadOptions::limit`] is set, only that many leading data rows are read (sampling).

use std::fmt;
use std::path::Path;

use crate::error::{IngestionError, IngestionResult};
use crate::types::RawTable;

use super::{csv, parquet};

/// Extensions accepted for upload, lowercase and without the leading dot.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["csv", "xlsx", "xls", "parquet"];

/// Supported upload formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileFormat {
    /// Comma-separated values.
    Csv,
    /// Apache Parquet.
    Parquet,
    /// Spreadsheet/workbook formats (feature-gated behind `excel`).
    Excel,
}

impl FileFormat {
    /// Parse a format from a file extension (case-insensitive).
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "csv" => Some(Self::Csv),
            "parquet" => Some(Self::Parquet),
            "xlsx" | "xls" => Some(Self::Excel),
            _ => None,
        }
    }

    /// Infer the format of a file name or path from its extension.
    pub fn from_path(path: impl AsRef<Path>) -> IngestionResult<Self> {
        let path = path.as_ref();
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or_default();
        Self::from_extension(ext).ok_or_else(|| IngestionError::UnsupportedFormat {
            extension: ext.to_string(),
        })
    }
}

impl fmt::Display for FileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Csv => "csv",
            Self::Parquet => "parquet",
            Self::Excel => "excel",
        };
        f.write_str(s)
    }
}

/// Options controlling unified reading.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReadOptions {
    /// If `None`, auto-detect format from file extension.
    pub format: Option<FileFormat>,
    /// If `Some(n)`, read only the first `n` data rows.
    pub limit: Option<usize>,
}

impl ReadOptions {
    /// Read only a bounded prefix of the file.
    pub fn sample(limit: usize) -> Self {
        Self {
            format: None,
            limit: Some(limit),
        }
    }
}

/// Unified read entry point for path-based sources.
///
/// ```no_run
/// use tabular_ingest::ingestion::{read_table_from_path, ReadOptions};
///
/// # fn main() -> Result<(), tabular_ingest::IngestionError> {
/// // Uses `.csv` to select the CSV reader; keeps the first 1000 rows.
/// let table = read_table_from_path("sales.csv", &ReadOptions::sample(1000))?;
/// println!("rows={} columns={}", table.row_count(), table.column_count());
/// # Ok(())
/// # }
/// ```
pub fn read_table_from_path(path: impl AsRef<Path>, options: &ReadOptions) -> IngestionResult<RawTable> {
    let path = path.as_ref();
    let fmt = match options.format {
        Some(f) => f,
        None => FileFormat::from_path(path)?,
    };

    let result = match fmt {
        FileFormat::Csv => csv::read_csv_from_path(path, options.limit),
        FileFormat::Parquet => parquet::read_parquet_from_path(path, options.limit),
        FileFormat::Excel => read_excel_dispatch(path, options.limit),
    };

    match &result {
        Ok(table) => tracing::debug!(
            format = %fmt,
            path = %path.display(),
            rows = table.row_count(),
            columns = table.column_count(),
            "read table"
        ),
        Err(e) => tracing::debug!(format = %fmt, path = %path.display(), error = %e, "failed to read table"),
    }

    result
}

fn read_excel_dispatch(path: &Path, limit: Option<usize>) -> IngestionResult<RawTable> {
    // Avoid unused warnings when the feature is off.
    let _ = (path, limit);

    #[cfg(feature = "excel")]
    {
        super::excel::read_excel_from_path(path, limit)
    }

    #[cfg(not(feature = "excel"))]
    {
        Err(IngestionError::UnsupportedFormat {
            extension: "xlsx (excel reading not enabled; enable cargo feature 'excel')".to_string(),
        })
    }
}
