//! Upload validation: format, size and structural sanity of the parsed table.
//!
//! Format and size are checked first and fail fast. Every structural check after that runs
//! independently and accumulates into [`ValidationReport::validation_errors`].

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::ingestion::{read_table_from_path, FileFormat, ReadOptions, SUPPORTED_EXTENSIONS};
use crate::inference::patterns::{
    is_numeric_literal, name_matches, parses_as_date, share_at_least, DATE_KEYWORDS,
};
use crate::inference::NUMERIC_THRESHOLD_PCT;
use crate::types::RawTable;

/// Default upper bound on upload size (100 MiB).
pub const DEFAULT_MAX_FILE_SIZE: u64 = 100 * 1024 * 1024;
pub const MIN_COLUMNS: usize = 2;
pub const MIN_NUMERIC_COLUMNS: usize = 2;
/// A column whose null ratio is strictly above this fails validation.
pub const MAX_NULL_RATIO: f64 = 0.9;

/// Identifier of the check that produced a [`ValidationIssue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationCheck {
    Format,
    Size,
    Unreadable,
    Empty,
    ColumnCount,
    DateColumn,
    NumericColumns,
    NullRatio,
}

/// One failed check. `column` is set for per-column checks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub column: Option<String>,
    pub check: ValidationCheck,
    pub detail: String,
}

impl ValidationIssue {
    fn table(check: ValidationCheck, detail: impl Into<String>) -> Self {
        Self {
            column: None,
            check,
            detail: detail.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationReport {
    pub is_valid: bool,
    pub error_message: Option<String>,
    pub validation_errors: Vec<ValidationIssue>,
    pub row_count: usize,
    pub column_count: usize,
}

impl ValidationReport {
    fn from_issues(issues: Vec<ValidationIssue>, row_count: usize, column_count: usize) -> Self {
        let error_message = if issues.is_empty() {
            None
        } else {
            Some(
                issues
                    .iter()
                    .map(|i| i.detail.as_str())
                    .collect::<Vec<_>>()
                    .join("; "),
            )
        };
        Self {
            is_valid: issues.is_empty(),
            error_message,
            validation_errors: issues,
            row_count,
            column_count,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ValidationService {
    max_file_size: u64,
}

impl Default for ValidationService {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FILE_SIZE)
    }
}

impl ValidationService {
    pub fn new(max_file_size: u64) -> Self {
        Self { max_file_size }
    }

    /// Validate the file at `path`, uploaded as `filename` with `declared_size` bytes.
    ///
    /// Never fails: unreadable files are reported as an `unreadable` issue. The source file is
    /// only read.
    pub fn validate(&self, path: impl AsRef<Path>, filename: &str, declared_size: u64) -> ValidationReport {
        let format = match FileFormat::from_path(filename) {
            Ok(f) => f,
            Err(_) => {
                let ext = Path::new(filename)
                    .extension()
                    .and_then(|e| e.to_str())
                    .unwrap_or_default();
                let issue = ValidationIssue::table(
                    ValidationCheck::Format,
                    format!(
                        "unsupported file format '{ext}' for '{filename}'; expected one of: {}",
                        SUPPORTED_EXTENSIONS.join(", ")
                    ),
                );
                return ValidationReport::from_issues(vec![issue], 0, 0);
            }
        };

        if declared_size == 0 || declared_size > self.max_file_size {
            let issue = ValidationIssue::table(
                ValidationCheck::Size,
                format!(
                    "file size {declared_size} bytes is outside the allowed range (1..={} bytes)",
                    self.max_file_size
                ),
            );
            return ValidationReport::from_issues(vec![issue], 0, 0);
        }

        let options = ReadOptions {
            format: Some(format),
            limit: None,
        };
        let table = match read_table_from_path(path, &options) {
            Ok(t) => t,
            Err(e) => {
                let issue = ValidationIssue::table(
                    ValidationCheck::Unreadable,
                    format!("could not parse '{filename}' as {format}: {e}"),
                );
                return ValidationReport::from_issues(vec![issue], 0, 0);
            }
        };

        let issues = self.validate_table(&table);
        let report = ValidationReport::from_issues(issues, table.row_count(), table.column_count());
        tracing::debug!(
            filename,
            valid = report.is_valid,
            issues = report.validation_errors.len(),
            rows = report.row_count,
            "validated upload"
        );
        report
    }

    /// Structural checks on a parsed table. Each check runs regardless of the others.
    pub fn validate_table(&self, table: &RawTable) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();

        if table.row_count() == 0 {
            issues.push(ValidationIssue::table(ValidationCheck::Empty, "file contains no data rows"));
        }

        if table.column_count() < MIN_COLUMNS {
            issues.push(ValidationIssue::table(
                ValidationCheck::ColumnCount,
                format!(
                    "file has {} column(s); at least {MIN_COLUMNS} are required",
                    table.column_count()
                ),
            ));
        }

        let has_date = (0..table.column_count()).any(|idx| {
            let values = table.non_null_values(idx);
            name_matches(&table.columns[idx], DATE_KEYWORDS)
                || (!values.is_empty() && values.iter().all(|v| parses_as_date(v)))
        });
        if !has_date {
            issues.push(ValidationIssue::table(
                ValidationCheck::DateColumn,
                "no column name or values resemble a date/time",
            ));
        }

        let numeric_columns = (0..table.column_count())
            .filter(|&idx| {
                share_at_least(
                    table.non_null_values(idx),
                    NUMERIC_THRESHOLD_PCT,
                    is_numeric_literal,
                )
            })
            .count();
        if numeric_columns < MIN_NUMERIC_COLUMNS {
            issues.push(ValidationIssue::table(
                ValidationCheck::NumericColumns,
                format!(
                    "found {numeric_columns} numeric column(s); at least {MIN_NUMERIC_COLUMNS} are required"
                ),
            ));
        }

        if table.row_count() > 0 {
            for (idx, name) in table.columns.iter().enumerate() {
                let ratio = table.null_count(idx) as f64 / table.row_count() as f64;
                if ratio > MAX_NULL_RATIO {
                    issues.push(ValidationIssue {
                        column: Some(name.clone()),
                        check: ValidationCheck::NullRatio,
                        detail: format!(
                            "column '{name}' is {:.1}% null (limit {:.0}%)",
                            ratio * 100.0,
                            MAX_NULL_RATIO * 100.0
                        ),
                    });
                }
            }
        }

        issues
    }
}
