//! Schema inference over a sampled table.
//!
//! [`SchemaInferenceEngine`] reads a bounded prefix of an uploaded file (every cell as text),
//! classifies each column, scores timestamp candidates and splits the remaining columns into
//! dimensions and metrics.
//!
//! ## Example
//!
//! ```rust
//! use tabular_ingest::inference::{Aggregation, SchemaInferenceEngine, TimestampColumn};
//! use tabular_ingest::types::RawTable;
//!
//! let table = RawTable::new(
//!     vec!["date".into(), "amount".into(), "category".into()],
//!     vec![
//!         vec![Some("2024-01-01".into()), Some("10".into()), Some("a".into())],
//!         vec![Some("2024-01-02".into()), Some("12".into()), Some("b".into())],
//!     ],
//! );
//! let analysis = SchemaInferenceEngine::default().analyze_table(&table).unwrap();
//! assert_eq!(analysis.timestamp_column, TimestampColumn::Detected("date".into()));
//! assert_eq!(analysis.dimensions, vec!["category".to_string()]);
//! assert_eq!(analysis.metrics[0].name, "amount");
//! assert_eq!(analysis.metrics[0].aggregation, Aggregation::Sum);
//! ```

pub mod patterns;

use std::collections::HashSet;
use std::path::Path;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::SchemaInferenceError;
use crate::ingestion::{read_table_from_path, ReadOptions};
use crate::types::RawTable;

use patterns::{
    is_boolean_token, is_integral_literal, is_numeric_literal, name_matches, parses_as_date,
    share_at_least, DATE_KEYWORDS, DIMENSION_KEYWORDS, NUMERIC_KEYWORDS,
};

/// Default number of leading rows sampled for inference.
pub const DEFAULT_SAMPLE_ROWS: usize = 1000;

/// Minimum share (percent) of non-null values that must look numeric.
pub const NUMERIC_THRESHOLD_PCT: usize = 80;

/// Column name reported when no usable timestamp column exists.
pub const FALLBACK_TIMESTAMP_COLUMN: &str = "timestamp";

/// Name of the metric synthesized when no column is a measure.
pub const COUNT_METRIC_NAME: &str = "count";

const SAMPLE_VALUES_PER_COLUMN: usize = 5;

/// Value type determined from a column's content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InferredType {
    Date,
    Numeric,
    Boolean,
    String,
}

/// Column type recommended for the analytics store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RecommendedType {
    Long,
    Double,
    String,
}

impl RecommendedType {
    pub fn is_numeric(self) -> bool {
        matches!(self, Self::Long | Self::Double)
    }
}

/// Which keyword vocabularies a column name matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct PatternHints {
    pub numeric_name: bool,
    pub date_name: bool,
    pub dimension_name: bool,
}

/// Per-column inference record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnProfile {
    pub name: String,
    pub inferred_type: InferredType,
    pub recommended_type: RecommendedType,
    pub null_percentage: f64,
    pub unique_percentage: f64,
    pub hints: PatternHints,
    pub sample_values: Vec<String>,
    pub timestamp_score: u32,
}

/// Aggregation applied to a metric at ingestion time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Aggregation {
    Sum,
    Count,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricColumn {
    pub name: String,
    pub aggregation: Aggregation,
}

/// The column chosen to drive time partitioning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "column", rename_all = "lowercase")]
pub enum TimestampColumn {
    Detected(String),
    /// No usable timestamp column; [`TimestampColumn::name`] reports the sentinel name.
    Missing,
}

impl TimestampColumn {
    pub fn name(&self) -> &str {
        match self {
            Self::Detected(name) => name,
            Self::Missing => FALLBACK_TIMESTAMP_COLUMN,
        }
    }

    pub fn is_detected(&self) -> bool {
        matches!(self, Self::Detected(_))
    }
}

/// Result of analyzing one sampled table. Ephemeral: never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchemaAnalysis {
    pub columns: Vec<ColumnProfile>,
    pub timestamp_column: TimestampColumn,
    pub dimensions: Vec<String>,
    pub metrics: Vec<MetricColumn>,
    pub sampled_rows: usize,
}

impl SchemaAnalysis {
    pub fn column(&self, name: &str) -> Option<&ColumnProfile> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Metrics backed by a real column (excludes the synthesized count).
    pub fn column_metrics(&self) -> impl Iterator<Item = &MetricColumn> {
        self.metrics
            .iter()
            .filter(|m| m.aggregation != Aggregation::Count)
    }
}

/// Classifies sampled columns and recommends a dimension/metric schema.
#[derive(Debug, Clone)]
pub struct SchemaInferenceEngine {
    sample_rows: usize,
}

impl Default for SchemaInferenceEngine {
    fn default() -> Self {
        Self::new(DEFAULT_SAMPLE_ROWS)
    }
}

impl SchemaInferenceEngine {
    pub fn new(sample_rows: usize) -> Self {
        Self {
            sample_rows: sample_rows.max(1),
        }
    }

    /// Sample the first rows of a file and analyze them.
    pub fn analyze_path(&self, path: impl AsRef<Path>) -> Result<SchemaAnalysis, SchemaInferenceError> {
        let table = read_table_from_path(path, &ReadOptions::sample(self.sample_rows))?;
        self.analyze_table(&table)
    }

    /// Analyze an already-loaded table. Rows beyond the sample size are ignored.
    pub fn analyze_table(&self, table: &RawTable) -> Result<SchemaAnalysis, SchemaInferenceError> {
        if table.column_count() == 0 {
            return Err(SchemaInferenceError::NoColumns);
        }

        let sampled_rows = table.row_count().min(self.sample_rows);
        let columns: Vec<ColumnProfile> = table
            .columns
            .par_iter()
            .enumerate()
            .map(|(idx, name)| profile_column(table, idx, name, sampled_rows))
            .collect();

        let timestamp_column = choose_timestamp(&columns);

        let mut dimensions = Vec::new();
        let mut metrics = Vec::new();
        for col in &columns {
            if col.name == timestamp_column.name() && timestamp_column.is_detected() {
                continue;
            }
            if col.recommended_type.is_numeric() {
                metrics.push(MetricColumn {
                    name: col.name.clone(),
                    aggregation: Aggregation::Sum,
                });
            } else {
                dimensions.push(col.name.clone());
            }
        }
        if metrics.is_empty() {
            metrics.push(MetricColumn {
                name: count_metric_name(table),
                aggregation: Aggregation::Count,
            });
        }

        tracing::debug!(
            timestamp = timestamp_column.name(),
            dimensions = dimensions.len(),
            metrics = metrics.len(),
            sampled_rows,
            "schema inferred"
        );

        Ok(SchemaAnalysis {
            columns,
            timestamp_column,
            dimensions,
            metrics,
            sampled_rows,
        })
    }
}

fn profile_column(table: &RawTable, idx: usize, name: &str, sampled_rows: usize) -> ColumnProfile {
    let cells: Vec<Option<&str>> = table.column_cells(idx).take(sampled_rows).collect();
    let values: Vec<&str> = cells.iter().copied().flatten().collect();

    let nulls = cells.len() - values.len();
    let distinct: HashSet<&str> = values.iter().copied().collect();
    let null_percentage = percentage(nulls, cells.len());
    let unique_percentage = percentage(distinct.len(), cells.len());

    let inferred_type = classify(&values);
    let hints = PatternHints {
        numeric_name: name_matches(name, NUMERIC_KEYWORDS),
        date_name: name_matches(name, DATE_KEYWORDS),
        dimension_name: name_matches(name, DIMENSION_KEYWORDS),
    };
    let recommended_type = recommend(inferred_type, hints, &values);

    let mut timestamp_score = 0;
    if hints.date_name {
        timestamp_score += 10;
    }
    if inferred_type == InferredType::Date {
        timestamp_score += 8;
    }
    if null_percentage < 20.0 {
        timestamp_score += 5;
    }
    if unique_percentage > 10.0 {
        timestamp_score += 3;
    }

    let mut seen = HashSet::new();
    let sample_values = values
        .iter()
        .filter(|v| seen.insert(**v))
        .take(SAMPLE_VALUES_PER_COLUMN)
        .map(|v| v.to_string())
        .collect();

    ColumnProfile {
        name: name.to_string(),
        inferred_type,
        recommended_type,
        null_percentage,
        unique_percentage,
        hints,
        sample_values,
        timestamp_score,
    }
}

/// Date, then numeric (>= 80% numeric literals), then boolean, else string.
pub fn classify(values: &[&str]) -> InferredType {
    if values.is_empty() {
        return InferredType::String;
    }
    if values.iter().all(|v| parses_as_date(v)) {
        return InferredType::Date;
    }
    if share_at_least(values.iter().copied(), NUMERIC_THRESHOLD_PCT, is_numeric_literal) {
        return InferredType::Numeric;
    }
    if values.iter().all(|v| is_boolean_token(v)) {
        return InferredType::Boolean;
    }
    InferredType::String
}

fn recommend(inferred: InferredType, hints: PatternHints, values: &[&str]) -> RecommendedType {
    if inferred != InferredType::Numeric {
        return RecommendedType::String;
    }
    let integral = values
        .iter()
        .filter(|v| is_numeric_literal(v))
        .all(|v| is_integral_literal(v));
    // Integer identifiers and codes stay categorical.
    if integral && hints.dimension_name && !hints.numeric_name {
        return RecommendedType::String;
    }
    if integral {
        RecommendedType::Long
    } else {
        RecommendedType::Double
    }
}

fn choose_timestamp(columns: &[ColumnProfile]) -> TimestampColumn {
    let mut best: Option<&ColumnProfile> = None;
    for col in columns {
        if col.timestamp_score > best.map_or(0, |b| b.timestamp_score) {
            best = Some(col);
        }
    }
    if let Some(col) = best {
        return TimestampColumn::Detected(col.name.clone());
    }
    columns
        .iter()
        .find(|c| c.inferred_type == InferredType::Date)
        .map(|c| TimestampColumn::Detected(c.name.clone()))
        .unwrap_or(TimestampColumn::Missing)
}

/// `count`, or `count_1`, `count_2`, ... when the table already has a column of that name.
fn count_metric_name(table: &RawTable) -> String {
    if table.index_of(COUNT_METRIC_NAME).is_none() {
        return COUNT_METRIC_NAME.to_string();
    }
    (1..)
        .map(|n| format!("{COUNT_METRIC_NAME}_{n}"))
        .find(|candidate| table.index_of(candidate).is_none())
        .unwrap_or_else(|| COUNT_METRIC_NAME.to_string())
}

fn percentage(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 * 100.0 / whole as f64
    }
}
