use serde::{Deserialize, Serialize};

use crate::error::{SchemaInferenceError, SpecBuildError};
use crate::inference::{Aggregation, MetricColumn, RecommendedType, SchemaAnalysis, COUNT_METRIC_NAME};
use crate::ingestion::FileFormat;

use super::{
    DataSchema, DimensionsSpec, Granularity, GranularitySpec, IngestionSpec, InputFormat,
    InputLocation, IoConfig, MetricSpec, TimestampSpec, TuningConfig, TASK_TYPE,
};

/// Partitioning, rollup and engine-side resource limits applied to every spec.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpecOptions {
    pub segment_granularity: Granularity,
    pub query_granularity: Granularity,
    pub rollup: bool,
    pub max_rows_per_segment: u64,
    pub max_rows_in_memory: u64,
}

impl Default for SpecOptions {
    fn default() -> Self {
        Self {
            segment_granularity: Granularity::Day,
            query_granularity: Granularity::Hour,
            rollup: true,
            max_rows_per_segment: 5_000_000,
            max_rows_in_memory: 100_000,
        }
    }
}

/// Hand-coded schema used when dynamic construction fails.
///
/// The default relies on engine-side dimension discovery (empty dimension list) and a row
/// count, so it fits any table that has an ISO `timestamp` column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FallbackSchema {
    pub timestamp_column: String,
    pub timestamp_format: String,
    pub dimensions: Vec<String>,
    pub metrics: Vec<MetricColumn>,
}

impl Default for FallbackSchema {
    fn default() -> Self {
        Self {
            timestamp_column: "timestamp".to_string(),
            timestamp_format: "iso".to_string(),
            dimensions: Vec::new(),
            metrics: vec![MetricColumn {
                name: COUNT_METRIC_NAME.to_string(),
                aggregation: Aggregation::Count,
            }],
        }
    }
}

/// Which construction path produced a spec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SpecMode {
    Dynamic,
    Fallback,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BuiltSpec {
    pub spec: IngestionSpec,
    pub mode: SpecMode,
}

/// Turns a schema analysis (or the fixed fallback schema) plus an input location into an
/// [`IngestionSpec`].
#[derive(Debug, Clone, Default)]
pub struct IngestionSpecBuilder {
    options: SpecOptions,
    fallback: FallbackSchema,
}

impl IngestionSpecBuilder {
    pub fn new(options: SpecOptions, fallback: FallbackSchema) -> Self {
        Self { options, fallback }
    }

    /// Build from an inference result, falling back to the fixed schema if dynamic
    /// construction fails for any reason.
    pub fn build(
        &self,
        analysis: Result<&SchemaAnalysis, SchemaInferenceError>,
        location: &InputLocation,
        datasource: &str,
        format: FileFormat,
    ) -> BuiltSpec {
        let dynamic = analysis
            .map_err(SpecBuildError::from)
            .and_then(|a| self.build_dynamic(a, location, datasource, format));

        match dynamic {
            Ok(spec) => BuiltSpec {
                spec,
                mode: SpecMode::Dynamic,
            },
            Err(e) => {
                tracing::warn!(datasource, error = %e, "dynamic spec construction failed; using fallback schema");
                BuiltSpec {
                    spec: self.build_fallback(location, datasource, format),
                    mode: SpecMode::Fallback,
                }
            }
        }
    }

    /// Build a spec driven by the inferred schema.
    pub fn build_dynamic(
        &self,
        analysis: &SchemaAnalysis,
        location: &InputLocation,
        datasource: &str,
        format: FileFormat,
    ) -> Result<IngestionSpec, SpecBuildError> {
        if datasource.trim().is_empty() {
            return Err(SpecBuildError::EmptyDatasource);
        }
        if !analysis.timestamp_column.is_detected() {
            return Err(SpecBuildError::MissingTimestamp);
        }
        let ts = analysis.timestamp_column.name();

        let dimensions = analysis
            .dimensions
            .iter()
            .filter(|d| d.as_str() != ts)
            .cloned()
            .collect();

        let metrics = analysis
            .metrics
            .iter()
            .map(|m| {
                let integral = analysis
                    .column(&m.name)
                    .is_some_and(|c| c.recommended_type == RecommendedType::Long);
                metric_spec(m, integral)
            })
            .collect();

        Ok(self.assemble(
            datasource,
            TimestampSpec {
                column: ts.to_string(),
                format: "auto".to_string(),
            },
            dimensions,
            metrics,
            location,
            format,
        ))
    }

    /// Build a spec from the fixed fallback schema. Never fails.
    pub fn build_fallback(&self, location: &InputLocation, datasource: &str, format: FileFormat) -> IngestionSpec {
        let ts = &self.fallback.timestamp_column;
        let dimensions = self
            .fallback
            .dimensions
            .iter()
            .filter(|d| *d != ts && !self.fallback.metrics.iter().any(|m| &m.name == *d))
            .cloned()
            .collect();
        let metrics = self
            .fallback
            .metrics
            .iter()
            .map(|m| metric_spec(m, false))
            .collect();

        self.assemble(
            datasource,
            TimestampSpec {
                column: ts.clone(),
                format: self.fallback.timestamp_format.clone(),
            },
            dimensions,
            metrics,
            location,
            format,
        )
    }

    fn assemble(
        &self,
        datasource: &str,
        timestamp_spec: TimestampSpec,
        dimensions: Vec<String>,
        metrics_spec: Vec<MetricSpec>,
        location: &InputLocation,
        format: FileFormat,
    ) -> IngestionSpec {
        // A count metric has no input column, so keep discovery from picking up a column of
        // the same name.
        let mut dimension_exclusions = vec![timestamp_spec.column.clone()];
        for m in &metrics_spec {
            if let MetricSpec::Count { name } = m {
                if !dimension_exclusions.contains(name) {
                    dimension_exclusions.push(name.clone());
                }
            }
        }
        let dimensions = dimensions
            .into_iter()
            .filter(|d| !metrics_spec.iter().any(|m| m.name() == d.as_str()))
            .collect();
        IngestionSpec::new(
            DataSchema {
                data_source: datasource.to_string(),
                timestamp_spec,
                dimensions_spec: DimensionsSpec {
                    dimensions,
                    dimension_exclusions,
                },
                metrics_spec,
                granularity_spec: GranularitySpec {
                    kind: "uniform".to_string(),
                    segment_granularity: self.options.segment_granularity,
                    query_granularity: self.options.query_granularity,
                    rollup: self.options.rollup,
                },
            },
            IoConfig {
                kind: TASK_TYPE.to_string(),
                input_source: location.input_source(),
                input_format: InputFormat::for_file(format),
                append_to_existing: false,
            },
            TuningConfig {
                kind: TASK_TYPE.to_string(),
                max_rows_per_segment: self.options.max_rows_per_segment,
                max_rows_in_memory: self.options.max_rows_in_memory,
            },
        )
    }
}

fn metric_spec(m: &MetricColumn, integral: bool) -> MetricSpec {
    match (m.aggregation, integral) {
        (Aggregation::Count, _) => MetricSpec::Count { name: m.name.clone() },
        (Aggregation::Sum, true) => MetricSpec::LongSum {
            name: m.name.clone(),
            field_name: m.name.clone(),
        },
        (Aggregation::Sum, false) => MetricSpec::DoubleSum {
            name: m.name.clone(),
            field_name: m.name.clone(),
        },
    }
}
