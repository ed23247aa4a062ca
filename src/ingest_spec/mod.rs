//! Declarative ingestion task document for the analytics store's batch-ingestion API.
//!
//! The shape follows the `index_parallel` task: a data schema (timestamp, dimensions, metrics,
//! granularity), an I/O config (where to read and how to parse) and tuning limits for the
//! engine. [`IngestionSpecBuilder`] produces these documents.

mod builder;

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::ingestion::FileFormat;

pub use builder::{BuiltSpec, FallbackSchema, IngestionSpecBuilder, SpecMode, SpecOptions};

const TASK_TYPE: &str = "index_parallel";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestionSpec {
    #[serde(rename = "type")]
    pub task_type: String,
    pub spec: IngestionSpecBody,
}

impl IngestionSpec {
    pub fn new(data_schema: DataSchema, io_config: IoConfig, tuning_config: TuningConfig) -> Self {
        Self {
            task_type: TASK_TYPE.to_string(),
            spec: IngestionSpecBody {
                data_schema,
                io_config,
                tuning_config,
            },
        }
    }

    pub fn data_schema(&self) -> &DataSchema {
        &self.spec.data_schema
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestionSpecBody {
    pub data_schema: DataSchema,
    pub io_config: IoConfig,
    pub tuning_config: TuningConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataSchema {
    pub data_source: String,
    pub timestamp_spec: TimestampSpec,
    pub dimensions_spec: DimensionsSpec,
    pub metrics_spec: Vec<MetricSpec>,
    pub granularity_spec: GranularitySpec,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimestampSpec {
    pub column: String,
    /// `auto` for inferred schemas, an explicit format (e.g. `iso`) for the fixed schema.
    pub format: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DimensionsSpec {
    pub dimensions: Vec<String>,
    pub dimension_exclusions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum MetricSpec {
    Count {
        name: String,
    },
    LongSum {
        name: String,
        #[serde(rename = "fieldName")]
        field_name: String,
    },
    DoubleSum {
        name: String,
        #[serde(rename = "fieldName")]
        field_name: String,
    },
}

impl MetricSpec {
    pub fn name(&self) -> &str {
        match self {
            Self::Count { name } | Self::LongSum { name, .. } | Self::DoubleSum { name, .. } => name,
        }
    }
}

/// Time bucket sizes understood by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Granularity {
    Minute,
    Hour,
    Day,
    Week,
    Month,
    Year,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GranularitySpec {
    #[serde(rename = "type")]
    pub kind: String,
    pub segment_granularity: Granularity,
    pub query_granularity: Granularity,
    pub rollup: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IoConfig {
    #[serde(rename = "type")]
    pub kind: String,
    pub input_source: InputSource,
    pub input_format: InputFormat,
    pub append_to_existing: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum InputSource {
    Local {
        #[serde(rename = "baseDir")]
        base_dir: String,
        filter: String,
    },
    S3 {
        uris: Vec<String>,
    },
    Http {
        uris: Vec<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum InputFormat {
    Csv {
        #[serde(rename = "findColumnsFromHeader")]
        find_columns_from_header: bool,
    },
    Parquet,
}

impl InputFormat {
    /// Engine-side parser for a file of the given upload format.
    ///
    /// Workbooks are converted to CSV when staged, so they are read as CSV.
    pub fn for_file(format: FileFormat) -> Self {
        match format {
            FileFormat::Csv | FileFormat::Excel => Self::Csv {
                find_columns_from_header: true,
            },
            FileFormat::Parquet => Self::Parquet,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TuningConfig {
    #[serde(rename = "type")]
    pub kind: String,
    pub max_rows_per_segment: u64,
    pub max_rows_in_memory: u64,
}

/// Where the engine reads the input from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputLocation {
    /// A file staged on a filesystem shared with the engine.
    Staged { base_dir: PathBuf, filename: String },
    /// An object-store or HTTP locator the engine can fetch itself.
    Uri(String),
}

impl InputLocation {
    pub fn input_source(&self) -> InputSource {
        match self {
            Self::Staged { base_dir, filename } => InputSource::Local {
                base_dir: base_dir.display().to_string(),
                filter: filename.clone(),
            },
            Self::Uri(uri) if uri.starts_with("s3://") => InputSource::S3 {
                uris: vec![uri.clone()],
            },
            Self::Uri(uri) => InputSource::Http {
                uris: vec![uri.clone()],
            },
        }
    }
}
