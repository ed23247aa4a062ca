//! `tabular-ingest` admits uploaded tabular files (CSV, Excel, Parquet) into an external
//! columnar analytics engine without a pre-declared schema.
//!
//! An upload is stored, recorded as a task in `ACCEPTED`, and queued. A background
//! [`pipeline::PipelineOrchestrator`] run then validates the file, infers a schema, builds an
//! ingestion spec, submits it to the engine's batch task API and polls the job until it ends.
//! The task record always ends in `COMPLETED` or `FAILED`.
//!
//! ## Reading and inferring
//!
//! Every reader produces a [`types::RawTable`] where each cell is text (or null), so inference
//! sees values before any coercion:
//!
//! ```no_run
//! use tabular_ingest::inference::SchemaInferenceEngine;
//!
//! # fn main() -> Result<(), tabular_ingest::SchemaInferenceError> {
//! let analysis = SchemaInferenceEngine::new(1000).analyze_path("sales.csv")?;
//! println!("timestamp={}", analysis.timestamp_column.name());
//! for metric in &analysis.metrics {
//!     println!("metric {} ({:?})", metric.name, metric.aggregation);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`ingestion`]: CSV / Excel (feature `excel`) / Parquet readers, extension dispatch
//! - [`validation`]: format, size and structural checks
//! - [`inference`]: column classification, timestamp scoring, dimension/metric split
//! - [`ingest_spec`]: the ingestion task document and its builder
//! - [`submission`]: the external job API client and the status monitor
//! - [`store`]: durable task records (SQLite)
//! - [`object_store`]: blob storage capability
//! - [`pipeline`]: the orchestrator, file staging and upload intake
//! - [`execution`]: bounded worker pool
//! - [`http`]: axum routes
//! - [`config`]: runtime configuration
//! - [`error`]: error types per layer

pub mod config;
pub mod error;
pub mod execution;
pub mod http;
pub mod inference;
pub mod ingest_spec;
pub mod ingestion;
pub mod object_store;
pub mod pipeline;
pub mod store;
pub mod submission;
pub mod types;
pub mod validation;

pub use error::{
    ConfigError, IngestionError, IngestionResult, IntakeError, JobApiError, ObjectStoreError, PipelineError,
    QueueError, SchemaInferenceError, SpecBuildError, StoreError,
};
