use std::time::Duration;

use thiserror::Error;

use crate::store::TaskStatus;

/// Convenience result type for file reading operations.
pub type IngestionResult<T> = Result<T, IngestionError>;

/// Error type returned by the table readers.
///
/// This is a single error enum shared across CSV/Parquet (and optional Excel) reading.
#[derive(Debug, Error)]
pub enum IngestionError {
    /// Underlying I/O error (e.g. file not found, permission denied).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[cfg(feature = "excel")]
    /// Excel reading error (feature-gated behind `excel`).
    #[error("excel error: {0}")]
    Excel(#[from] calamine::Error),

    /// CSV reading error.
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    /// Parquet reading error.
    #[error("parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    /// The file extension is not one of the supported upload formats.
    #[error("unsupported file format '{extension}'")]
    UnsupportedFormat { extension: String },

    /// The file parsed, but its content is not a usable table.
    #[error("malformed table: {message}")]
    Malformed { message: String },
}

/// Failure to produce a [`crate::inference::SchemaAnalysis`].
///
/// Low-confidence inference is never an error; only unreadable input is.
#[derive(Debug, Error)]
pub enum SchemaInferenceError {
    #[error("failed to read sample: {0}")]
    Read(#[from] IngestionError),

    #[error("sample has no columns")]
    NoColumns,
}

/// Dynamic ingestion spec construction failed; callers fall back to the fixed schema.
#[derive(Debug, Error)]
pub enum SpecBuildError {
    #[error("no usable timestamp column was inferred")]
    MissingTimestamp,

    #[error("datasource name must not be empty")]
    EmptyDatasource,

    #[error("schema inference failed: {0}")]
    Inference(#[from] SchemaInferenceError),
}

/// Errors talking to the external ingestion task API.
#[derive(Debug, Error)]
pub enum JobApiError {
    #[error("ingestion task API returned HTTP {status}: {body}")]
    SubmissionFailed { status: u16, body: String },

    #[error("ingestion task API response did not contain a task id")]
    MissingJobId,

    #[error("status query returned HTTP {status}")]
    StatusQuery { status: u16 },

    #[error("request to ingestion task API failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("could not decode ingestion task API response: {0}")]
    Decode(String),

    #[error("invalid ingestion task API base URL '{0}'")]
    InvalidBaseUrl(String),
}

/// Errors from the durable task record store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("task {task_id}: illegal status transition {from} -> {to}")]
    InvalidTransition {
        task_id: String,
        from: TaskStatus,
        to: TaskStatus,
    },

    #[error("unknown task status '{0}' in store")]
    UnknownStatus(String),

    #[error("invalid timestamp '{0}' in store")]
    InvalidTimestamp(String),

    #[error("task store lock poisoned")]
    Poisoned,
}

/// Errors from the object store capability.
#[derive(Debug, Error)]
pub enum ObjectStoreError {
    #[error("object store io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("object not found: {0}")]
    NotFound(String),

    #[error("invalid object uri '{0}'")]
    InvalidUri(String),

    #[error("invalid object key '{0}'")]
    InvalidKey(String),
}

/// Configuration could not be loaded.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config file: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid value '{value}' for {key}")]
    InvalidValue { key: String, value: String },
}

/// A task could not be handed to the worker pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum QueueError {
    #[error("ingestion queue is full")]
    Full,

    #[error("ingestion workers are shutting down")]
    Closed,
}

/// Upload intake failures. Only these reach the HTTP caller; anything after acceptance is
/// reported through the task record.
#[derive(Debug, Error)]
pub enum IntakeError {
    #[error("missing required field '{0}'")]
    MissingField(&'static str),

    #[error("file could not be stored: {0}")]
    ObjectStore(#[from] ObjectStoreError),

    #[error("task could not be recorded: {0}")]
    Store(#[from] StoreError),

    /// The task exists but was failed immediately because it could not be scheduled.
    #[error("task {task_id} was not scheduled: {source}")]
    NotScheduled {
        task_id: String,
        #[source]
        source: QueueError,
    },
}

/// Post-acceptance pipeline failures.
///
/// The `Display` text of a variant is what ends up in a failed task's `error_message`.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Bad format/size/structure, detected before anything is submitted.
    #[error("{0}")]
    Input(String),

    #[error("object store error: {0}")]
    ObjectStore(#[from] ObjectStoreError),

    #[error("failed to stage file for the ingestion engine: {0}")]
    Staging(#[source] std::io::Error),

    #[error("submission failed: {0}")]
    Submission(#[source] JobApiError),

    /// The external engine reported the job as failed; the detail is kept verbatim.
    #[error("{0}")]
    UpstreamJob(String),

    #[error("ingestion job {job_id} did not reach a terminal state within {}s (timeout)", timeout.as_secs())]
    Timeout { job_id: String, timeout: Duration },

    #[error("monitoring of ingestion job {job_id} was cancelled before it finished")]
    Cancelled { job_id: String },

    #[error("ingestion was cancelled before a job was submitted")]
    CancelledBeforeSubmission,

    #[error("task store error: {0}")]
    Store(#[from] StoreError),

    #[error("unexpected pipeline failure: {0}")]
    Fatal(String),
}
