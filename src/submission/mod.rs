//! Submission to, and monitoring of, the external batch-ingestion task API.
//!
//! - [`IngestionJobApi`] is the seam: one call to submit a spec, one call to query a job.
//! - [`OverlordClient`] implements it over HTTP with `reqwest`.
//! - [`JobMonitor`] polls a submitted job until it reaches a terminal state, times out, or is
//!   cancelled.

mod monitor;
mod overlord;

use std::fmt;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::JobApiError;
use crate::ingest_spec::IngestionSpec;

pub use monitor::{JobMonitor, JobOutcome, MonitorOptions};
pub use overlord::OverlordClient;

/// State of an external ingestion job as reported by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum JobState {
    Pending,
    Running,
    Success,
    Failed,
    Other(String),
}

impl JobState {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_uppercase().as_str() {
            "PENDING" | "WAITING" => Self::Pending,
            "RUNNING" => Self::Running,
            "SUCCESS" => Self::Success,
            "FAILED" => Self::Failed,
            _ => Self::Other(raw.to_string()),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Failed)
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => f.write_str("PENDING"),
            Self::Running => f.write_str("RUNNING"),
            Self::Success => f.write_str("SUCCESS"),
            Self::Failed => f.write_str("FAILED"),
            Self::Other(s) => f.write_str(s),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobStatusReport {
    pub state: JobState,
    pub detail: Option<String>,
}

/// Control plane of the analytics store's batch-ingestion jobs.
#[async_trait]
pub trait IngestionJobApi: Send + Sync {
    /// Submit a spec; returns the external job id. No retries.
    async fn submit(&self, spec: &IngestionSpec) -> Result<String, JobApiError>;

    /// Query the current state of a submitted job.
    async fn job_status(&self, job_id: &str) -> Result<JobStatusReport, JobApiError>;
}
