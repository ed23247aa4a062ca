use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::validation::ValidationIssue;

/// Lifecycle state of an [`IngestionTask`].
///
/// Variants are declared in pipeline order; `COMPLETED` and `FAILED` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    Accepted,
    Processing,
    Submitted,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Accepted => "ACCEPTED",
            Self::Processing => "PROCESSING",
            Self::Submitted => "SUBMITTED",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Whether the state machine allows moving from `self` to `next`.
    ///
    /// Non-terminal states may be re-entered to merge fields; terminal states absorb.
    pub fn can_transition_to(self, next: TaskStatus) -> bool {
        use TaskStatus::*;
        matches!(
            (self, next),
            (Accepted, Processing)
                | (Accepted, Failed)
                | (Processing, Processing)
                | (Processing, Submitted)
                | (Processing, Failed)
                | (Submitted, Submitted)
                | (Submitted, Completed)
                | (Submitted, Failed)
        )
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ACCEPTED" => Ok(Self::Accepted),
            "PROCESSING" => Ok(Self::Processing),
            "SUBMITTED" => Ok(Self::Submitted),
            "COMPLETED" => Ok(Self::Completed),
            "FAILED" => Ok(Self::Failed),
            other => Err(StoreError::UnknownStatus(other.to_string())),
        }
    }
}

/// The durable unit of work for one uploaded file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestionTask {
    pub task_id: String,
    pub datasource_name: String,
    pub original_filename: String,
    pub file_uri: String,
    pub status: TaskStatus,
    pub external_job_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Present if and only if `status` is `FAILED`.
    pub error_message: Option<String>,
    pub validation_errors: Option<Vec<ValidationIssue>>,
    pub file_size: Option<u64>,
    pub row_count: Option<u64>,
}

/// Fields merged into a task by [`super::TaskStateStore::update_status`].
///
/// Only `Some` fields overwrite stored values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskUpdate {
    pub external_job_id: Option<String>,
    pub error_message: Option<String>,
    pub validation_errors: Option<Vec<ValidationIssue>>,
    pub file_size: Option<u64>,
    pub row_count: Option<u64>,
}

impl TaskUpdate {
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            error_message: Some(message.into()),
            ..Default::default()
        }
    }

    pub fn with_job_id(mut self, job_id: impl Into<String>) -> Self {
        self.external_job_id = Some(job_id.into());
        self
    }

    pub fn with_row_count(mut self, rows: u64) -> Self {
        self.row_count = Some(rows);
        self
    }

    pub fn with_validation_errors(mut self, issues: Vec<ValidationIssue>) -> Self {
        self.validation_errors = Some(issues);
        self
    }
}

/// New opaque, URL-safe task identifier.
pub fn new_task_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}
