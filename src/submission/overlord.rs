use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::Deserialize;

use crate::error::JobApiError;
use crate::ingest_spec::IngestionSpec;

use super::{IngestionJobApi, JobState, JobStatusReport};

const TASK_PATH: [&str; 4] = ["druid", "indexer", "v1", "task"];

// POST /druid/indexer/v1/task -> {"task": "<id>"}
#[derive(Debug, Deserialize)]
struct SubmitResponse {
    task: Option<String>,
}

// GET /druid/indexer/v1/task/{id}/status -> {"task": "<id>", "status": {...}}
#[derive(Debug, Deserialize)]
struct StatusResponse {
    status: Option<TaskStatusPayload>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TaskStatusPayload {
    status: Option<String>,
    status_code: Option<String>,
    error_msg: Option<String>,
}

/// HTTP client for the ingestion engine's task API (the overlord).
#[derive(Debug, Clone)]
pub struct OverlordClient {
    base_url: Url,
    client: Client,
}

impl OverlordClient {
    /// Create a client with its own connection pool.
    pub fn new(base_url: impl Into<String>) -> Result<Self, JobApiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Self::with_client(base_url, client)
    }

    /// Create a client sharing an existing `reqwest::Client`.
    pub fn with_client(base_url: impl Into<String>, client: Client) -> Result<Self, JobApiError> {
        let raw = base_url.into();
        let base_url = Url::parse(&raw).map_err(|e| JobApiError::InvalidBaseUrl(format!("{raw}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(JobApiError::InvalidBaseUrl(raw));
        }
        Ok(Self { base_url, client })
    }

    /// Append path segments to the base URL. Each segment is percent-encoded,
    /// so a job id can never change the route.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, JobApiError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| JobApiError::InvalidBaseUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(TASK_PATH)
            .extend(segments);
        Ok(url)
    }
}

#[async_trait]
impl IngestionJobApi for OverlordClient {
    async fn submit(&self, spec: &IngestionSpec) -> Result<String, JobApiError> {
        let url = self.endpoint(&[])?;
        let response = self.client.post(url).json(spec).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(JobApiError::SubmissionFailed {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: SubmitResponse = response
            .json()
            .await
            .map_err(|e| JobApiError::Decode(e.to_string()))?;
        match parsed.task {
            Some(id) if !id.trim().is_empty() => {
                tracing::info!(job_id = %id, datasource = %spec.data_schema().data_source, "ingestion task submitted");
                Ok(id)
            }
            _ => Err(JobApiError::MissingJobId),
        }
    }

    async fn job_status(&self, job_id: &str) -> Result<JobStatusReport, JobApiError> {
        let url = self.endpoint(&[job_id, "status"])?;
        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(JobApiError::StatusQuery {
                status: status.as_u16(),
            });
        }

        let parsed: StatusResponse = response
            .json()
            .await
            .map_err(|e| JobApiError::Decode(e.to_string()))?;
        let payload = parsed
            .status
            .ok_or_else(|| JobApiError::Decode("status response has no 'status' object".to_string()))?;
        let raw_state = payload
            .status
            .or(payload.status_code)
            .ok_or_else(|| JobApiError::Decode("status response has no job state".to_string()))?;

        Ok(JobStatusReport {
            state: JobState::parse(&raw_state),
            detail: payload.error_msg,
        })
    }
}
