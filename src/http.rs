//! HTTP surface: upload intake, task status and task listing.
//!
//! | Route | Response |
//! |---|---|
//! | `POST /upload` (multipart `datasource_name`, `file`) | `202 {"task_id", "status"}` |
//! | `GET /status/{task_id}` | the task record, or `404` |
//! | `GET /tasks?limit=&offset=` | task records, newest first |
//! | `GET /tasks/summary` | task count per status |
//!
//! Errors are `{"code": "...", "message": "..."}` with a stable `code`.

use std::collections::BTreeMap;

use axum::extract::{DefaultBodyLimit, Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::{IntakeError, StoreError};
use crate::pipeline::UploadIntake;
use crate::store::{IngestionTask, TaskStatus};

/// Stable, machine-readable error codes.
pub mod error_code {
    pub const VALIDATION_FAILED: &str = "VALIDATION_FAILED";
    pub const NOT_FOUND: &str = "NOT_FOUND";
    pub const QUEUE_FULL: &str = "QUEUE_FULL";
    pub const STORAGE_ERROR: &str = "STORAGE_ERROR";
    pub const INTERNAL: &str = "INTERNAL";
}

const DEFAULT_PAGE_SIZE: usize = 50;
const MAX_PAGE_SIZE: usize = 500;
/// Room for multipart boundaries and the non-file fields.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

#[derive(Error, Debug)]
pub enum ApiError {
    /// HTTP 400.
    #[error("{0}")]
    Validation(String),

    /// HTTP 404.
    #[error("{0}")]
    NotFound(String),

    /// HTTP 503. The task was recorded as failed.
    #[error("{0}")]
    QueueFull(String),

    /// HTTP 500.
    #[error("{0}")]
    Storage(String),

    /// HTTP 500.
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::Validation(_) => error_code::VALIDATION_FAILED,
            ApiError::NotFound(_) => error_code::NOT_FOUND,
            ApiError::QueueFull(_) => error_code::QUEUE_FULL,
            ApiError::Storage(_) => error_code::STORAGE_ERROR,
            ApiError::Internal(_) => error_code::INTERNAL,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::QueueFull(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Storage(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(code = self.error_code(), error = %self, "request failed");
        }
        let body = serde_json::json!({
            "code": self.error_code(),
            "message": self.to_string(),
        });
        (status, Json(body)).into_response()
    }
}

impl From<IntakeError> for ApiError {
    fn from(err: IntakeError) -> Self {
        match err {
            IntakeError::MissingField(_) => ApiError::Validation(err.to_string()),
            IntakeError::ObjectStore(_) | IntakeError::Store(_) => ApiError::Storage(err.to_string()),
            IntakeError::NotScheduled { .. } => ApiError::QueueFull(err.to_string()),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Poisoned => ApiError::Internal(err.to_string()),
            other => ApiError::Storage(other.to_string()),
        }
    }
}

#[derive(Clone)]
struct AppState {
    intake: UploadIntake,
}

/// Build the router. Request bodies are capped slightly above `max_file_size`.
pub fn router(intake: UploadIntake, max_file_size: u64) -> Router {
    let body_limit = usize::try_from(max_file_size)
        .unwrap_or(usize::MAX)
        .saturating_add(MULTIPART_OVERHEAD);

    Router::new()
        .route("/upload", post(upload))
        .route("/status/{task_id}", get(task_status))
        .route("/tasks", get(list_tasks))
        .route("/tasks/summary", get(task_summary))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(AppState { intake })
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UploadAccepted {
    pub task_id: String,
    pub status: TaskStatus,
}

async fn upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<UploadAccepted>), ApiError> {
    let mut datasource_name = None;
    let mut file = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::Validation(format!("malformed multipart body: {e}")))?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("datasource_name") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ApiError::Validation(format!("unreadable datasource_name: {e}")))?;
                datasource_name = Some(text);
            }
            Some("file") => {
                let filename = field.file_name().map(str::to_string);
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::Validation(format!("unreadable file: {e}")))?;
                file = Some((filename, bytes));
            }
            _ => {}
        }
    }

    let datasource_name = datasource_name.ok_or(IntakeError::MissingField("datasource_name"))?;
    let (filename, bytes) = file.ok_or(IntakeError::MissingField("file"))?;
    let filename = filename.ok_or(IntakeError::MissingField("filename"))?;

    let task = state.intake.accept(&datasource_name, &filename, &bytes).await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(UploadAccepted {
            task_id: task.task_id,
            status: task.status,
        }),
    ))
}

async fn task_status(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> Result<Json<IngestionTask>, ApiError> {
    state
        .intake
        .store()
        .get(&task_id)?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("task '{task_id}' not found")))
}

#[derive(Debug, Deserialize)]
struct ListParams {
    limit: Option<usize>,
    offset: Option<usize>,
}

async fn list_tasks(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<IngestionTask>>, ApiError> {
    let limit = params.limit.unwrap_or(DEFAULT_PAGE_SIZE).min(MAX_PAGE_SIZE);
    let offset = params.offset.unwrap_or(0);
    Ok(Json(state.intake.store().list(limit, offset)?))
}

async fn task_summary(State(state): State<AppState>) -> Result<Json<BTreeMap<TaskStatus, u64>>, ApiError> {
    Ok(Json(state.intake.store().count_by_status()?))
}
