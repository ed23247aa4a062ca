use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::PipelineError;
use crate::execution::TaskRunner;
use crate::inference::SchemaInferenceEngine;
use crate::ingest_spec::{BuiltSpec, IngestionSpecBuilder, SpecMode};
use crate::ingestion::FileFormat;
use crate::object_store::ObjectStore;
use crate::store::{IngestionTask, TaskStateStore, TaskStatus, TaskUpdate};
use crate::submission::{IngestionJobApi, JobMonitor, JobOutcome};
use crate::validation::ValidationService;

use super::staging::{remove_quietly, FileStager};

/// Drives one uploaded file from `ACCEPTED` to a terminal status.
///
/// Collaborators are passed in; the orchestrator owns no global state. A run only ever writes
/// its own task row, so any number of runs may share one orchestrator.
pub struct PipelineOrchestrator {
    store: Arc<TaskStateStore>,
    objects: Arc<dyn ObjectStore>,
    jobs: Arc<dyn IngestionJobApi>,
    stager: FileStager,
    validation: ValidationService,
    inference: SchemaInferenceEngine,
    builder: IngestionSpecBuilder,
    monitor: JobMonitor,
    force_fallback_spec: bool,
}

impl PipelineOrchestrator {
    /// Create an orchestrator with default validation, inference, spec and monitor settings.
    pub fn new(
        store: Arc<TaskStateStore>,
        objects: Arc<dyn ObjectStore>,
        jobs: Arc<dyn IngestionJobApi>,
        stager: FileStager,
    ) -> Self {
        Self {
            store,
            objects,
            jobs,
            stager,
            validation: ValidationService::default(),
            inference: SchemaInferenceEngine::default(),
            builder: IngestionSpecBuilder::default(),
            monitor: JobMonitor::default(),
            force_fallback_spec: false,
        }
    }

    pub fn with_validation(mut self, validation: ValidationService) -> Self {
        self.validation = validation;
        self
    }

    pub fn with_inference(mut self, inference: SchemaInferenceEngine) -> Self {
        self.inference = inference;
        self
    }

    pub fn with_spec_builder(mut self, builder: IngestionSpecBuilder) -> Self {
        self.builder = builder;
        self
    }

    pub fn with_monitor(mut self, monitor: JobMonitor) -> Self {
        self.monitor = monitor;
        self
    }

    /// Skip inference and always submit the fallback schema.
    pub fn with_forced_fallback(mut self, force: bool) -> Self {
        self.force_fallback_spec = force;
        self
    }

    pub fn store(&self) -> &Arc<TaskStateStore> {
        &self.store
    }

    /// Run the pipeline for `task_id` and return the status it ended in.
    ///
    /// Every error is recorded on the task as `FAILED`; temporary files are removed on every
    /// path. Cancelling `cancel` stops the run before submission, or interrupts the wait for
    /// an already submitted job.
    #[tracing::instrument(name = "pipeline", skip_all, fields(task_id = %task_id))]
    pub async fn run(&self, task_id: &str, cancel: &CancellationToken) -> TaskStatus {
        let mut scratch = Vec::new();
        let result = self.execute(task_id, cancel, &mut scratch).await;

        for path in &scratch {
            remove_quietly(path).await;
        }

        match result {
            Ok(status) => status,
            Err(e) => {
                tracing::error!(error = %e, "ingestion pipeline failed");
                self.record_failure(task_id, &e.to_string());
                TaskStatus::Failed
            }
        }
    }

    /// Force `task_id` to `FAILED`. Used when a run could not finish on its own.
    pub fn record_failure(&self, task_id: &str, message: &str) {
        match self
            .store
            .update_status(task_id, TaskStatus::Failed, TaskUpdate::failed(message))
        {
            Ok(Some(_)) => {}
            Ok(None) => tracing::warn!(task_id, "cannot record failure for unknown task"),
            Err(e) => tracing::error!(task_id, error = %e, "failed to record task failure"),
        }
    }

    async fn execute(
        &self,
        task_id: &str,
        cancel: &CancellationToken,
        scratch: &mut Vec<PathBuf>,
    ) -> Result<TaskStatus, PipelineError> {
        let task = self.transition(task_id, TaskStatus::Processing, TaskUpdate::default())?;
        tracing::info!(datasource = %task.datasource_name, file = %task.original_filename, "processing upload");

        let artifact = self.objects.get(&task.file_uri).await?;
        if artifact.temporary {
            scratch.push(artifact.path.clone());
        }
        let source = artifact.path;

        let declared_size = match task.file_size {
            Some(size) => size,
            None => tokio::fs::metadata(&source)
                .await
                .map_err(|e| PipelineError::Input(format!("cannot read uploaded file: {e}")))?
                .len(),
        };

        let report = {
            let validation = self.validation.clone();
            let path = source.clone();
            let filename = task.original_filename.clone();
            blocking(move || validation.validate(&path, &filename, declared_size)).await?
        };
        if !report.is_valid {
            let message = report
                .error_message
                .unwrap_or_else(|| "validation failed".to_string());
            tracing::warn!(reason = %message, "upload failed validation");
            let update = TaskUpdate {
                error_message: Some(message),
                validation_errors: Some(report.validation_errors),
                file_size: Some(declared_size),
                ..Default::default()
            };
            self.transition(task_id, TaskStatus::Failed, update)?;
            return Ok(TaskStatus::Failed);
        }

        let format = FileFormat::from_path(&task.original_filename)
            .map_err(|e| PipelineError::Input(e.to_string()))?;

        let staged = {
            let stager = self.stager.clone();
            let id = task_id.to_string();
            let path = source.clone();
            let filename = task.original_filename.clone();
            blocking(move || stager.stage(&id, &path, &filename, format))
                .await?
                .map_err(PipelineError::Staging)?
        };
        scratch.push(staged.path());

        let built = self.build_spec(&task, &source, &staged).await?;
        tracing::info!(mode = ?built.mode, format = %staged.format, "ingestion spec built");

        // Never start an external job once shutdown has begun.
        if cancel.is_cancelled() {
            return Err(PipelineError::CancelledBeforeSubmission);
        }

        let job_id = self
            .jobs
            .submit(&built.spec)
            .await
            .map_err(PipelineError::Submission)?;

        self.transition(
            task_id,
            TaskStatus::Submitted,
            TaskUpdate::default()
                .with_job_id(job_id.clone())
                .with_row_count(report.row_count as u64),
        )?;
        tracing::info!(job_id = %job_id, rows = report.row_count, "ingestion job submitted");

        match self
            .monitor
            .poll_until_terminal(self.jobs.as_ref(), &job_id, cancel)
            .await
        {
            JobOutcome::Success { .. } => {
                self.transition(task_id, TaskStatus::Completed, TaskUpdate::default())?;
                tracing::info!(job_id = %job_id, "ingestion completed");
                Ok(TaskStatus::Completed)
            }
            JobOutcome::Failed { detail } => Err(PipelineError::UpstreamJob(detail)),
            JobOutcome::Timeout { .. } => Err(PipelineError::Timeout {
                job_id,
                timeout: self.monitor.options().timeout,
            }),
            JobOutcome::Cancelled => Err(PipelineError::Cancelled { job_id }),
        }
    }

    async fn build_spec(
        &self,
        task: &IngestionTask,
        source: &Path,
        staged: &super::StagedFile,
    ) -> Result<BuiltSpec, PipelineError> {
        let location = staged.location();
        let datasource = task.datasource_name.clone();
        let format = staged.format;
        let builder = self.builder.clone();

        if self.force_fallback_spec {
            return Ok(BuiltSpec {
                spec: builder.build_fallback(&location, &datasource, format),
                mode: SpecMode::Fallback,
            });
        }

        let inference = self.inference.clone();
        let path = source.to_path_buf();
        blocking(move || match inference.analyze_path(&path) {
            Ok(analysis) => builder.build(Ok(&analysis), &location, &datasource, format),
            Err(e) => builder.build(Err(e), &location, &datasource, format),
        })
        .await
    }

    fn transition(
        &self,
        task_id: &str,
        status: TaskStatus,
        update: TaskUpdate,
    ) -> Result<IngestionTask, PipelineError> {
        self.store
            .update_status(task_id, status, update)?
            .ok_or_else(|| PipelineError::Fatal(format!("task {task_id} does not exist")))
    }
}

#[async_trait]
impl TaskRunner for PipelineOrchestrator {
    async fn run(&self, task_id: &str, cancel: &CancellationToken) -> TaskStatus {
        PipelineOrchestrator::run(self, task_id, cancel).await
    }

    fn abandon(&self, task_id: &str, reason: &str) {
        self.record_failure(task_id, reason);
    }
}

async fn blocking<T, F>(f: F) -> Result<T, PipelineError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| PipelineError::Fatal(format!("blocking step did not complete: {e}")))
}
