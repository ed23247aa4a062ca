use std::path::Path;
use std::sync::Arc;

use crate::error::IntakeError;
use crate::execution::WorkerPool;
use crate::object_store::ObjectStore;
use crate::store::{new_task_id, IngestionTask, TaskStateStore, TaskStatus, TaskUpdate};

/// Accepts an upload: persists the blob, records the task and schedules it.
///
/// Structural validation is left to the pipeline, so a malformed file still yields a task
/// that ends `FAILED` with the validation detail.
#[derive(Clone)]
pub struct UploadIntake {
    store: Arc<TaskStateStore>,
    objects: Arc<dyn ObjectStore>,
    pool: Arc<WorkerPool>,
}

impl UploadIntake {
    pub fn new(store: Arc<TaskStateStore>, objects: Arc<dyn ObjectStore>, pool: Arc<WorkerPool>) -> Self {
        Self { store, objects, pool }
    }

    pub fn store(&self) -> &Arc<TaskStateStore> {
        &self.store
    }

    /// Returns the `ACCEPTED` task once it has been queued.
    ///
    /// If the queue refuses the task it is failed immediately and
    /// [`IntakeError::NotScheduled`] is returned.
    pub async fn accept(
        &self,
        datasource_name: &str,
        filename: &str,
        bytes: &[u8],
    ) -> Result<IngestionTask, IntakeError> {
        let datasource_name = datasource_name.trim();
        if datasource_name.is_empty() {
            return Err(IntakeError::MissingField("datasource_name"));
        }
        let object_name = Path::new(filename.trim())
            .file_name()
            .and_then(|s| s.to_str())
            .ok_or(IntakeError::MissingField("filename"))?;

        let task_id = new_task_id();
        let key = format!("{task_id}/{object_name}");
        let uri = self.objects.put(bytes, &key).await?;
        let task = match self.store.create_with_id(
            &task_id,
            datasource_name,
            object_name,
            &uri,
            Some(bytes.len() as u64),
        ) {
            Ok(task) => task,
            Err(e) => {
                // No record points at the blob, so nothing else would ever remove it.
                if let Err(cleanup) = self.objects.delete(&key).await {
                    tracing::warn!(task_id = %task_id, error = %cleanup, "could not remove unrecorded upload");
                }
                return Err(e.into());
            }
        };

        if let Err(source) = self.pool.submit(task_id.clone()) {
            tracing::warn!(task_id = %task_id, error = %source, "upload accepted but not scheduled");
            self.store
                .update_status(&task_id, TaskStatus::Failed, TaskUpdate::failed(source.to_string()))?;
            return Err(IntakeError::NotScheduled { task_id, source });
        }

        tracing::info!(task_id = %task.task_id, datasource = %task.datasource_name, bytes = bytes.len(), "upload accepted");
        Ok(task)
    }
}
