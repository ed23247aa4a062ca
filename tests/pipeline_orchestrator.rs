mod common;

use std::sync::Arc;
use std::time::Duration;

use tabular_ingest::ingest_spec::{InputSource, MetricSpec};
use tabular_ingest::object_store::{LocalObjectStore, ObjectStore};
use tabular_ingest::pipeline::{FileStager, PipelineOrchestrator};
use tabular_ingest::store::{new_task_id, TaskStateStore, TaskStatus};
use tabular_ingest::submission::{JobMonitor, JobState, MonitorOptions};
use tabular_ingest::validation::ValidationCheck;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use common::{ScriptedJobApi, StatusStep, SubmitReply};

struct Harness {
    _uploads: TempDir,
    shared: TempDir,
    store: Arc<TaskStateStore>,
    objects: Arc<LocalObjectStore>,
}

impl Harness {
    fn new() -> Self {
        let uploads = tempfile::tempdir().unwrap();
        let shared = tempfile::tempdir().unwrap();
        let objects = Arc::new(LocalObjectStore::new(uploads.path()).unwrap());
        Self {
            _uploads: uploads,
            shared,
            store: Arc::new(TaskStateStore::open_in_memory().unwrap()),
            objects,
        }
    }

    async fn upload(&self, filename: &str, bytes: &[u8]) -> String {
        let task_id = new_task_id();
        let uri = self
            .objects
            .put(bytes, &format!("{task_id}/{filename}"))
            .await
            .unwrap();
        self.store
            .create_with_id(&task_id, "sales", filename, &uri, Some(bytes.len() as u64))
            .unwrap();
        task_id
    }

    async fn upload_fixture(&self, fixture: &str) -> String {
        let bytes = std::fs::read(format!("tests/fixtures/{fixture}")).unwrap();
        self.upload(fixture, &bytes).await
    }

    fn orchestrator(&self, api: Arc<ScriptedJobApi>, timeout: Duration) -> PipelineOrchestrator {
        PipelineOrchestrator::new(
            self.store.clone(),
            self.objects.clone(),
            api,
            FileStager::new(self.shared.path()),
        )
        .with_monitor(JobMonitor::new(MonitorOptions {
            interval: Duration::from_millis(10),
            timeout,
            max_consecutive_failures: 3,
        }))
    }

    fn staged_files(&self) -> usize {
        std::fs::read_dir(self.shared.path()).unwrap().count()
    }
}

#[tokio::test]
async fn zero_byte_upload_fails_validation_without_submitting() {
    let h = Harness::new();
    let api = Arc::new(ScriptedJobApi::with_states(&[JobState::Success]));
    let task_id = h.upload("empty.csv", b"").await;

    let status = h
        .orchestrator(api.clone(), Duration::from_secs(5))
        .run(&task_id, &CancellationToken::new())
        .await;

    assert_eq!(status, TaskStatus::Failed);
    let task = h.store.get(&task_id).unwrap().unwrap();
    assert_eq!(task.status, TaskStatus::Failed);
    assert!(task.error_message.unwrap().contains("size"));
    let issues = task.validation_errors.unwrap();
    assert_eq!(issues[0].check, ValidationCheck::Size);
    assert!(task.completed_at.is_some());
    assert_eq!(api.submit_calls(), 0);
}

#[tokio::test]
async fn rejected_submission_fails_without_a_job_id() {
    let h = Harness::new();
    let api = Arc::new(ScriptedJobApi::new(
        SubmitReply::Reject {
            status: 500,
            body: "internal error",
        },
        vec![StatusStep::State(JobState::Success, None)],
    ));
    let task_id = h.upload_fixture("sales.csv").await;

    let status = h
        .orchestrator(api.clone(), Duration::from_secs(5))
        .run(&task_id, &CancellationToken::new())
        .await;

    assert_eq!(status, TaskStatus::Failed);
    let task = h.store.get(&task_id).unwrap().unwrap();
    assert!(task.error_message.unwrap().starts_with("submission failed"));
    assert_eq!(task.external_job_id, None);
    assert_eq!(api.submit_calls(), 1);
    assert_eq!(api.status_calls(), 0);
    assert_eq!(h.staged_files(), 0);
}

#[tokio::test]
async fn successful_job_completes_the_task() {
    let h = Harness::new();
    let api = Arc::new(ScriptedJobApi::with_states(&[
        JobState::Running,
        JobState::Running,
        JobState::Success,
    ]));
    let task_id = h.upload_fixture("sales.csv").await;

    let status = h
        .orchestrator(api.clone(), Duration::from_secs(5))
        .run(&task_id, &CancellationToken::new())
        .await;

    assert_eq!(status, TaskStatus::Completed);
    let task = h.store.get(&task_id).unwrap().unwrap();
    assert_eq!(task.status, TaskStatus::Completed);
    assert_eq!(task.external_job_id.as_deref(), Some("job-1"));
    assert_eq!(task.row_count, Some(8));
    assert_eq!(task.error_message, None);
    assert!(task.started_at.is_some());
    assert!(task.completed_at.unwrap() >= task.started_at.unwrap());
    assert_eq!(api.status_calls(), 3);
    assert_eq!(h.staged_files(), 0, "staged copy is removed after the run");

    let spec = api.last_spec().unwrap();
    let schema = spec.data_schema();
    assert_eq!(schema.data_source, "sales");
    assert_eq!(schema.timestamp_spec.column, "date");
    assert_eq!(schema.timestamp_spec.format, "auto");
    match &spec.spec.io_config.input_source {
        InputSource::Local { base_dir, filter } => {
            assert_eq!(base_dir, &h.shared.path().display().to_string());
            assert!(filter.starts_with(&task_id));
            assert!(filter.ends_with("sales.csv"));
        }
        other => panic!("expected a local input source, got {other:?}"),
    }
}

#[tokio::test]
async fn stuck_job_times_out_and_polling_stops() {
    let h = Harness::new();
    let api = Arc::new(ScriptedJobApi::with_states(&[JobState::Running]));
    let task_id = h.upload_fixture("sales.csv").await;

    let status = h
        .orchestrator(api.clone(), Duration::from_millis(80))
        .run(&task_id, &CancellationToken::new())
        .await;

    assert_eq!(status, TaskStatus::Failed);
    let task = h.store.get(&task_id).unwrap().unwrap();
    assert!(task.error_message.unwrap().contains("timeout"));
    assert_eq!(task.external_job_id.as_deref(), Some("job-1"));

    let polled = api.status_calls();
    assert!(polled >= 2);
    tokio::time::sleep(Duration::from_millis(60)).await;
    assert_eq!(api.status_calls(), polled);
}

#[tokio::test]
async fn upstream_failure_detail_reaches_the_task() {
    let h = Harness::new();
    let api = Arc::new(ScriptedJobApi::new(
        SubmitReply::Accept("job-1"),
        vec![StatusStep::State(JobState::Failed, Some("No valid rows to ingest"))],
    ));
    let task_id = h.upload_fixture("sales.csv").await;

    h.orchestrator(api, Duration::from_secs(5))
        .run(&task_id, &CancellationToken::new())
        .await;

    let task = h.store.get(&task_id).unwrap().unwrap();
    assert_eq!(task.status, TaskStatus::Failed);
    assert_eq!(task.error_message.as_deref(), Some("No valid rows to ingest"));
}

#[tokio::test]
async fn forced_fallback_skips_inference() {
    let h = Harness::new();
    let api = Arc::new(ScriptedJobApi::with_states(&[JobState::Success]));
    let task_id = h.upload_fixture("sales.csv").await;

    let status = h
        .orchestrator(api.clone(), Duration::from_secs(5))
        .with_forced_fallback(true)
        .run(&task_id, &CancellationToken::new())
        .await;

    assert_eq!(status, TaskStatus::Completed);
    let spec = api.last_spec().unwrap();
    let schema = spec.data_schema();
    assert_eq!(schema.timestamp_spec.column, "timestamp");
    assert_eq!(schema.timestamp_spec.format, "iso");
    assert!(matches!(schema.metrics_spec.as_slice(), [MetricSpec::Count { .. }]));
}

#[tokio::test]
async fn cancellation_fails_the_task() {
    let h = Harness::new();
    let api = Arc::new(ScriptedJobApi::with_states(&[JobState::Running]));
    let task_id = h.upload_fixture("sales.csv").await;
    let orchestrator = h.orchestrator(api, Duration::from_secs(30));
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();

    let (status, ()) = tokio::join!(orchestrator.run(&task_id, &cancel), async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        trigger.cancel();
    });

    assert_eq!(status, TaskStatus::Failed);
    let task = h.store.get(&task_id).unwrap().unwrap();
    assert!(task.error_message.unwrap().contains("cancelled"));
}

#[tokio::test]
async fn cancelled_run_never_submits_a_job() {
    let h = Harness::new();
    let api = Arc::new(ScriptedJobApi::with_states(&[JobState::Success]));
    let task_id = h.upload_fixture("sales.csv").await;
    let cancel = CancellationToken::new();
    cancel.cancel();

    let status = h
        .orchestrator(api.clone(), Duration::from_secs(5))
        .run(&task_id, &cancel)
        .await;

    assert_eq!(status, TaskStatus::Failed);
    assert_eq!(api.submit_calls(), 0);
    assert_eq!(api.status_calls(), 0);
    let task = h.store.get(&task_id).unwrap().unwrap();
    assert_eq!(task.external_job_id, None);
    assert!(task.error_message.unwrap().contains("before a job was submitted"));
    assert_eq!(h.staged_files(), 0);
}

#[tokio::test]
async fn missing_upload_fails_the_task() {
    let h = Harness::new();
    let api = Arc::new(ScriptedJobApi::with_states(&[JobState::Success]));
    let uri = format!("file://{}/gone.csv", h.objects.root().display());
    let task = h.store.create("sales", "gone.csv", &uri, Some(10)).unwrap();

    let status = h
        .orchestrator(api.clone(), Duration::from_secs(5))
        .run(&task.task_id, &CancellationToken::new())
        .await;

    assert_eq!(status, TaskStatus::Failed);
    let task = h.store.get(&task.task_id).unwrap().unwrap();
    assert!(task.error_message.unwrap().contains("not found"));
    assert_eq!(api.submit_calls(), 0);
}

#[tokio::test]
async fn finished_task_is_not_rerun() {
    let h = Harness::new();
    let api = Arc::new(ScriptedJobApi::with_states(&[JobState::Success]));
    let task_id = h.upload_fixture("sales.csv").await;
    let orchestrator = h.orchestrator(api.clone(), Duration::from_secs(5));

    assert_eq!(
        orchestrator.run(&task_id, &CancellationToken::new()).await,
        TaskStatus::Completed
    );
    // A second run cannot leave COMPLETED; the record is untouched.
    orchestrator.run(&task_id, &CancellationToken::new()).await;

    let task = h.store.get(&task_id).unwrap().unwrap();
    assert_eq!(task.status, TaskStatus::Completed);
    assert_eq!(api.submit_calls(), 1);
}
