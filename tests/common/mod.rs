#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use tabular_ingest::ingest_spec::IngestionSpec;
use tabular_ingest::submission::{IngestionJobApi, JobState, JobStatusReport};
use tabular_ingest::JobApiError;

/// What `submit` answers.
pub enum SubmitReply {
    Accept(&'static str),
    Reject { status: u16, body: &'static str },
}

/// One scripted answer to a status query. The last step repeats forever.
#[derive(Clone)]
pub enum StatusStep {
    State(JobState, Option<&'static str>),
    QueryError(u16),
}

/// In-memory stand-in for the ingestion engine's task API.
pub struct ScriptedJobApi {
    submit: SubmitReply,
    steps: Mutex<VecDeque<StatusStep>>,
    pub submitted: Mutex<Vec<IngestionSpec>>,
    submit_calls: AtomicUsize,
    status_calls: AtomicUsize,
}

impl ScriptedJobApi {
    pub fn new(submit: SubmitReply, steps: Vec<StatusStep>) -> Self {
        Self {
            submit,
            steps: Mutex::new(steps.into()),
            submitted: Mutex::new(Vec::new()),
            submit_calls: AtomicUsize::new(0),
            status_calls: AtomicUsize::new(0),
        }
    }

    /// Accepts submissions as `job-1` and reports the given states in order.
    pub fn with_states(states: &[JobState]) -> Self {
        Self::new(
            SubmitReply::Accept("job-1"),
            states.iter().map(|s| StatusStep::State(s.clone(), None)).collect(),
        )
    }

    pub fn submit_calls(&self) -> usize {
        self.submit_calls.load(Ordering::SeqCst)
    }

    pub fn status_calls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }

    pub fn last_spec(&self) -> Option<IngestionSpec> {
        self.submitted.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl IngestionJobApi for ScriptedJobApi {
    async fn submit(&self, spec: &IngestionSpec) -> Result<String, JobApiError> {
        self.submit_calls.fetch_add(1, Ordering::SeqCst);
        self.submitted.lock().unwrap().push(spec.clone());
        match &self.submit {
            SubmitReply::Accept(id) => Ok(id.to_string()),
            SubmitReply::Reject { status, body } => Err(JobApiError::SubmissionFailed {
                status: *status,
                body: body.to_string(),
            }),
        }
    }

    async fn job_status(&self, _job_id: &str) -> Result<JobStatusReport, JobApiError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        let step = {
            let mut steps = self.steps.lock().unwrap();
            if steps.len() > 1 {
                steps.pop_front()
            } else {
                steps.front().cloned()
            }
        };
        match step {
            Some(StatusStep::State(state, detail)) => Ok(JobStatusReport {
                state,
                detail: detail.map(str::to_string),
            }),
            Some(StatusStep::QueryError(status)) => Err(JobApiError::StatusQuery { status }),
            None => Ok(JobStatusReport {
                state: JobState::Running,
                detail: None,
            }),
        }
    }
}
