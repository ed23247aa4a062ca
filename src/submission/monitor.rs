use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::{IngestionJobApi, JobState};

/// Polling cadence and limits for [`JobMonitor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorOptions {
    /// Sleep between status queries.
    pub interval: Duration,
    /// Give up waiting once this much time has elapsed.
    pub timeout: Duration,
    /// Consecutive status-query errors tolerated before reporting failure.
    pub max_consecutive_failures: u32,
}

impl Default for MonitorOptions {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(10),
            timeout: Duration::from_secs(30 * 60),
            max_consecutive_failures: 3,
        }
    }
}

/// How a monitored job ended, from this pipeline's point of view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Success { detail: Option<String> },
    Failed { detail: String },
    /// The wait ended; the external job itself may still be running.
    Timeout { elapsed: Duration },
    Cancelled,
}

#[derive(Debug, Clone, Default)]
pub struct JobMonitor {
    options: MonitorOptions,
}

impl JobMonitor {
    pub fn new(options: MonitorOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &MonitorOptions {
        &self.options
    }

    /// Query `job_id` every `interval` until it is terminal, the timeout elapses, status
    /// queries keep failing, or `cancel` fires.
    pub async fn poll_until_terminal(
        &self,
        api: &dyn IngestionJobApi,
        job_id: &str,
        cancel: &CancellationToken,
    ) -> JobOutcome {
        let start = Instant::now();
        let mut failures = 0u32;

        loop {
            if cancel.is_cancelled() {
                return JobOutcome::Cancelled;
            }

            match api.job_status(job_id).await {
                Ok(report) => {
                    failures = 0;
                    match report.state {
                        JobState::Success => return JobOutcome::Success { detail: report.detail },
                        JobState::Failed => {
                            return JobOutcome::Failed {
                                detail: report
                                    .detail
                                    .unwrap_or_else(|| format!("ingestion job {job_id} failed")),
                            };
                        }
                        state => tracing::debug!(job_id, %state, "ingestion job still in progress"),
                    }
                }
                Err(e) => {
                    failures += 1;
                    tracing::warn!(job_id, attempt = failures, error = %e, "status query failed");
                    if failures >= self.options.max_consecutive_failures.max(1) {
                        return JobOutcome::Failed {
                            detail: format!("status query failed: {e}"),
                        };
                    }
                }
            }

            let elapsed = start.elapsed();
            if elapsed >= self.options.timeout {
                return JobOutcome::Timeout { elapsed };
            }

            tokio::select! {
                _ = cancel.cancelled() => return JobOutcome::Cancelled,
                _ = tokio::time::sleep(self.options.interval) => {}
            }
        }
    }
}
