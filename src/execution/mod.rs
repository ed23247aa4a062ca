//! Bounded worker pool for pipeline runs.
//!
//! Upload intake hands task ids to [`WorkerPool::submit`]; a fixed number of Tokio workers pull
//! them from a bounded queue and call a [`TaskRunner`] for each. The pool provides:
//!
//! - a concurrency ceiling (`workers`) and backpressure (`queue_capacity`, never blocking)
//! - a shared cancellation token handed to every run, fired by [`WorkerPool::shutdown`]
//! - real-time metrics and observer hooks for monitoring

mod observer;

use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::QueueError;
use crate::store::TaskStatus;

pub use observer::{
    CompositeWorkerObserver, TracingWorkerObserver, WorkerEvent, WorkerMetrics, WorkerMetricsSnapshot,
    WorkerObserver,
};

/// Unit of work executed by the pool for each queued task id.
#[async_trait]
pub trait TaskRunner: Send + Sync + 'static {
    /// Run the task to completion and return its final status.
    async fn run(&self, task_id: &str, cancel: &CancellationToken) -> TaskStatus;

    /// The task will never run (or its run panicked); record it as failed.
    fn abandon(&self, task_id: &str, reason: &str);
}

/// Configuration for the [`WorkerPool`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerOptions {
    /// Number of concurrently running tasks.
    pub workers: usize,
    /// Tasks that may wait for a free worker before `submit` is refused.
    pub queue_capacity: usize,
}

impl Default for WorkerOptions {
    fn default() -> Self {
        Self {
            workers: 4,
            queue_capacity: 64,
        }
    }
}

const SHUTDOWN_REASON: &str = "ingestion service shut down before the task started";

struct Shared {
    receiver: tokio::sync::Mutex<mpsc::Receiver<String>>,
    runner: Arc<dyn TaskRunner>,
    cancel: CancellationToken,
    metrics: Arc<WorkerMetrics>,
    observer: Option<Arc<dyn WorkerObserver>>,
}

impl Shared {
    fn emit(&self, event: WorkerEvent) {
        if let Some(obs) = &self.observer {
            obs.on_event(&event);
        }
    }
}

pub struct WorkerPool {
    sender: mpsc::Sender<String>,
    shared: Arc<Shared>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl WorkerPool {
    /// Spawn the workers. Must be called from within a Tokio runtime.
    pub fn start(runner: Arc<dyn TaskRunner>, options: WorkerOptions) -> Self {
        Self::start_with_observer(runner, options, None)
    }

    pub fn start_with_observer(
        runner: Arc<dyn TaskRunner>,
        options: WorkerOptions,
        observer: Option<Arc<dyn WorkerObserver>>,
    ) -> Self {
        let (sender, receiver) = mpsc::channel(options.queue_capacity.max(1));
        let shared = Arc::new(Shared {
            receiver: tokio::sync::Mutex::new(receiver),
            runner,
            cancel: CancellationToken::new(),
            metrics: Arc::new(WorkerMetrics::new()),
            observer,
        });

        let workers = (0..options.workers.max(1))
            .map(|idx| tokio::spawn(worker_loop(idx, Arc::clone(&shared))))
            .collect();

        Self {
            sender,
            shared,
            workers: Mutex::new(workers),
        }
    }

    /// Get a handle to real-time pool metrics.
    pub fn metrics(&self) -> Arc<WorkerMetrics> {
        Arc::clone(&self.shared.metrics)
    }

    /// The token passed to every run; cancelled by [`Self::shutdown`].
    pub fn cancellation_token(&self) -> CancellationToken {
        self.shared.cancel.clone()
    }

    /// Queue a task without waiting for space.
    pub fn submit(&self, task_id: String) -> Result<(), QueueError> {
        if self.shared.cancel.is_cancelled() {
            return Err(self.reject(task_id, QueueError::Closed));
        }
        match self.sender.try_send(task_id.clone()) {
            Ok(()) => {
                self.shared.metrics.on_queued();
                self.shared.emit(WorkerEvent::TaskQueued { task_id });
                Ok(())
            }
            Err(TrySendError::Full(id)) => Err(self.reject(id, QueueError::Full)),
            Err(TrySendError::Closed(id)) => Err(self.reject(id, QueueError::Closed)),
        }
    }

    fn reject(&self, task_id: String, err: QueueError) -> QueueError {
        self.shared.metrics.on_rejected();
        self.shared.emit(WorkerEvent::QueueRejected {
            task_id,
            reason: err.to_string(),
        });
        err
    }

    /// Cancel in-flight runs, wait for the workers to exit and fail every task still queued.
    pub async fn shutdown(&self) {
        self.shared.cancel.cancel();

        let handles = {
            let mut guard = self.workers.lock().unwrap_or_else(PoisonError::into_inner);
            std::mem::take(&mut *guard)
        };
        for handle in handles {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "worker exited abnormally");
            }
        }

        let mut receiver = self.shared.receiver.lock().await;
        receiver.close();
        while let Ok(task_id) = receiver.try_recv() {
            self.shared.runner.abandon(&task_id, SHUTDOWN_REASON);
            self.shared.metrics.on_rejected();
            self.shared.emit(WorkerEvent::QueueRejected {
                task_id,
                reason: SHUTDOWN_REASON.to_string(),
            });
        }

        self.shared.emit(WorkerEvent::Shutdown {
            metrics: self.shared.metrics.snapshot(),
        });
    }
}

async fn worker_loop(idx: usize, shared: Arc<Shared>) {
    loop {
        let next = {
            let mut receiver = shared.receiver.lock().await;
            tokio::select! {
                biased;
                _ = shared.cancel.cancelled() => None,
                id = receiver.recv() => id,
            }
        };
        let Some(task_id) = next else {
            break;
        };

        let start = Instant::now();
        shared.metrics.on_task_start();
        shared.emit(WorkerEvent::TaskStarted {
            task_id: task_id.clone(),
            worker: idx,
        });

        let run = {
            let runner = Arc::clone(&shared.runner);
            let cancel = shared.cancel.clone();
            let id = task_id.clone();
            tokio::spawn(async move { runner.run(&id, &cancel).await })
        };
        let status = match run.await {
            Ok(status) => status,
            Err(e) => {
                tracing::error!(task_id = %task_id, error = %e, "task run did not finish");
                let reason = if e.is_panic() {
                    "ingestion worker panicked while processing the task"
                } else {
                    "ingestion run was aborted"
                };
                shared.runner.abandon(&task_id, reason);
                TaskStatus::Failed
            }
        };

        let elapsed = start.elapsed();
        shared.metrics.on_task_end(status, elapsed);
        shared.emit(WorkerEvent::TaskFinished {
            task_id,
            status,
            elapsed,
        });
    }
}
