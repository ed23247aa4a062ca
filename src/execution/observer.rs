use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::store::TaskStatus;

/// Events emitted by the worker pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerEvent {
    TaskQueued { task_id: String },
    QueueRejected { task_id: String, reason: String },
    TaskStarted { task_id: String, worker: usize },
    TaskFinished {
        task_id: String,
        status: TaskStatus,
        elapsed: Duration,
    },
    Shutdown { metrics: WorkerMetricsSnapshot },
}

/// Observer hook for worker pool events.
pub trait WorkerObserver: Send + Sync {
    fn on_event(&self, event: &WorkerEvent);
}

/// Logs worker pool events through `tracing`.
#[derive(Debug, Default)]
pub struct TracingWorkerObserver;

impl WorkerObserver for TracingWorkerObserver {
    fn on_event(&self, event: &WorkerEvent) {
        match event {
            WorkerEvent::TaskQueued { task_id } => tracing::debug!(%task_id, "task queued"),
            WorkerEvent::QueueRejected { task_id, reason } => {
                tracing::warn!(%task_id, %reason, "task rejected by worker pool")
            }
            WorkerEvent::TaskStarted { task_id, worker } => {
                tracing::debug!(%task_id, worker, "task started")
            }
            WorkerEvent::TaskFinished {
                task_id,
                status,
                elapsed,
            } => tracing::info!(%task_id, %status, elapsed_ms = elapsed.as_millis() as u64, "task finished"),
            WorkerEvent::Shutdown { metrics } => tracing::info!(%metrics, "worker pool stopped"),
        }
    }
}

/// Fans each event out to several observers, in order.
#[derive(Default)]
pub struct CompositeWorkerObserver {
    observers: Vec<Arc<dyn WorkerObserver>>,
}

impl CompositeWorkerObserver {
    pub fn new(observers: Vec<Arc<dyn WorkerObserver>>) -> Self {
        Self { observers }
    }
}

impl WorkerObserver for CompositeWorkerObserver {
    fn on_event(&self, event: &WorkerEvent) {
        for obs in &self.observers {
            obs.on_event(event);
        }
    }
}

/// Live counters for a worker pool; snapshot them at any time.
#[derive(Debug, Default)]
pub struct WorkerMetrics {
    queued: AtomicU64,
    rejected: AtomicU64,
    started: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    busy_ns: AtomicU64,

    active: AtomicUsize,
    max_active: AtomicUsize,
}

impl WorkerMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_queued(&self) {
        let _ = self.queued.fetch_add(1, Ordering::SeqCst);
    }

    pub fn on_rejected(&self) {
        let _ = self.rejected.fetch_add(1, Ordering::SeqCst);
    }

    pub fn on_task_start(&self) {
        let _ = self.started.fetch_add(1, Ordering::SeqCst);
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        update_max_usize(&self.max_active, now);
    }

    pub fn on_task_end(&self, status: TaskStatus, elapsed: Duration) {
        let counter = if status == TaskStatus::Completed {
            &self.completed
        } else {
            &self.failed
        };
        let _ = counter.fetch_add(1, Ordering::SeqCst);
        let add = elapsed.as_nanos().min(u64::MAX as u128) as u64;
        let _ = self.busy_ns.fetch_add(add, Ordering::SeqCst);
        let _ = self.active.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn snapshot(&self) -> WorkerMetricsSnapshot {
        WorkerMetricsSnapshot {
            queued: self.queued.load(Ordering::SeqCst),
            rejected: self.rejected.load(Ordering::SeqCst),
            started: self.started.load(Ordering::SeqCst),
            completed: self.completed.load(Ordering::SeqCst),
            failed: self.failed.load(Ordering::SeqCst),
            busy: Duration::from_nanos(self.busy_ns.load(Ordering::SeqCst)),
            active: self.active.load(Ordering::SeqCst),
            max_active: self.max_active.load(Ordering::SeqCst),
        }
    }
}

fn update_max_usize(dst: &AtomicUsize, now: usize) {
    loop {
        let cur = dst.load(Ordering::SeqCst);
        if now <= cur {
            break;
        }
        if dst
            .compare_exchange(cur, now, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            break;
        }
    }
}

/// Immutable snapshot of [`WorkerMetrics`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerMetricsSnapshot {
    pub queued: u64,
    pub rejected: u64,
    pub started: u64,
    pub completed: u64,
    pub failed: u64,
    /// Summed wall time spent inside task runs.
    pub busy: Duration,
    pub active: usize,
    pub max_active: usize,
}

impl WorkerMetricsSnapshot {
    pub fn finished(&self) -> u64 {
        self.completed + self.failed
    }
}

impl fmt::Display for WorkerMetricsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "queued={}, rejected={}, started={}, completed={}, failed={}, active={}, max_active={}, busy={:?}",
            self.queued,
            self.rejected,
            self.started,
            self.completed,
            self.failed,
            self.active,
            self.max_active,
            self.busy
        )
    }
}
