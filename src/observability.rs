//! Tracing setup and task counters

use std::sync::atomic::{AtomicU64, Ordering};
use tracing_subscriber::EnvFilter;

/// Install the fmt subscriber, filtered by `RUST_LOG` (default `info`)
///
/// Calling it twice is harmless; the second install is ignored.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// Counters shared by the dispatcher and its managers
#[derive(Debug, Default)]
pub struct Metrics {
    tasks_created: AtomicU64,
    tasks_completed: AtomicU64,
    tasks_failed: AtomicU64,
    tasks_cancelled: AtomicU64,
    requests_declined: AtomicU64,
    preheats_started: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn task_created(&self) {
        Self::bump(&self.tasks_created, "tasks_created");
    }

    pub fn task_completed(&self) {
        Self::bump(&self.tasks_completed, "tasks_completed");
    }

    pub fn task_failed(&self) {
        Self::bump(&self.tasks_failed, "tasks_failed");
    }

    pub fn task_cancelled(&self) {
        Self::bump(&self.tasks_cancelled, "tasks_cancelled");
    }

    pub fn request_declined(&self) {
        Self::bump(&self.requests_declined, "requests_declined");
    }

    pub fn preheat_started(&self) {
        Self::bump(&self.preheats_started, "preheats_started");
    }

    fn bump(counter: &AtomicU64, name: &'static str) {
        counter.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = name, "Metric incremented");
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            tasks_created: self.tasks_created.load(Ordering::Relaxed),
            tasks_completed: self.tasks_completed.load(Ordering::Relaxed),
            tasks_failed: self.tasks_failed.load(Ordering::Relaxed),
            tasks_cancelled: self.tasks_cancelled.load(Ordering::Relaxed),
            requests_declined: self.requests_declined.load(Ordering::Relaxed),
            preheats_started: self.preheats_started.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub tasks_created: u64,
    pub tasks_completed: u64,
    pub tasks_failed: u64,
    pub tasks_cancelled: u64,
    pub requests_declined: u64,
    pub preheats_started: u64,
}
