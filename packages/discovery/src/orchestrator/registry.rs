//! In-memory job registry.
//!
//! Jobs are process-local: the registry is the only place they exist.
//! `start_job`, terminal transitions, and lookups are atomic relative to
//! each other; entries are removed by the orchestrator a grace period
//! after reaching a terminal state.

use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::types::{JobCounters, JobSnapshot, JobState};

/// Shared state for one running job.
pub struct JobEntry {
    state: Mutex<JobInner>,
    /// Root cancellation token for everything this job spawns.
    pub cancel: CancellationToken,
}

struct JobInner {
    snapshot: JobSnapshot,
    last_progress: Option<Instant>,
}

impl JobEntry {
    fn new(snapshot: JobSnapshot) -> Self {
        Self {
            state: Mutex::new(JobInner {
                snapshot,
                last_progress: None,
            }),
            cancel: CancellationToken::new(),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, JobInner> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Current point-in-time view.
    pub fn snapshot(&self) -> JobSnapshot {
        self.lock().snapshot.clone()
    }

    pub fn counters(&self) -> JobCounters {
        self.lock().snapshot.counters
    }

    pub fn urls_found(&self) -> u32 {
        self.lock().snapshot.urls_found
    }

    pub fn set_urls_found(&self, n: u32) {
        self.lock().snapshot.urls_found = n;
    }

    pub fn record_succeeded(&self) -> JobCounters {
        let mut inner = self.lock();
        inner.snapshot.counters.succeeded += 1;
        inner.snapshot.counters
    }

    pub fn record_failed(&self) -> JobCounters {
        let mut inner = self.lock();
        inner.snapshot.counters.failed += 1;
        inner.snapshot.counters
    }

    pub fn record_skipped(&self) -> JobCounters {
        let mut inner = self.lock();
        inner.snapshot.counters.skipped += 1;
        inner.snapshot.counters
    }

    /// Whether enough time has passed since the last `progress` event;
    /// updates the marker when it has.
    pub fn should_emit_progress(&self, coalesce: std::time::Duration) -> bool {
        let mut inner = self.lock();
        let due = inner
            .last_progress
            .map(|at| at.elapsed() >= coalesce)
            .unwrap_or(true);
        if due {
            inner.last_progress = Some(Instant::now());
        }
        due
    }

    /// Transition to a terminal state. Monotonic: once terminal, further
    /// calls are no-ops and the first terminal state wins.
    pub fn finish(&self, state: JobState) -> JobSnapshot {
        let mut inner = self.lock();
        if !inner.snapshot.status.is_terminal() {
            let finished = Utc::now();
            inner.snapshot.status = state;
            inner.snapshot.finished_at = Some(finished);
            inner.snapshot.duration_ms = Some(
                finished
                    .signed_duration_since(inner.snapshot.created_at)
                    .num_milliseconds(),
            );
        }
        inner.snapshot.clone()
    }
}

/// Registry of live jobs, keyed by job id.
#[derive(Clone, Default)]
pub struct JobRegistry {
    jobs: Arc<RwLock<HashMap<Uuid, Arc<JobEntry>>>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new running job.
    pub fn insert(&self, snapshot: JobSnapshot) -> Arc<JobEntry> {
        let entry = Arc::new(JobEntry::new(snapshot.clone()));
        self.jobs
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(snapshot.job_id, entry.clone());
        entry
    }

    pub fn get(&self, job_id: Uuid) -> Option<Arc<JobEntry>> {
        self.jobs
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&job_id)
            .cloned()
    }

    /// Remove a job (post-terminal garbage collection).
    pub fn remove(&self, job_id: Uuid) {
        self.jobs
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&job_id);
    }

    pub fn len(&self) -> usize {
        self.jobs.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
