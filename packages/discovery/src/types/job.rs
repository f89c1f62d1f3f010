//! Process-local discovery job state.
//!
//! Jobs are never persisted; they live in the orchestrator's registry and
//! are garbage-collected a grace period after reaching a terminal state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::pantry::GeoPoint;

/// Lifecycle state of a discovery job. Transitions are monotonic:
/// `Running` moves to exactly one terminal state and never back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Running,
    Completed,
    Failed,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Running)
    }
}

/// Per-job outcome counters. `succeeded + failed + skipped == urls_found`
/// on a clean drain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobCounters {
    pub succeeded: u32,
    pub failed: u32,
    pub skipped: u32,
}

/// A point-in-time view of a job, as returned by `job_status`.
#[derive(Debug, Clone, Serialize)]
pub struct JobSnapshot {
    pub job_id: Uuid,
    pub query: String,
    pub center: GeoPoint,
    pub radius_meters: u32,
    pub status: JobState,
    pub urls_found: u32,
    pub counters: JobCounters,
    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub duration_ms: Option<i64>,
}

impl JobSnapshot {
    /// A fresh running job for the given request parameters.
    pub fn new(job_id: Uuid, query: impl Into<String>, center: GeoPoint, radius_meters: u32) -> Self {
        Self {
            job_id,
            query: query.into(),
            center,
            radius_meters,
            status: JobState::Running,
            urls_found: 0,
            counters: JobCounters::default(),
            created_at: Utc::now(),
            finished_at: None,
            duration_ms: None,
        }
    }
}
