//! Job-related DTOs for API responses.

use crate::jobs::models::{DispatchFailure, JobInfo, RunSummary};
use serde::Serialize;
use utoipa::ToSchema;

fn rfc3339(ts: jiff::Timestamp) -> String {
    ts.strftime("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

// ============================================================================
// Response DTOs
// ============================================================================

/// One failed delivery kept in a run summary.
#[derive(Debug, Serialize, ToSchema)]
pub struct DispatchFailureResponse {
    /// Idempotency key of the candidate
    #[schema(example = "meeting:42:user:7:email")]
    pub key: String,
    #[schema(example = "550 mailbox unavailable")]
    pub error: String,
    pub attempts: u32,
}

impl From<DispatchFailure> for DispatchFailureResponse {
    fn from(failure: DispatchFailure) -> Self {
        Self {
            key: failure.key,
            error: failure.error,
            attempts: failure.attempts,
        }
    }
}

/// Response body for one run of a job.
#[derive(Debug, Serialize, ToSchema)]
#[schema(example = json!({
    "job_name": "task_reminders",
    "run_id": "5b7a3c1e-2f4d-4a8b-9c0d-1e2f3a4b5c6d",
    "started_at": "2025-01-01T09:00:00.000Z",
    "finished_at": "2025-01-01T09:00:04.120Z",
    "duration_ms": 4120,
    "sent": 128,
    "failed": 2,
    "skipped": 0,
    "affected_rows": 0,
    "failures": [
        {"key": "task:10:user:3", "error": "550 mailbox unavailable", "attempts": 1}
    ],
    "failures_omitted": 0,
    "cancelled": false
}))]
pub struct RunSummaryResponse {
    pub job_name: String,
    pub run_id: String,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub duration_ms: Option<i64>,
    pub sent: u64,
    pub failed: u64,
    pub skipped: u64,
    pub affected_rows: u64,
    pub failures: Vec<DispatchFailureResponse>,
    pub failures_omitted: u64,
    pub cancelled: bool,
}

impl From<RunSummary> for RunSummaryResponse {
    fn from(summary: RunSummary) -> Self {
        Self {
            duration_ms: summary.duration_ms(),
            job_name: summary.job_name,
            run_id: summary.run_id.to_string(),
            started_at: rfc3339(summary.started_at),
            finished_at: summary.finished_at.map(rfc3339),
            sent: summary.sent,
            failed: summary.failed,
            skipped: summary.skipped,
            affected_rows: summary.affected_rows,
            failures: summary.failures.into_iter().map(Into::into).collect(),
            failures_omitted: summary.failures_omitted,
            cancelled: summary.cancelled,
        }
    }
}

/// Response body for a registered job.
#[derive(Debug, Serialize, ToSchema)]
pub struct JobResponse {
    #[schema(example = "meeting_reminders")]
    pub name: String,
    #[schema(example = "every 300s")]
    pub trigger: String,
    pub running: bool,
    pub description: Option<String>,
    pub dropped_ticks: u64,
    pub last_run: Option<RunSummaryResponse>,
    pub last_error: Option<String>,
}

impl From<JobInfo> for JobResponse {
    fn from(info: JobInfo) -> Self {
        Self {
            name: info.name,
            trigger: info.trigger,
            running: info.running,
            description: info.description,
            dropped_ticks: info.dropped_ticks,
            last_run: info.last_run.map(RunSummaryResponse::from),
            last_error: info.last_error,
        }
    }
}
