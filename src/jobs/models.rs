use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::jobs::types::JobContext;

// ============================================================================
// Per-item outcomes
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Sent,
    Failed,
    Skipped,
}

/// Terminal result of dispatching one candidate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchResult {
    /// Idempotency key of the candidate
    pub key: String,
    pub outcome: Outcome,
    /// Error text when failed, reason when skipped
    pub detail: Option<String>,
    /// Delivery attempts made, zero when skipped before sending
    pub attempts: u32,
}

impl DispatchResult {
    pub fn sent(key: impl Into<String>, attempts: u32) -> Self {
        Self {
            key: key.into(),
            outcome: Outcome::Sent,
            detail: None,
            attempts,
        }
    }

    pub fn failed(key: impl Into<String>, error: impl Into<String>, attempts: u32) -> Self {
        Self {
            key: key.into(),
            outcome: Outcome::Failed,
            detail: Some(error.into()),
            attempts,
        }
    }

    pub fn skipped(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            outcome: Outcome::Skipped,
            detail: Some(reason.into()),
            attempts: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchFailure {
    pub key: String,
    pub error: String,
    pub attempts: u32,
}

// ============================================================================
// RunSummary
// ============================================================================

/// Aggregate of one run of a job body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub job_name: String,
    pub run_id: Uuid,
    pub started_at: Timestamp,
    pub finished_at: Option<Timestamp>,
    pub sent: u64,
    pub failed: u64,
    pub skipped: u64,
    /// Rows touched by maintenance jobs that send nothing
    pub affected_rows: u64,
    /// First failures of the run, bounded by `max_recorded_failures`
    pub failures: Vec<DispatchFailure>,
    /// Failures counted but not kept in `failures`
    pub failures_omitted: u64,
    /// True when the run stopped early on cancellation
    pub cancelled: bool,
}

impl RunSummary {
    pub fn new(job_name: impl Into<String>, run_id: Uuid) -> Self {
        Self {
            job_name: job_name.into(),
            run_id,
            started_at: Timestamp::now(),
            finished_at: None,
            sent: 0,
            failed: 0,
            skipped: 0,
            affected_rows: 0,
            failures: Vec::new(),
            failures_omitted: 0,
            cancelled: false,
        }
    }

    pub fn for_context(ctx: &JobContext) -> Self {
        Self::new(ctx.job_name.clone(), ctx.run_id)
    }

    /// Counts one result; failure details beyond `max_failures` are only counted.
    pub fn record(&mut self, result: DispatchResult, max_failures: usize) {
        match result.outcome {
            Outcome::Sent => self.sent += 1,
            Outcome::Skipped => self.skipped += 1,
            Outcome::Failed => {
                self.failed += 1;
                if self.failures.len() < max_failures {
                    self.failures.push(DispatchFailure {
                        key: result.key,
                        error: result.detail.unwrap_or_default(),
                        attempts: result.attempts,
                    });
                } else {
                    self.failures_omitted += 1;
                }
            }
        }
    }

    /// Number of candidates that reached an outcome
    pub fn total(&self) -> u64 {
        self.sent + self.failed + self.skipped
    }

    pub fn finish(mut self) -> Self {
        self.finished_at = Some(Timestamp::now());
        self
    }

    pub fn duration_ms(&self) -> Option<i64> {
        self.finished_at.map(|end| {
            end.duration_since(self.started_at).as_millis() as i64
        })
    }
}

// ============================================================================
// Job listing
// ============================================================================

/// Status snapshot of one registered job
#[derive(Debug, Clone, Serialize)]
pub struct JobInfo {
    pub name: String,
    pub trigger: String,
    pub running: bool,
    pub description: Option<String>,
    /// Ticks dropped because a previous firing was still running
    pub dropped_ticks: u64,
    pub last_run: Option<RunSummary>,
    pub last_error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_counts_every_outcome() {
        let mut summary = RunSummary::new("t", Uuid::new_v4());
        summary.record(DispatchResult::sent("a", 1), 10);
        summary.record(DispatchResult::failed("b", "550 rejected", 1), 10);
        summary.record(DispatchResult::skipped("c", "no email"), 10);

        assert_eq!((summary.sent, summary.failed, summary.skipped), (1, 1, 1));
        assert_eq!(summary.total(), 3);
        assert_eq!(summary.failures[0].key, "b");
        assert_eq!(summary.failures[0].error, "550 rejected");
    }

    #[test]
    fn test_failure_list_is_bounded() {
        let mut summary = RunSummary::new("t", Uuid::new_v4());
        for i in 0..5 {
            summary.record(DispatchResult::failed(format!("k{i}"), "boom", 3), 2);
        }

        assert_eq!(summary.failed, 5);
        assert_eq!(summary.failures.len(), 2);
        assert_eq!(summary.failures_omitted, 3);
    }

    #[test]
    fn test_finish_sets_end_time() {
        let summary = RunSummary::new("t", Uuid::new_v4()).finish();
        assert!(summary.finished_at.is_some());
        assert!(summary.duration_ms().unwrap() >= 0);
    }

    #[test]
    fn test_outcome_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Outcome::Skipped).unwrap(), "\"skipped\"");
    }
}
