//! The job bodies.

mod daily_summary;
mod data_cleanup;
mod health_check;
mod meeting_reminders;
mod task_reminders;

#[cfg(test)]
pub(crate) mod testing;

pub use daily_summary::DailySummaryJob;
pub use data_cleanup::DataCleanupJob;
pub use health_check::{HealthCheckJob, HealthState, HealthTransition};
pub use meeting_reminders::MeetingRemindersJob;
pub use task_reminders::TaskRemindersJob;

use std::time::Duration;

use jiff::{SignedDuration, Timestamp};

use crate::jobs::error::{JobError, JobResult};

/// `now - age`, failing instead of panicking on out-of-range ages.
pub(crate) fn older_than(now: Timestamp, age: Duration) -> JobResult<Timestamp> {
    let age = SignedDuration::try_from(age)
        .map_err(|e| JobError::ExecutionFailed(format!("age out of range: {e}")))?;
    now.checked_sub(age)
        .map_err(|e| JobError::ExecutionFailed(format!("threshold out of range: {e}")))
}

pub(crate) fn hours(n: u64) -> Duration {
    Duration::from_secs(n.saturating_mul(3600))
}

pub(crate) fn days(n: u64) -> Duration {
    Duration::from_secs(n.saturating_mul(86_400))
}
