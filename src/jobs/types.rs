use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::config::settings::ScheduleRef;
use crate::jobs::error::{JobError, JobResult};
use crate::jobs::models::RunSummary;

/// When a job fires
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Trigger {
    /// Six-field cron expression (with seconds), evaluated in UTC
    Cron(String),
    /// Fixed interval measured from scheduler start
    Interval(Duration),
}

impl Trigger {
    /// Builds the trigger a job config section describes.
    pub fn from_schedule(schedule: ScheduleRef<'_>) -> JobResult<Self> {
        match (schedule.cron, schedule.every_seconds) {
            (Some(cron), None) => {
                let fields = cron.split_whitespace().count();
                if fields != 6 {
                    return Err(JobError::InvalidTrigger(format!(
                        "cron expression '{cron}' has {fields} fields, expected 6"
                    )));
                }
                Ok(Trigger::Cron(cron.to_string()))
            }
            (None, Some(0)) => Err(JobError::InvalidTrigger(
                "interval must be greater than zero".to_string(),
            )),
            (None, Some(seconds)) => Ok(Trigger::Interval(Duration::from_secs(seconds))),
            (Some(_), Some(_)) => Err(JobError::InvalidTrigger(
                "cron and every_seconds are mutually exclusive".to_string(),
            )),
            (None, None) => Err(JobError::InvalidTrigger(
                "one of cron or every_seconds is required".to_string(),
            )),
        }
    }
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Trigger::Cron(expr) => write!(f, "cron({expr})"),
            Trigger::Interval(every) => write!(f, "every {}s", every.as_secs()),
        }
    }
}

/// Job execution context passed to tasks
#[derive(Debug, Clone)]
pub struct JobContext {
    pub run_id: Uuid,
    pub job_name: String,
    /// Cancelled when the scheduler stops; bodies check it between items
    pub cancellation_token: CancellationToken,
}

impl JobContext {
    pub fn new(job_name: impl Into<String>, cancellation_token: CancellationToken) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            job_name: job_name.into(),
            cancellation_token,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation_token.is_cancelled()
    }
}

/// Trait that all job bodies must implement
#[async_trait]
pub trait JobTask: Send + Sync {
    /// Unique job name, used for registration and manual triggers
    fn name(&self) -> &'static str;

    /// Run the body once
    async fn run(&self, ctx: &JobContext) -> JobResult<RunSummary>;

    /// Optional description
    fn description(&self) -> Option<String> {
        None
    }
}
