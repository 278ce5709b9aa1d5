use std::sync::Arc;

use crate::config::SchedulerConfig;
use crate::jobs::dispatch::{BatchDispatcher, DispatchConfig};
use crate::jobs::error::{JobError, JobResult};
use crate::jobs::gateway::ReminderQueryGateway;
use crate::jobs::scheduler::JobDefinition;
use crate::jobs::tasks::{
    DailySummaryJob, DataCleanupJob, HealthCheckJob, MeetingRemindersJob, TaskRemindersJob, days,
    hours,
};
use crate::jobs::types::{JobTask, Trigger};
use crate::services::notifications::NotificationSink;
use crate::services::notifications::compose::ServerInfo;

/// Names of every job body this build knows
pub const JOB_NAMES: [&str; 5] = [
    "task_reminders",
    "meeting_reminders",
    "daily_summary",
    "health_check",
    "data_cleanup",
];

/// Everything the job bodies need from the outside
#[derive(Clone)]
pub struct JobDependencies {
    pub gateway: Arc<dyn ReminderQueryGateway>,
    pub sink: Arc<dyn NotificationSink>,
    pub admin_email: String,
    pub server: ServerInfo,
}

/// Maps job names to configured task instances
pub struct JobRegistry {
    deps: JobDependencies,
    config: SchedulerConfig,
}

impl JobRegistry {
    pub fn new(deps: JobDependencies, config: SchedulerConfig) -> Self {
        Self { deps, config }
    }

    fn dispatcher(&self) -> BatchDispatcher {
        BatchDispatcher::new(DispatchConfig::from(&self.config.dispatch))
    }

    /// Create the task instance registered under `name`
    pub fn create_task(&self, name: &str) -> JobResult<Arc<dyn JobTask>> {
        let jobs = &self.config.jobs;
        let deps = &self.deps;

        let task: Arc<dyn JobTask> = match name {
            "task_reminders" => Arc::new(TaskRemindersJob::new(
                Arc::clone(&deps.gateway),
                Arc::clone(&deps.sink),
                self.dispatcher(),
                hours(jobs.task_reminders.pending_threshold_hours),
            )),
            "meeting_reminders" => Arc::new(MeetingRemindersJob::new(
                Arc::clone(&deps.gateway),
                Arc::clone(&deps.sink),
                self.dispatcher(),
                std::time::Duration::from_secs(
                    jobs.meeting_reminders.lookahead_minutes.saturating_mul(60),
                ),
            )),
            "daily_summary" => Arc::new(DailySummaryJob::new(
                Arc::clone(&deps.gateway),
                Arc::clone(&deps.sink),
                self.dispatcher(),
                hours(jobs.task_reminders.pending_threshold_hours),
            )),
            "health_check" => Arc::new(HealthCheckJob::new(
                Arc::clone(&deps.gateway),
                Arc::clone(&deps.sink),
                self.dispatcher(),
                deps.admin_email.clone(),
                deps.server.clone(),
            )),
            "data_cleanup" => Arc::new(DataCleanupJob::new(
                Arc::clone(&deps.gateway),
                self.dispatcher(),
                days(jobs.data_cleanup.retention_days),
            )),
            other => return Err(JobError::NotFound(other.to_string())),
        };
        Ok(task)
    }

    /// Definition for `name` whether or not it is enabled
    pub fn definition(&self, name: &str) -> JobResult<JobDefinition> {
        let (_, schedule) = self
            .config
            .jobs
            .schedules()
            .into_iter()
            .find(|(job, _)| *job == name)
            .ok_or_else(|| JobError::NotFound(name.to_string()))?;

        Ok(JobDefinition::new(
            Trigger::from_schedule(schedule)?,
            self.create_task(name)?,
        ))
    }

    /// Definitions of every enabled job
    pub fn definitions(&self) -> JobResult<Vec<JobDefinition>> {
        self.config
            .jobs
            .schedules()
            .into_iter()
            .filter(|(_, schedule)| schedule.enabled)
            .map(|(name, _)| self.definition(name))
            .collect()
    }
}
