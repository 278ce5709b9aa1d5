//! Jobs command handler
//!
//! `jobs list` reads only the configuration. `jobs run` builds the same
//! collaborators as the server, fires one job body through a private
//! scheduler and prints the run summary as JSON.

use std::time::Duration;

use crate::config::{Environment, settings::Settings};
use crate::db::establish_async_connection_pool;
use crate::error::AppResult;
use crate::jobs::{JobRegistry, JobScheduler, RunSummary, Trigger};
use crate::server::job_dependencies;
use crate::services::notifications::RealtimeHub;

/// Handler for the jobs subcommands
pub struct JobsCommandHandler {
    config: Settings,
    environment: Environment,
}

impl JobsCommandHandler {
    pub fn new(config: Settings, environment: Environment) -> Self {
        Self {
            config,
            environment,
        }
    }

    /// One line per job: name, state and trigger.
    pub fn list(&self) -> Vec<String> {
        let scheduler_state = if self.config.scheduler.enabled {
            "enabled"
        } else {
            "scheduler disabled"
        };

        self.config
            .scheduler
            .jobs
            .schedules()
            .into_iter()
            .map(|(name, schedule)| {
                let state = if schedule.enabled { scheduler_state } else { "disabled" };
                match Trigger::from_schedule(schedule) {
                    Ok(trigger) => format!("{name:<18} {state:<18} {trigger}"),
                    Err(e) => format!("{name:<18} {state:<18} invalid: {e}"),
                }
            })
            .collect()
    }

    /// Runs `name` once, whether or not it is enabled.
    ///
    /// # Errors
    /// - Database pool or SMTP transport cannot be built
    /// - The job aborts (storage unavailable, crash)
    pub async fn run(&self, name: &str) -> AppResult<RunSummary> {
        let pool = establish_async_connection_pool(&self.config.database).await?;
        let deps = job_dependencies(&self.config, self.environment, &pool, &RealtimeHub::new())?;
        let registry = JobRegistry::new(deps, self.config.scheduler.clone());

        let scheduler =
            JobScheduler::new(Duration::from_secs(self.config.scheduler.grace_period_seconds))
                .await?;
        scheduler.register(registry.definition(name)?).await?;

        let outcome = scheduler.trigger(name).await;
        scheduler.stop().await?;
        Ok(outcome?)
    }

    pub async fn run_and_print(&self, name: &str) -> AppResult<()> {
        let summary = self.run(name).await?;
        let json = serde_json::to_string_pretty(&summary).map_err(anyhow::Error::from)?;
        println!("{json}");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_shows_state_and_trigger() {
        let mut config = Settings::default();
        config.scheduler.enabled = true;
        config.scheduler.jobs.health_check.enabled = false;
        config.scheduler.jobs.daily_summary.every_seconds = Some(60);

        let lines = JobsCommandHandler::new(config, Environment::Test).list();

        assert_eq!(lines.len(), 5);
        assert!(lines[0].starts_with("task_reminders"));
        assert!(lines[0].ends_with("every 43200s"));
        assert!(lines.iter().any(|l| l.starts_with("health_check") && l.contains("disabled")));
        assert!(lines.iter().any(|l| l.starts_with("daily_summary") && l.contains("invalid")));
    }
}
