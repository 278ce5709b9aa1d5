//! Serve command handler
//!
//! Dry runs validate settings and build every enabled job trigger without
//! touching the database; real runs hand over to [`Server`].

use crate::config::{Environment, settings::Settings};
use crate::error::AppResult;
use crate::jobs::Trigger;
use crate::server::Server;

/// Handler for the serve command
pub struct ServeCommandHandler {
    config: Settings,
    environment: Environment,
}

impl ServeCommandHandler {
    pub fn new(config: Settings, environment: Environment) -> Self {
        Self {
            config,
            environment,
        }
    }

    pub async fn execute(self, dry_run: bool) -> anyhow::Result<()> {
        if dry_run {
            for line in self.validate_only()? {
                println!("{line}");
            }
            println!("Dry run completed successfully - configuration is ready for deployment");
            return Ok(());
        }
        Server::new(self.config, self.environment).run().await
    }

    /// Validation report lines; errors on the first invalid setting.
    pub fn validate_only(&self) -> AppResult<Vec<String>> {
        self.config.validate()?;

        let mut report = vec![
            "✓ Configuration is valid".to_string(),
            format!("✓ Environment: {}", self.environment),
            format!("✓ Server would bind to: {}", self.config.server.address()),
        ];

        let scheduler = &self.config.scheduler;
        if !scheduler.enabled {
            report.push("- Job scheduler disabled".to_string());
            return Ok(report);
        }
        for (name, schedule) in scheduler.jobs.schedules() {
            if schedule.enabled {
                let trigger = Trigger::from_schedule(schedule)?;
                report.push(format!("✓ Job {name}: {trigger}"));
            } else {
                report.push(format!("- Job {name}: disabled"));
            }
        }
        Ok(report)
    }
}
