//! Migrate command handler
//!
//! Handles database migration operations including dry-run and rollback.

use crate::config::settings::Settings;
use crate::db;
use crate::error::{AppError, AppResult};

/// Handler for the migrate command
pub struct MigrateCommandHandler {
    config: Settings,
}

impl MigrateCommandHandler {
    pub fn new(config: Settings) -> Self {
        Self { config }
    }

    /// Applies, previews or reverts migrations.
    ///
    /// # Errors
    /// - Invalid database configuration or rollback steps
    /// - Connection and migration errors
    pub async fn execute(&self, dry_run: bool, rollback: Option<u32>) -> AppResult<()> {
        self.config.database.validate()?;
        let url = &self.config.database.url;

        match (dry_run, rollback) {
            (_, Some(0)) => Err(AppError::Validation {
                field: "rollback_steps".to_string(),
                reason: "Number of rollback steps must be greater than 0".to_string(),
            }),
            (true, _) => {
                let pending = db::pending_migrations(url).await?;
                report("pending", &pending);
                if !pending.is_empty() {
                    println!("\nRun without --dry-run to apply these migrations");
                }
                Ok(())
            }
            (false, Some(steps)) => {
                println!("Rolling back {} migration(s)...", steps);
                let reverted = db::revert_migrations(url, steps).await?;
                report("reverted", &reverted);
                Ok(())
            }
            (false, None) => {
                let applied = db::run_pending_migrations(url).await?;
                report("applied", &applied);
                Ok(())
            }
        }
    }

    pub fn config(&self) -> &Settings {
        &self.config
    }
}

fn report(verb: &str, migrations: &[String]) {
    if migrations.is_empty() {
        println!("✓ No migrations {} - database is up to date", verb);
        return;
    }
    println!("✓ {} migration(s) {}:", migrations.len(), verb);
    for migration in migrations {
        println!("  - {}", migration);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handler(url: &str) -> MigrateCommandHandler {
        let mut config = Settings::default();
        config.database.url = url.to_string();
        MigrateCommandHandler::new(config)
    }

    #[tokio::test]
    async fn test_zero_rollback_steps_rejected_before_connecting() {
        match handler("postgres://127.0.0.1:1/taskdash").execute(false, Some(0)).await {
            Err(AppError::Validation { field, reason }) => {
                assert_eq!(field, "rollback_steps");
                assert!(reason.contains("must be greater than 0"));
            }
            other => panic!("Expected validation error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_invalid_database_url_is_a_configuration_error() {
        let result = handler("mysql://localhost/taskdash").execute(true, None).await;
        assert!(matches!(result, Err(AppError::Configuration { .. })));
    }
}
