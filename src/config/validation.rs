//! Configuration validation logic
//!
//! Range and consistency checks for every configuration section. The first
//! violation found is returned with the dotted path of the offending key.

use crate::config::error::ConfigError;
use crate::config::settings::{
    AlertsConfig, DatabaseConfig, DispatchSettings, FileSettings, JobsSettings, LoggerSettings,
    ScheduleRef, SchedulerConfig, ServerConfig, Settings, SmtpConfig,
};

const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

const VALID_LOG_FORMATS: &[&str] = &["full", "compact", "json"];

/// Largest page the dispatcher will ever materialize
const MAX_BATCH_SIZE: usize = 1000;

impl ServerConfig {
    /// Validate server configuration
    ///
    /// # Validation Rules
    /// - Port must be between 1 and 65535
    /// - Request timeout must be greater than 0
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::validation(
                "server.port",
                "Port must be between 1 and 65535. Please specify a valid port number.",
            ));
        }

        if self.request_timeout == 0 {
            return Err(ConfigError::validation(
                "server.request_timeout",
                "Request timeout must be greater than 0 seconds.",
            ));
        }

        Ok(())
    }
}

impl DatabaseConfig {
    /// Validate database configuration
    ///
    /// # Validation Rules
    /// - URL must be a non-empty PostgreSQL URL
    /// - Pool bounds must be positive with min <= max
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.url.is_empty() {
            return Err(ConfigError::validation(
                "database.url",
                "Database URL is required. Please specify a valid database connection string.",
            ));
        }

        if !self.url.starts_with("postgres://") && !self.url.starts_with("postgresql://") {
            return Err(ConfigError::validation(
                "database.url",
                "Invalid database URL format. Expected format: postgres://[user:password@]host[:port]/database",
            ));
        }

        if self.max_connections == 0 {
            return Err(ConfigError::validation(
                "database.max_connections",
                "Max connections must be greater than 0.",
            ));
        }

        if self.min_connections == 0 {
            return Err(ConfigError::validation(
                "database.min_connections",
                "Min connections must be greater than 0.",
            ));
        }

        if self.min_connections > self.max_connections {
            return Err(ConfigError::ValidationError {
                field: "database.min_connections".to_string(),
                message: format!(
                    "Min connections ({}) cannot exceed max connections ({}).",
                    self.min_connections, self.max_connections
                ),
            });
        }

        Ok(())
    }
}

impl FileSettings {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.enabled && self.path.trim().is_empty() {
            return Err(ConfigError::validation(
                "logger.file.path",
                "File path is required when file logging is enabled.",
            ));
        }

        if !VALID_LOG_FORMATS.contains(&self.format.to_lowercase().as_str()) {
            return Err(ConfigError::ValidationError {
                field: "logger.file.format".to_string(),
                message: format!(
                    "Invalid log format '{}'. Valid formats are: {}",
                    self.format,
                    VALID_LOG_FORMATS.join(", ")
                ),
            });
        }

        Ok(())
    }
}

impl LoggerSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !VALID_LOG_LEVELS.contains(&self.level.to_lowercase().as_str()) {
            return Err(ConfigError::ValidationError {
                field: "logger.level".to_string(),
                message: format!(
                    "Invalid log level '{}'. Valid levels are: {}",
                    self.level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            });
        }

        self.file.validate()
    }
}

impl SmtpConfig {
    /// Only checked while the scheduler is enabled; a server with jobs off
    /// never opens an SMTP connection.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::validation(
                "smtp.host",
                "SMTP host is required when the scheduler is enabled.",
            ));
        }

        if self.port == 0 {
            return Err(ConfigError::validation(
                "smtp.port",
                "SMTP port must be between 1 and 65535.",
            ));
        }

        if !looks_like_email(&self.from_email) {
            return Err(ConfigError::ValidationError {
                field: "smtp.from_email".to_string(),
                message: format!("'{}' is not a valid sender address.", self.from_email),
            });
        }

        if !self.username.is_empty() && self.password.is_empty() {
            return Err(ConfigError::validation(
                "smtp.password",
                "SMTP password is required when a username is configured.",
            ));
        }

        if self.timeout_seconds == 0 {
            return Err(ConfigError::validation(
                "smtp.timeout_seconds",
                "SMTP timeout must be greater than 0 seconds.",
            ));
        }

        Ok(())
    }
}

impl AlertsConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !looks_like_email(&self.admin_email) {
            return Err(ConfigError::validation(
                "alerts.admin_email",
                "An administrator address is required when the health check job is enabled.",
            ));
        }
        Ok(())
    }
}

impl DispatchSettings {
    /// Validate dispatch tuning
    ///
    /// # Validation Rules
    /// - `batch_size` in 1..=1000
    /// - `concurrency` in 1..=batch_size
    /// - `per_item_timeout_seconds` greater than 0
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_size == 0 || self.batch_size > MAX_BATCH_SIZE {
            return Err(ConfigError::ValidationError {
                field: "scheduler.dispatch.batch_size".to_string(),
                message: format!(
                    "Batch size must be between 1 and {}, got {}.",
                    MAX_BATCH_SIZE, self.batch_size
                ),
            });
        }

        if self.concurrency == 0 || self.concurrency > self.batch_size {
            return Err(ConfigError::ValidationError {
                field: "scheduler.dispatch.concurrency".to_string(),
                message: format!(
                    "Concurrency must be between 1 and the batch size ({}), got {}.",
                    self.batch_size, self.concurrency
                ),
            });
        }

        if self.per_item_timeout_seconds == 0 {
            return Err(ConfigError::validation(
                "scheduler.dispatch.per_item_timeout_seconds",
                "Per-item timeout must be greater than 0 seconds.",
            ));
        }

        Ok(())
    }
}

impl ScheduleRef<'_> {
    fn validate(&self, job: &str) -> Result<(), ConfigError> {
        let field = format!("scheduler.jobs.{job}");
        match (self.cron, self.every_seconds) {
            (Some(_), Some(_)) => Err(ConfigError::ValidationError {
                field,
                message: "Set either 'cron' or 'every_seconds', not both.".to_string(),
            }),
            (None, None) => Err(ConfigError::ValidationError {
                field,
                message: "A trigger is required: set 'cron' or 'every_seconds'.".to_string(),
            }),
            (None, Some(0)) => Err(ConfigError::ValidationError {
                field: format!("{field}.every_seconds"),
                message: "Interval must be greater than 0 seconds.".to_string(),
            }),
            (Some(expr), None) if expr.split_whitespace().count() != 6 => {
                Err(ConfigError::ValidationError {
                    field: format!("{field}.cron"),
                    message: format!(
                        "Cron expression '{expr}' must have six fields: sec min hour day month weekday."
                    ),
                })
            }
            _ => Ok(()),
        }
    }
}

impl JobsSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, schedule) in self.schedules() {
            if schedule.enabled {
                schedule.validate(name)?;
            }
        }

        if self.task_reminders.enabled && self.task_reminders.pending_threshold_hours == 0 {
            return Err(ConfigError::validation(
                "scheduler.jobs.task_reminders.pending_threshold_hours",
                "Pending threshold must be greater than 0 hours.",
            ));
        }

        if self.meeting_reminders.enabled && self.meeting_reminders.lookahead_minutes == 0 {
            return Err(ConfigError::validation(
                "scheduler.jobs.meeting_reminders.lookahead_minutes",
                "Lookahead must be greater than 0 minutes.",
            ));
        }

        if self.data_cleanup.enabled && self.data_cleanup.retention_days == 0 {
            return Err(ConfigError::validation(
                "scheduler.jobs.data_cleanup.retention_days",
                "Retention must be at least 1 day.",
            ));
        }

        Ok(())
    }
}

impl SchedulerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.grace_period_seconds == 0 {
            return Err(ConfigError::validation(
                "scheduler.grace_period_seconds",
                "Grace period must be greater than 0 seconds.",
            ));
        }

        self.dispatch.validate()?;
        self.jobs.validate()
    }
}

impl Settings {
    /// Validate all configuration settings
    ///
    /// Returns the first validation error encountered. SMTP and alert
    /// sections are only required while the scheduler is enabled.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.validate()?;
        self.database.validate()?;
        self.logger.validate()?;
        self.scheduler.validate()?;

        if self.scheduler.enabled {
            self.smtp.validate()?;
            if self.scheduler.jobs.health_check.enabled {
                self.alerts.validate()?;
            }
        }

        Ok(())
    }
}

fn looks_like_email(value: &str) -> bool {
    match value.split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.') && !value.contains(' '),
        None => false,
    }
}
