//! Configuration settings structures for taskdash
//!
//! This module defines all configuration structures that can be loaded from
//! TOML files and environment variables.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::config::error::ConfigError;
use crate::logger::{ConsoleConfig, FileConfig, LogFormat, LoggerConfig};

// ============================================================================
// Default value functions
// ============================================================================

fn default_app_name() -> String {
    "taskdash".to_string()
}

fn default_app_version() -> String {
    crate::pkg_version().to_string()
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_request_timeout() -> u64 {
    30
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    1
}

fn default_connection_timeout() -> u64 {
    30
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

fn default_log_path() -> String {
    "logs/taskdash.log".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

fn default_smtp_host() -> String {
    "localhost".to_string()
}

fn default_smtp_port() -> u16 {
    587
}

fn default_from_email() -> String {
    "noreply@taskdash.local".to_string()
}

fn default_from_name() -> String {
    "Taskdash".to_string()
}

fn default_smtp_timeout() -> u64 {
    30
}

fn default_grace_period() -> u64 {
    30
}

fn default_batch_size() -> usize {
    50
}

fn default_concurrency() -> usize {
    1
}

fn default_inter_batch_delay_ms() -> u64 {
    1000
}

fn default_per_item_timeout() -> u64 {
    30
}

fn default_dispatch_retries() -> u32 {
    2
}

fn default_retry_backoff_ms() -> u64 {
    500
}

fn default_max_recorded_failures() -> usize {
    100
}

// ============================================================================
// Application Configuration
// ============================================================================

/// Application basic information configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationConfig {
    #[serde(default = "default_app_name")]
    pub name: String,

    #[serde(default = "default_app_version")]
    pub version: String,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            name: default_app_name(),
            version: default_app_version(),
        }
    }
}

// ============================================================================
// Server Configuration
// ============================================================================

/// Axum HTTP server configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Upper bound on a request in seconds; long-running routes are exempt
    #[serde(default = "default_request_timeout")]
    pub request_timeout: u64,
}

impl ServerConfig {
    /// Get the full server address as "host:port"
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout: default_request_timeout(),
        }
    }
}

// ============================================================================
// Database Configuration
// ============================================================================

/// PostgreSQL connection pool configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database connection URL
    #[serde(default)]
    pub url: String,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    /// Connection timeout in seconds
    #[serde(default = "default_connection_timeout")]
    pub connection_timeout: u64,

    /// Whether to run pending migrations on startup
    #[serde(default)]
    pub auto_migrate: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_connections: default_max_connections(),
            min_connections: default_min_connections(),
            connection_timeout: default_connection_timeout(),
            auto_migrate: false,
        }
    }
}

// ============================================================================
// Logger Settings
// ============================================================================

/// Console output settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsoleSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_true")]
    pub colored: bool,
}

impl Default for ConsoleSettings {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            colored: default_true(),
        }
    }
}

/// File output settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSettings {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_log_path")]
    pub path: String,

    #[serde(default = "default_true")]
    pub append: bool,

    /// Log format: "full", "compact", or "json"
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for FileSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            path: default_log_path(),
            append: default_true(),
            format: default_log_format(),
        }
    }
}

/// Logger configuration settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggerSettings {
    /// Log level: "trace", "debug", "info", "warn", "error"
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub console: ConsoleSettings,

    #[serde(default)]
    pub file: FileSettings,
}

impl Default for LoggerSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            console: ConsoleSettings::default(),
            file: FileSettings::default(),
        }
    }
}

impl LoggerSettings {
    /// Convert the file representation into the runtime `LoggerConfig`.
    pub fn into_logger_config(self) -> Result<LoggerConfig, ConfigError> {
        let console = ConsoleConfig::new(self.console.enabled, self.console.colored);
        let file = self.file.into_file_config()?;

        LoggerConfig::new(console, file, self.level).map_err(|e| ConfigError::ValidationError {
            field: "logger".to_string(),
            message: e.to_string(),
        })
    }
}

impl FileSettings {
    pub fn into_file_config(self) -> Result<FileConfig, ConfigError> {
        let format = self
            .format
            .parse::<LogFormat>()
            .map_err(|e| ConfigError::ValidationError {
                field: "logger.file.format".to_string(),
                message: e.to_string(),
            })?;

        FileConfig::new(self.enabled, PathBuf::from(self.path), self.append, format).map_err(
            |e| ConfigError::ValidationError {
                field: "logger.file".to_string(),
                message: e.to_string(),
            },
        )
    }
}

// ============================================================================
// SMTP / Alert Configuration
// ============================================================================

/// Transport security used when talking to the SMTP relay
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SmtpSecurity {
    /// Implicit TLS (usually port 465)
    Tls,
    /// Plain connection upgraded with STARTTLS (usually port 587)
    #[default]
    Starttls,
    /// Unencrypted, for local relays and test servers only
    None,
}

/// Outgoing mail configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SmtpConfig {
    #[serde(default = "default_smtp_host")]
    pub host: String,

    #[serde(default = "default_smtp_port")]
    pub port: u16,

    /// Empty username disables authentication
    #[serde(default)]
    pub username: String,

    #[serde(default)]
    pub password: String,

    #[serde(default = "default_from_email")]
    pub from_email: String,

    #[serde(default = "default_from_name")]
    pub from_name: String,

    #[serde(default)]
    pub security: SmtpSecurity,

    /// Connection/command timeout of the transport in seconds
    #[serde(default = "default_smtp_timeout")]
    pub timeout_seconds: u64,
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            host: default_smtp_host(),
            port: default_smtp_port(),
            username: String::new(),
            password: String::new(),
            from_email: default_from_email(),
            from_name: default_from_name(),
            security: SmtpSecurity::default(),
            timeout_seconds: default_smtp_timeout(),
        }
    }
}

/// Operator alerting configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct AlertsConfig {
    /// Recipient of server health alerts and recovery notices
    #[serde(default)]
    pub admin_email: String,
}

// ============================================================================
// Scheduler Configuration
// ============================================================================

/// Bulk delivery tuning shared by every reminder job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchSettings {
    /// Candidates pulled and processed per page
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Deliveries in flight at once within a page
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Pause between pages in milliseconds
    #[serde(default = "default_inter_batch_delay_ms")]
    pub inter_batch_delay_ms: u64,

    /// Cap on a single delivery attempt in seconds
    #[serde(default = "default_per_item_timeout")]
    pub per_item_timeout_seconds: u64,

    /// Retries after a transient failure
    #[serde(default = "default_dispatch_retries")]
    pub max_retries: u32,

    /// Base backoff between retries in milliseconds, doubled per attempt
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// Upper bound on failures kept in a run summary
    #[serde(default = "default_max_recorded_failures")]
    pub max_recorded_failures: usize,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            concurrency: default_concurrency(),
            inter_batch_delay_ms: default_inter_batch_delay_ms(),
            per_item_timeout_seconds: default_per_item_timeout(),
            max_retries: default_dispatch_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
            max_recorded_failures: default_max_recorded_failures(),
        }
    }
}

/// Borrowed view of the trigger fields every job section carries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleRef<'a> {
    pub enabled: bool,
    pub cron: Option<&'a str>,
    pub every_seconds: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskRemindersConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cron: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub every_seconds: Option<u64>,
    /// A pending task becomes due for a reminder after this many hours
    #[serde(default = "TaskRemindersConfig::default_threshold")]
    pub pending_threshold_hours: u64,
}

impl TaskRemindersConfig {
    fn default_threshold() -> u64 {
        24
    }
}

impl Default for TaskRemindersConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            cron: None,
            every_seconds: Some(12 * 60 * 60),
            pending_threshold_hours: Self::default_threshold(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeetingRemindersConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cron: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub every_seconds: Option<u64>,
    /// Outer bound of the reminder window; per-meeting `reminder_minutes` narrows it
    #[serde(default = "MeetingRemindersConfig::default_lookahead")]
    pub lookahead_minutes: u64,
}

impl MeetingRemindersConfig {
    fn default_lookahead() -> u64 {
        24 * 60
    }
}

impl Default for MeetingRemindersConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            cron: None,
            every_seconds: Some(5 * 60),
            lookahead_minutes: Self::default_lookahead(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DailySummaryConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cron: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub every_seconds: Option<u64>,
}

impl Default for DailySummaryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            cron: Some("0 0 9 * * *".to_string()),
            every_seconds: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthCheckConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cron: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub every_seconds: Option<u64>,
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            cron: None,
            every_seconds: Some(5 * 60),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataCleanupConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cron: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub every_seconds: Option<u64>,
    /// Completed tasks older than this are deleted
    #[serde(default = "DataCleanupConfig::default_retention")]
    pub retention_days: u64,
}

impl DataCleanupConfig {
    fn default_retention() -> u64 {
        30
    }
}

impl Default for DataCleanupConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            cron: Some("0 0 2 * * *".to_string()),
            every_seconds: None,
            retention_days: Self::default_retention(),
        }
    }
}

macro_rules! schedule_ref {
    ($($config:ty),+) => {
        $(
            impl $config {
                pub fn schedule(&self) -> ScheduleRef<'_> {
                    ScheduleRef {
                        enabled: self.enabled,
                        cron: self.cron.as_deref(),
                        every_seconds: self.every_seconds,
                    }
                }
            }
        )+
    };
}

schedule_ref!(
    TaskRemindersConfig,
    MeetingRemindersConfig,
    DailySummaryConfig,
    HealthCheckConfig,
    DataCleanupConfig
);

/// Per-job sections under `[scheduler.jobs]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct JobsSettings {
    #[serde(default)]
    pub task_reminders: TaskRemindersConfig,
    #[serde(default)]
    pub meeting_reminders: MeetingRemindersConfig,
    #[serde(default)]
    pub daily_summary: DailySummaryConfig,
    #[serde(default)]
    pub health_check: HealthCheckConfig,
    #[serde(default)]
    pub data_cleanup: DataCleanupConfig,
}

impl JobsSettings {
    /// Every job section keyed by its registered job name.
    pub fn schedules(&self) -> [(&'static str, ScheduleRef<'_>); 5] {
        [
            ("task_reminders", self.task_reminders.schedule()),
            ("meeting_reminders", self.meeting_reminders.schedule()),
            ("daily_summary", self.daily_summary.schedule()),
            ("health_check", self.health_check.schedule()),
            ("data_cleanup", self.data_cleanup.schedule()),
        ]
    }
}

/// Background scheduler configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Whether scheduled firings are started with the server
    #[serde(default)]
    pub enabled: bool,

    /// How long `stop()` waits for in-flight firings, in seconds
    #[serde(default = "default_grace_period")]
    pub grace_period_seconds: u64,

    #[serde(default)]
    pub dispatch: DispatchSettings,

    #[serde(default)]
    pub jobs: JobsSettings,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            grace_period_seconds: default_grace_period(),
            dispatch: DispatchSettings::default(),
            jobs: JobsSettings::default(),
        }
    }
}

// ============================================================================
// Main Settings Structure
// ============================================================================

/// Complete application settings
///
/// This structure represents the entire configuration that can be loaded
/// from TOML files and environment variables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub application: ApplicationConfig,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub logger: LoggerSettings,

    #[serde(default)]
    pub smtp: SmtpConfig,

    #[serde(default)]
    pub alerts: AlertsConfig,

    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn arb_dispatch() -> impl Strategy<Value = DispatchSettings> {
        (
            1usize..=1000,
            1usize..=16,
            0u64..=5_000,
            1u64..=120,
            0u32..=5,
            0u64..=2_000,
            0usize..=500,
        )
            .prop_map(
                |(
                    batch_size,
                    concurrency,
                    inter_batch_delay_ms,
                    per_item_timeout_seconds,
                    max_retries,
                    retry_backoff_ms,
                    max_recorded_failures,
                )| DispatchSettings {
                    batch_size,
                    concurrency,
                    inter_batch_delay_ms,
                    per_item_timeout_seconds,
                    max_retries,
                    retry_backoff_ms,
                    max_recorded_failures,
                },
            )
    }

    fn arb_trigger() -> impl Strategy<Value = (Option<String>, Option<u64>)> {
        prop_oneof![
            (1u64..=86_400).prop_map(|secs| (None, Some(secs))),
            Just((Some("0 30 8 * * Mon-Fri".to_string()), None)),
            Just((Some("0 0 */6 * * *".to_string()), None)),
        ]
    }

    fn arb_scheduler() -> impl Strategy<Value = SchedulerConfig> {
        (any::<bool>(), 1u64..=600, arb_dispatch(), arb_trigger(), 1u64..=365).prop_map(
            |(enabled, grace, dispatch, (cron, every_seconds), retention_days)| SchedulerConfig {
                enabled,
                grace_period_seconds: grace,
                dispatch,
                jobs: JobsSettings {
                    data_cleanup: DataCleanupConfig {
                        enabled: true,
                        cron,
                        every_seconds,
                        retention_days,
                    },
                    ..JobsSettings::default()
                },
            },
        )
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        /// Serializing scheduler settings to TOML and reading them back is lossless,
        /// including the optional trigger fields that are skipped when absent.
        #[test]
        fn prop_scheduler_settings_toml_round_trip(scheduler in arb_scheduler()) {
            let settings = Settings { scheduler, ..Settings::default() };
            let toml_str = toml::to_string(&settings).expect("Settings should serialize to TOML");
            let back: Settings = toml::from_str(&toml_str).expect("TOML should deserialize back");
            prop_assert_eq!(settings, back);
        }
    }

    #[test]
    fn test_application_config_defaults() {
        let config = ApplicationConfig::default();
        assert_eq!(config.name, "taskdash");
        assert_eq!(config.version, crate::pkg_version());
    }

    #[test]
    fn test_server_config_address() {
        assert_eq!(ServerConfig::default().address(), "127.0.0.1:3000");
    }

    #[test]
    fn test_dispatch_defaults() {
        let dispatch = DispatchSettings::default();
        assert_eq!(dispatch.batch_size, 50);
        assert_eq!(dispatch.concurrency, 1);
        assert_eq!(dispatch.inter_batch_delay_ms, 1000);
        assert_eq!(dispatch.per_item_timeout_seconds, 30);
        assert_eq!(dispatch.max_retries, 2);
    }

    #[test]
    fn test_job_defaults_follow_reminder_cadence() {
        let jobs = JobsSettings::default();
        assert_eq!(jobs.task_reminders.every_seconds, Some(43_200));
        assert_eq!(jobs.meeting_reminders.every_seconds, Some(300));
        assert_eq!(jobs.daily_summary.cron.as_deref(), Some("0 0 9 * * *"));
        assert_eq!(jobs.health_check.every_seconds, Some(300));
        assert_eq!(jobs.data_cleanup.retention_days, 30);
    }

    #[test]
    fn test_schedules_lists_every_job() {
        let jobs = JobsSettings::default();
        let names: Vec<_> = jobs.schedules().iter().map(|(name, _)| *name).collect();
        assert_eq!(
            names,
            [
                "task_reminders",
                "meeting_reminders",
                "daily_summary",
                "health_check",
                "data_cleanup"
            ]
        );
    }

    #[test]
    fn test_partial_job_section_keeps_defaults() {
        let settings: Settings = toml::from_str(
            r#"
            [scheduler.jobs.meeting_reminders]
            every_seconds = 60
            "#,
        )
        .unwrap();

        let meeting = &settings.scheduler.jobs.meeting_reminders;
        assert!(meeting.enabled);
        assert_eq!(meeting.every_seconds, Some(60));
        assert_eq!(meeting.lookahead_minutes, 1440);
        assert_eq!(settings.scheduler.jobs.task_reminders.pending_threshold_hours, 24);
    }

    #[test]
    fn test_partial_job_section_keeps_default_trigger() {
        let settings: Settings = toml::from_str(
            r#"
            [scheduler.jobs.data_cleanup]
            retention_days = 90

            [scheduler.jobs.health_check]
            enabled = false
            "#,
        )
        .unwrap();

        let cleanup = &settings.scheduler.jobs.data_cleanup;
        assert_eq!(cleanup.retention_days, 90);
        assert_eq!(cleanup.cron.as_deref(), Some("0 0 2 * * *"));
        assert_eq!(cleanup.every_seconds, None);

        let health = &settings.scheduler.jobs.health_check;
        assert!(!health.enabled);
        assert_eq!(health.every_seconds, Some(300));
    }

    #[test]
    fn test_smtp_security_parsing() {
        let settings: Settings = toml::from_str(
            r#"
            [smtp]
            host = "smtp.example.com"
            port = 465
            security = "tls"
            "#,
        )
        .unwrap();
        assert_eq!(settings.smtp.security, SmtpSecurity::Tls);
        assert_eq!(settings.smtp.from_name, "Taskdash");
    }

    #[test]
    fn test_logger_settings_conversion() {
        let settings = LoggerSettings {
            level: "debug".to_string(),
            console: ConsoleSettings::default(),
            file: FileSettings {
                enabled: true,
                path: "logs/test.log".to_string(),
                append: true,
                format: "compact".to_string(),
            },
        };
        let config = settings.into_logger_config().unwrap();
        assert_eq!(config.file.format, LogFormat::Compact);
        assert_eq!(config.level, "debug");
    }

    #[test]
    fn test_logger_settings_invalid_format() {
        let settings = LoggerSettings {
            file: FileSettings {
                format: "yaml".to_string(),
                ..FileSettings::default()
            },
            ..LoggerSettings::default()
        };
        assert!(matches!(
            settings.into_logger_config(),
            Err(ConfigError::ValidationError { field, .. }) if field == "logger.file.format"
        ));
    }
}
