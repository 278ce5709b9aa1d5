//! CLI argument parsing with clap
//!
//! This module defines the command-line interface structure using clap,
//! including all commands, arguments, and their documentation.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Task and meeting reminder service
#[derive(Parser, Debug)]
#[command(name = "taskdash")]
#[command(about = "Task and meeting reminder service with scheduled email jobs")]
#[command(long_about = "
Taskdash serves the job and realtime API and runs the background jobs that
email task reminders, meeting reminders, daily summaries and health alerts.

EXAMPLES:
    # Start the server with default configuration
    taskdash serve

    # Start server on custom host and port
    taskdash serve --host 0.0.0.0 --port 8080

    # Use a single configuration file
    taskdash --config /etc/taskdash/production.toml serve

    # Check configuration without starting server
    taskdash serve --dry-run

    # Apply or preview database migrations
    taskdash migrate
    taskdash migrate --dry-run

    # Fire one job body now and print its run summary
    taskdash jobs run daily_summary
")]
#[command(version = crate::clap_long_version())]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Configuration file path
    ///
    /// Load this single TOML file instead of the layered `config/` directory.
    /// `TASKDASH_*` environment variables still apply on top.
    #[arg(short, long, value_name = "FILE", value_parser = super::validation::validate_config_file_path)]
    pub config: Option<PathBuf>,

    /// Override environment detection
    ///
    /// Selects the `{env}.toml` layer and the environment quoted in alerts.
    /// Defaults to TASKDASH_APP_ENV, then development.
    #[arg(short, long, value_enum)]
    pub env: Option<Environment>,

    /// Enable verbose logging (debug level)
    #[arg(short, long)]
    pub verbose: bool,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the web server and the job scheduler (default)
    ///
    /// Examples:
    ///   taskdash serve                           # Start with defaults
    ///   taskdash serve --host 0.0.0.0 --port 80  # Bind to all interfaces on port 80
    ///   taskdash serve --dry-run                 # Validate config without starting
    Serve {
        /// Host address to bind to
        #[arg(long, value_name = "ADDRESS", value_parser = super::validation::validate_host_address)]
        host: Option<String>,

        /// Port number to listen on
        #[arg(short, long, value_name = "PORT", value_parser = super::validation::validate_port)]
        port: Option<u16>,

        /// Log level override; wins over --verbose/--quiet
        #[arg(long, value_enum)]
        log_level: Option<LogLevel>,

        /// Validate configuration and job triggers, then exit
        #[arg(long)]
        dry_run: bool,
    },
    /// Database migration operations
    ///
    /// Examples:
    ///   taskdash migrate                    # Apply all pending migrations
    ///   taskdash migrate --dry-run          # Show pending migrations without applying
    ///   taskdash migrate --rollback 3       # Rollback the last 3 migrations
    Migrate {
        /// Show pending migrations without applying
        #[arg(long, conflicts_with = "rollback")]
        dry_run: bool,

        /// Number of migrations to rollback (1-100)
        #[arg(long, value_name = "STEPS", conflicts_with = "dry_run", value_parser = super::validation::validate_rollback_steps)]
        rollback: Option<u32>,
    },
    /// Background job operations
    Jobs {
        #[command(subcommand)]
        command: JobsCommand,
    },
}

#[derive(Subcommand, Debug)]
pub enum JobsCommand {
    /// Print every known job with its trigger and whether it is enabled
    List,
    /// Fire one job body once, even if it is disabled, and print the run summary as JSON
    Run {
        /// Job name, e.g. task_reminders
        #[arg(value_parser = super::validation::validate_job_name)]
        name: String,
    },
}

/// Environment options
#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum Environment {
    #[value(name = "development", alias = "dev")]
    Development,
    #[value(name = "test")]
    Test,
    #[value(name = "staging", alias = "stage")]
    Staging,
    #[value(name = "production", alias = "prod")]
    Production,
}

/// Log level options
#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum LogLevel {
    #[value(name = "error")]
    Error,
    #[value(name = "warn", alias = "warning")]
    Warn,
    #[value(name = "info")]
    Info,
    #[value(name = "debug")]
    Debug,
    #[value(name = "trace")]
    Trace,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

impl From<Environment> for crate::config::Environment {
    fn from(env: Environment) -> Self {
        match env {
            Environment::Development => crate::config::Environment::Development,
            Environment::Test => crate::config::Environment::Test,
            Environment::Staging => crate::config::Environment::Staging,
            Environment::Production => crate::config::Environment::Production,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_default_behavior() {
        let cli = Cli::try_parse_from(["taskdash"]).unwrap();
        assert!(cli.command.is_none());
        assert!(!cli.verbose);
        assert!(cli.config.is_none());
        assert!(cli.env.is_none());
    }

    #[test]
    fn test_serve_command() {
        let cli = Cli::try_parse_from([
            "taskdash", "serve", "--host", "0.0.0.0", "--port", "8080", "--log-level", "debug",
        ])
        .unwrap();

        match cli.command {
            Some(Commands::Serve {
                host,
                port,
                log_level,
                dry_run,
            }) => {
                assert_eq!(host.as_deref(), Some("0.0.0.0"));
                assert_eq!(port, Some(8080));
                assert_eq!(log_level.map(LogLevel::as_str), Some("debug"));
                assert!(!dry_run);
            }
            other => panic!("Expected Serve command, got {other:?}"),
        }
    }

    #[test]
    fn test_jobs_run_command() {
        let cli = Cli::try_parse_from(["taskdash", "--env", "prod", "jobs", "run", "daily_summary"])
            .unwrap();

        assert!(matches!(cli.env, Some(Environment::Production)));
        match cli.command {
            Some(Commands::Jobs {
                command: JobsCommand::Run { name },
            }) => assert_eq!(name, "daily_summary"),
            other => panic!("Expected jobs run, got {other:?}"),
        }
    }

    #[test]
    fn test_unknown_job_name_is_rejected() {
        let err = Cli::try_parse_from(["taskdash", "jobs", "run", "backup"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn test_migrate_flags_conflict() {
        let err = Cli::try_parse_from(["taskdash", "migrate", "--dry-run", "--rollback", "1"])
            .unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }

    #[test]
    fn test_conflicting_verbose_quiet() {
        let err = Cli::try_parse_from(["taskdash", "--verbose", "--quiet"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }
}
