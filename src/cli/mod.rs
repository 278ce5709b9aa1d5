//! CLI module for taskdash
//!
//! This module provides command-line interface functionality including:
//! - Argument parsing with clap
//! - Configuration merging (CLI args + config files)
//! - Command handlers for serve, migrate and jobs

pub mod config_merger;
pub mod handlers;
pub mod parser;
pub mod validation;

pub use config_merger::ConfigurationMerger;
pub use parser::{Cli, Commands, Environment, JobsCommand, LogLevel};

use handlers::{JobsCommandHandler, MigrateCommandHandler, ServeCommandHandler};

use crate::logger::init_logger;

/// Loads settings, installs the logger and runs the selected command.
///
/// No subcommand means `serve`.
///
/// # Errors
/// Returns error if configuration loading, logger setup or the command fails
pub async fn execute(cli: Cli) -> anyhow::Result<()> {
    let merger = ConfigurationMerger::load(&cli)?;
    let environment = merger.environment();
    let settings = merger.merge_cli_args(&cli)?;

    init_logger(settings.logger.clone().into_logger_config()?)?;

    match cli.command {
        Some(Commands::Serve { dry_run, .. }) => {
            ServeCommandHandler::new(settings, environment)
                .execute(dry_run)
                .await
        }
        None => ServeCommandHandler::new(settings, environment).execute(false).await,
        Some(Commands::Migrate { dry_run, rollback }) => {
            MigrateCommandHandler::new(settings)
                .execute(dry_run, rollback)
                .await?;
            Ok(())
        }
        Some(Commands::Jobs { command }) => {
            let handler = JobsCommandHandler::new(settings, environment);
            match command {
                JobsCommand::List => {
                    for line in handler.list() {
                        println!("{line}");
                    }
                }
                JobsCommand::Run { name } => handler.run_and_print(&name).await?,
            }
            Ok(())
        }
    }
}
