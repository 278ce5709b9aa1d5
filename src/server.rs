//! Server module for managing HTTP server lifecycle
//!
//! This module wires storage, notifications and the job scheduler together,
//! serves HTTP and shuts everything down in order.

use std::sync::Arc;
use std::time::Duration;

use crate::api::routes::create_router;
use crate::config::{Environment, settings::Settings};
use crate::db::{AsyncDbPool, establish_async_connection_pool, run_pending_migrations};
use crate::error::AppResult;
use crate::jobs::{JobDependencies, JobRegistry, JobScheduler, PgReminderGateway};
use crate::services::NotificationService;
use crate::services::notifications::RealtimeHub;
use crate::services::notifications::compose::ServerInfo;
use crate::state::AppState;
use tokio::net::TcpListener;
use tokio::signal;

/// HTTP server manager
pub struct Server {
    settings: Settings,
    environment: Environment,
}

impl Server {
    pub fn new(settings: Settings, environment: Environment) -> Self {
        Self {
            settings,
            environment,
        }
    }

    /// Start the server and run until shutdown signal
    ///
    /// This method:
    /// 1. Logs startup information
    /// 2. Initializes the database pool and applies migrations if configured
    /// 3. Builds the notification service and the job scheduler
    /// 4. Binds to configured address and serves until a signal arrives
    /// 5. Stops the scheduler, waiting for running jobs up to the grace period
    ///
    /// # Errors
    /// - Database connection pool or migration errors
    /// - Invalid SMTP settings or job triggers
    /// - Address binding errors
    pub async fn run(self) -> anyhow::Result<()> {
        let settings = &self.settings;

        tracing::info!(
            app_name = %settings.application.name,
            app_version = %settings.application.version,
            environment = %self.environment,
            "Application starting"
        );
        tracing::info!(
            host = %settings.server.host,
            port = %settings.server.port,
            request_timeout = %settings.server.request_timeout,
            "Server configuration loaded"
        );
        tracing::info!(
            max_connections = %settings.database.max_connections,
            min_connections = %settings.database.min_connections,
            connection_timeout = %settings.database.connection_timeout,
            auto_migrate = %settings.database.auto_migrate,
            "Database configuration loaded"
        );
        tracing::info!(
            enabled = %settings.scheduler.enabled,
            batch_size = %settings.scheduler.dispatch.batch_size,
            concurrency = %settings.scheduler.dispatch.concurrency,
            smtp_host = %settings.smtp.host,
            "Scheduler configuration loaded"
        );

        let pool = establish_async_connection_pool(&settings.database).await?;
        tracing::info!("Database connection pool initialized");

        if settings.database.auto_migrate {
            let applied = run_pending_migrations(&settings.database.url).await?;
            tracing::info!(count = applied.len(), migrations = ?applied, "Migrations applied");
        }

        let realtime = RealtimeHub::new();
        let scheduler = Arc::new(self.build_scheduler(&pool, &realtime).await?);
        let state = AppState::new(pool, Arc::clone(&scheduler), realtime);

        let router = create_router(
            state,
            Duration::from_secs(settings.server.request_timeout),
        );

        let address = settings.server.address();
        let listener = TcpListener::bind(&address).await.map_err(|e| {
            tracing::error!(error = %e, address = %address, "Failed to bind to address");
            anyhow::anyhow!("Failed to bind to {}: {}", address, e)
        })?;

        tracing::info!(address = %address, "Server listening");

        let served = axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await;

        if let Err(e) = scheduler.stop().await {
            tracing::error!(error = %e, "Job scheduler did not stop cleanly");
        }
        served?;

        tracing::info!("Server shutdown complete");
        Ok(())
    }

    async fn build_scheduler(
        &self,
        pool: &AsyncDbPool,
        realtime: &RealtimeHub,
    ) -> AppResult<JobScheduler> {
        let config = &self.settings.scheduler;
        let scheduler =
            JobScheduler::new(Duration::from_secs(config.grace_period_seconds)).await?;

        if !config.enabled {
            tracing::info!("Job scheduler disabled");
            return Ok(scheduler);
        }

        let deps = job_dependencies(&self.settings, self.environment, pool, realtime)?;
        let registry = JobRegistry::new(deps, config.clone());
        for definition in registry.definitions()? {
            scheduler.register(definition).await?;
        }
        scheduler.start().await?;
        Ok(scheduler)
    }
}

/// Collaborators shared by every job body.
pub fn job_dependencies(
    settings: &Settings,
    environment: Environment,
    pool: &AsyncDbPool,
    realtime: &RealtimeHub,
) -> AppResult<JobDependencies> {
    let notifications = NotificationService::new(&settings.smtp, realtime.clone())?;

    Ok(JobDependencies {
        gateway: Arc::new(PgReminderGateway::new(pool.clone())),
        sink: Arc::new(notifications),
        admin_email: settings.alerts.admin_email.clone(),
        server: server_info(settings, environment),
    })
}

fn server_info(settings: &Settings, environment: Environment) -> ServerInfo {
    let hostname = hostname::get()
        .map(|h| h.to_string_lossy().into_owned())
        .unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Could not read host name");
            "unknown".to_string()
        });

    ServerInfo {
        app_name: settings.application.name.clone(),
        hostname,
        environment: environment.to_string(),
    }
}

/// Waits for a shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_info_quotes_environment() {
        let settings = Settings::default();
        let info = server_info(&settings, Environment::Staging);

        assert_eq!(info.environment, "staging");
        assert_eq!(info.app_name, settings.application.name);
        assert!(!info.hostname.is_empty());
    }
}
