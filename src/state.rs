//! Application state for Axum web framework.
//!
//! Contains the shared resources that are accessible across all request
//! handlers: the connection pool, repositories, the job scheduler and the
//! realtime connection registry.

use std::sync::Arc;

use crate::db::AsyncDbPool;
use crate::jobs::JobScheduler;
use crate::repositories::Repositories;
use crate::services::notifications::RealtimeHub;

/// Application state shared by every handler.
///
/// Cloning is cheap: the pool, the repositories and the hub are all `Arc`
/// backed, and the scheduler is shared explicitly.
#[derive(Clone)]
pub struct AppState {
    /// Direct access to the database connection pool
    pub db_pool: AsyncDbPool,
    pub repos: Repositories,
    /// Scheduler owning the background jobs; also serves manual triggers
    pub scheduler: Arc<JobScheduler>,
    /// Websocket connections keyed by user id
    pub realtime: RealtimeHub,
}

impl AppState {
    /// Creates the state from an already configured pool, scheduler and hub.
    ///
    /// # Example
    /// ```ignore
    /// let pool = establish_async_connection_pool(&settings.database).await?;
    /// let state = AppState::new(pool, scheduler, hub);
    /// ```
    pub fn new(pool: AsyncDbPool, scheduler: Arc<JobScheduler>, realtime: RealtimeHub) -> Self {
        Self {
            repos: Repositories::new(pool.clone()),
            db_pool: pool,
            scheduler,
            realtime,
        }
    }
}
