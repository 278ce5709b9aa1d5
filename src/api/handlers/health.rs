//! Health check endpoint handlers.
//!
//! These are for load balancers and orchestrators. The database check goes
//! straight to the pool; the scheduler check only reads in-memory state.

use std::collections::BTreeMap;
use std::time::Instant;

use crate::api::doc::HEALTH_TAG;
use crate::api::dto::{ComponentHealth, HealthResponse, HealthStatus};
use crate::db;
use crate::jobs::JobScheduler;
use crate::state::AppState;
use axum::{extract::State, http::StatusCode, response::Json};
use utoipa_axum::router::OpenApiRouter;
use utoipa_axum::routes;

/// Creates health check routes.
///
/// # Routes
/// - `GET /health` - Component health
/// - `GET /health/ready` - Readiness probe
/// - `GET /health/live` - Liveness probe
pub fn health_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(health_check))
        .routes(routes!(readiness_check))
        .routes(routes!(liveness_check))
}

/// Basic health check endpoint.
///
/// Returns the database and scheduler status. Responds 503 with the same
/// body when any component is unhealthy.
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy or degraded", body = HealthResponse),
        (status = 503, description = "Service is unhealthy", body = HealthResponse)
    ),
    tag = HEALTH_TAG
)]
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let mut checks = BTreeMap::new();
    checks.insert("database".to_string(), check_database(&state).await);
    checks.insert("scheduler".to_string(), check_scheduler(&state.scheduler));

    let response = HealthResponse::from_checks(crate::pkg_version(), checks);
    let status = match response.status {
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
    };
    (status, Json(response))
}

/// Readiness probe endpoint.
///
/// Ready means the database answers.
#[utoipa::path(
    get,
    path = "/health/ready",
    responses(
        (status = 200, description = "Service is ready"),
        (status = 503, description = "Service is not ready")
    ),
    tag = HEALTH_TAG
)]
pub async fn readiness_check(State(state): State<AppState>) -> StatusCode {
    match check_database(&state).await.status {
        HealthStatus::Healthy => StatusCode::OK,
        HealthStatus::Degraded | HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    }
}

/// Liveness probe endpoint. No dependencies are touched.
#[utoipa::path(
    get,
    path = "/health/live",
    responses(
        (status = 200, description = "Service is alive")
    ),
    tag = HEALTH_TAG
)]
pub async fn liveness_check() -> StatusCode {
    StatusCode::OK
}

async fn check_database(state: &AppState) -> ComponentHealth {
    let start = Instant::now();
    let health = match db::ping(&state.db_pool).await {
        Ok(()) => ComponentHealth::new(HealthStatus::Healthy, "Connected"),
        Err(e) => {
            tracing::warn!(error = %e, "Database health check failed");
            ComponentHealth::new(HealthStatus::Unhealthy, format!("{e}"))
        }
    };
    health.timed(start.elapsed())
}

fn check_scheduler(scheduler: &JobScheduler) -> ComponentHealth {
    let jobs = scheduler.jobs();
    let running = jobs.iter().filter(|j| j.running).count();

    if scheduler.is_started() {
        ComponentHealth::new(
            HealthStatus::Healthy,
            format!("{} jobs registered, {} running", jobs.len(), running),
        )
    } else if jobs.is_empty() {
        ComponentHealth::new(HealthStatus::Healthy, "Scheduler disabled")
    } else {
        ComponentHealth::new(
            HealthStatus::Degraded,
            format!("{} jobs registered but scheduler not started", jobs.len()),
        )
    }
}
