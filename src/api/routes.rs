//! Router configuration for the API.
//!
//! This module provides centralized route registration, the OpenAPI
//! document and middleware configuration for the application.

use std::time::Duration;

use axum::{Router, http::StatusCode, middleware};
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use utoipa::OpenApi;
use utoipa_axum::router::OpenApiRouter;
use utoipa_swagger_ui::SwaggerUi;

use crate::api::doc::ApiDoc;
use crate::api::handlers;
use crate::api::middleware::{logging_middleware, request_id_middleware};
use crate::state::AppState;

pub const OPENAPI_PATH: &str = "/api-docs/openapi.json";

/// Creates the main application router with all routes and middleware.
///
/// # Middleware Order
/// Middleware is applied in reverse order of declaration (last added runs first):
/// 1. Request ID middleware (runs first) - generates/propagates request IDs
/// 2. Logging middleware (runs second) - logs requests with request IDs
///
/// # Routes
/// - `/health`, `/health/ready`, `/health/live`
/// - `/api/jobs`, `/api/jobs/{name}/run`
/// - `/ws/{user_id}`
/// - `/swagger-ui` and the OpenAPI document
///
/// `request_timeout` answers 408 on every route except the manual job run
/// and the websocket upgrade.
pub fn create_router(state: AppState, request_timeout: Duration) -> Router {
    let (router, api) = api_router(Some(request_timeout)).split_for_parts();

    router
        .merge(SwaggerUi::new("/swagger-ui").url(OPENAPI_PATH, api))
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(middleware::from_fn(logging_middleware))
        .layer(middleware::from_fn(request_id_middleware))
        .with_state(state)
}

fn api_router(request_timeout: Option<Duration>) -> OpenApiRouter<AppState> {
    let mut bounded = OpenApiRouter::new()
        .merge(handlers::health::health_routes())
        .merge(handlers::jobs::job_routes());
    if let Some(timeout) = request_timeout {
        bounded = bounded.layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            timeout,
        ));
    }

    OpenApiRouter::with_openapi(ApiDoc::openapi())
        .merge(bounded)
        .merge(handlers::jobs::job_run_routes())
        .merge(handlers::ws::ws_routes())
}

/// The OpenAPI document served at [`OPENAPI_PATH`].
pub fn openapi() -> utoipa::openapi::OpenApi {
    api_router(None).into_openapi()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::{JobContext, JobDefinition, JobResult, JobScheduler, JobTask, RunSummary, Trigger};
    use crate::state::testing;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use std::sync::Arc;
    use tower::util::ServiceExt;

    /// Outlasts the request timeout used below.
    struct Slow;

    #[async_trait]
    impl JobTask for Slow {
        fn name(&self) -> &'static str {
            "slow"
        }

        async fn run(&self, ctx: &JobContext) -> JobResult<RunSummary> {
            tokio::time::sleep(Duration::from_millis(150)).await;
            Ok(RunSummary::for_context(ctx).finish())
        }
    }

    async fn router(request_timeout: Duration) -> Router {
        let scheduler = JobScheduler::new(Duration::from_secs(1)).await.unwrap();
        scheduler
            .register(JobDefinition::new(
                Trigger::Interval(Duration::from_secs(3600)),
                Arc::new(Slow),
            ))
            .await
            .unwrap();
        create_router(testing::state(Arc::new(scheduler)), request_timeout)
    }

    async fn status_of(router: Router, method: &str, uri: &str) -> StatusCode {
        router
            .oneshot(
                Request::builder()
                    .method(method)
                    .uri(uri)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap()
            .status()
    }

    #[tokio::test]
    async fn test_request_timeout_bounds_health_routes() {
        // Readiness waits on a pool checkout that gives up after 200ms
        let router = router(Duration::from_millis(30)).await;

        assert_eq!(
            status_of(router.clone(), "GET", "/health/ready").await,
            StatusCode::REQUEST_TIMEOUT
        );
        assert_eq!(status_of(router, "GET", "/health/live").await, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_manual_run_is_exempt_from_request_timeout() {
        let router = router(Duration::from_millis(30)).await;

        assert_eq!(
            status_of(router, "POST", "/api/jobs/slow/run").await,
            StatusCode::OK
        );
    }

    #[test]
    fn test_openapi_lists_every_route() {
        let doc = openapi();
        let paths: Vec<&str> = doc.paths.paths.keys().map(String::as_str).collect();

        for expected in [
            "/health",
            "/health/ready",
            "/health/live",
            "/api/jobs",
            "/api/jobs/{name}/run",
            "/ws/{user_id}",
        ] {
            assert!(paths.contains(&expected), "missing {expected} in {paths:?}");
        }
        assert_eq!(doc.info.title, "Taskdash");
    }
}
