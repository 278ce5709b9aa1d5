//! Job listing and manual trigger handlers.

use crate::api::doc::JOB_TAG;
use crate::api::dto::{ErrorResponse, JobResponse, RunSummaryResponse};
use crate::api::middleware::{RequestId, error_to_response_with_request_id};
use crate::error::AppError;
use crate::jobs::JobError;
use crate::state::AppState;
use axum::{
    Extension, Json,
    extract::{Path, State},
    response::Response,
};
use utoipa_axum::router::OpenApiRouter;
use utoipa_axum::routes;

/// Creates the job listing route.
pub fn job_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new().routes(routes!(list_jobs))
}

/// Manual trigger route; a run may legitimately outlast the request timeout.
pub fn job_run_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new().routes(routes!(run_job))
}

/// GET /api/jobs - List registered jobs with their last run
#[utoipa::path(
    get,
    path = "/api/jobs",
    tag = JOB_TAG,
    responses(
        (status = 200, description = "Registered jobs sorted by name", body = Vec<JobResponse>)
    )
)]
async fn list_jobs(State(state): State<AppState>) -> Json<Vec<JobResponse>> {
    Json(
        state
            .scheduler
            .jobs()
            .into_iter()
            .map(JobResponse::from)
            .collect(),
    )
}

/// POST /api/jobs/{name}/run - Fire a job now and wait for its summary
///
/// The run is detached from the request, so a client that hangs up does not
/// cancel it halfway.
#[utoipa::path(
    post,
    path = "/api/jobs/{name}/run",
    tag = JOB_TAG,
    params(
        ("name" = String, Path, description = "Job name", example = "task_reminders")
    ),
    responses(
        (status = 200, description = "Run finished", body = RunSummaryResponse),
        (status = 404, description = "Unknown job", body = ErrorResponse),
        (status = 409, description = "Job is already running", body = ErrorResponse),
        (status = 500, description = "Run aborted", body = ErrorResponse)
    )
)]
async fn run_job(
    State(state): State<AppState>,
    Path(name): Path<String>,
    request_id: Option<Extension<RequestId>>,
) -> Result<Json<RunSummaryResponse>, Response> {
    let scheduler = state.scheduler.clone();
    let outcome = tokio::spawn(async move { scheduler.trigger(&name).await })
        .await
        .map_err(|e| JobError::ExecutionFailed(format!("trigger task failed: {e}")))
        .and_then(|result| result);

    outcome
        .map(|summary| Json(RunSummaryResponse::from(summary)))
        .map_err(|e| {
            let request_id = request_id.as_ref().map(|Extension(id)| id.0.as_str());
            error_to_response_with_request_id(AppError::from(e), request_id)
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::{JobContext, JobDefinition, JobResult, JobScheduler, JobTask, RunSummary, Trigger};
    use crate::state::testing;
    use async_trait::async_trait;
    use axum::http::StatusCode;
    use std::sync::Arc;
    use std::time::Duration;

    struct Echo;

    #[async_trait]
    impl JobTask for Echo {
        fn name(&self) -> &'static str {
            "echo"
        }

        async fn run(&self, ctx: &JobContext) -> JobResult<RunSummary> {
            let mut summary = RunSummary::for_context(ctx);
            summary.sent = 3;
            Ok(summary.finish())
        }
    }

    async fn state() -> AppState {
        let scheduler = JobScheduler::new(Duration::from_secs(1)).await.unwrap();
        scheduler
            .register(JobDefinition::new(
                Trigger::Interval(Duration::from_secs(3600)),
                Arc::new(Echo),
            ))
            .await
            .unwrap();
        testing::state(Arc::new(scheduler))
    }

    #[tokio::test]
    async fn test_manual_run_returns_summary() {
        let state = state().await;

        let Json(summary) = run_job(State(state.clone()), Path("echo".to_string()), None)
            .await
            .unwrap();
        assert_eq!(summary.job_name, "echo");
        assert_eq!(summary.sent, 3);

        let Json(jobs) = list_jobs(State(state)).await;
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].trigger, "every 3600s");
        assert_eq!(jobs[0].last_run.as_ref().map(|r| r.sent), Some(3));
    }

    #[tokio::test]
    async fn test_unknown_job_is_404_with_request_id() {
        let state = state().await;

        let response = run_job(
            State(state),
            Path("backup".to_string()),
            Some(Extension(RequestId("req-1".to_string()))),
        )
        .await
        .unwrap_err();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["request_id"], "req-1");
    }
}
