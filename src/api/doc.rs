use utoipa::OpenApi;

pub const HEALTH_TAG: &str = "Health";
pub const JOB_TAG: &str = "Jobs";
pub const REALTIME_TAG: &str = "Realtime";

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Taskdash",
        description = "Task and meeting reminders: background jobs, manual triggers and realtime push",
    ),
    components(
        schemas(
            crate::api::dto::ErrorResponse,
            crate::services::notifications::RealtimeEvent,
        )
    ),
    tags(
        (name = HEALTH_TAG, description = "Health check endpoints"),
        (name = JOB_TAG, description = "Background job listing and manual triggers"),
        (name = REALTIME_TAG, description = "Websocket push of reminder events"),
    )
)]
pub struct ApiDoc;
