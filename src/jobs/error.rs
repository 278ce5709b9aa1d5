use thiserror::Error;

use crate::error::AppError;

#[derive(Debug, Error)]
pub enum JobError {
    /// Storage could not be reached or queried; the current run is aborted
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Job is already running: {0}")]
    AlreadyRunning(String),

    #[error("Job not found: {0}")]
    NotFound(String),

    #[error("Job already exists: {0}")]
    AlreadyExists(String),

    #[error("Invalid trigger: {0}")]
    InvalidTrigger(String),

    /// The job body panicked; caught at the scheduler boundary
    #[error("Job '{job}' crashed: {message}")]
    HandlerCrash { job: String, message: String },

    #[error("Job execution failed: {0}")]
    ExecutionFailed(String),

    #[error("Scheduler error: {0}")]
    Scheduler(String),
}

pub type JobResult<T> = Result<T, JobError>;

impl From<AppError> for JobError {
    fn from(error: AppError) -> Self {
        let storage = error.is_storage_failure();
        let message = format!("{:#}", anyhow::Error::from(error));
        if storage {
            JobError::StorageUnavailable(message)
        } else {
            JobError::ExecutionFailed(message)
        }
    }
}

impl From<tokio_cron_scheduler::JobSchedulerError> for JobError {
    fn from(error: tokio_cron_scheduler::JobSchedulerError) -> Self {
        JobError::Scheduler(error.to_string())
    }
}

impl From<JobError> for AppError {
    fn from(error: JobError) -> Self {
        match error {
            JobError::NotFound(name) => AppError::NotFound {
                entity: "job".to_string(),
                field: "name".to_string(),
                value: name,
            },
            JobError::AlreadyRunning(name) => AppError::Conflict {
                message: format!("job '{name}' is already running"),
            },
            JobError::InvalidTrigger(reason) => AppError::Validation {
                field: "trigger".to_string(),
                reason,
            },
            other => AppError::Internal {
                source: anyhow::Error::from(other),
            },
        }
    }
}
