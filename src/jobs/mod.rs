//! Background jobs: the scheduler, the batch dispatcher and the job bodies.

pub mod dispatch;
pub mod error;
pub mod executor;
pub mod gateway;
pub mod models;
pub mod registry;
pub mod scheduler;
pub mod tasks;
pub mod types;

pub use dispatch::{BatchDispatcher, DispatchConfig, ReminderCandidate};
pub use error::{JobError, JobResult};
pub use gateway::{PgReminderGateway, ReminderQueryGateway};
pub use models::{DispatchResult, JobInfo, Outcome, RunSummary};
pub use registry::{JOB_NAMES, JobDependencies, JobRegistry};
pub use scheduler::{JobDefinition, JobScheduler};
pub use types::{JobContext, JobTask, Trigger};
