use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use jiff::Timestamp;

use crate::jobs::dispatch::BatchDispatcher;
use crate::jobs::error::JobResult;
use crate::jobs::gateway::ReminderQueryGateway;
use crate::jobs::models::RunSummary;
use crate::jobs::tasks::older_than;
use crate::jobs::types::{JobContext, JobTask};

/// Deletes completed tasks past retention in bounded batches.
pub struct DataCleanupJob {
    gateway: Arc<dyn ReminderQueryGateway>,
    dispatcher: BatchDispatcher,
    retention: Duration,
}

impl DataCleanupJob {
    pub fn new(
        gateway: Arc<dyn ReminderQueryGateway>,
        dispatcher: BatchDispatcher,
        retention: Duration,
    ) -> Self {
        Self {
            gateway,
            dispatcher,
            retention,
        }
    }
}

#[async_trait]
impl JobTask for DataCleanupJob {
    fn name(&self) -> &'static str {
        "data_cleanup"
    }

    async fn run(&self, ctx: &JobContext) -> JobResult<RunSummary> {
        let threshold = older_than(Timestamp::now(), self.retention)?;
        let mut summary = RunSummary::for_context(ctx);

        self.dispatcher
            .drain(ctx, &mut summary, |limit| {
                let gateway = Arc::clone(&self.gateway);
                async move {
                    gateway
                        .delete_completed_tasks_older_than(threshold, limit)
                        .await
                }
            })
            .await?;

        tracing::info!(
            deleted_count = summary.affected_rows,
            retention_days = self.retention.as_secs() / 86_400,
            "Data cleanup completed"
        );
        Ok(summary.finish())
    }

    fn description(&self) -> Option<String> {
        Some(format!(
            "Delete completed tasks older than {} days",
            self.retention.as_secs() / 86_400
        ))
    }
}
