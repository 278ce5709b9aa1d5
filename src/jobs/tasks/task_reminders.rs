use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use jiff::Timestamp;
use serde_json::json;

use crate::jobs::dispatch::{BatchDispatcher, CandidateSender, CandidateSource, ReminderCandidate};
use crate::jobs::error::JobResult;
use crate::jobs::gateway::{PendingTask, ReminderQueryGateway};
use crate::jobs::models::{DispatchResult, Outcome, RunSummary};
use crate::jobs::tasks::older_than;
use crate::jobs::types::{JobContext, JobTask};
use crate::services::notifications::{DeliveryError, NotificationSink, RealtimeEvent, compose};

/// Reminds owners about tasks left pending past a threshold.
pub struct TaskRemindersJob {
    gateway: Arc<dyn ReminderQueryGateway>,
    sink: Arc<dyn NotificationSink>,
    dispatcher: BatchDispatcher,
    pending_threshold: Duration,
}

impl TaskRemindersJob {
    pub fn new(
        gateway: Arc<dyn ReminderQueryGateway>,
        sink: Arc<dyn NotificationSink>,
        dispatcher: BatchDispatcher,
        pending_threshold: Duration,
    ) -> Self {
        Self {
            gateway,
            sink,
            dispatcher,
            pending_threshold,
        }
    }
}

/// Keyset pages of pending tasks; the cursor is the last task id seen.
struct PendingTaskSource {
    gateway: Arc<dyn ReminderQueryGateway>,
    threshold: Timestamp,
    cursor: i32,
}

#[async_trait]
impl CandidateSource<PendingTask> for PendingTaskSource {
    async fn next_page(&mut self, limit: usize) -> JobResult<Vec<ReminderCandidate<PendingTask>>> {
        let tasks = self
            .gateway
            .fetch_pending_tasks_older_than(self.threshold, self.cursor, limit)
            .await?;
        if let Some(last) = tasks.last() {
            self.cursor = last.id;
        }

        Ok(tasks
            .into_iter()
            .map(|task| ReminderCandidate {
                recipient_id: task.owner.id,
                target: task.owner.email.clone(),
                idempotency_key: format!("task:{}:user:{}", task.id, task.owner.id),
                payload: task,
            })
            .collect())
    }
}

struct TaskReminderSender {
    sink: Arc<dyn NotificationSink>,
    timeout: Duration,
    now: Timestamp,
}

#[async_trait]
impl CandidateSender<PendingTask> for TaskReminderSender {
    async fn before_delivery(
        &self,
        candidate: &ReminderCandidate<PendingTask>,
    ) -> JobResult<Option<String>> {
        Ok(candidate
            .target
            .trim()
            .is_empty()
            .then(|| "owner has no email address".to_string()))
    }

    async fn deliver(&self, candidate: &ReminderCandidate<PendingTask>) -> Result<(), DeliveryError> {
        let message = compose::task_reminder(&candidate.target, &candidate.payload, self.now);
        self.sink.send_email(&message, self.timeout).await
    }

    async fn after_delivery(
        &self,
        candidate: &ReminderCandidate<PendingTask>,
        result: &DispatchResult,
    ) -> JobResult<()> {
        if result.outcome == Outcome::Sent {
            let task = &candidate.payload;
            let event = RealtimeEvent::new(
                "task_reminder",
                json!({
                    "task_id": task.id,
                    "title": task.title,
                    "priority": task.priority,
                }),
            );
            self.sink.push_event(candidate.recipient_id, event).await;
        }
        Ok(())
    }
}

#[async_trait]
impl JobTask for TaskRemindersJob {
    fn name(&self) -> &'static str {
        "task_reminders"
    }

    async fn run(&self, ctx: &JobContext) -> JobResult<RunSummary> {
        let now = Timestamp::now();
        let mut source = PendingTaskSource {
            gateway: Arc::clone(&self.gateway),
            threshold: older_than(now, self.pending_threshold)?,
            cursor: 0,
        };
        let sender = TaskReminderSender {
            sink: Arc::clone(&self.sink),
            timeout: self.dispatcher.config().per_item_timeout,
            now,
        };

        self.dispatcher.run(ctx, &mut source, &sender).await
    }

    fn description(&self) -> Option<String> {
        Some(format!(
            "Email owners of tasks pending for more than {}h",
            self.pending_threshold.as_secs() / 3600
        ))
    }
}
