use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use jiff::Timestamp;

use crate::jobs::dispatch::{BatchDispatcher, CandidateSender, CandidateSource, ReminderCandidate};
use crate::jobs::error::JobResult;
use crate::jobs::gateway::{ReminderQueryGateway, UserContact};
use crate::jobs::models::RunSummary;
use crate::jobs::tasks::older_than;
use crate::jobs::types::{JobContext, JobTask};
use crate::models::TaskStatistics;
use crate::services::notifications::{DeliveryError, NotificationSink, compose};

type SummaryPayload = (UserContact, TaskStatistics);

/// Sends every active user their task counts once a day.
pub struct DailySummaryJob {
    gateway: Arc<dyn ReminderQueryGateway>,
    sink: Arc<dyn NotificationSink>,
    dispatcher: BatchDispatcher,
    overdue_after: Duration,
}

impl DailySummaryJob {
    pub fn new(
        gateway: Arc<dyn ReminderQueryGateway>,
        sink: Arc<dyn NotificationSink>,
        dispatcher: BatchDispatcher,
        overdue_after: Duration,
    ) -> Self {
        Self {
            gateway,
            sink,
            dispatcher,
            overdue_after,
        }
    }
}

/// Active users with their statistics loaded page by page.
struct ActiveUserSource {
    gateway: Arc<dyn ReminderQueryGateway>,
    overdue_before: Timestamp,
    cursor: i32,
}

#[async_trait]
impl CandidateSource<SummaryPayload> for ActiveUserSource {
    async fn next_page(&mut self, limit: usize) -> JobResult<Vec<ReminderCandidate<SummaryPayload>>> {
        let users = self.gateway.fetch_active_users(self.cursor, limit).await?;
        if let Some(last) = users.last() {
            self.cursor = last.id;
        }

        let mut page = Vec::with_capacity(users.len());
        for user in users {
            let stats = self
                .gateway
                .task_statistics(user.id, self.overdue_before)
                .await?;
            page.push(ReminderCandidate {
                recipient_id: user.id,
                target: user.email.clone(),
                idempotency_key: format!("summary:user:{}", user.id),
                payload: (user, stats),
            });
        }
        Ok(page)
    }
}

struct SummarySender {
    sink: Arc<dyn NotificationSink>,
    timeout: Duration,
    today: Timestamp,
}

#[async_trait]
impl CandidateSender<SummaryPayload> for SummarySender {
    async fn before_delivery(
        &self,
        candidate: &ReminderCandidate<SummaryPayload>,
    ) -> JobResult<Option<String>> {
        let (_, stats) = &candidate.payload;
        if stats.total == 0 {
            return Ok(Some("no tasks".to_string()));
        }
        if candidate.target.trim().is_empty() {
            return Ok(Some("user has no email address".to_string()));
        }
        Ok(None)
    }

    async fn deliver(&self, candidate: &ReminderCandidate<SummaryPayload>) -> Result<(), DeliveryError> {
        let (user, stats) = &candidate.payload;
        let message = compose::daily_summary(&candidate.target, &user.display_name, stats, self.today);
        self.sink.send_email(&message, self.timeout).await
    }
}

#[async_trait]
impl JobTask for DailySummaryJob {
    fn name(&self) -> &'static str {
        "daily_summary"
    }

    async fn run(&self, ctx: &JobContext) -> JobResult<RunSummary> {
        let now = Timestamp::now();
        let mut source = ActiveUserSource {
            gateway: Arc::clone(&self.gateway),
            overdue_before: older_than(now, self.overdue_after)?,
            cursor: 0,
        };
        let sender = SummarySender {
            sink: Arc::clone(&self.sink),
            timeout: self.dispatcher.config().per_item_timeout,
            today: now,
        };

        self.dispatcher.run(ctx, &mut source, &sender).await
    }

    fn description(&self) -> Option<String> {
        Some("Email each active user a summary of their tasks".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::tasks::hours;
    use crate::jobs::tasks::testing::{FakeGateway, RecordingSink, contact, ctx, dispatcher};

    fn stats(total: i64, completed: i64) -> TaskStatistics {
        TaskStatistics {
            total,
            pending: total - completed,
            in_progress: 0,
            completed,
            overdue: 0,
        }
    }

    #[tokio::test]
    async fn test_users_without_tasks_are_skipped() {
        let gateway = Arc::new(FakeGateway::default());
        *gateway.users.lock().unwrap() = vec![
            (contact(1, "a@example.com"), stats(3, 1)),
            (contact(2, "b@example.com"), stats(0, 0)),
            (contact(3, "c@example.com"), stats(5, 5)),
            (contact(4, "d@example.com"), stats(0, 0)),
            (contact(5, "e@example.com"), stats(2, 0)),
        ];
        let sink = Arc::new(RecordingSink::default());
        let job = DailySummaryJob::new(gateway, sink.clone(), dispatcher(2), hours(24));

        let summary = job.run(&ctx("daily_summary")).await.unwrap();

        assert_eq!(summary.sent, 3);
        assert_eq!(summary.skipped, 2);
        assert_eq!(summary.total(), 5);
        let recipients: Vec<_> = sink.sent().into_iter().map(|m| m.to).collect();
        assert_eq!(recipients, vec!["a@example.com", "c@example.com", "e@example.com"]);
        assert!(sink.sent()[1].html_body.contains("Completion rate: 100%"));
    }
}
