use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use crate::jobs::dispatch::{BatchDispatcher, CandidateSender, CandidateSource, ReminderCandidate};
use crate::jobs::error::JobResult;
use crate::jobs::gateway::{DueMeeting, ReminderQueryGateway};
use crate::jobs::models::{DispatchResult, Outcome, RunSummary};
use crate::jobs::types::{JobContext, JobTask};
use crate::models::ReminderStatus;
use crate::services::notifications::{DeliveryError, NotificationSink, RealtimeEvent, compose};

/// Emails each participant once when a meeting enters their reminder window.
///
/// Every attempted pair gets a ledger row, `failed` included, so later ticks
/// never retry it; retries happen only inside a run.
pub struct MeetingRemindersJob {
    gateway: Arc<dyn ReminderQueryGateway>,
    sink: Arc<dyn NotificationSink>,
    dispatcher: BatchDispatcher,
    lookahead: Duration,
}

impl MeetingRemindersJob {
    pub fn new(
        gateway: Arc<dyn ReminderQueryGateway>,
        sink: Arc<dyn NotificationSink>,
        dispatcher: BatchDispatcher,
        lookahead: Duration,
    ) -> Self {
        Self {
            gateway,
            sink,
            dispatcher,
            lookahead,
        }
    }
}

struct DueMeetingSource {
    gateway: Arc<dyn ReminderQueryGateway>,
    window: Duration,
    cursor: i32,
}

#[async_trait]
impl CandidateSource<DueMeeting> for DueMeetingSource {
    async fn next_page(&mut self, limit: usize) -> JobResult<Vec<ReminderCandidate<DueMeeting>>> {
        let meetings = self
            .gateway
            .fetch_meetings_due_within(self.window, self.cursor, limit)
            .await?;
        if let Some(last) = meetings.last() {
            self.cursor = last.cursor;
        }

        Ok(meetings
            .into_iter()
            .map(|meeting| ReminderCandidate {
                recipient_id: meeting.participant.id,
                target: meeting.participant.email.clone(),
                idempotency_key: format!(
                    "meeting:{}:user:{}:email",
                    meeting.meeting_id, meeting.participant.id
                ),
                payload: meeting,
            })
            .collect())
    }
}

struct MeetingReminderSender {
    gateway: Arc<dyn ReminderQueryGateway>,
    sink: Arc<dyn NotificationSink>,
    timeout: Duration,
}

#[async_trait]
impl CandidateSender<DueMeeting> for MeetingReminderSender {
    async fn before_delivery(
        &self,
        candidate: &ReminderCandidate<DueMeeting>,
    ) -> JobResult<Option<String>> {
        let meeting = &candidate.payload;
        if self
            .gateway
            .reminder_exists(meeting.meeting_id, meeting.participant.id)
            .await?
        {
            return Ok(Some("reminder already recorded".to_string()));
        }
        if candidate.target.trim().is_empty() {
            return Ok(Some("participant has no email address".to_string()));
        }
        Ok(None)
    }

    async fn deliver(&self, candidate: &ReminderCandidate<DueMeeting>) -> Result<(), DeliveryError> {
        let message = compose::meeting_reminder(&candidate.target, &candidate.payload);
        self.sink.send_email(&message, self.timeout).await
    }

    async fn after_delivery(
        &self,
        candidate: &ReminderCandidate<DueMeeting>,
        result: &DispatchResult,
    ) -> JobResult<()> {
        let status = match result.outcome {
            Outcome::Sent => ReminderStatus::Sent,
            Outcome::Failed => ReminderStatus::Failed,
            Outcome::Skipped => return Ok(()),
        };
        let meeting = &candidate.payload;

        let inserted = self
            .gateway
            .record_reminder(meeting.meeting_id, meeting.participant.id, status)
            .await?;
        if !inserted {
            tracing::info!(
                key = %candidate.idempotency_key,
                "Reminder already recorded by a concurrent run"
            );
        }

        if status == ReminderStatus::Sent {
            let event = RealtimeEvent::new(
                "meeting_reminder",
                json!({
                    "meeting_id": meeting.meeting_id,
                    "title": meeting.title,
                    "meeting_date": meeting.meeting_date,
                    "location": meeting.location,
                    "meeting_url": meeting.meeting_url,
                }),
            );
            self.sink.push_event(candidate.recipient_id, event).await;
        }
        Ok(())
    }
}

#[async_trait]
impl JobTask for MeetingRemindersJob {
    fn name(&self) -> &'static str {
        "meeting_reminders"
    }

    async fn run(&self, ctx: &JobContext) -> JobResult<RunSummary> {
        let mut source = DueMeetingSource {
            gateway: Arc::clone(&self.gateway),
            window: self.lookahead,
            cursor: 0,
        };
        let sender = MeetingReminderSender {
            gateway: Arc::clone(&self.gateway),
            sink: Arc::clone(&self.sink),
            timeout: self.dispatcher.config().per_item_timeout,
        };

        self.dispatcher.run(ctx, &mut source, &sender).await
    }

    fn description(&self) -> Option<String> {
        Some("Email meeting participants once their reminder window opens".to_string())
    }
}
