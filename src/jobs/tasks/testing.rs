//! In-memory gateway and sink shared by the job body tests.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use jiff::Timestamp;
use tokio_util::sync::CancellationToken;

use crate::jobs::dispatch::{BatchDispatcher, DispatchConfig};
use crate::jobs::error::{JobError, JobResult};
use crate::jobs::gateway::{DueMeeting, PendingTask, ReminderQueryGateway, UserContact};
use crate::jobs::types::JobContext;
use crate::models::{ReminderStatus, TaskStatistics};
use crate::services::notifications::{DeliveryError, EmailMessage, NotificationSink, RealtimeEvent};

pub fn ctx(name: &str) -> JobContext {
    JobContext::new(name, CancellationToken::new())
}

pub fn dispatcher(batch_size: usize) -> BatchDispatcher {
    BatchDispatcher::new(DispatchConfig {
        batch_size,
        concurrency: 1,
        inter_batch_delay: Duration::ZERO,
        per_item_timeout: Duration::from_secs(1),
        max_retries: 1,
        retry_backoff: Duration::from_millis(1),
        max_recorded_failures: 50,
    })
}

pub fn contact(id: i32, email: &str) -> UserContact {
    UserContact {
        id,
        username: format!("user{id}"),
        email: email.to_string(),
        display_name: format!("User {id}"),
    }
}

pub fn pending_task(id: i32, owner: UserContact) -> PendingTask {
    PendingTask {
        id,
        title: format!("Task {id}"),
        description: None,
        priority: "medium".to_string(),
        created_at: "2025-01-01T00:00:00Z".parse().unwrap(),
        owner,
    }
}

pub fn due_meeting(cursor: i32, meeting_id: i32, participant: UserContact) -> DueMeeting {
    DueMeeting {
        cursor,
        meeting_id,
        title: format!("Meeting {meeting_id}"),
        description: None,
        meeting_date: Timestamp::now() + jiff::SignedDuration::from_mins(10),
        duration_minutes: 30,
        location: Some("Room 1".to_string()),
        meeting_url: None,
        reminder_minutes: 15,
        participant,
    }
}

/// Storage fake. Meetings are filtered against the reminder ledger like the
/// real query unless `ledger_blind_query` is set.
#[derive(Default)]
pub struct FakeGateway {
    pub tasks: Mutex<Vec<PendingTask>>,
    pub meetings: Mutex<Vec<DueMeeting>>,
    pub reminders: Mutex<HashMap<(i32, i32), ReminderStatus>>,
    pub users: Mutex<Vec<(UserContact, TaskStatistics)>>,
    pub completed_old: Mutex<usize>,
    pub ledger_blind_query: AtomicBool,
    pub storage_down: AtomicBool,
    pub fail_record: AtomicBool,
    pub pings: AtomicUsize,
}

impl FakeGateway {
    fn check(&self) -> JobResult<()> {
        if self.storage_down.load(Ordering::SeqCst) {
            Err(JobError::StorageUnavailable("connection refused".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl ReminderQueryGateway for FakeGateway {
    async fn fetch_pending_tasks_older_than(
        &self,
        threshold: Timestamp,
        after_id: i32,
        limit: usize,
    ) -> JobResult<Vec<PendingTask>> {
        self.check()?;
        Ok(self
            .tasks
            .lock()
            .unwrap()
            .iter()
            .filter(|t| t.id > after_id && t.created_at < threshold)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn fetch_meetings_due_within(
        &self,
        _window: Duration,
        after_id: i32,
        limit: usize,
    ) -> JobResult<Vec<DueMeeting>> {
        self.check()?;
        let blind = self.ledger_blind_query.load(Ordering::SeqCst);
        let reminders = self.reminders.lock().unwrap();
        Ok(self
            .meetings
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.cursor > after_id)
            .filter(|m| blind || !reminders.contains_key(&(m.meeting_id, m.participant.id)))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn reminder_exists(&self, meeting_id: i32, user_id: i32) -> JobResult<bool> {
        self.check()?;
        Ok(self.reminders.lock().unwrap().contains_key(&(meeting_id, user_id)))
    }

    async fn record_reminder(
        &self,
        meeting_id: i32,
        user_id: i32,
        status: ReminderStatus,
    ) -> JobResult<bool> {
        self.check()?;
        if self.fail_record.load(Ordering::SeqCst) {
            return Err(JobError::StorageUnavailable("insert failed".into()));
        }
        let mut reminders = self.reminders.lock().unwrap();
        if reminders.contains_key(&(meeting_id, user_id)) {
            return Ok(false);
        }
        reminders.insert((meeting_id, user_id), status);
        Ok(true)
    }

    async fn fetch_active_users(&self, after_id: i32, limit: usize) -> JobResult<Vec<UserContact>> {
        self.check()?;
        Ok(self
            .users
            .lock()
            .unwrap()
            .iter()
            .map(|(user, _)| user)
            .filter(|u| u.id > after_id)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn task_statistics(
        &self,
        user_id: i32,
        _overdue_before: Timestamp,
    ) -> JobResult<TaskStatistics> {
        self.check()?;
        Ok(self
            .users
            .lock()
            .unwrap()
            .iter()
            .find(|(u, _)| u.id == user_id)
            .map(|(_, stats)| *stats)
            .unwrap_or_default())
    }

    async fn delete_completed_tasks_older_than(
        &self,
        _threshold: Timestamp,
        limit: usize,
    ) -> JobResult<usize> {
        self.check()?;
        let mut left = self.completed_old.lock().unwrap();
        let n = limit.min(*left);
        *left -= n;
        Ok(n)
    }

    async fn ping(&self) -> JobResult<()> {
        self.pings.fetch_add(1, Ordering::SeqCst);
        self.check()
    }
}

/// Records every email and event; fails addresses in `reject` permanently.
#[derive(Default)]
pub struct RecordingSink {
    pub emails: Mutex<Vec<EmailMessage>>,
    pub events: Mutex<Vec<(i32, RealtimeEvent)>>,
    pub reject: Mutex<HashSet<String>>,
}

impl RecordingSink {
    pub fn sent(&self) -> Vec<EmailMessage> {
        self.emails.lock().unwrap().clone()
    }

    pub fn event_kinds(&self) -> Vec<String> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .map(|(_, e)| e.kind.clone())
            .collect()
    }
}

#[async_trait]
impl NotificationSink for RecordingSink {
    async fn send_email(&self, message: &EmailMessage, _timeout: Duration) -> Result<(), DeliveryError> {
        if self.reject.lock().unwrap().contains(&message.to) {
            return Err(DeliveryError::Permanent("550 mailbox unavailable".into()));
        }
        self.emails.lock().unwrap().push(message.clone());
        Ok(())
    }

    async fn push_event(&self, user_id: i32, event: RealtimeEvent) {
        self.events.lock().unwrap().push((user_id, event));
    }
}
