//! Read/write contracts the job bodies need from storage.
//!
//! Job bodies only depend on [`ReminderQueryGateway`]; [`PgReminderGateway`]
//! backs it with the repositories. Snapshots are plain owned values so a page
//! can be dropped without touching the pool again.

use std::time::Duration;

use async_trait::async_trait;
use jiff::Timestamp;
use serde::Serialize;

use crate::db::{self, AsyncDbPool};
use crate::jobs::error::JobResult;
use crate::models::{DueMeetingRow, ReminderStatus, ReminderType, Task, TaskStatistics, User};
use crate::repositories::Repositories;

/// Recipient identity shared by every reminder
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserContact {
    pub id: i32,
    pub username: String,
    pub email: String,
    pub display_name: String,
}

impl From<User> for UserContact {
    fn from(user: User) -> Self {
        Self {
            display_name: user.display_name().to_string(),
            id: user.id,
            username: user.username,
            email: user.email,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingTask {
    pub id: i32,
    pub title: String,
    pub description: Option<String>,
    pub priority: String,
    pub created_at: Timestamp,
    pub owner: UserContact,
}

impl From<(Task, User)> for PendingTask {
    fn from((task, user): (Task, User)) -> Self {
        Self {
            id: task.id,
            title: task.title,
            description: task.description,
            priority: task.priority.to_string(),
            created_at: task.created_at.to_jiff(),
            owner: user.into(),
        }
    }
}

/// One participant of a meeting inside its reminder window
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DueMeeting {
    /// Keyset cursor (participant row id)
    pub cursor: i32,
    pub meeting_id: i32,
    pub title: String,
    pub description: Option<String>,
    pub meeting_date: Timestamp,
    pub duration_minutes: i32,
    pub location: Option<String>,
    pub meeting_url: Option<String>,
    pub reminder_minutes: i32,
    pub participant: UserContact,
}

impl From<DueMeetingRow> for DueMeeting {
    fn from(row: DueMeetingRow) -> Self {
        let display_name = row
            .full_name
            .as_deref()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or(&row.username)
            .to_string();
        Self {
            cursor: row.participant_row_id,
            meeting_id: row.meeting_id,
            title: row.title,
            description: row.description,
            meeting_date: row.meeting_date.to_jiff(),
            duration_minutes: row.duration_minutes,
            location: row.location,
            meeting_url: row.meeting_url,
            reminder_minutes: row.reminder_minutes,
            participant: UserContact {
                id: row.user_id,
                username: row.username,
                email: row.email,
                display_name,
            },
        }
    }
}

/// Storage queries used by the reminder jobs.
///
/// Every method checks out one pooled connection and releases it before
/// returning. Storage failures surface as [`JobError::StorageUnavailable`].
///
/// [`JobError::StorageUnavailable`]: crate::jobs::JobError::StorageUnavailable
#[async_trait]
pub trait ReminderQueryGateway: Send + Sync {
    /// Pending tasks created before `threshold`, ordered by id, `id > after_id`.
    async fn fetch_pending_tasks_older_than(
        &self,
        threshold: Timestamp,
        after_id: i32,
        limit: usize,
    ) -> JobResult<Vec<PendingTask>>;

    /// (meeting, participant) pairs starting within
    /// `min(window, reminder_minutes)` with no email reminder recorded yet.
    async fn fetch_meetings_due_within(
        &self,
        window: Duration,
        after_id: i32,
        limit: usize,
    ) -> JobResult<Vec<DueMeeting>>;

    async fn reminder_exists(&self, meeting_id: i32, user_id: i32) -> JobResult<bool>;

    /// Returns false when another writer recorded the pair first.
    async fn record_reminder(
        &self,
        meeting_id: i32,
        user_id: i32,
        status: ReminderStatus,
    ) -> JobResult<bool>;

    async fn fetch_active_users(&self, after_id: i32, limit: usize) -> JobResult<Vec<UserContact>>;

    async fn task_statistics(
        &self,
        user_id: i32,
        overdue_before: Timestamp,
    ) -> JobResult<TaskStatistics>;

    /// Deletes at most `limit` rows; returns how many went.
    async fn delete_completed_tasks_older_than(
        &self,
        threshold: Timestamp,
        limit: usize,
    ) -> JobResult<usize>;

    /// Cheap reachability probe
    async fn ping(&self) -> JobResult<()>;
}

/// PostgreSQL implementation over the repositories
#[derive(Clone)]
pub struct PgReminderGateway {
    repos: Repositories,
    pool: AsyncDbPool,
}

impl PgReminderGateway {
    pub fn new(pool: AsyncDbPool) -> Self {
        Self {
            repos: Repositories::new(pool.clone()),
            pool,
        }
    }
}

fn clamp_limit(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

#[async_trait]
impl ReminderQueryGateway for PgReminderGateway {
    async fn fetch_pending_tasks_older_than(
        &self,
        threshold: Timestamp,
        after_id: i32,
        limit: usize,
    ) -> JobResult<Vec<PendingTask>> {
        let rows = self
            .repos
            .tasks
            .pending_created_before(threshold, after_id, clamp_limit(limit))
            .await?;
        Ok(rows.into_iter().map(PendingTask::from).collect())
    }

    async fn fetch_meetings_due_within(
        &self,
        window: Duration,
        after_id: i32,
        limit: usize,
    ) -> JobResult<Vec<DueMeeting>> {
        let window_minutes = i32::try_from(window.as_secs() / 60).unwrap_or(i32::MAX);
        let limit = i32::try_from(limit).unwrap_or(i32::MAX);
        let rows = self
            .repos
            .meetings
            .due_within(window_minutes, after_id, limit)
            .await?;
        Ok(rows.into_iter().map(DueMeeting::from).collect())
    }

    async fn reminder_exists(&self, meeting_id: i32, user_id: i32) -> JobResult<bool> {
        Ok(self
            .repos
            .meetings
            .reminder_exists(meeting_id, user_id, ReminderType::Email)
            .await?)
    }

    async fn record_reminder(
        &self,
        meeting_id: i32,
        user_id: i32,
        status: ReminderStatus,
    ) -> JobResult<bool> {
        Ok(self
            .repos
            .meetings
            .record_reminder(meeting_id, user_id, ReminderType::Email, status)
            .await?)
    }

    async fn fetch_active_users(&self, after_id: i32, limit: usize) -> JobResult<Vec<UserContact>> {
        let users = self
            .repos
            .users
            .list_active_after(after_id, clamp_limit(limit))
            .await?;
        Ok(users.into_iter().map(UserContact::from).collect())
    }

    async fn task_statistics(
        &self,
        user_id: i32,
        overdue_before: Timestamp,
    ) -> JobResult<TaskStatistics> {
        Ok(self
            .repos
            .tasks
            .statistics_for_user(user_id, overdue_before)
            .await?)
    }

    async fn delete_completed_tasks_older_than(
        &self,
        threshold: Timestamp,
        limit: usize,
    ) -> JobResult<usize> {
        Ok(self
            .repos
            .tasks
            .delete_completed_created_before(threshold, clamp_limit(limit))
            .await?)
    }

    async fn ping(&self) -> JobResult<()> {
        Ok(db::ping(&self.pool).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{TaskPriority, TaskStatus};
    use jiff_diesel::ToDiesel;

    fn user(full_name: Option<&str>) -> User {
        User {
            id: 4,
            username: "ada".to_string(),
            email: "ada@example.com".to_string(),
            full_name: full_name.map(str::to_string),
            is_active: true,
            created_at: Timestamp::UNIX_EPOCH.to_diesel(),
        }
    }

    #[test]
    fn test_contact_prefers_full_name() {
        assert_eq!(UserContact::from(user(Some("Ada Lovelace"))).display_name, "Ada Lovelace");
        assert_eq!(UserContact::from(user(Some("  "))).display_name, "ada");
        assert_eq!(UserContact::from(user(None)).display_name, "ada");
    }

    #[test]
    fn test_pending_task_snapshot() {
        let created: Timestamp = "2025-03-01T08:00:00Z".parse().unwrap();
        let task = Task {
            id: 11,
            user_id: 4,
            title: "Write report".to_string(),
            description: None,
            status: TaskStatus::Pending,
            priority: TaskPriority::High,
            due_date: None,
            created_at: created.to_diesel(),
            updated_at: created.to_diesel(),
        };

        let snapshot = PendingTask::from((task, user(None)));

        assert_eq!(snapshot.priority, "high");
        assert_eq!(snapshot.created_at, created);
        assert_eq!(snapshot.owner.id, 4);
    }
}
