//! Meeting repository: reminder-window scans and the reminder ledger.

use diesel::prelude::*;
use diesel::sql_types::Integer;
use diesel_async::RunQueryDsl;
use jiff_diesel::ToDiesel;

use crate::db::AsyncDbPool;
use crate::error::AppError;
use crate::models::{
    DueMeetingRow, MeetingStatus, NewMeetingReminder, ReminderStatus, ReminderType,
};
use crate::schema::sql_types::MeetingStatus as MeetingStatusSql;

/// A participant is due once `now` passes `meeting_date - min(reminder_minutes, window)`
/// and the meeting has not started. Pairs that already have a reminder row of
/// this type are excluded whatever its status.
const DUE_MEETINGS_SQL: &str = r#"
SELECT mp.id AS participant_row_id,
       m.id AS meeting_id,
       m.title,
       m.description,
       m.meeting_date,
       m.duration_minutes,
       m.location,
       m.meeting_url,
       m.reminder_minutes,
       u.id AS user_id,
       u.username,
       u.email,
       u.full_name
FROM meeting_participants mp
JOIN meetings m ON m.id = mp.meeting_id
JOIN users u ON u.id = mp.user_id
WHERE m.is_active
  AND m.status = $1
  AND u.is_active
  AND m.meeting_date > now()
  AND m.meeting_date <= now() + make_interval(mins => LEAST(m.reminder_minutes, $2))
  AND mp.id > $3
  AND NOT EXISTS (
      SELECT 1 FROM meeting_reminders mr
      WHERE mr.meeting_id = m.id
        AND mr.user_id = u.id
        AND mr.reminder_type = 'email'
  )
ORDER BY mp.id
LIMIT $4
"#;

#[derive(Clone)]
pub struct MeetingRepository {
    pool: AsyncDbPool,
}

impl MeetingRepository {
    pub fn new(pool: AsyncDbPool) -> Self {
        Self { pool }
    }

    /// Next page of (meeting, participant) pairs inside their reminder window,
    /// keyset paginated on the participant row id.
    pub async fn due_within(
        &self,
        window_minutes: i32,
        after_participant_id: i32,
        limit: i32,
    ) -> Result<Vec<DueMeetingRow>, AppError> {
        let mut conn = self.pool.get().await?;

        diesel::sql_query(DUE_MEETINGS_SQL)
            .bind::<MeetingStatusSql, _>(MeetingStatus::Scheduled)
            .bind::<Integer, _>(window_minutes)
            .bind::<Integer, _>(after_participant_id)
            .bind::<Integer, _>(limit)
            .load(&mut conn)
            .await
            .map_err(AppError::from)
    }

    pub async fn reminder_exists(
        &self,
        for_meeting: i32,
        for_user: i32,
        kind: ReminderType,
    ) -> Result<bool, AppError> {
        use crate::schema::meeting_reminders::dsl::*;
        let mut conn = self.pool.get().await?;

        diesel::select(diesel::dsl::exists(
            meeting_reminders
                .filter(meeting_id.eq(for_meeting))
                .filter(user_id.eq(for_user))
                .filter(reminder_type.eq(kind)),
        ))
        .get_result(&mut conn)
        .await
        .map_err(AppError::from)
    }

    /// Inserts the reminder marker; returns `false` when a concurrent writer
    /// already holds the (meeting, user, type) key.
    pub async fn record_reminder(
        &self,
        for_meeting: i32,
        for_user: i32,
        kind: ReminderType,
        outcome: ReminderStatus,
    ) -> Result<bool, AppError> {
        use crate::schema::meeting_reminders::dsl::*;
        let mut conn = self.pool.get().await?;

        let row = NewMeetingReminder {
            meeting_id: for_meeting,
            user_id: for_user,
            sent_at: jiff::Timestamp::now().to_diesel(),
            reminder_type: kind,
            status: outcome,
        };

        let inserted = diesel::insert_into(meeting_reminders)
            .values(&row)
            .on_conflict((meeting_id, user_id, reminder_type))
            .do_nothing()
            .execute(&mut conn)
            .await?;

        Ok(inserted == 1)
    }
}
