use diesel::prelude::*;
use diesel::sql_types::{Int4, Nullable, Text, Timestamptz, Varchar};
use diesel_derive_enum::DbEnum;
use jiff_diesel::Timestamp;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, DbEnum)]
#[db_enum(existing_type_path = "crate::schema::sql_types::MeetingStatus")]
#[serde(rename_all = "snake_case")]
pub enum MeetingStatus {
    Scheduled,
    InProgress,
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, DbEnum)]
#[db_enum(existing_type_path = "crate::schema::sql_types::ReminderType")]
#[serde(rename_all = "lowercase")]
pub enum ReminderType {
    Email,
    Sms,
    Push,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, DbEnum)]
#[db_enum(existing_type_path = "crate::schema::sql_types::ReminderStatus")]
#[serde(rename_all = "lowercase")]
pub enum ReminderStatus {
    Sent,
    Failed,
    Pending,
}

/// Insert-only reminder marker; the unique key on
/// (meeting_id, user_id, reminder_type) backs the dedup check.
#[derive(Debug, Insertable, Clone)]
#[diesel(table_name = crate::schema::meeting_reminders)]
pub struct NewMeetingReminder {
    pub meeting_id: i32,
    pub user_id: i32,
    pub sent_at: Timestamp,
    pub reminder_type: ReminderType,
    pub status: ReminderStatus,
}

/// One (meeting, participant) pair that is inside its reminder window.
///
/// Loaded through a raw keyset query, hence `QueryableByName`.
#[derive(Debug, QueryableByName, Clone)]
pub struct DueMeetingRow {
    #[diesel(sql_type = Int4)]
    pub participant_row_id: i32,
    #[diesel(sql_type = Int4)]
    pub meeting_id: i32,
    #[diesel(sql_type = Varchar)]
    pub title: String,
    #[diesel(sql_type = Nullable<Text>)]
    pub description: Option<String>,
    #[diesel(sql_type = Timestamptz)]
    pub meeting_date: Timestamp,
    #[diesel(sql_type = Int4)]
    pub duration_minutes: i32,
    #[diesel(sql_type = Nullable<Varchar>)]
    pub location: Option<String>,
    #[diesel(sql_type = Nullable<Varchar>)]
    pub meeting_url: Option<String>,
    #[diesel(sql_type = Int4)]
    pub reminder_minutes: i32,
    #[diesel(sql_type = Int4)]
    pub user_id: i32,
    #[diesel(sql_type = Varchar)]
    pub username: String,
    #[diesel(sql_type = Varchar)]
    pub email: String,
    #[diesel(sql_type = Nullable<Varchar>)]
    pub full_name: Option<String>,
}
