mod meeting;
mod task;
mod user;

pub use meeting::{
    DueMeetingRow, MeetingStatus, NewMeetingReminder, ReminderStatus, ReminderType,
};
pub use task::{Task, TaskPriority, TaskStatistics, TaskStatus};
pub use user::User;
