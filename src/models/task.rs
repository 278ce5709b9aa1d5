use diesel::prelude::*;
use diesel_derive_enum::DbEnum;
use jiff_diesel::Timestamp;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, DbEnum)]
#[db_enum(existing_type_path = "crate::schema::sql_types::TaskStatus")]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, DbEnum)]
#[db_enum(existing_type_path = "crate::schema::sql_types::TaskPriority")]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    Low,
    Medium,
    High,
}

impl std::fmt::Display for TaskPriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskPriority::Low => write!(f, "low"),
            TaskPriority::Medium => write!(f, "medium"),
            TaskPriority::High => write!(f, "high"),
        }
    }
}

#[derive(Debug, Queryable, Selectable, Clone)]
#[diesel(table_name = crate::schema::tasks)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Task {
    pub id: i32,
    pub user_id: i32,
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub due_date: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Per-user task counts used by the daily summary
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TaskStatistics {
    pub total: i64,
    pub pending: i64,
    pub in_progress: i64,
    pub completed: i64,
    /// Pending tasks older than the overdue threshold
    pub overdue: i64,
}

impl TaskStatistics {
    pub fn from_counts(counts: &[(TaskStatus, i64)], overdue: i64) -> Self {
        counts
            .iter()
            .fold(Self { overdue, ..Self::default() }, |mut stats, (status, count)| {
                stats.total += count;
                match status {
                    TaskStatus::Pending => stats.pending += count,
                    TaskStatus::InProgress => stats.in_progress += count,
                    TaskStatus::Completed => stats.completed += count,
                }
                stats
            })
    }

    /// Completed share in whole percent
    pub fn completion_rate(&self) -> i64 {
        if self.total == 0 {
            0
        } else {
            self.completed * 100 / self.total
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_statistics_from_grouped_counts() {
        let stats = TaskStatistics::from_counts(
            &[
                (TaskStatus::Pending, 3),
                (TaskStatus::Completed, 5),
                (TaskStatus::InProgress, 2),
            ],
            1,
        );
        assert_eq!(stats.total, 10);
        assert_eq!(stats.pending, 3);
        assert_eq!(stats.in_progress, 2);
        assert_eq!(stats.completed, 5);
        assert_eq!(stats.overdue, 1);
        assert_eq!(stats.completion_rate(), 50);
    }

    #[test]
    fn test_completion_rate_without_tasks() {
        assert_eq!(TaskStatistics::default().completion_rate(), 0);
    }
}
