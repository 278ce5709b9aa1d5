//! Task repository: due-task scans, per-user statistics and retention deletes.

use diesel::dsl::count_star;
use diesel::prelude::*;
use diesel::pg::Pg;
use diesel::query_builder::{BoxedSqlQuery, SqlQuery};
use diesel::sql_types::{BigInt, Timestamptz};
use diesel_async::RunQueryDsl;
use jiff_diesel::ToDiesel;

use crate::db::AsyncDbPool;
use crate::error::AppError;
use crate::models::{Task, TaskStatistics, TaskStatus, User};
use crate::schema::sql_types::TaskStatus as TaskStatusSql;

/// One bounded retention step. The id subquery reads the same table the
/// outer statement deletes from, which the query builder cannot express.
const DELETE_COMPLETED_BATCH_SQL: &str = r#"
DELETE FROM tasks
WHERE id IN (
    SELECT id FROM tasks
    WHERE status = $1
      AND created_at < $2
    ORDER BY id
    LIMIT $3
)
"#;

#[derive(Clone)]
pub struct TaskRepository {
    pool: AsyncDbPool,
}

impl TaskRepository {
    pub fn new(pool: AsyncDbPool) -> Self {
        Self { pool }
    }

    /// Pending tasks created before `threshold`, joined to their active owner.
    ///
    /// Keyset paginated on `tasks.id` so rows changing status between pages
    /// never shift the cursor.
    pub async fn pending_created_before(
        &self,
        threshold: jiff::Timestamp,
        after_id: i32,
        limit: i64,
    ) -> Result<Vec<(Task, User)>, AppError> {
        use crate::schema::{tasks, users};
        let mut conn = self.pool.get().await?;

        tasks::table
            .inner_join(users::table)
            .filter(tasks::status.eq(TaskStatus::Pending))
            .filter(tasks::created_at.lt(threshold.to_diesel()))
            .filter(tasks::id.gt(after_id))
            .filter(users::is_active.eq(true))
            .order(tasks::id.asc())
            .limit(limit)
            .select((Task::as_select(), User::as_select()))
            .load(&mut conn)
            .await
            .map_err(AppError::from)
    }

    /// Task counts per status for one user; pending tasks created before
    /// `overdue_before` are also counted as overdue.
    pub async fn statistics_for_user(
        &self,
        owner_id: i32,
        overdue_before: jiff::Timestamp,
    ) -> Result<TaskStatistics, AppError> {
        use crate::schema::tasks::dsl::*;
        let mut conn = self.pool.get().await?;

        let counts: Vec<(TaskStatus, i64)> = tasks
            .filter(user_id.eq(owner_id))
            .group_by(status)
            .select((status, count_star()))
            .load(&mut conn)
            .await?;

        let overdue: i64 = tasks
            .filter(user_id.eq(owner_id))
            .filter(status.eq(TaskStatus::Pending))
            .filter(created_at.lt(overdue_before.to_diesel()))
            .count()
            .get_result(&mut conn)
            .await?;

        Ok(TaskStatistics::from_counts(&counts, overdue))
    }

    /// Deletes at most `limit` completed tasks created before `threshold`.
    ///
    /// The bounded id subquery keeps each statement's lock footprint small;
    /// callers loop until fewer than `limit` rows come back.
    pub async fn delete_completed_created_before(
        &self,
        threshold: jiff::Timestamp,
        limit: i64,
    ) -> Result<usize, AppError> {
        let mut conn = self.pool.get().await?;

        delete_completed_batch(threshold, limit)
            .execute(&mut conn)
            .await
            .map_err(AppError::from)
    }
}

fn delete_completed_batch(
    threshold: jiff::Timestamp,
    limit: i64,
) -> BoxedSqlQuery<'static, Pg, SqlQuery> {
    diesel::sql_query(DELETE_COMPLETED_BATCH_SQL)
        .into_boxed()
        .bind::<TaskStatusSql, _>(TaskStatus::Completed)
        .bind::<Timestamptz, _>(threshold.to_diesel())
        .bind::<BigInt, _>(limit)
}
