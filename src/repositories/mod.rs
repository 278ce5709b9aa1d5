//! Repository layer for data access operations.
//!
//! Each call checks out one pooled connection and returns it before the
//! future resolves; nothing here holds a transaction across calls.

mod meeting_repo;
mod task_repo;
mod user_repo;

pub use meeting_repo::MeetingRepository;
pub use task_repo::TaskRepository;
pub use user_repo::UserRepository;

use crate::db::AsyncDbPool;

/// Aggregates all repositories for convenient access.
///
/// Since `AsyncDbPool` uses `Arc` internally, cloning is cheap.
#[derive(Clone)]
pub struct Repositories {
    pub users: UserRepository,
    pub tasks: TaskRepository,
    pub meetings: MeetingRepository,
}

impl Repositories {
    pub fn new(pool: AsyncDbPool) -> Self {
        Self {
            users: UserRepository::new(pool.clone()),
            tasks: TaskRepository::new(pool.clone()),
            meetings: MeetingRepository::new(pool),
        }
    }
}
