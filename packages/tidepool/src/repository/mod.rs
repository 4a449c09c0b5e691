// Repository layer — each domain lives in its own file with `impl ChatRepository`.

use sqlx::sqlite::SqlitePool;

mod auth;
mod hubs;
mod messages;
mod rooms;

pub use auth::{hash_password, is_unique_violation};

#[cfg(test)]
pub(crate) mod test_helpers;

#[derive(Clone)]
pub struct ChatRepository {
    pub(crate) pool: SqlitePool,
}

impl ChatRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}
