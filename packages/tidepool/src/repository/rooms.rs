use anyhow::Result;
use chrono::Utc;

use super::ChatRepository;
use crate::models::Room;

impl ChatRepository {
    pub async fn create_room(&self, room: &Room) -> Result<()> {
        sqlx::query(
            "INSERT INTO rooms (id, hub_id, name, group_name, kind, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&room.id)
        .bind(&room.hub_id)
        .bind(&room.name)
        .bind(&room.group_name)
        .bind(&room.kind)
        .bind(room.created_at)
        .bind(room.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_room(&self, id: &str) -> Result<Option<Room>> {
        let room = sqlx::query_as::<_, Room>(
            "SELECT id, hub_id, name, group_name, kind, created_at, updated_at
             FROM rooms WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(room)
    }

    /// Rooms in a hub, grouped then alphabetical within a group.
    pub async fn get_hub_rooms(&self, hub_id: &str) -> Result<Vec<Room>> {
        let rooms = sqlx::query_as::<_, Room>(
            "SELECT id, hub_id, name, group_name, kind, created_at, updated_at
             FROM rooms WHERE hub_id = ?
             ORDER BY group_name, name",
        )
        .bind(hub_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rooms)
    }

    /// Record how far a user has read in a room. Later writes win.
    pub async fn upsert_read_status(
        &self,
        room_id: &str,
        user_id: &str,
        last_read_msg_id: Option<i64>,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO room_read_status (room_id, user_id, last_read_msg_id, updated_at)
             VALUES (?, ?, ?, ?)
             ON CONFLICT (room_id, user_id) DO UPDATE SET
                 last_read_msg_id = excluded.last_read_msg_id,
                 updated_at = excluded.updated_at",
        )
        .bind(room_id)
        .bind(user_id)
        .bind(last_read_msg_id)
        .bind(Utc::now().timestamp())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
