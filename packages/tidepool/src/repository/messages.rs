use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;

use super::ChatRepository;
use crate::models::{AuthorProfile, Message, MessageWithAuthor, Room, User};
use crate::ws::MessageStore;

impl ChatRepository {
    /// Insert a message and return it with its database-assigned id.
    /// Ids come from rowid assignment, so they are strictly increasing
    /// per room in insertion order.
    pub async fn insert_message(
        &self,
        room_id: &str,
        hub_id: &str,
        author_id: &str,
        content: &str,
    ) -> Result<Message> {
        let now = Utc::now().timestamp();
        let result = sqlx::query(
            "INSERT INTO messages (room_id, hub_id, author_id, content, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(room_id)
        .bind(hub_id)
        .bind(author_id)
        .bind(content)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(Message {
            id: Some(result.last_insert_rowid()),
            room_id: room_id.to_string(),
            hub_id: hub_id.to_string(),
            author_id: author_id.to_string(),
            content: content.to_string(),
            created_at: now,
            updated_at: now,
        })
    }

    /// Most recent messages in a room, newest first, with author
    /// profiles attached.
    pub async fn recent_messages(&self, room_id: &str, limit: u32) -> Result<Vec<MessageWithAuthor>> {
        let rows = sqlx::query_as::<_, MessageRow>(
            "SELECT m.id, m.room_id, m.hub_id, m.author_id, m.content,
                    m.created_at, m.updated_at, u.username AS author_username
             FROM messages m JOIN users u ON u.id = m.author_id
             WHERE m.room_id = ?
             ORDER BY m.id DESC
             LIMIT ?",
        )
        .bind(room_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(MessageRow::into_enriched).collect())
    }
}

#[derive(sqlx::FromRow)]
struct MessageRow {
    id: i64,
    room_id: String,
    hub_id: String,
    author_id: String,
    content: String,
    created_at: i64,
    updated_at: i64,
    author_username: String,
}

impl MessageRow {
    fn into_enriched(self) -> MessageWithAuthor {
        MessageWithAuthor {
            author: AuthorProfile {
                id: self.author_id.clone(),
                username: self.author_username,
            },
            message: Message {
                id: Some(self.id),
                room_id: self.room_id,
                hub_id: self.hub_id,
                author_id: self.author_id,
                content: self.content,
                created_at: self.created_at,
                updated_at: self.updated_at,
            },
        }
    }
}

#[async_trait]
impl MessageStore for ChatRepository {
    async fn store_message(
        &self,
        room: &Room,
        author: &User,
        content: &str,
    ) -> Result<MessageWithAuthor> {
        let message = self
            .insert_message(&room.id, &room.hub_id, &author.id, content)
            .await
            .with_context(|| format!("Failed to store message in room {}", room.id))?;
        Ok(MessageWithAuthor {
            message,
            author: author.profile(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Hub;
    use crate::repository::test_helpers;

    async fn seed_room(repo: &ChatRepository) -> (User, Room) {
        let user = User::new("alice".into(), "alice@example.com".into(), "hash".into());
        repo.create_user(&user).await.unwrap();
        let hub = Hub::new(user.id.clone(), "general".into());
        repo.create_hub(&hub).await.unwrap();
        let room = Room::new(hub.id.clone(), "lobby".into(), "text".into(), "".into());
        repo.create_room(&room).await.unwrap();
        (user, room)
    }

    #[tokio::test]
    async fn insert_assigns_strictly_increasing_ids() {
        let repo = test_helpers::test_repository().await;
        let (user, room) = seed_room(&repo).await;

        let mut last = 0;
        for i in 0..5 {
            let msg = repo
                .insert_message(&room.id, &room.hub_id, &user.id, &format!("msg {i}"))
                .await
                .unwrap();
            let id = msg.id.unwrap();
            assert!(id > last);
            last = id;
        }
    }

    #[tokio::test]
    async fn recent_messages_newest_first_with_author() {
        let repo = test_helpers::test_repository().await;
        let (user, room) = seed_room(&repo).await;

        for i in 0..4 {
            repo.insert_message(&room.id, &room.hub_id, &user.id, &format!("msg {i}"))
                .await
                .unwrap();
        }

        let history = repo.recent_messages(&room.id, 3).await.unwrap();
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].message.content, "msg 3");
        assert_eq!(history[2].message.content, "msg 1");
        assert_eq!(history[0].author.username, "alice");
        assert!(history[0].message.id.unwrap() > history[1].message.id.unwrap());
    }

    #[tokio::test]
    async fn recent_messages_scoped_to_room() {
        let repo = test_helpers::test_repository().await;
        let (user, room) = seed_room(&repo).await;
        let other = Room::new(room.hub_id.clone(), "other".into(), "text".into(), "".into());
        repo.create_room(&other).await.unwrap();

        repo.insert_message(&room.id, &room.hub_id, &user.id, "here")
            .await
            .unwrap();
        repo.insert_message(&other.id, &other.hub_id, &user.id, "elsewhere")
            .await
            .unwrap();

        let history = repo.recent_messages(&room.id, 50).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].message.content, "here");
    }

    #[tokio::test]
    async fn store_message_enriches_with_author_profile() {
        let repo = test_helpers::test_repository().await;
        let (user, room) = seed_room(&repo).await;

        let enriched = repo.store_message(&room, &user, "hello").await.unwrap();
        assert!(enriched.message.id.is_some());
        assert_eq!(enriched.message.room_id, room.id);
        assert_eq!(enriched.author, user.profile());
    }
}
