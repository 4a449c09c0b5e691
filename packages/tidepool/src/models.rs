use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A registered account. Email and password hash never leave the server.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub username: String,
    #[serde(skip_serializing)]
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: i64,
    pub updated_at: i64,
}

impl User {
    pub fn new(username: String, email: String, password_hash: String) -> Self {
        let now = Utc::now().timestamp();
        Self {
            id: Uuid::new_v4().to_string(),
            username,
            email,
            password_hash,
            created_at: now,
            updated_at: now,
        }
    }

    /// Public projection attached to broadcast messages and history rows.
    pub fn profile(&self) -> AuthorProfile {
        AuthorProfile {
            id: self.id.clone(),
            username: self.username.clone(),
        }
    }
}

/// The public slice of a user embedded in message payloads.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorProfile {
    pub id: String,
    pub username: String,
}

/// A hub: a named collection of rooms with an owner and a member list.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hub {
    pub id: String,
    pub owner_id: String,
    pub name: String,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Hub {
    pub fn new(owner_id: String, name: String) -> Self {
        let now = Utc::now().timestamp();
        Self {
            id: Uuid::new_v4().to_string(),
            owner_id,
            name,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A room inside a hub. `kind` is free-form ("text", "voice", ...).
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    pub id: String,
    pub hub_id: String,
    pub name: String,
    pub group_name: String,
    pub kind: String,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Room {
    pub fn new(hub_id: String, name: String, kind: String, group_name: String) -> Self {
        let now = Utc::now().timestamp();
        Self {
            id: Uuid::new_v4().to_string(),
            hub_id,
            name,
            group_name,
            kind,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A persisted chat message. `id` is None until the database assigns one.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: Option<i64>,
    pub room_id: String,
    pub hub_id: String,
    pub author_id: String,
    pub content: String,
    pub created_at: i64,
    pub updated_at: i64,
}

/// A message enriched with its author's public profile. This is the
/// broadcast payload and the history-row shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageWithAuthor {
    #[serde(flatten)]
    pub message: Message,
    pub author: AuthorProfile,
}

/// Per-user read marker for a room.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomReadStatus {
    pub room_id: String,
    pub user_id: String,
    pub last_read_msg_id: Option<i64>,
    pub updated_at: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_serialization_hides_secrets() {
        let user = User::new(
            "alice".into(),
            "alice@example.com".into(),
            "$argon2id$fake".into(),
        );
        let json = serde_json::to_value(&user).unwrap();
        assert_eq!(json["username"], "alice");
        assert!(json.get("email").is_none());
        assert!(json.get("passwordHash").is_none());
        assert!(json.get("password_hash").is_none());
    }

    #[test]
    fn message_with_author_flattens() {
        let msg = Message {
            id: Some(7),
            room_id: "r-1".into(),
            hub_id: "h-1".into(),
            author_id: "u-1".into(),
            content: "hello".into(),
            created_at: 100,
            updated_at: 100,
        };
        let enriched = MessageWithAuthor {
            message: msg,
            author: AuthorProfile {
                id: "u-1".into(),
                username: "alice".into(),
            },
        };
        let json = serde_json::to_value(&enriched).unwrap();
        // Flattened: message fields at the top level, author nested
        assert_eq!(json["id"], 7);
        assert_eq!(json["roomId"], "r-1");
        assert_eq!(json["author"]["username"], "alice");
    }
}
