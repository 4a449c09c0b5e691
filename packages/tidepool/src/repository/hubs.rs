use anyhow::Result;
use chrono::Utc;

use super::ChatRepository;
use crate::models::Hub;

impl ChatRepository {
    /// Create a hub. The owner becomes a member in the same transaction.
    pub async fn create_hub(&self, hub: &Hub) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO hubs (id, owner_id, name, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&hub.id)
        .bind(&hub.owner_id)
        .bind(&hub.name)
        .bind(hub.created_at)
        .bind(hub.updated_at)
        .execute(&mut *tx)
        .await?;

        sqlx::query("INSERT INTO hub_members (hub_id, user_id, joined_at) VALUES (?, ?, ?)")
            .bind(&hub.id)
            .bind(&hub.owner_id)
            .bind(Utc::now().timestamp())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    pub async fn get_hub(&self, id: &str) -> Result<Option<Hub>> {
        let hub = sqlx::query_as::<_, Hub>(
            "SELECT id, owner_id, name, created_at, updated_at FROM hubs WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(hub)
    }

    /// Add a user to a hub. Joining a hub twice is a no-op.
    pub async fn join_hub(&self, hub_id: &str, user_id: &str) -> Result<()> {
        sqlx::query(
            "INSERT OR IGNORE INTO hub_members (hub_id, user_id, joined_at) VALUES (?, ?, ?)",
        )
        .bind(hub_id)
        .bind(user_id)
        .bind(Utc::now().timestamp())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Hubs the user belongs to, newest first.
    pub async fn get_user_hubs(&self, user_id: &str) -> Result<Vec<Hub>> {
        let hubs = sqlx::query_as::<_, Hub>(
            "SELECT h.id, h.owner_id, h.name, h.created_at, h.updated_at
             FROM hubs h JOIN hub_members m ON m.hub_id = h.id
             WHERE m.user_id = ?
             ORDER BY m.joined_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(hubs)
    }

    pub async fn is_hub_member(&self, hub_id: &str, user_id: &str) -> Result<bool> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM hub_members WHERE hub_id = ? AND user_id = ?",
        )
        .bind(hub_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::User;
    use crate::repository::test_helpers;

    async fn seed_user(repo: &ChatRepository, username: &str) -> User {
        let user = User::new(
            username.to_string(),
            format!("{username}@example.com"),
            "hash".to_string(),
        );
        repo.create_user(&user).await.unwrap();
        user
    }

    #[tokio::test]
    async fn create_hub_makes_owner_a_member() {
        let repo = test_helpers::test_repository().await;
        let owner = seed_user(&repo, "alice").await;

        let hub = Hub::new(owner.id.clone(), "general".into());
        repo.create_hub(&hub).await.unwrap();

        assert!(repo.is_hub_member(&hub.id, &owner.id).await.unwrap());
        let found = repo.get_hub(&hub.id).await.unwrap().unwrap();
        assert_eq!(found.name, "general");
    }

    #[tokio::test]
    async fn join_is_idempotent() {
        let repo = test_helpers::test_repository().await;
        let owner = seed_user(&repo, "alice").await;
        let joiner = seed_user(&repo, "bob").await;

        let hub = Hub::new(owner.id.clone(), "general".into());
        repo.create_hub(&hub).await.unwrap();

        assert!(!repo.is_hub_member(&hub.id, &joiner.id).await.unwrap());
        repo.join_hub(&hub.id, &joiner.id).await.unwrap();
        repo.join_hub(&hub.id, &joiner.id).await.unwrap();
        assert!(repo.is_hub_member(&hub.id, &joiner.id).await.unwrap());
    }

    #[tokio::test]
    async fn user_hubs_lists_memberships() {
        let repo = test_helpers::test_repository().await;
        let owner = seed_user(&repo, "alice").await;
        let other = seed_user(&repo, "bob").await;

        let h1 = Hub::new(owner.id.clone(), "one".into());
        let h2 = Hub::new(other.id.clone(), "two".into());
        repo.create_hub(&h1).await.unwrap();
        repo.create_hub(&h2).await.unwrap();
        repo.join_hub(&h2.id, &owner.id).await.unwrap();

        let hubs = repo.get_user_hubs(&owner.id).await.unwrap();
        assert_eq!(hubs.len(), 2);
        let names: Vec<_> = hubs.iter().map(|h| h.name.as_str()).collect();
        assert!(names.contains(&"one") && names.contains(&"two"));

        assert_eq!(repo.get_user_hubs(&other.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn missing_hub_is_none() {
        let repo = test_helpers::test_repository().await;
        assert!(repo.get_hub("nope").await.unwrap().is_none());
    }
}
