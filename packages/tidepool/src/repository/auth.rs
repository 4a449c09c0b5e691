//! Identity: argon2-hashed accounts and opaque DB-backed session tokens.
//!
//! Tokens are random 256-bit values handed to the client in an HttpOnly
//! cookie; only their SHA-256 digest is stored, so a leaked database
//! does not leak live sessions.

use anyhow::Result;
use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use chrono::Utc;
use rand::Rng;
use sha2::{Digest, Sha256};

use super::ChatRepository;
use crate::models::User;

/// Hash a password with Argon2id and a random salt.
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("failed to hash password: {e}"))?;
    Ok(hash.to_string())
}

/// Verify a password against a stored Argon2id hash.
fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let parsed =
        PasswordHash::new(hash).map_err(|e| anyhow::anyhow!("invalid password hash: {e}"))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn token_digest(token: &str) -> String {
    hex(&Sha256::digest(token.as_bytes()))
}

/// True when an error is the database rejecting a duplicate key, such
/// as an already-taken username. Lets callers map the race loser of a
/// concurrent insert to a conflict instead of a server error.
pub fn is_unique_violation(e: &anyhow::Error) -> bool {
    e.downcast_ref::<sqlx::Error>()
        .and_then(|e| e.as_database_error())
        .is_some_and(|db| db.is_unique_violation())
}

impl ChatRepository {
    pub async fn create_user(&self, user: &User) -> Result<()> {
        sqlx::query(
            "INSERT INTO users (id, username, email, password_hash, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&user.id)
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_user_by_id(&self, id: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, username, email, password_hash, created_at, updated_at
             FROM users WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    pub async fn get_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, username, email, password_hash, created_at, updated_at
             FROM users WHERE username = ?",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    /// Verify password against the stored argon2 hash. Returns the User
    /// on success, None for unknown usernames and wrong passwords alike.
    pub async fn verify_user_password(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Option<User>> {
        let user = match self.get_user_by_username(username).await? {
            Some(u) => u,
            None => return Ok(None),
        };
        if verify_password(password, &user.password_hash)? {
            Ok(Some(user))
        } else {
            Ok(None)
        }
    }

    /// Issue a session for a user. Returns the raw token; only its
    /// digest touches the database.
    pub async fn create_session(&self, user_id: &str, ttl_secs: u64) -> Result<String> {
        let token_bytes: [u8; 32] = rand::rng().random();
        let token = hex(&token_bytes);
        let now = Utc::now().timestamp();

        sqlx::query(
            "INSERT INTO sessions (token_hash, user_id, created_at, expires_at)
             VALUES (?, ?, ?, ?)",
        )
        .bind(token_digest(&token))
        .bind(user_id)
        .bind(now)
        .bind(now + ttl_secs as i64)
        .execute(&self.pool)
        .await?;

        Ok(token)
    }

    /// Resolve a session token to its user, ignoring expired sessions.
    pub async fn resolve_session(&self, token: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT u.id, u.username, u.email, u.password_hash, u.created_at, u.updated_at
             FROM sessions s JOIN users u ON u.id = s.user_id
             WHERE s.token_hash = ? AND s.expires_at > ?",
        )
        .bind(token_digest(token))
        .bind(Utc::now().timestamp())
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    pub async fn delete_session(&self, token: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM sessions WHERE token_hash = ?")
            .bind(token_digest(token))
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Remove expired sessions. Returns how many were deleted.
    pub async fn cleanup_expired_sessions(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= ?")
            .bind(Utc::now().timestamp())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_helpers;

    fn make_user(username: &str) -> User {
        User::new(
            username.to_string(),
            format!("{username}@example.com"),
            hash_password("hunter2").unwrap(),
        )
    }

    #[test]
    fn hash_and_verify_password() {
        let hash = hash_password("hunter2").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("hunter2", &hash).unwrap());
        assert!(!verify_password("wrong", &hash).unwrap());
    }

    #[test]
    fn same_password_different_salts() {
        let h1 = hash_password("same").unwrap();
        let h2 = hash_password("same").unwrap();
        assert_ne!(h1, h2);
        assert!(verify_password("same", &h1).unwrap());
        assert!(verify_password("same", &h2).unwrap());
    }

    #[tokio::test]
    async fn create_and_get_user() {
        let repo = test_helpers::test_repository().await;
        let user = make_user("alice");
        repo.create_user(&user).await.unwrap();

        let found = repo.get_user_by_username("alice").await.unwrap().unwrap();
        assert_eq!(found.id, user.id);

        let by_id = repo.get_user_by_id(&user.id).await.unwrap().unwrap();
        assert_eq!(by_id.username, "alice");
    }

    #[tokio::test]
    async fn duplicate_username_is_a_unique_violation() {
        let repo = test_helpers::test_repository().await;
        repo.create_user(&make_user("alice")).await.unwrap();

        let err = repo.create_user(&make_user("alice")).await.unwrap_err();
        assert!(is_unique_violation(&err));

        // An unrelated constraint failure is not misclassified
        let err = repo
            .create_session("no-such-user", 3600)
            .await
            .unwrap_err();
        assert!(!is_unique_violation(&err));
    }

    #[tokio::test]
    async fn verify_user_password_paths() {
        let repo = test_helpers::test_repository().await;
        repo.create_user(&make_user("bob")).await.unwrap();

        assert!(repo.verify_user_password("bob", "hunter2").await.unwrap().is_some());
        assert!(repo.verify_user_password("bob", "wrong").await.unwrap().is_none());
        assert!(repo.verify_user_password("nobody", "x").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn session_roundtrip() {
        let repo = test_helpers::test_repository().await;
        let user = make_user("carol");
        repo.create_user(&user).await.unwrap();

        let token = repo.create_session(&user.id, 3600).await.unwrap();
        let resolved = repo.resolve_session(&token).await.unwrap().unwrap();
        assert_eq!(resolved.id, user.id);

        // Raw token is never stored verbatim
        let stored: Option<String> =
            sqlx::query_scalar("SELECT token_hash FROM sessions WHERE user_id = ?")
                .bind(&user.id)
                .fetch_optional(&repo.pool)
                .await
                .unwrap();
        assert_ne!(stored.unwrap(), token);

        assert!(repo.delete_session(&token).await.unwrap());
        assert!(repo.resolve_session(&token).await.unwrap().is_none());
        assert!(!repo.delete_session(&token).await.unwrap());
    }

    #[tokio::test]
    async fn expired_sessions_do_not_resolve() {
        let repo = test_helpers::test_repository().await;
        let user = make_user("dave");
        repo.create_user(&user).await.unwrap();

        let token = repo.create_session(&user.id, 0).await.unwrap();
        assert!(repo.resolve_session(&token).await.unwrap().is_none());

        let removed = repo.cleanup_expired_sessions().await.unwrap();
        assert_eq!(removed, 1);
    }
}
