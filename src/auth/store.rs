use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

pub const DEFAULT_PROFILE_PICTURE: &str = "default_profile.png";

/// User record in the database.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String, // Argon2 hash, not exposed in JSON
    pub profile_picture: String,
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("username already taken")]
    DuplicateUsername,
    #[error("user not found")]
    NotFound,
    #[error(transparent)]
    Backend(#[from] sqlx::Error),
}

/// Persistence seam for user records.
///
/// Usernames are case-sensitive and stored as-is; lookups are exact-match.
/// Implementations must enforce username uniqueness atomically at insert,
/// so a racing duplicate registration fails with `DuplicateUsername`
/// instead of overwriting anything.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError>;
    async fn insert(
        &self,
        username: &str,
        password_hash: &str,
        profile_picture: &str,
    ) -> Result<User, StoreError>;
    async fn update_password_hash(&self, id: Uuid, new_hash: &str) -> Result<(), StoreError>;
}

/// Postgres-backed store. The `users.username` UNIQUE constraint is what
/// makes the duplicate check atomic.
pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, password_hash, profile_picture, created_at
            FROM users
            WHERE username = $1
            "#,
        )
        .bind(username)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, password_hash, profile_picture, created_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn insert(
        &self,
        username: &str,
        password_hash: &str,
        profile_picture: &str,
    ) -> Result<User, StoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (username, password_hash, profile_picture)
            VALUES ($1, $2, $3)
            RETURNING id, username, password_hash, profile_picture, created_at
            "#,
        )
        .bind(username)
        .bind(password_hash)
        .bind(profile_picture)
        .fetch_one(&self.db)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::DuplicateUsername,
            _ => StoreError::Backend(e),
        })?;
        Ok(user)
    }

    async fn update_password_hash(&self, id: Uuid, new_hash: &str) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE users SET password_hash = $2 WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(new_hash)
        .execute(&self.db)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}

/// In-memory store, used by tests and by deployments without DATABASE_URL.
/// The uniqueness check and the insert share one write lock.
#[derive(Default)]
pub struct MemoryUserStore {
    users: RwLock<HashMap<Uuid, User>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let users = self.users.read().expect("user map poisoned");
        Ok(users.values().find(|u| u.username == username).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let users = self.users.read().expect("user map poisoned");
        Ok(users.get(&id).cloned())
    }

    async fn insert(
        &self,
        username: &str,
        password_hash: &str,
        profile_picture: &str,
    ) -> Result<User, StoreError> {
        let mut users = self.users.write().expect("user map poisoned");
        if users.values().any(|u| u.username == username) {
            return Err(StoreError::DuplicateUsername);
        }
        let user = User {
            id: Uuid::new_v4(),
            username: username.to_string(),
            password_hash: password_hash.to_string(),
            profile_picture: profile_picture.to_string(),
            created_at: OffsetDateTime::now_utc(),
        };
        users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn update_password_hash(&self, id: Uuid, new_hash: &str) -> Result<(), StoreError> {
        let mut users = self.users.write().expect("user map poisoned");
        match users.get_mut(&id) {
            Some(user) => {
                user.password_hash = new_hash.to_string();
                Ok(())
            }
            None => Err(StoreError::NotFound),
        }
    }
}
