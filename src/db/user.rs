//! User accounts.

use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::tree::DirectoryNode;
use crate::{DspaceError, Result};

/// A user owning one directory tree.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    /// Unique user id (uuid).
    pub id: String,
    /// Unique login name.
    pub username: String,
    /// Contact address.
    pub email: String,
    /// When the user was created.
    pub created_at: String,
}

/// Repository for user accounts.
pub struct UserRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> UserRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a user with an empty root directory.
    pub async fn create(&self, username: &str, email: &str) -> Result<User> {
        if username.trim().is_empty() {
            return Err(DspaceError::Validation("username must not be empty".to_string()));
        }

        let id = uuid::Uuid::new_v4().to_string();
        let directory = serde_json::to_string(&DirectoryNode::root())?;

        sqlx::query("INSERT INTO users (id, username, email, directory) VALUES (?, ?, ?, ?)")
            .bind(&id)
            .bind(username)
            .bind(email)
            .bind(&directory)
            .execute(self.pool)
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                    DspaceError::Conflict(format!("user {} already exists", username))
                }
                other => DspaceError::Database(other.to_string()),
            })?;

        info!(user = username, "User created");
        self.get_by_identifier(&id)
            .await?
            .ok_or_else(|| DspaceError::NotFound("user".to_string()))
    }

    /// Find a user by username, email or id.
    pub async fn get_by_identifier(&self, identifier: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, username, email, created_at FROM users
             WHERE username = ? OR email = ? OR id = ?
             ORDER BY CASE WHEN username = ? THEN 0 WHEN id = ? THEN 1 ELSE 2 END
             LIMIT 1",
        )
        .bind(identifier)
        .bind(identifier)
        .bind(identifier)
        .bind(identifier)
        .bind(identifier)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| DspaceError::Database(e.to_string()))?;

        if user.is_none() {
            debug!(user = identifier, "User not found");
        }
        Ok(user)
    }

    /// Return the user named `username`, creating it if absent.
    pub async fn ensure(&self, username: &str) -> Result<User> {
        if let Some(user) = self.get_by_identifier(username).await? {
            return Ok(user);
        }
        self.create(username, "").await
    }

    /// Delete a user and their directory. Returns whether a user was removed.
    #[cfg(test)]
    pub async fn delete(&self, identifier: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM users WHERE username = ? OR email = ? OR id = ?")
            .bind(identifier)
            .bind(identifier)
            .bind(identifier)
            .execute(self.pool)
            .await
            .map_err(|e| DspaceError::Database(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }

    /// Number of users.
    #[cfg(test)]
    pub async fn count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(self.pool)
            .await
            .map_err(|e| DspaceError::Database(e.to_string()))?;
        Ok(count)
    }
}
