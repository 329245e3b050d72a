//! Directory documents.
//!
//! Each user's tree is stored as one JSON document with a version counter.
//! Writers pass the version they read; a stale version is rejected with
//! [`DspaceError::Conflict`] instead of overwriting a concurrent change.

use sqlx::SqlitePool;
use tracing::debug;

use crate::tree::DirectoryNode;
use crate::{DspaceError, Result};

/// A user's directory tree as read from the database.
#[derive(Debug, Clone)]
pub struct StoredDirectory {
    /// Owning user id.
    pub user_id: String,
    /// Root of the tree.
    pub root: DirectoryNode,
    /// Version to pass back to [`DirectoryRepository::set`].
    pub version: i64,
}

/// Repository for directory documents.
pub struct DirectoryRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> DirectoryRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Read the tree of the user matching `identifier` (username, email or id).
    pub async fn get(&self, identifier: &str) -> Result<Option<StoredDirectory>> {
        let row: Option<(String, String, i64)> = sqlx::query_as(
            "SELECT id, directory, version FROM users
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

        let Some((user_id, directory, version)) = row else {
            debug!(user = identifier, "No directory for user");
            return Ok(None);
        };

        Ok(Some(StoredDirectory {
            user_id,
            root: serde_json::from_str(&directory)?,
            version,
        }))
    }

    /// Replace the tree of `user_id` if it is still at `expected_version`.
    ///
    /// Returns the new version.
    pub async fn set(&self, user_id: &str, root: &DirectoryNode, expected_version: i64) -> Result<i64> {
        let directory = serde_json::to_string(root)?;

        let result = sqlx::query(
            "UPDATE users SET directory = ?, version = version + 1, updated_at = datetime('now')
             WHERE id = ? AND version = ?",
        )
        .bind(&directory)
        .bind(user_id)
        .bind(expected_version)
        .execute(self.pool)
        .await
        .map_err(|e| DspaceError::Database(e.to_string()))?;

        if result.rows_affected() == 0 {
            let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE id = ?)")
                .bind(user_id)
                .fetch_one(self.pool)
                .await
                .map_err(|e| DspaceError::Database(e.to_string()))?;

            return Err(if exists {
                DspaceError::Conflict(format!(
                    "directory changed since version {}",
                    expected_version
                ))
            } else {
                DspaceError::NotFound("user".to_string())
            });
        }

        debug!(user = user_id, version = expected_version + 1, "Directory updated");
        Ok(expected_version + 1)
    }
}
