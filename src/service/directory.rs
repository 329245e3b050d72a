//! Directory listing and versioned tree updates.

use tracing::{debug, warn};

use crate::db::{Database, DirectoryRepository};
use crate::tree::DirectoryNode;
use crate::{DspaceError, Result};

/// Attempts at a read-modify-write before a conflict is reported.
pub const MAX_UPDATE_ATTEMPTS: u32 = 5;

/// Return the whole tree of `user`.
pub async fn get_directory(db: &Database, user: &str) -> Result<DirectoryNode> {
    debug!(user, "Fetching virtual directory");
    DirectoryRepository::new(db.pool())
        .get(user)
        .await?
        .map(|stored| stored.root)
        .ok_or_else(|| DspaceError::NotFound("user directory".to_string()))
}

/// Apply `mutate` to the user's tree and store the result.
///
/// `mutate` returns `None` when it changed nothing; the tree is then not
/// written. When another writer stored a newer version in the meantime the
/// tree is re-read and `mutate` runs again, up to [`MAX_UPDATE_ATTEMPTS`]
/// times. Returns the mutation result and the tree as stored.
pub async fn update_directory<T, F>(
    db: &Database,
    user: &str,
    mut mutate: F,
) -> Result<(Option<T>, DirectoryNode)>
where
    F: FnMut(&mut DirectoryNode) -> Result<Option<T>>,
{
    let repo = DirectoryRepository::new(db.pool());

    for attempt in 1..=MAX_UPDATE_ATTEMPTS {
        let mut stored = repo
            .get(user)
            .await?
            .ok_or_else(|| DspaceError::NotFound("user directory".to_string()))?;

        let Some(value) = mutate(&mut stored.root)? else {
            return Ok((None, stored.root));
        };

        match repo.set(&stored.user_id, &stored.root, stored.version).await {
            Ok(_) => return Ok((Some(value), stored.root)),
            Err(DspaceError::Conflict(reason)) => {
                warn!(user, attempt, %reason, "Directory changed concurrently, retrying");
            }
            Err(e) => return Err(e),
        }
    }

    Err(DspaceError::Conflict(format!(
        "directory of {} kept changing after {} attempts",
        user, MAX_UPDATE_ATTEMPTS
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::UserRepository;
    use crate::tree::{insert_by_path, DirectoryNode};

    async fn setup() -> Database {
        let db = Database::open_in_memory().await.unwrap();
        UserRepository::new(db.pool()).create("alice", "").await.unwrap();
        db
    }

    #[tokio::test]
    async fn test_get_directory() {
        let db = setup().await;
        let root = get_directory(&db, "alice").await.unwrap();
        assert_eq!(root.name, "root");

        let missing = get_directory(&db, "bob").await;
        assert!(matches!(missing, Err(DspaceError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_update_persists() {
        let db = setup().await;
        let (value, root) = update_directory(&db, "alice", |root| {
            insert_by_path(DirectoryNode::file("a", "root/a").with_id("a"), root)?;
            Ok(Some(7))
        })
        .await
        .unwrap();

        assert_eq!(value, Some(7));
        assert_eq!(get_directory(&db, "alice").await.unwrap(), root);
    }

    #[tokio::test]
    async fn test_noop_update_skips_write() {
        let db = setup().await;
        let (value, _) = update_directory::<(), _>(&db, "alice", |_| Ok(None))
            .await
            .unwrap();
        assert!(value.is_none());

        let stored = DirectoryRepository::new(db.pool())
            .get("alice")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.version, 1);
    }

    #[tokio::test]
    async fn test_mutation_error_propagates() {
        let db = setup().await;
        let result = update_directory::<(), _>(&db, "alice", |_| {
            Err(DspaceError::Validation("nope".to_string()))
        })
        .await;
        assert!(matches!(result, Err(DspaceError::Validation(_))));
    }

    #[tokio::test]
    async fn test_concurrent_updates_both_land() {
        let db = std::sync::Arc::new(setup().await);

        let tasks: Vec<_> = ["x", "y", "z"]
            .into_iter()
            .map(|name| {
                let db = db.clone();
                tokio::spawn(async move {
                    update_directory(&db, "alice", |root| {
                        insert_by_path(
                            DirectoryNode::file(name, format!("root/{name}")).with_id(name),
                            root,
                        )?;
                        Ok(Some(()))
                    })
                    .await
                })
            })
            .collect();

        for task in tasks {
            task.await.unwrap().unwrap();
        }

        let root = get_directory(&db, "alice").await.unwrap();
        assert_eq!(root.children().len(), 3);
    }
}
