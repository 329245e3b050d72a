//! Delete orchestration.

use tracing::info;

use super::directory::update_directory;
use crate::db::Database;
use crate::tree::{delete_by_id, DirectoryNode};
use crate::{DspaceError, Result};

/// Result of a delete request.
#[derive(Debug, Clone, PartialEq)]
pub enum DeleteOutcome {
    /// The node was removed; carries the stored tree.
    Deleted(DirectoryNode),
    /// No node had the id. Nothing was written.
    NotFound,
}

/// Remove node `id` and its subtree from `user`'s tree.
///
/// Chunks stay on the platform; only the references are dropped.
pub async fn delete_node(db: &Database, user: &str, id: &str) -> Result<DeleteOutcome> {
    if id.trim().is_empty() {
        return Err(DspaceError::Validation("identifier missing".to_string()));
    }

    info!(user, resource = id, "Deleting resource");

    let (removed, root) = update_directory(db, user, |root| {
        if root.id.as_deref() == Some(id) {
            return Err(DspaceError::Validation(
                "the root directory cannot be deleted".to_string(),
            ));
        }
        Ok(delete_by_id(root, id).then_some(()))
    })
    .await?;

    match removed {
        Some(()) => {
            info!(user, resource = id, "Resource deleted");
            Ok(DeleteOutcome::Deleted(root))
        }
        None => {
            info!(user, resource = id, "Resource not found, nothing to delete");
            Ok(DeleteOutcome::NotFound)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::UserRepository;
    use crate::service::{get_directory, update_directory};
    use crate::tree::insert_by_path;

    async fn setup() -> Database {
        let db = Database::open_in_memory().await.unwrap();
        UserRepository::new(db.pool()).create("alice", "").await.unwrap();
        update_directory(&db, "alice", |root| {
            insert_by_path(
                DirectoryNode::directory("d", "root/d")
                    .with_id("d")
                    .with_child(DirectoryNode::file("f", "root/d/f").with_id("f")),
                root,
            )?;
            insert_by_path(DirectoryNode::file("g", "root/g").with_id("g"), root)?;
            Ok(Some(()))
        })
        .await
        .unwrap();
        db
    }

    #[tokio::test]
    async fn test_delete_directory_subtree() {
        let db = setup().await;
        let outcome = delete_node(&db, "alice", "d").await.unwrap();

        let DeleteOutcome::Deleted(root) = outcome else {
            panic!("expected deletion");
        };
        assert_eq!(root.children().len(), 1);
        assert_eq!(get_directory(&db, "alice").await.unwrap(), root);
    }

    #[tokio::test]
    async fn test_delete_unknown_is_noop() {
        let db = setup().await;
        let before = get_directory(&db, "alice").await.unwrap();

        let outcome = delete_node(&db, "alice", "missing").await.unwrap();
        assert_eq!(outcome, DeleteOutcome::NotFound);
        assert_eq!(get_directory(&db, "alice").await.unwrap(), before);
    }

    #[tokio::test]
    async fn test_delete_root_rejected() {
        let db = setup().await;
        let root = get_directory(&db, "alice").await.unwrap();
        let result = delete_node(&db, "alice", root.id.as_deref().unwrap()).await;
        assert!(matches!(result, Err(DspaceError::Validation(_))));
    }

    #[tokio::test]
    async fn test_delete_validation_and_missing_user() {
        let db = setup().await;
        assert!(matches!(
            delete_node(&db, "alice", " ").await,
            Err(DspaceError::Validation(_))
        ));
        assert!(matches!(
            delete_node(&db, "bob", "x").await,
            Err(DspaceError::NotFound(_))
        ));
    }
}
