//! Retrieval orchestration.

use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;

use axum::body::Bytes;
use futures::Stream;
use tracing::info;

use crate::db::Database;
use crate::storage::{ArchiveBuilder, ArchiveEntry, ChunkStore};
use crate::tree::{descendants, find_by_field, DirectoryNode, NodeField, NodeKind};
use crate::{DspaceError, Result};

/// Streamed archive body.
pub type ArchiveStream = Pin<Box<dyn Stream<Item = io::Result<Bytes>> + Send>>;

/// What a retrieval produced.
pub enum Retrieval {
    /// A single file, fully reassembled.
    File {
        /// Node name.
        name: String,
        /// Extension recovered from the stored chunks.
        extension: Option<String>,
        content: Bytes,
    },
    /// A directory, as a zip stream.
    Archive { name: String, stream: ArchiveStream },
}

impl std::fmt::Debug for Retrieval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Retrieval::File {
                name,
                extension,
                content,
            } => f
                .debug_struct("File")
                .field("name", name)
                .field("extension", extension)
                .field("size", &content.len())
                .finish(),
            Retrieval::Archive { name, .. } => {
                f.debug_struct("Archive").field("name", name).finish()
            }
        }
    }
}

/// Archive entries for every file and empty directory below `node`.
///
/// Paths are relative to `node`.
pub fn archive_entries(node: &DirectoryNode) -> Vec<ArchiveEntry> {
    descendants(node)
        .into_iter()
        .filter_map(|(path, child)| match &child.kind {
            NodeKind::File { links } => Some(ArchiveEntry::File {
                path,
                links: links.clone(),
            }),
            NodeKind::Directory { children } if children.is_empty() => {
                Some(ArchiveEntry::Directory { path })
            }
            NodeKind::Directory { .. } => None,
        })
        .collect()
}

/// Looks up stored nodes and rebuilds their content.
pub struct RetrievalService<'a> {
    db: &'a Database,
    store: &'a Arc<ChunkStore>,
}

impl<'a> RetrievalService<'a> {
    pub fn new(db: &'a Database, store: &'a Arc<ChunkStore>) -> Self {
        Self { db, store }
    }

    /// Retrieve the node `id` from `user`'s tree.
    pub async fn retrieve(&self, user: &str, id: &str) -> Result<Retrieval> {
        if id.trim().is_empty() {
            return Err(DspaceError::Validation("identifier missing".to_string()));
        }

        info!(user, resource = id, "Starting retrieval");
        let started = Instant::now();

        let root = super::get_directory(self.db, user).await?;
        let node = find_by_field(&root, NodeField::Id, id)
            .ok_or_else(|| DspaceError::NotFound("resource".to_string()))?;

        match &node.kind {
            NodeKind::File { links } => {
                let file = self.store.retrieve(links.as_slice()).await?;
                info!(
                    user,
                    resource = id,
                    size = file.bytes.len(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "File retrieved"
                );
                Ok(Retrieval::File {
                    name: node.name.clone(),
                    extension: file.extension,
                    content: file.bytes,
                })
            }
            NodeKind::Directory { .. } => {
                let entries = archive_entries(node);
                info!(
                    user,
                    resource = id,
                    entries = entries.len(),
                    "Streaming directory archive"
                );
                let stream = ArchiveBuilder::new(self.store.clone()).stream(entries);
                Ok(Retrieval::Archive {
                    name: node.name.clone(),
                    stream: Box::pin(stream),
                })
            }
        }
    }
}
