//! Upload orchestration.
//!
//! An upload carries a declared structure (a directory or file node, as the
//! client wants it to appear in its tree) and the file contents. Every
//! uploaded file must match exactly one declared file by name. Contents go
//! to the chunk store first; the structure with its links is then merged
//! into the user's tree by path.

use std::collections::HashSet;
use std::time::{Duration, Instant};

use axum::body::Bytes;
use futures::future::try_join_all;
use tracing::{debug, info};

use super::directory::update_directory;
use crate::db::{Database, DirectoryRepository};
use crate::storage::{ChunkLocator, ChunkStore};
use crate::tree::{
    assign_ids, descendants, insert_by_path, merge_child, validate_names, DirectoryNode, NodeKind,
};
use crate::{DspaceError, Result};

/// One uploaded file.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    /// File name as sent by the client.
    pub name: String,
    /// File content.
    pub content: Bytes,
}

impl UploadedFile {
    pub fn new(name: impl Into<String>, content: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }
}

/// An upload request.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    /// Declared structure the files belong to.
    pub structure: DirectoryNode,
    /// File contents.
    pub files: Vec<UploadedFile>,
}

/// Result of a completed upload.
#[derive(Debug, Clone)]
pub struct UploadOutcome {
    /// The user's tree after the merge.
    pub directory: DirectoryNode,
    /// Wall time from request start to stored tree.
    pub elapsed: Duration,
    /// Number of files stored.
    pub files: usize,
    /// Total number of chunks sent.
    pub chunks: usize,
}

/// Coordinates chunk uploads and tree merges.
pub struct UploadService<'a> {
    db: &'a Database,
    store: &'a ChunkStore,
}

impl<'a> UploadService<'a> {
    pub fn new(db: &'a Database, store: &'a ChunkStore) -> Self {
        Self { db, store }
    }

    /// Store `request` for `user`.
    ///
    /// All validation happens before the first chunk is sent.
    pub async fn upload(&self, user: &str, request: UploadRequest) -> Result<UploadOutcome> {
        let started = Instant::now();
        let UploadRequest {
            mut structure,
            files,
        } = request;

        info!(user, files = files.len(), "Starting upload");

        validate_names(&structure)?;
        match_declared_files(&structure, &files)?;

        let mut current = DirectoryRepository::new(self.db.pool())
            .get(user)
            .await?
            .ok_or_else(|| DspaceError::NotFound("user directory".to_string()))?
            .root;

        // Name clashes with the stored tree must fail before any chunk is sent.
        // The real merge below repeats this against the tree current at write time.
        merge_structure(structure.clone(), &mut current)?;

        assign_ids(&mut structure);

        let uploads = files.iter().map(|file| async move {
            let links = self.store.upload(file.content.clone(), &file.name).await?;
            Ok::<_, DspaceError>((file.name.as_str(), links))
        });
        let uploaded = try_join_all(uploads).await?;

        let mut chunks = 0;
        for (name, links) in uploaded {
            chunks += links.len();
            let links = links.iter().map(ChunkLocator::encode).collect();
            if let Some(node) = find_declared_file(&mut structure, name) {
                node.set_links(links);
            }
        }

        let (_, directory) = update_directory(self.db, user, |root| {
            merge_structure(structure.clone(), root)?;
            Ok(Some(()))
        })
        .await?;

        let elapsed = started.elapsed();
        info!(
            user,
            files = files.len(),
            chunks,
            elapsed_ms = elapsed.as_millis() as u64,
            "Upload complete"
        );

        Ok(UploadOutcome {
            directory,
            elapsed,
            files: files.len(),
            chunks,
        })
    }
}

/// Merge a declared structure into `root`.
///
/// A structure declared as the root itself contributes its children.
fn merge_structure(structure: DirectoryNode, root: &mut DirectoryNode) -> Result<()> {
    if structure.path != root.path {
        return insert_by_path(structure, root);
    }

    match structure.kind {
        NodeKind::Directory { children } => {
            for child in children {
                merge_child(root, child)?;
            }
            Ok(())
        }
        NodeKind::File { .. } => Err(DspaceError::Validation(format!(
            "{} is the root directory path",
            structure.path
        ))),
    }
}

/// First file node in pre-order named `name`.
fn find_declared_file<'n>(node: &'n mut DirectoryNode, name: &str) -> Option<&'n mut DirectoryNode> {
    if node.is_file() {
        return (node.name == name).then_some(node);
    }
    node.children_mut()?
        .iter_mut()
        .find_map(|child| find_declared_file(child, name))
}

/// Check that uploaded files and declared file nodes pair up one to one.
fn match_declared_files(structure: &DirectoryNode, files: &[UploadedFile]) -> Result<()> {
    let mut declared: Vec<&str> = Vec::new();
    if structure.is_file() {
        declared.push(&structure.name);
    }
    declared.extend(
        descendants(structure)
            .into_iter()
            .filter(|(_, node)| node.is_file())
            .map(|(_, node)| node.name.as_str()),
    );

    let mut seen = HashSet::new();
    for name in &declared {
        if !seen.insert(*name) {
            return Err(DspaceError::Validation(format!(
                "file name {} is declared more than once",
                name
            )));
        }
    }

    let mut uploaded = HashSet::new();
    for file in files {
        if !uploaded.insert(file.name.as_str()) {
            return Err(DspaceError::Validation(format!(
                "file {} was uploaded more than once",
                file.name
            )));
        }
        if !seen.contains(file.name.as_str()) {
            return Err(DspaceError::Validation(format!(
                "file {} does not match any file in the directory structure",
                file.name
            )));
        }
    }

    if let Some(missing) = declared.iter().find(|name| !uploaded.contains(**name)) {
        return Err(DspaceError::Validation(format!(
            "declared file {} was not uploaded",
            missing
        )));
    }

    debug!(files = files.len(), "Declared structure matches uploaded files");
    Ok(())
}
