//! Streamed zip bundling for directory retrieval.
//!
//! Files are fetched one after another through the [`ChunkStore`] and
//! compressed on the blocking pool. Compressed output is handed to the HTTP
//! body as soon as each entry is written, so a directory never has to be
//! held in memory as a whole.

use std::io::{self, Seek, Write};
use std::sync::{Arc, Mutex};

use axum::body::Bytes;
use futures::Stream;
use tokio::sync::mpsc;
use tracing::{debug, error};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use super::chunk_store::ChunkStore;
use crate::{DspaceError, Result};

/// Compressed bytes buffered between the zip writer and the body stream.
const STREAM_BUFFER: usize = 4;

/// One entry of a directory archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArchiveEntry {
    /// A file stored as chunk links.
    File { path: String, links: Vec<String> },
    /// A directory with no files below it.
    Directory { path: String },
}

impl ArchiveEntry {
    /// Path inside the archive.
    pub fn path(&self) -> &str {
        match self {
            ArchiveEntry::File { path, .. } | ArchiveEntry::Directory { path } => path,
        }
    }
}

/// Zip writer sink that collects output until it is drained.
#[derive(Clone, Default)]
struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    fn drain(&self) -> Bytes {
        match self.0.lock() {
            Ok(mut buf) => Bytes::from(std::mem::take(&mut *buf)),
            Err(_) => Bytes::new(),
        }
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        let mut buf = self
            .0
            .lock()
            .map_err(|_| io::Error::other("archive buffer poisoned"))?;
        buf.extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn archive_error(e: impl std::fmt::Display) -> DspaceError {
    DspaceError::Archive(e.to_string())
}

fn options() -> SimpleFileOptions {
    SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .compression_level(Some(6))
}

fn write_entry<W: Write + Seek>(
    writer: &mut ZipWriter<W>,
    entry: &ArchiveEntry,
    content: Option<Bytes>,
) -> Result<()> {
    match content {
        Some(bytes) => {
            writer
                .start_file(entry.path(), options())
                .map_err(archive_error)?;
            writer.write_all(&bytes)?;
        }
        None => {
            writer
                .add_directory(entry.path(), options())
                .map_err(archive_error)?;
        }
    }
    Ok(())
}

/// Builds zip archives from stored files.
pub struct ArchiveBuilder {
    store: Arc<ChunkStore>,
}

impl ArchiveBuilder {
    pub fn new(store: Arc<ChunkStore>) -> Self {
        Self { store }
    }

    /// Stream a zip of `entries`.
    ///
    /// The stream ends with an error item if a file cannot be retrieved; the
    /// archive is then truncated.
    pub fn stream(
        &self,
        entries: Vec<ArchiveEntry>,
    ) -> impl Stream<Item = io::Result<Bytes>> + Send + 'static {
        let (tx, rx) = mpsc::channel(STREAM_BUFFER);
        let store = self.store.clone();

        tokio::spawn(async move {
            if let Err(e) = write_archive(store, entries, &tx).await {
                error!("Archive stream aborted: {}", e);
                let _ = tx.send(Err(io::Error::other(e.to_string()))).await;
            }
        });

        futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|item| (item, rx))
        })
    }

    /// Build the whole archive in memory.
    #[cfg(test)]
    pub async fn to_bytes(&self, entries: Vec<ArchiveEntry>) -> Result<Bytes> {
        use futures::StreamExt;

        let mut stream = Box::pin(self.stream(entries));
        let mut out = Vec::new();
        while let Some(chunk) = stream.next().await {
            out.extend_from_slice(&chunk.map_err(archive_error)?);
        }
        Ok(Bytes::from(out))
    }
}

async fn write_archive(
    store: Arc<ChunkStore>,
    entries: Vec<ArchiveEntry>,
    tx: &mpsc::Sender<io::Result<Bytes>>,
) -> Result<()> {
    let sink = SharedBuffer::default();
    let mut writer = ZipWriter::new_stream(sink.clone());

    for entry in entries {
        let content = match &entry {
            ArchiveEntry::File { links, .. } => Some(store.retrieve(links.as_slice()).await?.bytes),
            ArchiveEntry::Directory { .. } => None,
        };

        debug!(path = entry.path(), "Adding archive entry");
        writer = tokio::task::spawn_blocking(move || {
            write_entry(&mut writer, &entry, content).map(|()| writer)
        })
        .await
        .map_err(archive_error)??;

        let chunk = sink.drain();
        if !chunk.is_empty() && tx.send(Ok(chunk)).await.is_err() {
            debug!("Archive receiver dropped, stopping");
            return Ok(());
        }
    }

    tokio::task::spawn_blocking(move || writer.finish().map(|_| ()).map_err(archive_error))
        .await
        .map_err(archive_error)??;

    let tail = sink.drain();
    if !tail.is_empty() {
        let _ = tx.send(Ok(tail)).await;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MemoryPlatform, RetryPolicy};
    use std::io::{Cursor, Read};
    use std::time::Duration;

    async fn store() -> Arc<ChunkStore> {
        let platform = Arc::new(MemoryPlatform::new(2));
        Arc::new(
            ChunkStore::connect(
                platform,
                &RetryPolicy::fixed(Duration::from_millis(1)),
                RetryPolicy::fixed(Duration::from_millis(1)).with_max_attempts(2),
                4,
            )
            .await
            .unwrap(),
        )
    }

    async fn stored_file(store: &ChunkStore, path: &str, content: &[u8]) -> ArchiveEntry {
        let links = store
            .upload(Bytes::copy_from_slice(content), path)
            .await
            .unwrap()
            .iter()
            .map(|l| l.encode())
            .collect();
        ArchiveEntry::File {
            path: path.to_string(),
            links,
        }
    }

    fn read_entry(archive: &mut zip::ZipArchive<Cursor<Vec<u8>>>, name: &str) -> String {
        let mut file = archive.by_name(name).unwrap();
        let mut out = String::new();
        file.read_to_string(&mut out).unwrap();
        out
    }

    #[tokio::test]
    async fn test_archive_contains_relative_paths() {
        let store = store().await;
        let entries = vec![
            stored_file(&store, "a.txt", b"alpha contents").await,
            stored_file(&store, "sub/b.txt", b"beta").await,
        ];

        let bytes = ArchiveBuilder::new(store).to_bytes(entries).await.unwrap();
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes.to_vec())).unwrap();

        assert_eq!(archive.len(), 2);
        assert_eq!(read_entry(&mut archive, "a.txt"), "alpha contents");
        assert_eq!(read_entry(&mut archive, "sub/b.txt"), "beta");
    }

    #[tokio::test]
    async fn test_empty_archive_is_valid() {
        let store = store().await;
        let bytes = ArchiveBuilder::new(store).to_bytes(Vec::new()).await.unwrap();

        let archive = zip::ZipArchive::new(Cursor::new(bytes.to_vec())).unwrap();
        assert_eq!(archive.len(), 0);
    }

    #[tokio::test]
    async fn test_empty_directory_entry() {
        let store = store().await;
        let entries = vec![ArchiveEntry::Directory {
            path: "empty".to_string(),
        }];

        let bytes = ArchiveBuilder::new(store).to_bytes(entries).await.unwrap();
        let archive = zip::ZipArchive::new(Cursor::new(bytes.to_vec())).unwrap();

        assert_eq!(archive.len(), 1);
        assert!(archive.file_names().any(|n| n.trim_end_matches('/') == "empty"));
    }

    #[tokio::test]
    async fn test_unretrievable_file_ends_stream_with_error() {
        let store = store().await;
        let entries = vec![ArchiveEntry::File {
            path: "missing.txt".to_string(),
            links: vec!["https://discord.com/channels/1/1000/999999".to_string()],
        }];

        let result = ArchiveBuilder::new(store).to_bytes(entries).await;
        assert!(matches!(result, Err(DspaceError::Archive(_))));
    }
}
