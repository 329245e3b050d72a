//! Chunked file upload and ordered reassembly.

use std::sync::Arc;

use axum::body::Bytes;
use futures::stream::{FuturesUnordered, StreamExt};
use tracing::{debug, info};

use super::distributor::ChannelDistributor;
use super::label::ChunkLabel;
use super::locator::ChunkLocator;
use super::platform::StoragePlatform;
use super::retry::RetryPolicy;
use crate::{DspaceError, Result};

/// A file rebuilt from its chunks.
#[derive(Debug, Clone)]
pub struct RetrievedFile {
    /// Extension recovered from the first chunk's label.
    pub extension: Option<String>,
    /// File content.
    pub bytes: Bytes,
}

/// Splits files into chunks spread over the channel pool and puts them back together.
pub struct ChunkStore {
    platform: Arc<dyn StoragePlatform>,
    distributor: ChannelDistributor,
    retry: RetryPolicy,
    chunk_size: usize,
}

impl ChunkStore {
    /// Create a chunk store.
    ///
    /// `chunk_size` is in bytes and must be at least 1.
    pub fn new(
        platform: Arc<dyn StoragePlatform>,
        distributor: ChannelDistributor,
        retry: RetryPolicy,
        chunk_size: usize,
    ) -> Result<Self> {
        if chunk_size == 0 {
            return Err(DspaceError::Config("chunk size must be at least 1 byte".to_string()));
        }

        Ok(Self {
            platform,
            distributor,
            retry,
            chunk_size,
        })
    }

    /// Log in to the platform (retrying per `login_policy`) and build a store
    /// over the channel pool it returns.
    pub async fn connect(
        platform: Arc<dyn StoragePlatform>,
        login_policy: &RetryPolicy,
        retry: RetryPolicy,
        chunk_size: usize,
    ) -> Result<Self> {
        info!(backend = platform.name(), "Attempting to log in");
        let channels = login_policy
            .run("platform login", || platform.login())
            .await?;
        info!(
            backend = platform.name(),
            channels = channels.len(),
            "Logged in, channel pool ready"
        );

        let distributor = ChannelDistributor::new(channels)?;
        Self::new(platform, distributor, retry, chunk_size)
    }

    /// Chunk size in bytes.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// The channel distributor.
    pub fn distributor(&self) -> &ChannelDistributor {
        &self.distributor
    }

    /// Number of chunks a file of `len` bytes is split into.
    pub fn chunk_count(&self, len: usize) -> usize {
        len.div_ceil(self.chunk_size)
    }

    /// Upload `bytes` and return its locators in chunk-index order.
    ///
    /// Chunks are sent concurrently. Each result is written into the slot of
    /// its chunk index, so completion order never affects the returned order.
    pub async fn upload(&self, bytes: Bytes, file_name: &str) -> Result<Vec<ChunkLocator>> {
        let count = self.chunk_count(bytes.len());
        info!(file = file_name, size = bytes.len(), chunks = count, "Uploading file");

        let mut pending: FuturesUnordered<_> = (0..count)
            .map(|index| {
                let start = index * self.chunk_size;
                let end = (start + self.chunk_size).min(bytes.len());
                let chunk = bytes.slice(start..end);
                let label = ChunkLabel::new(file_name, index, count).to_string();
                async move { (index, self.upload_chunk(chunk, label).await) }
            })
            .collect();

        let mut slots: Vec<Option<ChunkLocator>> = vec![None; count];
        while let Some((index, result)) = pending.next().await {
            slots[index] = Some(result?);
        }

        info!(file = file_name, chunks = count, "Upload complete");
        slots
            .into_iter()
            .enumerate()
            .map(|(index, slot)| {
                slot.ok_or_else(|| DspaceError::Platform(format!("chunk {index} missing")))
            })
            .collect()
    }

    async fn upload_chunk(&self, chunk: Bytes, label: String) -> Result<ChunkLocator> {
        let locator = self
            .retry
            .run("chunk upload", || {
                let chunk = chunk.clone();
                let label = label.as_str();
                async move {
                    let channel = self.distributor.next();
                    let message_id = self
                        .platform
                        .send_attachment(&channel, chunk, label)
                        .await?;
                    Ok(ChunkLocator::new(&channel, message_id))
                }
            })
            .await?;

        debug!(chunk = %label, link = %locator, "Chunk uploaded");
        Ok(locator)
    }

    /// Rebuild a file from its locators.
    ///
    /// All links are decoded before any download starts, so a malformed link
    /// fails the call without retrying. Downloads run concurrently and are
    /// concatenated strictly in the order of `links`.
    pub async fn retrieve<S: AsRef<str>>(&self, links: &[S]) -> Result<RetrievedFile> {
        let locators = links
            .iter()
            .map(|link| ChunkLocator::parse(link.as_ref()))
            .collect::<Result<Vec<_>>>()?;

        debug!(chunks = locators.len(), "Beginning file retrieval");

        let mut pending: FuturesUnordered<_> = locators
            .iter()
            .enumerate()
            .map(|(index, locator)| async move { (index, self.retrieve_chunk(locator).await) })
            .collect();

        let mut slots: Vec<Option<(String, Bytes)>> = vec![None; locators.len()];
        while let Some((index, result)) = pending.next().await {
            slots[index] = Some(result?);
        }

        let mut chunks = Vec::with_capacity(slots.len());
        for (index, slot) in slots.into_iter().enumerate() {
            chunks.push(
                slot.ok_or_else(|| DspaceError::Platform(format!("chunk {index} missing")))?,
            );
        }

        let extension = chunks
            .first()
            .and_then(|(name, _)| ChunkLabel::parse(name))
            .and_then(|label| label.extension);

        let total: usize = chunks.iter().map(|(_, b)| b.len()).sum();
        let mut buffer = Vec::with_capacity(total);
        for (_, bytes) in &chunks {
            buffer.extend_from_slice(bytes);
        }

        debug!(chunks = chunks.len(), size = total, "File retrieval complete");
        Ok(RetrievedFile {
            extension,
            bytes: Bytes::from(buffer),
        })
    }

    async fn retrieve_chunk(&self, locator: &ChunkLocator) -> Result<(String, Bytes)> {
        let channel = &locator.channel();
        let platform = &self.platform;

        let (name, bytes) = self
            .retry
            .run("chunk download", || async move {
                let attachments = platform
                    .fetch_message(channel, &locator.message_id)
                    .await?;
                let attachment = attachments.into_iter().next().ok_or_else(|| {
                    DspaceError::Platform(format!("no attachment found for {locator}"))
                })?;
                let bytes = platform.fetch_bytes(&attachment.url).await?;
                Ok((attachment.name, bytes))
            })
            .await?;

        debug!(chunk = %name, link = %locator, "Chunk retrieved");
        Ok((name, bytes))
    }
}
