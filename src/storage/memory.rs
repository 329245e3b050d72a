//! Process-local storage platform.
//!
//! Keeps messages in memory. Used by the `memory` backend and by tests, which
//! can inject transient failures and random latency to exercise retry and
//! ordering behaviour.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Bytes;
use rand::Rng;

use super::platform::{Attachment, Channel, StoragePlatform};
use crate::{DspaceError, Result};

const MEMORY_SERVER_ID: &str = "1";
const URL_PREFIX: &str = "memory://attachments/";

#[derive(Debug, Default)]
struct Stored {
    /// (channel id, message id) -> attachments
    messages: HashMap<(String, String), Vec<Attachment>>,
    /// attachment url -> bytes
    blobs: HashMap<String, Bytes>,
}

/// In-memory [`StoragePlatform`].
#[derive(Debug)]
pub struct MemoryPlatform {
    channels: Vec<Channel>,
    stored: RwLock<Stored>,
    next_message_id: AtomicU64,
    fail_sends: AtomicUsize,
    fail_fetches: AtomicUsize,
    fail_logins: AtomicUsize,
    max_latency_ms: u64,
    sends: AtomicUsize,
}

impl MemoryPlatform {
    /// Create a platform with `channel_count` channels.
    pub fn new(channel_count: usize) -> Self {
        let channels = (0..channel_count)
            .map(|i| Channel::new(MEMORY_SERVER_ID, format!("{}", 1000 + i)))
            .collect();

        Self {
            channels,
            stored: RwLock::new(Stored::default()),
            next_message_id: AtomicU64::new(1),
            fail_sends: AtomicUsize::new(0),
            fail_fetches: AtomicUsize::new(0),
            fail_logins: AtomicUsize::new(0),
            max_latency_ms: 0,
            sends: AtomicUsize::new(0),
        }
    }

    /// Create a platform whose channel ids are the given strings.
    pub fn with_channel_ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut platform = Self::new(0);
        platform.channels = ids
            .into_iter()
            .map(|id| Channel::new(MEMORY_SERVER_ID, id))
            .collect();
        platform
    }

    /// Delay every send and fetch by a random amount up to `max_latency`.
    pub fn with_random_latency(mut self, max_latency: Duration) -> Self {
        self.max_latency_ms = max_latency.as_millis() as u64;
        self
    }

    /// Make the next `n` sends fail.
    pub fn fail_next_sends(&self, n: usize) {
        self.fail_sends.store(n, Ordering::SeqCst);
    }

    /// Make the next `n` message fetches fail.
    pub fn fail_next_fetches(&self, n: usize) {
        self.fail_fetches.store(n, Ordering::SeqCst);
    }

    /// Make the next `n` logins fail.
    pub fn fail_next_logins(&self, n: usize) {
        self.fail_logins.store(n, Ordering::SeqCst);
    }

    /// Number of successful sends so far.
    pub fn send_count(&self) -> usize {
        self.sends.load(Ordering::SeqCst)
    }

    /// Number of stored messages on `channel_id`.
    pub fn messages_in(&self, channel_id: &str) -> usize {
        self.stored
            .read()
            .map(|s| s.messages.keys().filter(|(c, _)| c == channel_id).count())
            .unwrap_or(0)
    }

    /// Drop the attachments of a message, as if it had been edited.
    pub fn strip_attachments(&self, channel_id: &str, message_id: &str) {
        if let Ok(mut stored) = self.stored.write() {
            if let Some(attachments) = stored
                .messages
                .get_mut(&(channel_id.to_string(), message_id.to_string()))
            {
                attachments.clear();
            }
        }
    }

    fn take_failure(counter: &AtomicUsize) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    async fn simulate_latency(&self) {
        if self.max_latency_ms == 0 {
            return;
        }
        let delay = rand::rng().random_range(0..=self.max_latency_ms);
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }

    fn poisoned() -> DspaceError {
        DspaceError::Platform("memory store lock poisoned".to_string())
    }
}

impl Default for MemoryPlatform {
    fn default() -> Self {
        Self::new(4)
    }
}

#[async_trait]
impl StoragePlatform for MemoryPlatform {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn login(&self) -> Result<Vec<Channel>> {
        if Self::take_failure(&self.fail_logins) {
            return Err(DspaceError::Platform("simulated login failure".to_string()));
        }
        Ok(self.channels.clone())
    }

    async fn send_attachment(&self, channel: &Channel, bytes: Bytes, name: &str) -> Result<String> {
        self.simulate_latency().await;

        if Self::take_failure(&self.fail_sends) {
            return Err(DspaceError::Platform("simulated send failure".to_string()));
        }
        if !self.channels.contains(channel) {
            return Err(DspaceError::Platform(format!(
                "unknown channel {}",
                channel.channel_id
            )));
        }

        let message_id = self.next_message_id.fetch_add(1, Ordering::SeqCst).to_string();
        let url = format!("{URL_PREFIX}{}/{message_id}/{name}", channel.channel_id);

        let mut stored = self.stored.write().map_err(|_| Self::poisoned())?;
        stored.blobs.insert(url.clone(), bytes);
        stored.messages.insert(
            (channel.channel_id.clone(), message_id.clone()),
            vec![Attachment {
                name: name.to_string(),
                url,
            }],
        );
        self.sends.fetch_add(1, Ordering::SeqCst);

        Ok(message_id)
    }

    async fn fetch_message(&self, channel: &Channel, message_id: &str) -> Result<Vec<Attachment>> {
        self.simulate_latency().await;

        if Self::take_failure(&self.fail_fetches) {
            return Err(DspaceError::Platform("simulated fetch failure".to_string()));
        }

        let stored = self.stored.read().map_err(|_| Self::poisoned())?;
        stored
            .messages
            .get(&(channel.channel_id.clone(), message_id.to_string()))
            .cloned()
            .ok_or_else(|| DspaceError::Platform(format!("unknown message {message_id}")))
    }

    async fn fetch_bytes(&self, url: &str) -> Result<Bytes> {
        let stored = self.stored.read().map_err(|_| Self::poisoned())?;
        stored
            .blobs
            .get(url)
            .cloned()
            .ok_or_else(|| DspaceError::Platform(format!("no attachment at {url}")))
    }
}
