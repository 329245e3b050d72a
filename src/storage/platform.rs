//! Remote storage platform seam.
//!
//! The chunk store only needs four things from a message platform: a session,
//! posting one attachment to a channel, reading a message's attachments back,
//! and downloading attachment bytes.

use async_trait::async_trait;
use axum::body::Bytes;

use crate::Result;

/// A storage channel handle.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Channel {
    /// Server (guild) the channel belongs to.
    pub server_id: String,
    /// Channel id.
    pub channel_id: String,
}

impl Channel {
    /// Create a channel handle.
    pub fn new(server_id: impl Into<String>, channel_id: impl Into<String>) -> Self {
        Self {
            server_id: server_id.into(),
            channel_id: channel_id.into(),
        }
    }
}

/// An attachment on a fetched message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    /// Attachment file name (the chunk label).
    pub name: String,
    /// Download URL.
    pub url: String,
}

/// Operations the chunk store needs from a message platform.
///
/// Every method may fail transiently; callers wrap them in a [`super::RetryPolicy`].
#[async_trait]
pub trait StoragePlatform: Send + Sync {
    /// Short backend name for logs.
    fn name(&self) -> &'static str;

    /// Establish the session and resolve the channel pool.
    async fn login(&self) -> Result<Vec<Channel>>;

    /// Post `bytes` as a single attachment named `name`; returns the message id.
    async fn send_attachment(&self, channel: &Channel, bytes: Bytes, name: &str)
        -> Result<String>;

    /// Fetch the attachments of a message.
    async fn fetch_message(&self, channel: &Channel, message_id: &str) -> Result<Vec<Attachment>>;

    /// Download attachment bytes.
    async fn fetch_bytes(&self, url: &str) -> Result<Bytes>;
}
