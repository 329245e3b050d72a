//! Chunk locator codec.
//!
//! A locator is the only durable reference to a stored chunk. It is persisted
//! in string form inside a file node's `links`, so the format must stay stable:
//!
//! ```text
//! https://discord.com/channels/<server_id>/<channel_id>/<message_id>
//! ```

use std::fmt;
use std::str::FromStr;

use url::Url;

use super::platform::Channel;
use crate::{DspaceError, Result};

const LINK_HOST: &str = "discord.com";
const LINK_PREFIX: &str = "channels";

/// Where one chunk lives: the message carrying it as an attachment.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChunkLocator {
    /// Server (guild) id.
    pub server_id: String,
    /// Channel id.
    pub channel_id: String,
    /// Message id.
    pub message_id: String,
}

impl ChunkLocator {
    /// Create a locator for a message posted to `channel`.
    pub fn new(channel: &Channel, message_id: impl Into<String>) -> Self {
        Self {
            server_id: channel.server_id.clone(),
            channel_id: channel.channel_id.clone(),
            message_id: message_id.into(),
        }
    }

    /// The channel holding the chunk.
    pub fn channel(&self) -> Channel {
        Channel::new(&self.server_id, &self.channel_id)
    }

    /// Decode a locator from its string form.
    pub fn parse(link: &str) -> Result<Self> {
        let url = Url::parse(link).map_err(|e| DspaceError::Locator(format!("{link}: {e}")))?;

        if url.scheme() != "https" || url.host_str() != Some(LINK_HOST) {
            return Err(DspaceError::Locator(format!("{link}: unexpected origin")));
        }

        let segments: Vec<&str> = url
            .path_segments()
            .map(|s| s.collect())
            .unwrap_or_default();

        match segments.as_slice() {
            [LINK_PREFIX, server, channel, message]
                if is_snowflake(server) && is_snowflake(channel) && is_snowflake(message) =>
            {
                Ok(Self {
                    server_id: server.to_string(),
                    channel_id: channel.to_string(),
                    message_id: message.to_string(),
                })
            }
            _ => Err(DspaceError::Locator(format!(
                "{link}: expected /{LINK_PREFIX}/<server>/<channel>/<message>"
            ))),
        }
    }

    /// Encode a locator to its persisted string form.
    pub fn encode(&self) -> String {
        self.to_string()
    }
}

fn is_snowflake(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

impl fmt::Display for ChunkLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "https://{LINK_HOST}/{LINK_PREFIX}/{}/{}/{}",
            self.server_id, self.channel_id, self.message_id
        )
    }
}

impl FromStr for ChunkLocator {
    type Err = DspaceError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}
