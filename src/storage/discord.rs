//! Discord REST backend.

use std::time::Duration;

use async_trait::async_trait;
use axum::body::Bytes;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response};
use serde::Deserialize;
use tracing::{debug, info};

use super::platform::{Attachment, Channel, StoragePlatform};
use crate::config::StorageConfig;
use crate::{DspaceError, Result};

/// User agent sent with every request.
const USER_AGENT: &str = "DiscordBot (dspace, 0.1)";

#[derive(Debug, Deserialize)]
struct CurrentUser {
    id: String,
    username: String,
}

#[derive(Debug, Deserialize)]
struct ChannelInfo {
    id: String,
    guild_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MessageInfo {
    id: String,
    #[serde(default)]
    attachments: Vec<AttachmentInfo>,
}

#[derive(Debug, Deserialize)]
struct AttachmentInfo {
    filename: String,
    url: String,
}

/// [`StoragePlatform`] over the Discord bot REST API.
pub struct DiscordPlatform {
    client: Client,
    /// Attachment downloads go to the CDN without the bot token.
    downloads: Client,
    api_base: String,
    channel_ids: Vec<String>,
}

impl DiscordPlatform {
    /// Build a client from the storage configuration.
    pub fn new(config: &StorageConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        let mut auth = HeaderValue::from_str(&format!("Bot {}", config.token))
            .map_err(|e| DspaceError::Config(format!("invalid bot token: {}", e)))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);

        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| DspaceError::Config(format!("failed to create HTTP client: {}", e)))?;

        let downloads = Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| DspaceError::Config(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            downloads,
            api_base: config.api_base_url.trim_end_matches('/').to_string(),
            channel_ids: config.channels.clone(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.api_base, path)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self
            .client
            .get(self.endpoint(path))
            .send()
            .await
            .map_err(|e| DspaceError::Platform(format!("GET {}: {}", path, e)))?;

        check_status(response, path)
            .await?
            .json()
            .await
            .map_err(|e| DspaceError::Platform(format!("GET {}: invalid body: {}", path, e)))
    }
}

async fn check_status(response: Response, what: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(DspaceError::Platform(format!(
        "{}: HTTP {}: {}",
        what,
        status,
        body.chars().take(200).collect::<String>()
    )))
}

#[async_trait]
impl StoragePlatform for DiscordPlatform {
    fn name(&self) -> &'static str {
        "discord"
    }

    async fn login(&self) -> Result<Vec<Channel>> {
        let me: CurrentUser = self.get_json("/users/@me").await?;
        info!(bot = %me.username, id = %me.id, "Authenticated with Discord");

        let mut channels = Vec::with_capacity(self.channel_ids.len());
        for id in &self.channel_ids {
            let info: ChannelInfo = self.get_json(&format!("/channels/{}", id)).await?;
            let guild_id = info.guild_id.ok_or_else(|| {
                DspaceError::Config(format!("channel {} does not belong to a server", id))
            })?;
            debug!(channel = %info.id, server = %guild_id, "Channel resolved");
            channels.push(Channel::new(guild_id, info.id));
        }

        Ok(channels)
    }

    async fn send_attachment(&self, channel: &Channel, bytes: Bytes, name: &str) -> Result<String> {
        let path = format!("/channels/{}/messages", channel.channel_id);
        let payload = serde_json::json!({
            "attachments": [{ "id": 0, "filename": name }]
        });

        let part = Part::stream(reqwest::Body::from(bytes)).file_name(name.to_string());
        let form = Form::new()
            .text("payload_json", payload.to_string())
            .part("files[0]", part);

        let response = self
            .client
            .post(self.endpoint(&path))
            .multipart(form)
            .send()
            .await
            .map_err(|e| DspaceError::Platform(format!("POST {}: {}", path, e)))?;

        let message: MessageInfo = check_status(response, &path)
            .await?
            .json()
            .await
            .map_err(|e| DspaceError::Platform(format!("POST {}: invalid body: {}", path, e)))?;

        Ok(message.id)
    }

    async fn fetch_message(&self, channel: &Channel, message_id: &str) -> Result<Vec<Attachment>> {
        let path = format!("/channels/{}/messages/{}", channel.channel_id, message_id);
        let message: MessageInfo = self.get_json(&path).await?;

        Ok(message
            .attachments
            .into_iter()
            .map(|a| Attachment {
                name: a.filename,
                url: a.url,
            })
            .collect())
    }

    async fn fetch_bytes(&self, url: &str) -> Result<Bytes> {
        let response = self
            .downloads
            .get(url)
            .send()
            .await
            .map_err(|e| DspaceError::Platform(format!("download failed: {}", e)))?;

        check_status(response, "attachment download")
            .await?
            .bytes()
            .await
            .map_err(|e| DspaceError::Platform(format!("download failed: {}", e)))
    }
}
