//! Discord destination. Sends through the REST API; no gateway session is needed
//! for a send-only relay.

use std::sync::OnceLock;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, warn};

use super::Destination;
use crate::config::DiscordConfig;
use crate::error::RelayError;
use crate::relay::StagedFile;

const DISCORD_MAX_MESSAGE_LEN: usize = 2000;

#[derive(Debug, Clone, Deserialize)]
struct DiscordUser {
    id: String,
    username: String,
}

/// Channel handle resolved once at startup.
#[derive(Debug, Clone, Deserialize)]
pub struct ResolvedChannel {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
}

pub struct DiscordSender {
    config: DiscordConfig,
    client: Client,
    /// `Some(None)` once resolution has been attempted and failed.
    channel: OnceLock<Option<ResolvedChannel>>,
}

impl DiscordSender {
    pub fn new(config: DiscordConfig) -> Self {
        Self {
            config,
            client: Client::new(),
            channel: OnceLock::new(),
        }
    }

    fn auth_header(&self) -> String {
        format!("Bot {}", self.config.bot_token)
    }

    async fn fetch_current_user(&self) -> Result<DiscordUser, RelayError> {
        let resp = self
            .client
            .get(format!("{}/users/@me", self.config.api_base))
            .header("Authorization", self.auth_header())
            .send()
            .await?;
        let resp = check_status(resp).await?;
        Ok(resp.json().await?)
    }

    async fn lookup_channel(&self) -> Result<ResolvedChannel, RelayError> {
        let resp = self
            .client
            .get(format!(
                "{}/channels/{}",
                self.config.api_base, self.config.channel_id
            ))
            .header("Authorization", self.auth_header())
            .send()
            .await?;
        let resp = check_status(resp).await?;
        Ok(resp.json().await?)
    }

    /// Resolve the destination channel. Only the first call does any I/O.
    pub async fn resolve(&self) -> Option<&ResolvedChannel> {
        if let Some(resolved) = self.channel.get() {
            return resolved.as_ref();
        }

        let resolved = match self.lookup_channel().await {
            Ok(channel) => {
                info!(
                    "Found Discord channel: #{} (ID: {})",
                    channel.name.as_deref().unwrap_or("unnamed"),
                    channel.id
                );
                Some(channel)
            }
            Err(e) => {
                warn!(
                    "Could not find Discord channel with ID {}: {}",
                    self.config.channel_id, e
                );
                None
            }
        };

        self.channel.get_or_init(|| resolved).as_ref()
    }

    fn resolved_channel(&self) -> Result<&ResolvedChannel, RelayError> {
        self.channel
            .get()
            .and_then(Option::as_ref)
            .ok_or(RelayError::ChannelUnresolved(self.config.channel_id))
    }
}

async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, RelayError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(RelayError::Api {
        status: status.as_u16(),
        body,
    })
}

/// Cut `text` to Discord's message limit at a character boundary.
fn truncate_content(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut truncated: String = text.chars().take(max_chars.saturating_sub(1)).collect();
    truncated.push('…');
    truncated
}

#[async_trait]
impl Destination for DiscordSender {
    async fn on_ready(&self) {
        match self.fetch_current_user().await {
            Ok(user) => info!("Discord bot logged in as {} (ID: {})", user.username, user.id),
            Err(e) => warn!("Failed to fetch Discord bot identity: {}", e),
        }

        if self.resolve().await.is_some() {
            info!("Ready to relay messages");
        } else {
            warn!("Relaying is disabled until the Discord channel is reachable and the bot restarts");
        }
    }

    async fn send(&self, text: &str, attachment: Option<&StagedFile>) -> Result<(), RelayError> {
        let channel = self.resolved_channel()?;

        if text.is_empty() && attachment.is_none() {
            return Err(RelayError::EmptyPayload);
        }

        let content = truncate_content(text, DISCORD_MAX_MESSAGE_LEN);
        let url = format!("{}/channels/{}/messages", self.config.api_base, channel.id);

        let request = match attachment {
            Some(file) => {
                let bytes = tokio::fs::read(&file.local_path).await.map_err(|source| {
                    RelayError::FileRead {
                        path: file.local_path.clone(),
                        source,
                    }
                })?;
                debug!(
                    "Uploading {} ({} bytes) to Discord",
                    file.display_name,
                    bytes.len()
                );
                let form = Form::new()
                    .percent_encode_noop()
                    .text("payload_json", json!({ "content": content }).to_string())
                    .part("files[0]", Part::bytes(bytes).file_name(file.display_name.clone()));
                self.client.post(&url).multipart(form)
            }
            None => self.client.post(&url).json(&json!({ "content": content })),
        };

        let resp = request
            .header("Authorization", self.auth_header())
            .send()
            .await?;
        check_status(resp).await?;

        debug!(
            "Sent to Discord: {}",
            content.chars().take(80).collect::<String>()
        );
        Ok(())
    }
}
