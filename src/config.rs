use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::RelayError;

pub const TELEGRAM_TOKEN_VAR: &str = "TELEGRAM_BOT_TOKEN";
pub const DISCORD_TOKEN_VAR: &str = "DISCORD_BOT_TOKEN";
pub const DISCORD_CHANNEL_VAR: &str = "DISCORD_CHANNEL_ID";

#[derive(Debug, Clone)]
pub struct Config {
    pub telegram: TelegramConfig,
    pub discord: DiscordConfig,
    pub relay: RelayConfig,
}

#[derive(Debug, Clone)]
pub struct TelegramConfig {
    pub bot_token: String,
    /// When set, only messages from this chat are relayed.
    pub source_chat_id: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct DiscordConfig {
    pub bot_token: String,
    pub channel_id: u64,
    pub api_base: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RelayConfig {
    /// Token prepended to every forwarded message to alert the channel.
    #[serde(default = "default_mention")]
    pub mention: String,
    #[serde(default = "default_staging_dir")]
    pub staging_dir: PathBuf,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            mention: default_mention(),
            staging_dir: default_staging_dir(),
        }
    }
}

/// Non-secret knobs read from the optional TOML settings file.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct FileSettings {
    #[serde(default)]
    pub relay: RelayConfig,
    #[serde(default)]
    pub telegram: TelegramSettings,
    #[serde(default)]
    pub discord: DiscordSettings,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct TelegramSettings {
    #[serde(default)]
    pub source_chat_id: Option<i64>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DiscordSettings {
    #[serde(default = "default_api_base")]
    pub api_base: String,
}

impl Default for DiscordSettings {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
        }
    }
}

fn default_mention() -> String {
    "@everyone".to_string()
}

fn default_staging_dir() -> PathBuf {
    std::env::temp_dir().join("relaybot")
}

fn default_api_base() -> String {
    "https://discord.com/api/v10".to_string()
}

impl FileSettings {
    /// Read settings from `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file: {}", path.display()))?;

        toml::from_str(&content)
            .with_context(|| format!("Failed to parse settings file: {}", path.display()))
    }
}

impl Config {
    /// Load settings from `path` and the required values from the process environment.
    pub fn load(path: &Path) -> Result<Self> {
        let settings = FileSettings::load(path)?;
        let config = Self::from_parts(settings, |key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Combine file settings with the required values resolved through `lookup`.
    pub fn from_parts<F>(settings: FileSettings, lookup: F) -> Result<Self, RelayError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| -> Result<String, RelayError> {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .ok_or_else(|| {
                    RelayError::config(format!("{} not found in environment variables", key))
                })
        };

        let telegram_token = required(TELEGRAM_TOKEN_VAR)?;
        let discord_token = required(DISCORD_TOKEN_VAR)?;
        let raw_channel = required(DISCORD_CHANNEL_VAR)?;
        let channel_id = raw_channel.parse::<u64>().map_err(|_| {
            RelayError::config(format!(
                "{} must be an integer, got '{}'",
                DISCORD_CHANNEL_VAR, raw_channel
            ))
        })?;

        if settings.relay.mention.trim().is_empty() {
            return Err(RelayError::config("relay.mention must not be empty"));
        }

        Ok(Config {
            telegram: TelegramConfig {
                bot_token: telegram_token,
                source_chat_id: settings.telegram.source_chat_id,
            },
            discord: DiscordConfig {
                bot_token: discord_token,
                channel_id,
                api_base: settings.discord.api_base.trim_end_matches('/').to_string(),
            },
            relay: settings.relay,
        })
    }
}
