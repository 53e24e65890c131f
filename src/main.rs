mod config;
mod error;
mod platform;
mod relay;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use teloxide::Bot;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::platform::discord::DiscordSender;
use crate::platform::telegram::{self, TelegramFiles};
use crate::platform::Destination;
use crate::relay::{RelayPipeline, Staging};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,relaybot=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    match dotenvy::dotenv() {
        Ok(path) => info!("Loaded environment from {}", path.display()),
        Err(e) if e.not_found() => {}
        Err(e) => warn!("Ignoring unreadable .env file: {}", e),
    }

    let settings_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("relay.toml"));

    let config = Config::load(&settings_path)
        .with_context(|| format!("Failed to load configuration ({})", settings_path.display()))?;

    info!("Configuration loaded successfully");
    info!("  Discord channel: {}", config.discord.channel_id);
    info!("  Mention: {}", config.relay.mention);
    info!("  Staging directory: {}", config.relay.staging_dir.display());

    let discord = Arc::new(DiscordSender::new(config.discord.clone()));
    discord.on_ready().await;

    let bot = Bot::new(&config.telegram.bot_token);
    let pipeline = Arc::new(RelayPipeline::new(
        config.relay.mention.clone(),
        Staging::new(config.relay.staging_dir.clone()),
        Arc::new(TelegramFiles::new(bot.clone())),
        discord,
    ));

    info!("Relay is starting...");
    let result = telegram::run(bot, pipeline.clone(), config.telegram.source_chat_id).await;

    pipeline.shutdown().await;
    info!("Relay stopped");

    result
}
