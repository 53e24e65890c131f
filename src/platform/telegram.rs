use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use teloxide::net::Download;
use teloxide::prelude::*;
use teloxide::types::FileId;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use super::FileSource;
use crate::relay::{MediaFile, PhotoVariant, RelayOutcome, RelayPipeline, SourceMessage};

/// Downloads attachments through the Telegram Bot API.
pub struct TelegramFiles {
    bot: Bot,
}

impl TelegramFiles {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl FileSource for TelegramFiles {
    async fn fetch(&self, remote_id: &str, dest: &Path) -> Result<()> {
        let file = self
            .bot
            .get_file(FileId(remote_id.to_string()))
            .await
            .with_context(|| format!("Failed to look up Telegram file {}", remote_id))?;

        let mut dst = tokio::fs::File::create(dest)
            .await
            .with_context(|| format!("Failed to create {}", dest.display()))?;

        self.bot
            .download_file(&file.path, &mut dst)
            .await
            .with_context(|| format!("Failed to download Telegram file {}", remote_id))?;
        dst.flush().await?;

        debug!("Downloaded Telegram file {} to {}", remote_id, dest.display());
        Ok(())
    }
}

/// Build the platform-neutral view of a Telegram message.
fn source_message(msg: &Message) -> SourceMessage {
    let user = msg.from.as_ref();

    SourceMessage {
        first_name: user.map(|u| u.first_name.clone()),
        username: user.and_then(|u| u.username.clone()),
        chat_title: msg.chat.title().map(str::to_string),
        text: msg.text().map(str::to_string),
        caption: msg.caption().map(str::to_string),
        photo: msg
            .photo()
            .map(|sizes| {
                sizes
                    .iter()
                    .map(|ps| PhotoVariant {
                        file_id: ps.file.id.to_string(),
                        width: ps.width,
                        height: ps.height,
                        file_size: u64::from(ps.file.size),
                    })
                    .collect()
            })
            .unwrap_or_default(),
        video: msg.video().map(|v| MediaFile {
            file_id: v.file.id.to_string(),
            file_name: v.file_name.clone(),
        }),
        document: msg.document().map(|d| MediaFile {
            file_id: d.file.id.to_string(),
            file_name: d.file_name.clone(),
        }),
    }
}

/// Listen for Telegram messages and hand each one to the pipeline.
///
/// Returns after Ctrl-C, once in-flight handlers have finished.
pub async fn run(
    bot: Bot,
    pipeline: Arc<RelayPipeline>,
    source_chat_id: Option<i64>,
) -> Result<()> {
    let me = bot
        .get_me()
        .await
        .context("Failed to connect to Telegram (check TELEGRAM_BOT_TOKEN)")?;
    info!(
        "Telegram bot logged in as @{}",
        me.user.username.as_deref().unwrap_or("unknown")
    );

    match source_chat_id {
        Some(id) => info!("Relaying messages from Telegram chat {}", id),
        None => info!("Relaying messages from every chat the bot is in"),
    }

    let handler = Update::filter_message()
        .filter_map(move |msg: Message| match source_chat_id {
            Some(id) if msg.chat.id.0 != id => {
                debug!("Ignoring message from chat {}", msg.chat.id.0);
                None
            }
            _ => Some(msg),
        })
        .endpoint(handle_message);

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![pipeline])
        .default_handler(|upd| async move {
            debug!("Ignoring update without a message: {:?}", upd.id);
        })
        .error_handler(LoggingErrorHandler::with_custom_text("telegram"))
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    info!("Telegram polling stopped");
    Ok(())
}

async fn handle_message(msg: Message, pipeline: Arc<RelayPipeline>) -> ResponseResult<()> {
    debug!(
        "Message {} in chat {} ({:?})",
        msg.id.0,
        msg.chat.id.0,
        msg.chat.title()
    );

    match pipeline.on_message(source_message(&msg)).await {
        RelayOutcome::Delivered { attachment } => match attachment {
            Some(kind) => debug!("Message {} relayed with {}", msg.id.0, kind),
            None => debug!("Message {} relayed", msg.id.0),
        },
        RelayOutcome::Skipped => debug!("Message {} has nothing to relay", msg.id.0),
        RelayOutcome::Failed(e) if e.is_transport() => {
            warn!("Message {} dropped, Discord rejected it: {}", msg.id.0, e)
        }
        RelayOutcome::Failed(e) => warn!("Message {} dropped: {}", msg.id.0, e),
    }

    // Per-message failures never stop the dispatcher.
    Ok(())
}
