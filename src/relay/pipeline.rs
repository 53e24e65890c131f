use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::message::{AttachmentKind, InboundMessage, SourceMessage};
use super::staging::Staging;
use crate::error::RelayError;
use crate::platform::{Destination, FileSource};

/// Result of handling one inbound message.
#[derive(Debug)]
pub enum RelayOutcome {
    /// Nothing relayable; no staging and no send happened.
    Skipped,
    Delivered { attachment: Option<AttachmentKind> },
    Failed(RelayError),
}

/// Build the outbound text for `msg`.
pub fn compose_text(mention: &str, msg: &InboundMessage) -> String {
    let sender = &msg.sender_display_name;
    let head = match &msg.origin_label {
        Some(origin) => format!("{} **[{}]** {}", mention, origin, sender),
        None => format!("{} {}", mention, sender),
    };
    match &msg.text {
        Some(text) => format!("{}: {}", head, text),
        None => head,
    }
}

/// Stages, composes, sends and cleans up, one message at a time.
pub struct RelayPipeline {
    mention: String,
    staging: Staging,
    files: Arc<dyn FileSource>,
    destination: Arc<dyn Destination>,
    /// Held for the whole cycle; records the staged file of the cycle in progress.
    in_flight: Mutex<Option<PathBuf>>,
}

impl RelayPipeline {
    pub fn new(
        mention: impl Into<String>,
        staging: Staging,
        files: Arc<dyn FileSource>,
        destination: Arc<dyn Destination>,
    ) -> Self {
        Self {
            mention: mention.into(),
            staging,
            files,
            destination,
            in_flight: Mutex::new(None),
        }
    }

    /// Entry point for the source listener.
    pub async fn on_message(&self, source: SourceMessage) -> RelayOutcome {
        match InboundMessage::from_source(&source) {
            Some(msg) => self.relay(msg).await,
            None => {
                debug!("Message has no text and no supported attachment, skipping");
                RelayOutcome::Skipped
            }
        }
    }

    pub async fn relay(&self, msg: InboundMessage) -> RelayOutcome {
        if !msg.is_relayable() {
            return RelayOutcome::Skipped;
        }

        let mut in_flight = self.in_flight.lock().await;

        info!(
            "Relaying message from [{}] {}{}",
            msg.origin_label.as_deref().unwrap_or("direct"),
            msg.sender_display_name,
            msg.attachment
                .as_ref()
                .map(|a| format!(" with {}", a.kind))
                .unwrap_or_default()
        );

        let result = self.stage_and_send(&msg, &mut in_flight).await;
        *in_flight = None;

        match result {
            Ok(()) => RelayOutcome::Delivered {
                attachment: msg.attachment.map(|a| a.kind),
            },
            Err(e) => RelayOutcome::Failed(e),
        }
    }

    /// One relay cycle. Records the staged path in `in_flight` while the send is pending.
    async fn stage_and_send(
        &self,
        msg: &InboundMessage,
        in_flight: &mut Option<PathBuf>,
    ) -> Result<(), RelayError> {
        let staged = match &msg.attachment {
            Some(attachment) => Some(self.staging.stage(attachment, self.files.as_ref()).await?),
            None => None,
        };
        *in_flight = staged.as_ref().map(|f| f.local_path.clone());

        let text = compose_text(&self.mention, msg);
        let result = self.destination.send(&text, staged.as_ref()).await;

        if let Some(file) = staged {
            file.remove().await;
        }

        if result.is_ok() {
            debug!("Delivered: {}", text);
        }
        result
    }

    /// Wait for the cycle in progress and delete any staged file it left behind.
    pub async fn shutdown(&self) {
        let mut in_flight = self.in_flight.lock().await;
        if let Some(path) = in_flight.take() {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => info!("Removed leftover staged file {}", path.display()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!(
                    "Failed to remove leftover staged file {}: {}",
                    path.display(),
                    e
                ),
            }
        }
    }
}
