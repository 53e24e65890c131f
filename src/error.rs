use std::path::PathBuf;

use thiserror::Error;

/// Failures of a single relay cycle, plus the startup configuration error.
///
/// Everything except `Config` is contained inside one relay cycle: it is
/// logged and the message is dropped, the listener keeps running.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("Discord channel {0} could not be resolved")]
    ChannelUnresolved(u64),

    #[error("failed to fetch Telegram file {file_id}: {reason}")]
    Fetch { file_id: String, reason: String },

    #[error("Discord request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Discord API error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("failed to read staged file {}: {source}", path.display())]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("refusing to send an empty message")]
    EmptyPayload,
}

impl RelayError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// True for network and API failures on the destination side.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Api { .. })
    }
}
