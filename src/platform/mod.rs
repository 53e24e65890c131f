pub mod discord;
pub mod telegram;

use std::path::Path;

use anyhow::Result;
use async_trait::async_trait;

use crate::error::RelayError;
use crate::relay::StagedFile;

/// Fetches file contents from the source platform.
#[async_trait]
pub trait FileSource: Send + Sync {
    /// Download the file identified by `remote_id` into `dest`.
    async fn fetch(&self, remote_id: &str, dest: &Path) -> Result<()>;
}

/// The platform messages are forwarded to.
#[async_trait]
pub trait Destination: Send + Sync {
    /// Called once at startup, before any message is relayed.
    async fn on_ready(&self);

    /// Perform exactly one send of `text`, with the staged file attached if given.
    async fn send(&self, text: &str, attachment: Option<&StagedFile>) -> Result<(), RelayError>;
}
