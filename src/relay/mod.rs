//! Message normalization and the relay cycle: stage, compose, send, clean up.

pub mod message;
pub mod pipeline;
pub mod staging;

pub use message::{MediaFile, PhotoVariant, SourceMessage};
pub use pipeline::{RelayOutcome, RelayPipeline};
pub use staging::{StagedFile, Staging};
