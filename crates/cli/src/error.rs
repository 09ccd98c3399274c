//! CLI error types.

use thiserror::Error;

use crate::config::ConfigError;

/// CLI errors.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// A line typed into `record` could not be understood.
    #[error("invalid command: {0}")]
    InvalidCommand(String),

    /// Configuration is invalid or could not be read.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// An error occurred in the storage layer.
    #[error(transparent)]
    Storage(#[from] storage::Error),

    /// The polling task panicked or was cancelled.
    #[error("polling task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    /// An I/O error occurred.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
