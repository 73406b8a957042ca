//! Error types for the headless runner.

use std::path::PathBuf;

use skirmish_core::error::GameError;
use thiserror::Error;

/// Result type alias using [`HeadlessError`].
pub type Result<T> = std::result::Result<T, HeadlessError>;

/// Errors raised while loading, running or reporting on games.
#[derive(Debug, Error)]
pub enum HeadlessError {
    /// The engine refused a scenario, command or replay.
    #[error(transparent)]
    Game(#[from] GameError),

    /// Reading or writing a file failed.
    #[error("I/O error on '{}': {source}", path.display())]
    Io {
        /// File being accessed.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Reading stdin or writing stdout failed.
    #[error("Stream error: {0}")]
    Stream(#[from] std::io::Error),

    /// JSON encoding failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A protocol command could not be carried out.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The batch could not be started.
    #[error("Batch error: {0}")]
    Batch(String),
}

impl HeadlessError {
    /// Wrap an I/O error with the path it happened on.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
