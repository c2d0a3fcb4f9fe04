//! Error type for the tools.

use std::path::PathBuf;

use glob_core::error::GameError;
use thiserror::Error;

/// Result type alias using [`ToolError`].
pub type Result<T> = std::result::Result<T, ToolError>;

/// Errors raised by the command-line tools.
#[derive(Debug, Error)]
pub enum ToolError {
    /// A file could not be opened, read or written.
    #[error("Failed to access '{path}': {source}")]
    Io {
        /// File involved.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// A RON file did not parse.
    #[error("Failed to parse '{path}': {message}")]
    Parse {
        /// File involved.
        path: PathBuf,
        /// Parser message.
        message: String,
    },

    /// Type data parsed but is inconsistent.
    #[error("Data validation found {} problem(s): {}", .0.len(), .0.join("; "))]
    Validation(Vec<String>),

    /// A scenario cannot be turned into a game.
    #[error("Invalid scenario: {0}")]
    Scenario(String),

    /// The simulation rejected a save, a replay or a setup step.
    #[error(transparent)]
    Game(#[from] GameError),

    /// JSON output could not be produced.
    #[error("Failed to encode JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl ToolError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
