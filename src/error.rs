//! Error types for the bake engine

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for bake operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while planning or capturing
#[derive(Error, Debug)]
pub enum Error {
    /// Selector resolved to nothing, or the target has a zero-area box
    #[error("Target not found: {0}")]
    NotFound(String),

    /// The capture box is degenerate
    #[error("Invalid clip: {0}")]
    InvalidClip(String),

    /// The source document does not exist
    #[error("Source document missing: {}", .0.display())]
    FileMissing(PathBuf),

    /// Every strategy of one smart capture failed
    #[error("All capture strategies failed: {}", .0.join("; "))]
    AggregateStrategyFailure(Vec<String>),

    /// Absent or malformed input to a public entry point
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Failed to start the rendering engine
    #[error("Engine initialization failed: {0}")]
    Initialization(String),

    /// Failed to navigate to a document
    #[error("Navigation failed: {0}")]
    Navigation(String),

    /// Operation timed out
    #[error("Operation timed out after {0}ms")]
    Timeout(u64),

    /// Screenshot or mutation failed inside the page
    #[error("Rendering failed: {0}")]
    Render(String),

    /// Driver-level failure (CDP transport, worker thread)
    #[error("Driver error: {0}")]
    Driver(String),

    /// The session (or its page worker) has been closed
    #[error("Render session is closed")]
    SessionClosed,

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image decoding failed: {0}")]
    Image(#[from] image::ImageError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Errors that must stop a whole bake run rather than a single node.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::FileMissing(_) | Error::Initialization(_) | Error::SessionClosed)
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::Driver(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aggregate_failure_lists_every_message() {
        let err = Error::AggregateStrategyFailure(vec!["clone: a".into(), "in-place: b".into()]);
        let text = err.to_string();
        assert!(text.contains("clone: a"));
        assert!(text.contains("in-place: b"));
    }

    #[test]
    fn fatal_classification() {
        assert!(Error::FileMissing(PathBuf::from("/nope.html")).is_fatal());
        assert!(!Error::NotFound("x".into()).is_fatal());
    }
}
