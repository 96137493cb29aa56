use std::fmt::Display;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MediaError {
    /// The media backend rejected an operation.
    #[error("{operation} failed: {reason}")]
    Backend { operation: &'static str, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl MediaError {
    pub fn backend(operation: &'static str, reason: impl Display) -> Self {
        MediaError::Backend {
            operation,
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, MediaError>;
