use thiserror::Error;

/// Why an inbound text frame could not be turned into a [`SignalingMessage`].
///
/// [`SignalingMessage`]: crate::message::SignalingMessage
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("message is not an object with a string `type`")]
    MissingOrInvalidType,

    #[error("unknown message type `{0}`")]
    UnknownType(String),

    #[error("malformed `{kind}` message: {source}")]
    Malformed {
        kind: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Error)]
pub enum SignalingError {
    /// The connection is still connecting or already closed.
    #[error("signaling connection is not open")]
    NotOpen,

    #[error("failed to encode outbound message: {0}")]
    Encode(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SignalingError>;
