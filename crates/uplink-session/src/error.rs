use thiserror::Error;
use uplink_api::ApiError;
use uplink_media::MediaError;

/// A negotiation step failed; the session is torn down.
#[derive(Debug, Error)]
pub enum NegotiationError {
    #[error(transparent)]
    Media(#[from] MediaError),

    #[error("{step} timed out")]
    Timeout { step: &'static str },
}

/// The session could not be started.
#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("no channel id configured")]
    MissingChannelId,

    #[error("access token request failed: {0}")]
    Token(#[source] ApiError),

    #[error("ticket request failed: {0}")]
    Ticket(#[source] ApiError),
}
