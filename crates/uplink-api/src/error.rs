//! Error types for the REST clients.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    /// The HTTP response had a non-2xx status code.
    #[error("request failed: {status} {body}")]
    Status { status: u16, body: String },

    /// An error from the underlying HTTP client, including body decoding.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// A configured endpoint is not a valid URL.
    #[error("invalid endpoint URL: {0}")]
    Url(#[from] url::ParseError),
}

pub type Result<T> = std::result::Result<T, ApiError>;

/// Turn a non-2xx response into [`ApiError::Status`] carrying the raw body.
pub(crate) async fn ensure_success(resp: reqwest::Response) -> Result<reqwest::Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(ApiError::Status { status: status.as_u16(), body })
}
