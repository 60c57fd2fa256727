use perch_http::{HttpError, StatusCode};
use thiserror::Error;

/// Error taxonomy for fetch and stream operations.
#[derive(Debug, Error)]
pub enum SocialError {
    /// The remote rejected our credentials. Fatal to the operation.
    #[error("authentication rejected: {0}")]
    Auth(String),

    /// Transport failure or non-auth API error during a batch fetch.
    /// Aborts the whole run.
    #[error("remote service error: {0}")]
    Remote(String),

    /// A fetched payload did not match the typed model. The whole batch
    /// fails rather than rows being filled with defaults.
    #[error("malformed response: {0}")]
    Malformed(String),

    /// Local file i/o (stream target, batch export).
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<HttpError> for SocialError {
    fn from(err: HttpError) -> Self {
        match err {
            HttpError::Api {
                status,
                ref message,
                ..
            } if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN => {
                SocialError::Auth(message.clone())
            }
            HttpError::Decode(msg, snippet) => {
                SocialError::Malformed(format!("{msg}; body: {snippet}"))
            }
            other => SocialError::Remote(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, SocialError>;
