use std::time::Duration;

use crate::{api::Problem, dir::Operation};

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors surfaced by the ACME engine.
///
/// Only [`Error::BadNonce`] is ever handled internally (by a single retry with a fresh nonce);
/// everything else is returned to the caller as-is.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The HTTP transport failed before the authority produced a response.
    #[error("transport error: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// The authority answered with a problem document.
    #[error("ACME problem: {0}")]
    Protocol(Problem),

    /// The nonce presented was rejected by the authority.
    #[error("bad nonce: {0}")]
    BadNonce(Problem),

    #[error("unsupported key: {0}")]
    UnsupportedKey(String),

    /// The directory does not advertise an endpoint for the operation.
    #[error("directory does not support the {0} operation")]
    UnknownOperation(Operation),

    #[error("invalid state: {0}")]
    InvalidState(String),

    /// Signing was attempted with an account key that was replaced by a key change.
    #[error("account key was rotated; this handle is stale")]
    StaleKey,

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// The authority moved the order to `invalid`.
    #[error("order failed: {}", .0.as_ref().map_or_else(|| "no problem reported".to_owned(), ToString::to_string))]
    OrderFailed(Option<Problem>),

    #[error("invalid revocation reason code: {0}")]
    InvalidReason(u32),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The authority responded with something the protocol does not allow.
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),

    #[error("signing failed: {0}")]
    Signing(String),

    #[error("key decoding failed: {0}")]
    Key(String),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Transport(Box::new(err))
    }
}
