//! Unified error type.

use http::StatusCode;
use thiserror::Error;

/// The error type returned by handlers, interceptors and the inbound.
///
/// A handler failure and an interceptor short-circuit look the same to the
/// caller: both are just an `Error` bubbling out of the composed handler.
/// Nothing records which layer produced it.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The request is malformed or missing required metadata.
    #[error("bad request: {reason}")]
    BadRequest { reason: String },

    /// An interceptor declined to call through (auth, policy, quota).
    #[error("rejected: {0}")]
    Rejected(String),

    /// The handler failed while processing the request.
    #[error("unexpected error: {0}")]
    Unexpected(String),

    #[error("deadline exceeded")]
    DeadlineExceeded,

    #[error("request cancelled")]
    Cancelled,

    /// A header was added after body bytes were written.
    #[error("headers must be added before the response body is written")]
    HeadersAfterBody,

    /// The response sink was already finalized.
    #[error("response already finalized")]
    ResponseFinalized,

    #[error("invalid socket address `{0}`")]
    InvalidAddress(String),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn bad_request(reason: impl Into<String>) -> Self {
        Self::BadRequest { reason: reason.into() }
    }

    /// Wire status for this error when it escapes the chain.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Self::Rejected(_) => StatusCode::FORBIDDEN,
            Self::DeadlineExceeded => StatusCode::GATEWAY_TIMEOUT,
            // nginx's "client closed request"
            Self::Cancelled => StatusCode::from_u16(499).unwrap_or(StatusCode::BAD_REQUEST),
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
