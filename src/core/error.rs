//! Classified failures of a quote fetch

use serde::Serialize;
use thiserror::Error;

/// Wait the quote provider asks for once it starts rate limiting.
pub const RATE_LIMIT_WAIT_SECS: u64 = 30;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error(
        "Too many requests. Please wait {} seconds before trying again.",
        RATE_LIMIT_WAIT_SECS
    )]
    RateLimited,

    #[error("The quote service responded with HTTP {status_code}.")]
    ServerError { status_code: u16 },

    #[error("Could not reach the quote service: {0}")]
    NetworkError(String),

    #[error("The quote service sent an unreadable response: {0}")]
    DecodeError(String),

    #[error("The quote service returned no usable quotes.")]
    EmptyResult,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorKind {
    RateLimited,
    ServerError { status_code: u16 },
    NetworkError,
    DecodeError,
    EmptyResult,
}

impl FetchError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            FetchError::RateLimited => ErrorKind::RateLimited,
            FetchError::ServerError { status_code } => ErrorKind::ServerError {
                status_code: *status_code,
            },
            FetchError::NetworkError(_) => ErrorKind::NetworkError,
            FetchError::DecodeError(_) => ErrorKind::DecodeError,
            FetchError::EmptyResult => ErrorKind::EmptyResult,
        }
    }
}

/// Error as surfaced to the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorInfo {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&FetchError> for ErrorInfo {
    fn from(err: &FetchError) -> Self {
        ErrorInfo {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}
