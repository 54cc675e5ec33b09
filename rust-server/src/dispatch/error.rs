//! Dispatch and configuration errors.

use axum::extract::rejection::QueryRejection;
use axum::http::StatusCode;
use thiserror::Error;

use crate::message::DecodeError;

/// Why an exchange was rejected before reaching a message handler.
///
/// Every variant ends the exchange in the invalid-request handler. An
/// authentic, well-formed push of an unrecognized kind is not an error;
/// it goes to the unknown-request handler instead.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Query string did not parse.
    #[error("invalid query string: {0}")]
    Query(#[from] QueryRejection),

    /// A required query parameter is missing or empty.
    #[error("{0} is empty")]
    MissingParam(&'static str),

    /// Signature does not match the configured token.
    #[error("check signature failed")]
    SignatureMismatch,

    /// Body could not be read (I/O failure or over the size limit).
    #[error("failed to read request body: {0}")]
    Body(#[source] axum::Error),

    /// Body is not a valid push document.
    #[error("failed to decode message: {0}")]
    Decode(#[from] DecodeError),
}

impl DispatchError {
    /// HTTP status the default invalid-request handler answers with.
    pub fn status(&self) -> StatusCode {
        match self {
            DispatchError::SignatureMismatch => StatusCode::UNAUTHORIZED,
            DispatchError::Query(_)
            | DispatchError::MissingParam(_)
            | DispatchError::Body(_)
            | DispatchError::Decode(_) => StatusCode::BAD_REQUEST,
        }
    }
}

/// Faults detected while building a [`Dispatcher`](super::Dispatcher).
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("token must not be empty")]
    EmptyToken,
}
