//! Unified error types for the PJHQ resource cache.
//!
//! Messages carry a stable uppercase code prefix so page clients and the MCP
//! surface can match on them without parsing free text.

use std::time::Duration;

use rmcp::model::{ErrorCode, ErrorData as McpError};
use tokio_rusqlite::rusqlite;

/// Unified error types for controller, messenger and storage.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid input parameters (e.g., empty URL list).
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    /// A message failed boundary validation.
    #[error("INVALID_MESSAGE: {0}")]
    InvalidMessage(String),

    /// Invalid URL.
    #[error("INVALID_URL: {0}")]
    InvalidUrl(String),

    /// Database operation failed.
    #[error("CACHE_ERROR: {0}")]
    Database(tokio_rusqlite::Error),

    /// Migration failed to apply.
    #[error("CACHE_ERROR: migration failed: {0}")]
    MigrationFailed(String),

    /// Manifest could not be loaded.
    #[error("MANIFEST_ERROR: {0}")]
    Manifest(String),

    /// Fetch failed outright (DNS, connect, TLS, body read).
    #[error("NETWORK_ERROR: {0}")]
    Network(String),

    /// Fetch response too large.
    #[error("FETCH_TOO_LARGE: {0}")]
    FetchTooLarge(String),

    /// No active controller for this page yet; the call was queued or rejected.
    #[error("NOT_READY: controller is not active")]
    NotReady,

    /// Controller inbox closed before the message could be delivered.
    #[error("CONTROLLER_GONE: {0}")]
    ControllerGone(String),

    /// The controller dropped the reply channel without answering.
    #[error("REPLY_DROPPED: controller closed the reply channel")]
    ReplyDropped,

    /// The controller did not answer within the request timeout.
    #[error("TIMEOUT: no reply within {0:?}")]
    Timeout(Duration),

    /// The controller answered with an error payload.
    #[error("CONTROLLER_ERROR: {0}")]
    Controller(String),

    /// The controller answered with a reply of the wrong shape.
    #[error("UNEXPECTED_REPLY: expected {expected}")]
    UnexpectedReply { expected: &'static str },
}

impl From<tokio_rusqlite::Error<Error>> for Error {
    fn from(err: tokio_rusqlite::Error<Error>) -> Self {
        match err {
            tokio_rusqlite::Error::Error(e) => e,
            tokio_rusqlite::Error::ConnectionClosed => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
            tokio_rusqlite::Error::Close(c) => Error::Database(tokio_rusqlite::Error::Close(c)),
            _ => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
        }
    }
}

impl From<tokio_rusqlite::Error<rusqlite::Error>> for Error {
    fn from(err: tokio_rusqlite::Error<rusqlite::Error>) -> Self {
        Error::Database(err)
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Database(tokio_rusqlite::Error::Error(err))
    }
}

impl From<Error> for McpError {
    fn from(err: Error) -> Self {
        let (code, message) = match &err {
            Error::InvalidInput(msg) | Error::InvalidMessage(msg) => (-32602, msg.clone()),
            Error::InvalidUrl(msg) => (-32003, msg.clone()),
            Error::Database(e) => (-32002, e.to_string()),
            Error::MigrationFailed(msg) => (-32002, msg.clone()),
            Error::Manifest(msg) => (-32013, msg.clone()),
            Error::Network(msg) => (-32008, msg.clone()),
            Error::FetchTooLarge(msg) => (-32007, msg.clone()),
            Error::NotReady => (-32020, "controller is not active".to_string()),
            Error::ControllerGone(msg) => (-32021, msg.clone()),
            Error::ReplyDropped => (-32022, "controller closed the reply channel".to_string()),
            Error::Timeout(after) => (-32006, format!("no reply within {after:?}")),
            Error::Controller(msg) => (-32023, msg.clone()),
            Error::UnexpectedReply { expected } => (-32000, format!("expected {expected} reply")),
        };

        McpError { code: ErrorCode(code), message: message.into(), data: None }
    }
}
