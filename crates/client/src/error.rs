//! Client error types.

use crate::transport::TransportError;

/// Top-level client error.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("transport: {0}")]
    Transport(#[from] TransportError),

    /// The host reported a failure; the string is carried verbatim.
    #[error("host: {0}")]
    Host(String),

    /// The reply did not have the shape the protocol promises, e.g. the
    /// number of assigned ids does not match the number of new controls.
    #[error("protocol: {0}")]
    Protocol(String),

    /// An operation was invoked on a control that has never been
    /// synchronized onto a page. Raised before any network interaction.
    #[error("control is not attached to a page")]
    NotAttached,

    #[error("timed out waiting for a host reply")]
    ReplyTimeout,

    /// The connection was torn down while a call was still pending.
    #[error("connection closed")]
    ConnectionClosed,

    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
