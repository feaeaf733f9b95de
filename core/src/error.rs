//! Error taxonomy for the request pipeline.
//!
//! # Design
//! Every variant is `Clone` because a single failure is delivered to every
//! observer of a [`ResponseFuture`](crate::ResponseFuture). Underlying sources
//! (`serde_json` errors, transport errors) are shared behind `Arc` instead of
//! being flattened into strings, so callers can still reach and downcast them.
//!
//! Configuration errors (`InvalidUrl`, `Encode`) are returned synchronously
//! from `perform`, before anything is dispatched. Everything else arrives
//! through the future.

use std::error::Error as StdError;
use std::sync::Arc;

use thiserror::Error;

/// Source error produced by a transport, shared between observers.
pub type SharedError = Arc<dyn StdError + Send + Sync + 'static>;

/// Errors produced while building, dispatching or decoding a request.
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// The target URL could not be constructed.
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    /// The request body could not be serialized.
    #[error("failed to encode request body: {0}")]
    Encode(#[source] Arc<serde_json::Error>),

    /// The transport could not obtain a response.
    #[error("transport error: {0}")]
    Transport(#[source] SharedError),

    /// The transport produced a response without HTTP status metadata.
    #[error("bad response: {0}")]
    BadResponse(String),

    /// A 2xx body did not decode as the success model.
    #[error("failed to decode response: {0}")]
    Decode(#[source] Arc<serde_json::Error>),

    /// A non-2xx body did not decode as the error model either.
    #[error("unable to decode error response (status {status})")]
    UnableToDecodeErrorResponse { status: u16 },

    /// A non-2xx response whose body decoded as the error model. `message` is
    /// the model's `Display` text.
    #[error("{message}")]
    StatusCode { status: u16, message: String },

    /// The promise side was dropped before it was settled.
    #[error("promise dropped before it was settled")]
    Abandoned,
}

impl Error {
    /// Wrap any error type as a transport failure.
    pub fn transport<E>(source: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Error::Transport(Arc::new(source))
    }

    /// The transport's own error, for downcasting to a concrete type.
    pub fn transport_source(&self) -> Option<&(dyn StdError + Send + Sync + 'static)> {
        match self {
            Error::Transport(source) => Some(source.as_ref()),
            _ => None,
        }
    }

    /// HTTP status code carried by the error, when there is one.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::UnableToDecodeErrorResponse { status } | Error::StatusCode { status, .. } => {
                Some(*status)
            }
            _ => None,
        }
    }
}
