pub mod client;
pub mod codec;
pub mod commands;
pub mod frame;
pub mod parse;

use std::io;
use std::sync::Arc;

use thiserror::Error as ThisError;

pub use client::{Client, Response, DEFAULT_PORT};
pub use codec::{EncodeError, RespCodec};
pub use frame::Frame;
pub use parse::DecodeError;

/// Every failure a caller can observe, either from a command future or from
/// the transport tearing down. One transport failure completes every
/// outstanding handle with the same cause, so the type is `Clone`.
#[derive(Debug, ThisError, Clone)]
pub enum Error {
    /// Malformed wire frame. Fatal for the connection that produced it.
    #[error("protocol error: {0}")]
    Decode(#[from] DecodeError),

    /// A queued frame can never fit the write buffer.
    #[error("{0}")]
    Encode(#[from] EncodeError),

    /// Submitted before connect, after disconnect, or after a fatal failure.
    #[error("redis client not connected")]
    NotConnected,

    /// The server answered with a RESP error value. Surfaced by response
    /// coercion only; the transport delivers error frames as ordinary values.
    #[error("server error: {0}")]
    Server(String),

    /// A response frame had a variant the command wrapper did not expect.
    #[error("invalid response: expected {expected}, got {actual}")]
    InvalidResponse {
        expected: &'static str,
        actual: &'static str,
    },

    /// Underlying socket failure.
    #[error("I/O error: {0}")]
    Io(Arc<io::Error>),

    /// The server sent a frame while no request was outstanding.
    #[error("response received with no outstanding request")]
    StrayResponse,
}

impl From<io::Error> for Error {
    fn from(src: io::Error) -> Error {
        Error::Io(Arc::new(src))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
