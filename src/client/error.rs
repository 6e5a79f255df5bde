use thiserror::Error;

use crate::client::connection::ConnectionError;
use crate::protocol::frame::{FrameReadError, SerializationError};

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error("connection error: {0}")]
    Connection(#[from] ConnectionError),

    #[error("cannot read response: {0}")]
    Frame(#[from] FrameReadError),

    #[error(transparent)]
    Serialization(#[from] SerializationError),

    #[error("invalid response payload: {0}")]
    InvalidResponse(#[from] serde_json::Error),

    #[error("correlation id {0} is already linked")]
    InvalidCorrelationId(u32),

    #[error("connection closed before the response arrived")]
    ConnectionClosed,

    #[error("broker error {code}: {message}")]
    Broker { code: i32, message: String },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
