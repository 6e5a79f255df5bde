//! Client-side TCP transport.

use std::time::Duration;

use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tracing::debug;

use crate::protocol::frame::{Frame, FrameReader, SerializationError};

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConnectionError {
    #[error("IO Error: {0}")]
    IO(#[from] std::io::Error),

    #[error("Connecting to broker timed out")]
    ConnectTimeout,

    #[error(transparent)]
    Serialization(#[from] SerializationError),
}

pub type Result<T, E = ConnectionError> = std::result::Result<T, E>;

/// The write side of one broker connection.
///
/// The read side is handed out at connect time and belongs to a response
/// dispatcher for the connection's lifetime.
#[derive(Debug)]
pub struct BrokerConnection {
    writer: Mutex<OwnedWriteHalf>,
}

impl BrokerConnection {
    /// Connects to `broker`, optionally bounding the connection attempt.
    pub async fn connect(
        broker: &str,
        timeout: Option<Duration>,
    ) -> Result<(Self, FrameReader<OwnedReadHalf>)> {
        let stream = Self::connect_timeout(broker, timeout).await?;
        debug!(broker, "connected");
        let (read_half, write_half) = stream.into_split();
        Ok((
            Self {
                writer: Mutex::new(write_half),
            },
            FrameReader::new(read_half),
        ))
    }

    async fn connect_timeout(host: &str, timeout: Option<Duration>) -> Result<TcpStream> {
        match timeout {
            Some(timeout) => Ok(tokio::time::timeout(timeout, TcpStream::connect(host))
                .await
                .map_err(|_| ConnectionError::ConnectTimeout)??),
            None => Ok(TcpStream::connect(host).await?),
        }
    }

    /// Writes one frame and flushes it.
    pub async fn send(&self, frame: &Frame) -> Result<()> {
        let encoded = frame.encode()?;
        let mut writer = self.writer.lock().await;
        writer.write_all(&encoded).await?;
        writer.flush().await?;
        Ok(())
    }
}
