//! Message framing.
//!
//! A frame is a fixed-width ASCII-decimal header followed by an opaque
//! payload:
//!
//! ```text
//! correlation_id (10 digits) | api_key (2 digits) | payload_length (4 digits) | payload
//! ```
//!
//! The header carries no delimiters; every prefix byte must be an ASCII
//! digit. The 4-digit length field caps payloads at [`MAX_PAYLOAD_LENGTH`]
//! bytes.

use bytes::Bytes;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::constants::{
    API_KEY_WIDTH, CORRELATION_ID_WIDTH, HEADER_WIDTH, MAX_PAYLOAD_LENGTH, PAYLOAD_LENGTH_WIDTH,
};
use crate::protocol::api_key::ApiKey;

#[derive(Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum SerializationError {
    #[error("frame header must be {HEADER_WIDTH} ASCII digits")]
    MalformedHeader,

    #[error("declared payload length {declared} does not match actual length {actual}")]
    PayloadLengthMismatch { declared: usize, actual: usize },

    #[error("payload of {0} bytes exceeds the {MAX_PAYLOAD_LENGTH} byte frame limit")]
    PayloadTooLarge(usize),

    #[error("API key {0} does not fit the {API_KEY_WIDTH}-digit field")]
    ApiKeyTooLarge(u8),
}

/// The header of a [`Frame`]: which request this is and which exchange it
/// belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// Client-assigned id echoed back by the server to match responses to
    /// requests on a connection.
    pub correlation_id: u32,

    /// Tag identifying the request type.
    pub api_key: ApiKey,
}

/// One request or response message on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub header: FrameHeader,
    pub payload: Bytes,
}

impl Frame {
    pub fn new(correlation_id: u32, api_key: ApiKey, payload: impl Into<Bytes>) -> Self {
        Self {
            header: FrameHeader {
                correlation_id,
                api_key,
            },
            payload: payload.into(),
        }
    }

    /// Serializes the frame: each header integer zero-padded to its width,
    /// payload appended unchanged.
    pub fn encode(&self) -> Result<Bytes, SerializationError> {
        if self.payload.len() > MAX_PAYLOAD_LENGTH {
            return Err(SerializationError::PayloadTooLarge(self.payload.len()));
        }
        let api_key = u8::from(self.header.api_key);
        if api_key > 99 {
            return Err(SerializationError::ApiKeyTooLarge(api_key));
        }

        let mut buf = Vec::with_capacity(HEADER_WIDTH + self.payload.len());
        buf.extend_from_slice(
            format!(
                "{:0cid_width$}{:0key_width$}{:0len_width$}",
                self.header.correlation_id,
                api_key,
                self.payload.len(),
                cid_width = CORRELATION_ID_WIDTH,
                key_width = API_KEY_WIDTH,
                len_width = PAYLOAD_LENGTH_WIDTH,
            )
            .as_bytes(),
        );
        buf.extend_from_slice(&self.payload);
        Ok(buf.into())
    }

    /// Parses a complete serialized frame, validating the exact shape.
    pub fn decode(data: &[u8]) -> Result<Self, SerializationError> {
        if data.len() < HEADER_WIDTH {
            return Err(SerializationError::MalformedHeader);
        }
        let (header, payload) = data.split_at(HEADER_WIDTH);
        if !header.iter().all(|b| b.is_ascii_digit()) {
            return Err(SerializationError::MalformedHeader);
        }
        // All-digits was just checked, so the header is valid UTF-8.
        let digits =
            std::str::from_utf8(header).map_err(|_| SerializationError::MalformedHeader)?;

        let correlation_id = digits[..CORRELATION_ID_WIDTH]
            .parse::<u32>()
            .map_err(|_| SerializationError::MalformedHeader)?;
        let api_key = digits[CORRELATION_ID_WIDTH..CORRELATION_ID_WIDTH + API_KEY_WIDTH]
            .parse::<u8>()
            .map_err(|_| SerializationError::MalformedHeader)?;
        let declared = digits[CORRELATION_ID_WIDTH + API_KEY_WIDTH..]
            .parse::<usize>()
            .map_err(|_| SerializationError::MalformedHeader)?;

        if payload.len() != declared {
            return Err(SerializationError::PayloadLengthMismatch {
                declared,
                actual: payload.len(),
            });
        }

        Ok(Self {
            header: FrameHeader {
                correlation_id,
                api_key: ApiKey::from(api_key),
            },
            payload: Bytes::copy_from_slice(payload),
        })
    }
}

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum FrameReadError {
    #[error("cannot read frame: {0}")]
    IO(#[from] std::io::Error),

    #[error("stream ended mid-frame")]
    UnexpectedEof,

    #[error(transparent)]
    Serialization(#[from] SerializationError),
}

/// Reads length-delimited frames off a byte stream.
#[derive(Debug)]
pub struct FrameReader<R> {
    reader: R,
}

impl<R> FrameReader<R>
where
    R: AsyncRead + Unpin,
{
    pub fn new(reader: R) -> Self {
        Self { reader }
    }

    /// Reads exactly one frame.
    ///
    /// Returns `None` on a clean end of stream, i.e. EOF before the first
    /// header byte. EOF anywhere inside a frame is an error.
    pub async fn read_frame(&mut self) -> Result<Option<Frame>, FrameReadError> {
        let mut header = [0u8; HEADER_WIDTH];
        let mut filled = 0;
        while filled < HEADER_WIDTH {
            let n = self.reader.read(&mut header[filled..]).await?;
            if n == 0 {
                return if filled == 0 {
                    Ok(None)
                } else {
                    Err(FrameReadError::UnexpectedEof)
                };
            }
            filled += n;
        }

        if !header.iter().all(|b| b.is_ascii_digit()) {
            return Err(SerializationError::MalformedHeader.into());
        }
        let declared = std::str::from_utf8(&header[HEADER_WIDTH - PAYLOAD_LENGTH_WIDTH..])
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
            .ok_or(SerializationError::MalformedHeader)?;

        let mut buf = Vec::with_capacity(HEADER_WIDTH + declared);
        buf.extend_from_slice(&header);
        buf.resize(HEADER_WIDTH + declared, 0);
        self.reader
            .read_exact(&mut buf[HEADER_WIDTH..])
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::UnexpectedEof => FrameReadError::UnexpectedEof,
                _ => FrameReadError::IO(e),
            })?;

        Ok(Some(Frame::decode(&buf)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use assert_matches::assert_matches;
    use proptest::prelude::*;

    #[test]
    fn test_encode_known_frame() {
        let frame = Frame::new(1, ApiKey::Produce, "hello".as_bytes());
        assert_eq!(frame.encode().unwrap(), "0000000001010005hello".as_bytes());
    }

    #[test]
    fn test_encode_empty_payload() {
        let frame = Frame::new(42, ApiKey::ListTopics, Bytes::new());
        assert_eq!(frame.encode().unwrap(), "0000000042040000".as_bytes());
    }

    #[test]
    fn test_encode_oversized_payload() {
        let frame = Frame::new(1, ApiKey::Produce, vec![0u8; MAX_PAYLOAD_LENGTH + 1]);
        assert_matches!(frame.encode(), Err(SerializationError::PayloadTooLarge(_)));
    }

    #[test]
    fn test_decode_rejects_short_input() {
        assert_matches!(
            Frame::decode(b"123"),
            Err(SerializationError::MalformedHeader)
        );
    }

    #[test]
    fn test_decode_rejects_non_digit_header() {
        assert_matches!(
            Frame::decode(b"00000000xx010005hello"),
            Err(SerializationError::MalformedHeader)
        );
    }

    #[test]
    fn test_decode_rejects_length_mismatch() {
        assert_matches!(
            Frame::decode(b"00000000010100380123456789"),
            Err(SerializationError::PayloadLengthMismatch {
                declared: 38,
                actual: 10,
            })
        );
    }

    proptest! {
        #[test]
        fn test_roundtrip_frame(
            correlation_id: u32,
            api_key in 0u8..100,
            payload in proptest::collection::vec(any::<u8>(), 0..200),
        ) {
            let frame = Frame::new(correlation_id, ApiKey::from(api_key), payload);
            let encoded = frame.encode().unwrap();
            let decoded = Frame::decode(&encoded).unwrap();
            assert_eq!(decoded, frame);
        }

        #[test]
        fn test_roundtrip_bytes(
            correlation_id: u32,
            api_key in 0u8..100,
            payload in proptest::collection::vec(any::<u8>(), 0..200),
        ) {
            // Every decodable byte string re-encodes to itself.
            let encoded = Frame::new(correlation_id, ApiKey::from(api_key), payload)
                .encode()
                .unwrap();
            let reencoded = Frame::decode(&encoded).unwrap().encode().unwrap();
            assert_eq!(reencoded, encoded);
        }
    }

    #[tokio::test]
    async fn test_read_frame() {
        let data = b"0000000007020004ping".to_vec();
        let mut reader = FrameReader::new(data.as_slice());

        let frame = reader.read_frame().await.unwrap().unwrap();
        assert_eq!(frame.header.correlation_id, 7);
        assert_eq!(frame.header.api_key, ApiKey::Fetch);
        assert_eq!(frame.payload, "ping".as_bytes());

        assert!(reader.read_frame().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_read_frame_clean_eof() {
        let mut reader = FrameReader::new(b"".as_slice());
        assert!(reader.read_frame().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_read_frame_partial_header() {
        let data = b"00000042".to_vec();
        let mut reader = FrameReader::new(data.as_slice());
        assert_matches!(
            reader.read_frame().await,
            Err(FrameReadError::UnexpectedEof)
        );
    }

    #[tokio::test]
    async fn test_read_frame_truncated_payload() {
        let data = b"0000000001010005hel".to_vec();
        let mut reader = FrameReader::new(data.as_slice());
        assert_matches!(
            reader.read_frame().await,
            Err(FrameReadError::UnexpectedEof)
        );
    }
}
