//! Records and their binary encoding.
//!
//! A record is the unit of value flowing through the broker. On disk and on
//! the wire its body is UTF-8 JSON with keys in declaration order (`value`,
//! `key`, `timestamp`, `headers`, `offset`); binary fields are base64
//! strings. In a segment's log file each body is prefixed with its length as
//! 4 ASCII-decimal digits.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::{MAX_PAYLOAD_LENGTH, PAYLOAD_LENGTH_WIDTH};

#[derive(Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum RecordError {
    #[error("record offset must be set before encoding")]
    UnsetOffset,

    #[error("record offset is already set")]
    OffsetAlreadySet,

    #[error(
        "encoded record of {0} bytes does not fit a {PAYLOAD_LENGTH_WIDTH}-digit length prefix"
    )]
    TooLarge(usize),

    #[error("malformed record: {0}")]
    Malformed(String),
}

impl From<serde_json::Error> for RecordError {
    fn from(err: serde_json::Error) -> Self {
        Self::Malformed(err.to_string())
    }
}

/// A single record of a topic/partition.
///
/// `offset` is unset until the record is appended; the partition assigns it
/// exactly once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub topic: String,
    pub partition: u32,
    pub value: Vec<u8>,
    pub key: Option<Vec<u8>>,

    /// Epoch seconds.
    pub timestamp: i64,

    pub headers: BTreeMap<String, Vec<u8>>,
    pub offset: Option<u64>,
}

impl Record {
    /// Returns a copy carrying the assigned offset.
    ///
    /// Offsets are assigned once, at append time; re-assigning is an error.
    pub fn with_offset(&self, offset: u64) -> Result<Self, RecordError> {
        if self.offset.is_some() {
            return Err(RecordError::OffsetAlreadySet);
        }
        Ok(Self {
            offset: Some(offset),
            ..self.clone()
        })
    }

    /// The length-prefixed binary form written to a segment's log file.
    pub fn encode(&self) -> Result<Vec<u8>, RecordError> {
        let body = serde_json::to_vec(&self.body()?)?;
        if body.len() > MAX_PAYLOAD_LENGTH {
            return Err(RecordError::TooLarge(body.len()));
        }

        let mut buf = Vec::with_capacity(PAYLOAD_LENGTH_WIDTH + body.len());
        buf.extend_from_slice(
            format!("{:0width$}", body.len(), width = PAYLOAD_LENGTH_WIDTH).as_bytes(),
        );
        buf.extend_from_slice(&body);
        Ok(buf)
    }

    /// On-disk footprint of the record: length prefix plus JSON body.
    pub fn encoded_len(&self) -> Result<u64, RecordError> {
        Ok(self.encode()?.len() as u64)
    }

    /// Parses a JSON record body read back from a log file, restoring the
    /// partition identity the body does not carry.
    pub fn decode(
        topic: impl Into<String>,
        partition: u32,
        body: &[u8],
    ) -> Result<Self, RecordError> {
        let body: RecordBody = serde_json::from_slice(body)?;
        Ok(Self::from_body(topic, partition, body))
    }

    pub fn from_body(topic: impl Into<String>, partition: u32, body: RecordBody) -> Self {
        Self {
            topic: topic.into(),
            partition,
            value: body.value,
            key: body.key,
            timestamp: body.timestamp,
            headers: body.headers,
            offset: Some(body.offset),
        }
    }

    pub fn body(&self) -> Result<RecordBody, RecordError> {
        Ok(RecordBody {
            value: self.value.clone(),
            key: self.key.clone(),
            timestamp: self.timestamp,
            headers: self.headers.clone(),
            offset: self.offset.ok_or(RecordError::UnsetOffset)?,
        })
    }
}

/// The JSON body of a stored record: everything but the partition identity.
///
/// Field order is the serialization order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RecordBody {
    #[serde(with = "base64_bytes")]
    pub value: Vec<u8>,

    #[serde(with = "base64_bytes_opt")]
    pub key: Option<Vec<u8>>,

    pub timestamp: i64,

    #[serde(with = "base64_bytes_map")]
    pub headers: BTreeMap<String, Vec<u8>>,

    pub offset: u64,
}

/// Metadata the broker assigned to a produced record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordMetadata {
    pub topic: String,
    pub partition: u32,
    pub offset: u64,
    pub timestamp: i64,
}

pub(crate) mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(encoded).map_err(serde::de::Error::custom)
    }
}

pub(crate) mod base64_bytes_opt {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &Option<Vec<u8>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match bytes {
            Some(bytes) => serializer.serialize_some(&STANDARD.encode(bytes)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Vec<u8>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Option::<String>::deserialize(deserializer)?
            .map(|encoded| STANDARD.decode(encoded).map_err(serde::de::Error::custom))
            .transpose()
    }
}

pub(crate) mod base64_bytes_map {
    use std::collections::BTreeMap;

    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(map: &BTreeMap<String, Vec<u8>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_map(map.iter().map(|(k, v)| (k, STANDARD.encode(v))))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<BTreeMap<String, Vec<u8>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        BTreeMap::<String, String>::deserialize(deserializer)?
            .into_iter()
            .map(|(k, v)| {
                STANDARD
                    .decode(v)
                    .map(|v| (k, v))
                    .map_err(serde::de::Error::custom)
            })
            .collect()
    }
}
