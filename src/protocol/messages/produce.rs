use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::error_code;
use crate::record::{base64_bytes, base64_bytes_map, base64_bytes_opt, Record};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProduceRequest {
    pub topic: String,
    pub partition: u32,

    /// The records to append, in order. Must be non-empty.
    pub records: Vec<RecordContents>,
}

/// One record as submitted by a producer.
///
/// The broker assigns the offset; a missing timestamp is filled with the
/// server clock at parse time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RecordContents {
    #[serde(with = "base64_bytes")]
    pub value: Vec<u8>,

    #[serde(default, with = "base64_bytes_opt")]
    pub key: Option<Vec<u8>>,

    #[serde(default)]
    pub timestamp: Option<i64>,

    #[serde(default, with = "base64_bytes_map")]
    pub headers: BTreeMap<String, Vec<u8>>,
}

impl RecordContents {
    /// Builds the storage-side record, without an offset.
    pub fn into_record(
        self,
        topic: impl Into<String>,
        partition: u32,
        fallback_timestamp: i64,
    ) -> Record {
        Record {
            topic: topic.into(),
            partition,
            value: self.value,
            key: self.key,
            timestamp: self.timestamp.unwrap_or(fallback_timestamp),
            headers: self.headers,
            offset: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProduceResponse {
    pub topic: String,
    pub partition: u32,

    /// Offset assigned to the first record of the batch; later records
    /// follow consecutively. `-1` on failure.
    pub base_offset: i64,

    pub error_code: i32,
    pub error_message: Option<String>,
}

impl ProduceResponse {
    pub fn success(topic: impl Into<String>, partition: u32, base_offset: u64) -> Self {
        Self {
            topic: topic.into(),
            partition,
            base_offset: base_offset as i64,
            error_code: error_code::NONE,
            error_message: None,
        }
    }

    pub fn failure(
        topic: impl Into<String>,
        partition: u32,
        error_code: i32,
        error_message: impl Into<String>,
    ) -> Self {
        Self {
            topic: topic.into(),
            partition,
            base_offset: -1,
            error_code,
            error_message: Some(error_message.into()),
        }
    }
}
