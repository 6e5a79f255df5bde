use serde::{Deserialize, Serialize};

use super::error_code;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OffsetCommitRequest {
    /// The consumer group committing progress.
    pub group_id: String,

    /// The offsets to commit. Must be non-empty.
    pub topics: Vec<TopicOffset>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TopicOffset {
    pub topic: String,
    pub partition: u32,
    pub offset: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OffsetCommitResponse {
    /// Result for each committed entry in request order.
    pub topics: Vec<CommitStatus>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitStatus {
    pub topic: String,
    pub partition: u32,
    pub error_code: i32,
    pub error_message: Option<String>,
}

impl CommitStatus {
    pub fn success(topic: impl Into<String>, partition: u32) -> Self {
        Self {
            topic: topic.into(),
            partition,
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
            error_code,
            error_message: Some(error_message.into()),
        }
    }
}
