use thiserror::Error;

use crate::record::RecordError;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("I/O error: {0}")]
    IO(#[from] std::io::Error),

    #[error("invalid admin command: {0}")]
    InvalidAdminCommand(String),

    #[error("partition {topic}-{partition} does not exist")]
    PartitionNotFound { topic: String, partition: u32 },

    #[error("invalid offset: {0}")]
    InvalidOffset(String),

    #[error("record of {record_size} bytes exceeds the segment size limit of {limit} bytes")]
    ExceedSegmentSize { record_size: u64, limit: u64 },

    #[error("corrupt log data: {0}")]
    Corrupt(String),

    #[error("JSON serialization: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Record(#[from] RecordError),
}

pub type Result<T, E = StorageError> = std::result::Result<T, E>;
