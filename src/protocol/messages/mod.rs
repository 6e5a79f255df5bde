//! Payload schemas, one module per API key.
//!
//! All payloads are JSON. Parsing is strict: unknown fields are rejected.
//! Responses carry an `error_code` (see [`error_code`]) and an optional
//! `error_message`; element-shaped requests (CreateTopics, OffsetCommit)
//! report per-element results.

mod create_topics;
mod fetch;
mod list_topics;
mod offset_commit;
mod produce;

pub use create_topics::{CreateTopicsRequest, CreateTopicsResponse, NewTopic, TopicStatus};
pub use fetch::{FetchRequest, FetchResponse};
pub use list_topics::ListTopicsResponse;
pub use offset_commit::{CommitStatus, OffsetCommitRequest, OffsetCommitResponse, TopicOffset};
pub use produce::{ProduceRequest, ProduceResponse, RecordContents};

/// Error codes surfaced in response payloads.
pub mod error_code {
    /// Success.
    pub const NONE: i32 = 0;

    /// Admin command rejected (bad partition count, duplicate topic names).
    pub const INVALID_ADMIN_COMMAND: i32 = 10;

    /// Partition not found on the produce/create path.
    pub const PARTITION_NOT_FOUND: i32 = 11;

    /// Invalid offset or segment size exceeded on the fetch path.
    pub const INVALID_OFFSET: i32 = 20;

    /// Partition not found on the fetch/commit path.
    pub const FETCH_PARTITION_NOT_FOUND: i32 = 21;

    /// Unspecified server-side failure.
    pub const UNEXPECTED: i32 = -1;
}
