//! One handler per API key.
//!
//! Handlers catch every domain error and encode it into the response
//! payload; only framing/protocol errors propagate and tear down the
//! connection. Element-shaped requests (CreateTopics, OffsetCommit) report
//! per-element results; Produce and Fetch succeed or fail per call.

use std::collections::HashSet;

use tracing::warn;

use crate::protocol::messages::{
    error_code, CommitStatus, CreateTopicsRequest, CreateTopicsResponse, FetchRequest,
    FetchResponse, ListTopicsResponse, OffsetCommitRequest, OffsetCommitResponse, ProduceRequest,
    ProduceResponse, TopicStatus,
};
use crate::record::{Record, RecordBody};
use crate::storage::error::StorageError;
use crate::storage::offsets::{CommittedOffset, OffsetStore};
use crate::storage::{FetchQuery, LogStorage};

pub(crate) fn create_topics(
    storage: &LogStorage,
    request: CreateTopicsRequest,
) -> CreateTopicsResponse {
    let mut seen = HashSet::new();
    if request.topics.iter().any(|t| !seen.insert(t.name.as_str())) {
        let topics = request
            .topics
            .into_iter()
            .map(|topic| {
                TopicStatus::failure(
                    topic.name,
                    error_code::INVALID_ADMIN_COMMAND,
                    "duplicate topic names in request",
                )
            })
            .collect();
        return CreateTopicsResponse { topics };
    }

    let topics = request
        .topics
        .into_iter()
        .map(
            |topic| match storage.init_topic(&topic.name, topic.num_partitions) {
                Ok(()) => TopicStatus::success(topic.name),
                Err(err) => {
                    warn!(topic = %topic.name, %err, "create topic failed");
                    TopicStatus::failure(topic.name, create_topics_error_code(&err), err.to_string())
                }
            },
        )
        .collect();
    CreateTopicsResponse { topics }
}

pub(crate) fn produce(storage: &LogStorage, request: ProduceRequest) -> ProduceResponse {
    let now = chrono::Utc::now().timestamp();
    let ProduceRequest {
        topic,
        partition,
        records,
    } = request;

    let records: Vec<Record> = records
        .into_iter()
        .map(|contents| contents.into_record(&topic, partition, now))
        .collect();

    // Appends are not rolled back on failure; records written before the
    // error remain and the caller resolves actual success by fetching.
    match storage.append_batch(&topic, partition, &records) {
        Ok(base_offset) => ProduceResponse::success(topic, partition, base_offset),
        Err(err) => {
            warn!(%topic, partition, %err, "produce failed");
            ProduceResponse::failure(topic, partition, produce_error_code(&err), err.to_string())
        }
    }
}

pub(crate) fn fetch(storage: &LogStorage, request: FetchRequest) -> FetchResponse {
    let query = FetchQuery {
        topic: request.topic.clone(),
        partition: request.partition,
        offset: request.offset,
        max_bytes: request.max_bytes,
    };

    let records = match storage.list_logs(&query) {
        Ok(records) => records,
        Err(err) => {
            warn!(topic = %request.topic, partition = request.partition, %err, "fetch failed");
            return FetchResponse::failure(
                request.topic,
                request.partition,
                fetch_error_code(&err),
                err.to_string(),
            );
        }
    };

    match records
        .iter()
        .map(Record::body)
        .collect::<Result<Vec<RecordBody>, _>>()
    {
        Ok(bodies) => FetchResponse::success(request.topic, request.partition, bodies),
        Err(err) => FetchResponse::failure(
            request.topic,
            request.partition,
            error_code::INVALID_OFFSET,
            err.to_string(),
        ),
    }
}

pub(crate) fn offset_commit(
    log_storage: &LogStorage,
    offset_store: &OffsetStore,
    request: OffsetCommitRequest,
) -> OffsetCommitResponse {
    let group_id = request.group_id;
    let topics = request
        .topics
        .into_iter()
        .map(|entry| {
            if !log_storage.has_partition(&entry.topic, entry.partition) {
                return CommitStatus::failure(
                    entry.topic.clone(),
                    entry.partition,
                    error_code::FETCH_PARTITION_NOT_FOUND,
                    format!("partition {}-{} does not exist", entry.topic, entry.partition),
                );
            }

            let committed = CommittedOffset {
                group_id: group_id.clone(),
                topic: entry.topic.clone(),
                partition: entry.partition,
                offset: entry.offset,
            };
            match offset_store.update_and_commit(committed) {
                Ok(()) => CommitStatus::success(entry.topic, entry.partition),
                Err(err) => {
                    warn!(%group_id, topic = %entry.topic, partition = entry.partition, %err, "offset commit failed");
                    CommitStatus::failure(
                        entry.topic,
                        entry.partition,
                        error_code::UNEXPECTED,
                        err.to_string(),
                    )
                }
            }
        })
        .collect();
    OffsetCommitResponse { topics }
}

pub(crate) fn list_topics(storage: &LogStorage) -> ListTopicsResponse {
    ListTopicsResponse::success(storage.list_topics())
}

fn create_topics_error_code(err: &StorageError) -> i32 {
    match err {
        StorageError::InvalidAdminCommand(_) => error_code::INVALID_ADMIN_COMMAND,
        StorageError::PartitionNotFound { .. } => error_code::PARTITION_NOT_FOUND,
        _ => error_code::UNEXPECTED,
    }
}

fn produce_error_code(err: &StorageError) -> i32 {
    match err {
        StorageError::PartitionNotFound { .. } => error_code::PARTITION_NOT_FOUND,
        _ => error_code::UNEXPECTED,
    }
}

fn fetch_error_code(err: &StorageError) -> i32 {
    match err {
        StorageError::PartitionNotFound { .. } => error_code::FETCH_PARTITION_NOT_FOUND,
        StorageError::InvalidOffset(_)
        | StorageError::ExceedSegmentSize { .. }
        | StorageError::Record(_) => error_code::INVALID_OFFSET,
        _ => error_code::UNEXPECTED,
    }
}
