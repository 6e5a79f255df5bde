//! API-key dispatch.

use std::sync::Arc;

use bytes::Bytes;
use serde::Serialize;
use thiserror::Error;

use crate::broker::handlers;
use crate::protocol::api_key::ApiKey;
use crate::protocol::frame::Frame;
use crate::protocol::messages::{CreateTopicsRequest, OffsetCommitRequest, ProduceRequest};
use crate::storage::offsets::OffsetStore;
use crate::storage::LogStorage;

/// Errors that cannot be answered with a framed response; the connection is
/// closed instead.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RouteError {
    #[error("no handler registered for API key {0:?}")]
    UnknownMessageType(ApiKey),

    #[error("malformed request payload: {0}")]
    BadRequest(#[from] serde_json::Error),

    #[error("invalid request: {0}")]
    InvalidRequest(&'static str),
}

/// Maps each API key to its handler and frames the handler's response under
/// the request's header.
#[derive(Debug)]
pub struct Router {
    log_storage: Arc<LogStorage>,
    offset_store: Arc<OffsetStore>,
}

impl Router {
    pub fn new(log_storage: Arc<LogStorage>, offset_store: Arc<OffsetStore>) -> Self {
        Self {
            log_storage,
            offset_store,
        }
    }

    pub fn route(&self, request: &Frame) -> Result<Frame, RouteError> {
        let payload = match request.header.api_key {
            ApiKey::CreateTopics => {
                let req: CreateTopicsRequest = serde_json::from_slice(&request.payload)?;
                if req.topics.is_empty() {
                    return Err(RouteError::InvalidRequest(
                        "CreateTopics requires at least one topic",
                    ));
                }
                to_payload(&handlers::create_topics(&self.log_storage, req))?
            }
            ApiKey::Produce => {
                let req: ProduceRequest = serde_json::from_slice(&request.payload)?;
                if req.records.is_empty() {
                    return Err(RouteError::InvalidRequest(
                        "Produce requires at least one record",
                    ));
                }
                to_payload(&handlers::produce(&self.log_storage, req))?
            }
            ApiKey::Fetch => to_payload(&handlers::fetch(
                &self.log_storage,
                serde_json::from_slice(&request.payload)?,
            ))?,
            ApiKey::OffsetCommit => {
                let req: OffsetCommitRequest = serde_json::from_slice(&request.payload)?;
                if req.topics.is_empty() {
                    return Err(RouteError::InvalidRequest(
                        "OffsetCommit requires at least one entry",
                    ));
                }
                to_payload(&handlers::offset_commit(
                    &self.log_storage,
                    &self.offset_store,
                    req,
                ))?
            }
            ApiKey::ListTopics => to_payload(&handlers::list_topics(&self.log_storage))?,
            key @ ApiKey::Unknown(_) => return Err(RouteError::UnknownMessageType(key)),
        };

        Ok(Frame {
            header: request.header,
            payload,
        })
    }
}

fn to_payload<T: Serialize>(response: &T) -> Result<Bytes, RouteError> {
    Ok(serde_json::to_vec(response)?.into())
}
