//! Broker clients.
//!
//! [`Client`] issues correlated admin and consumer requests over one broker
//! connection; [`producer::Producer`] batches records per partition before
//! shipping them. Both run a background dispatcher task that routes
//! response frames back to their waiting request by correlation id.

pub mod connection;
pub mod dispatcher;
pub mod error;
pub mod producer;

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::task::JoinHandle;

use crate::protocol::api_key::ApiKey;
use crate::protocol::frame::Frame;
use crate::protocol::messages::{
    error_code, CreateTopicsRequest, CreateTopicsResponse, FetchRequest, FetchResponse, NewTopic,
    OffsetCommitRequest, OffsetCommitResponse, ProduceRequest, ProduceResponse, RecordContents,
    TopicOffset,
};
use crate::record::Record;
use connection::BrokerConnection;
use dispatcher::ResponseDispatcher;
use error::{Error, Result};

/// Builder for [`Client`].
#[derive(Debug)]
pub struct ClientBuilder {
    broker: String,
    connect_timeout: Option<Duration>,
}

impl ClientBuilder {
    /// Creates a new [`ClientBuilder`] for the given broker address.
    pub fn new(broker: impl Into<String>) -> Self {
        Self {
            broker: broker.into(),
            connect_timeout: None,
        }
    }

    /// Bounds the TCP connection attempt.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Connects and starts the background response dispatcher.
    pub async fn build(self) -> Result<Client> {
        let (conn, frames) = BrokerConnection::connect(&self.broker, self.connect_timeout).await?;
        let dispatcher = Arc::new(ResponseDispatcher::default());
        let dispatch_task = tokio::spawn({
            let dispatcher = Arc::clone(&dispatcher);
            async move { dispatcher.run(frames).await }
        });
        Ok(Client {
            conn,
            dispatcher,
            next_correlation_id: AtomicU32::new(1),
            dispatch_task,
        })
    }
}

/// A correlated request/response client for one broker.
///
/// Correlation ids come from a monotone counter, so no two outstanding
/// requests of this client share one.
#[derive(Debug)]
pub struct Client {
    conn: BrokerConnection,
    dispatcher: Arc<ResponseDispatcher>,
    next_correlation_id: AtomicU32,
    dispatch_task: JoinHandle<()>,
}

impl Drop for Client {
    fn drop(&mut self) {
        self.dispatch_task.abort();
    }
}

impl Client {
    /// Sends one correlated request and awaits the raw response payload.
    async fn request(&self, api_key: ApiKey, payload: Bytes) -> Result<Bytes> {
        let correlation_id = self.next_correlation_id.fetch_add(1, Ordering::Relaxed);
        let rx = self.dispatcher.link(correlation_id)?;
        self.conn
            .send(&Frame::new(correlation_id, api_key, payload))
            .await?;
        rx.await.map_err(|_| Error::ConnectionClosed)
    }

    /// Creates topics. Returns the broker's per-topic results.
    pub async fn create_topics(&self, topics: Vec<NewTopic>) -> Result<CreateTopicsResponse> {
        let payload = serde_json::to_vec(&CreateTopicsRequest { topics })?;
        let response = self.request(ApiKey::CreateTopics, payload.into()).await?;
        Ok(serde_json::from_slice(&response)?)
    }

    /// Lists the topic names known to the broker.
    pub async fn list_topics(&self) -> Result<Vec<String>> {
        let response = self.request(ApiKey::ListTopics, Bytes::new()).await?;
        let response: crate::protocol::messages::ListTopicsResponse =
            serde_json::from_slice(&response)?;
        if response.error_code != error_code::NONE {
            return Err(Error::Broker {
                code: response.error_code,
                message: response.error_message.unwrap_or_default(),
            });
        }
        Ok(response.topics)
    }

    /// Produces one batch to a partition and returns the broker's response,
    /// including the base offset on success.
    pub async fn produce(
        &self,
        topic: impl Into<String>,
        partition: u32,
        records: Vec<RecordContents>,
    ) -> Result<ProduceResponse> {
        let payload = serde_json::to_vec(&ProduceRequest {
            topic: topic.into(),
            partition,
            records,
        })?;
        let response = self.request(ApiKey::Produce, payload.into()).await?;
        Ok(serde_json::from_slice(&response)?)
    }

    /// Fetches records from one partition starting at `offset`, bounded by
    /// `max_bytes` of on-disk record data.
    pub async fn fetch(
        &self,
        topic: impl Into<String>,
        partition: u32,
        offset: u64,
        max_bytes: u64,
    ) -> Result<Vec<Record>> {
        let payload = serde_json::to_vec(&FetchRequest {
            topic: topic.into(),
            partition,
            offset,
            max_bytes,
        })?;
        let response = self.request(ApiKey::Fetch, payload.into()).await?;
        let response: FetchResponse = serde_json::from_slice(&response)?;
        if response.error_code != error_code::NONE {
            return Err(Error::Broker {
                code: response.error_code,
                message: response.error_message.unwrap_or_default(),
            });
        }

        let FetchResponse {
            topic,
            partition,
            records,
            ..
        } = response;
        Ok(records
            .into_iter()
            .map(|body| Record::from_body(topic.clone(), partition, body))
            .collect())
    }

    /// Commits consumer-group offsets. Returns the per-entry results.
    pub async fn offset_commit(
        &self,
        group_id: impl Into<String>,
        topics: Vec<TopicOffset>,
    ) -> Result<OffsetCommitResponse> {
        let payload = serde_json::to_vec(&OffsetCommitRequest {
            group_id: group_id.into(),
            topics,
        })?;
        let response = self.request(ApiKey::OffsetCommit, payload.into()).await?;
        Ok(serde_json::from_slice(&response)?)
    }
}
