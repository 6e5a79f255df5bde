//! Producer-side batching.
//!
//! Records accumulate per `(topic, partition)` until a batch's serialized
//! size reaches the configured threshold; a background sender then ships
//! ready batches as Produce requests, and the produce dispatcher completes
//! each record's delivery future once the broker replies.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::warn;

use crate::client::connection::BrokerConnection;
use crate::client::dispatcher::{ProduceDispatcher, ProduceSlot};
use crate::client::error::{Error, Result};
use crate::protocol::api_key::ApiKey;
use crate::protocol::frame::Frame;
use crate::protocol::messages::{ProduceRequest, RecordContents};
use crate::record::RecordMetadata;

/// Serialized batch size at which a batch becomes ready to send.
const DEFAULT_BATCH_SIZE: usize = 4096;

/// How often the background sender looks for ready batches.
const DEFAULT_LINGER: Duration = Duration::from_millis(100);

/// A record handed to the producer.
#[derive(Debug, Clone)]
pub struct ProducerRecord {
    pub topic: String,
    pub partition: u32,
    pub value: Vec<u8>,
    pub key: Option<Vec<u8>>,

    /// Epoch seconds; filled with the client clock when unset.
    pub timestamp: Option<i64>,

    pub headers: BTreeMap<String, Vec<u8>>,
}

/// Resolves to the record's broker-assigned metadata.
#[derive(Debug)]
pub struct Delivery {
    rx: oneshot::Receiver<Result<RecordMetadata>>,
}

impl Delivery {
    pub async fn wait(self) -> Result<RecordMetadata> {
        self.rx.await.map_err(|_| Error::ConnectionClosed)?
    }
}

/// Buffers records per partition until a batch is worth sending.
#[derive(Debug, Default)]
pub struct RecordAccumulator {
    batches: Mutex<HashMap<(String, u32), Vec<(RecordContents, ProduceSlot)>>>,
}

impl RecordAccumulator {
    /// Adds a record and its completion slot to the partition's batch.
    pub(crate) fn add(&self, key: (String, u32), contents: RecordContents, slot: ProduceSlot) {
        let mut batches = self.batches.lock();
        batches.entry(key).or_default().push((contents, slot));
    }

    /// Removes and returns the batches whose serialized request has reached
    /// `min_bytes`.
    pub(crate) fn ready_batches(
        &self,
        min_bytes: usize,
    ) -> Vec<(ProduceRequest, Vec<ProduceSlot>)> {
        self.take_batches(Some(min_bytes))
    }

    /// Removes and returns every non-empty batch.
    pub(crate) fn drain(&self) -> Vec<(ProduceRequest, Vec<ProduceSlot>)> {
        self.take_batches(None)
    }

    fn take_batches(&self, min_bytes: Option<usize>) -> Vec<(ProduceRequest, Vec<ProduceSlot>)> {
        let mut batches = self.batches.lock();
        let keys: Vec<(String, u32)> = batches.keys().cloned().collect();

        let mut ready = Vec::new();
        for key in keys {
            let Some(entries) = batches.get(&key) else {
                continue;
            };
            if entries.is_empty() {
                continue;
            }

            let request = ProduceRequest {
                topic: key.0.clone(),
                partition: key.1,
                records: entries
                    .iter()
                    .map(|(contents, _)| contents.clone())
                    .collect(),
            };
            let size = serde_json::to_vec(&request).map(|p| p.len()).unwrap_or(0);
            if min_bytes.map_or(true, |min| size >= min) {
                let slots = batches
                    .remove(&key)
                    .unwrap_or_default()
                    .into_iter()
                    .map(|(_, slot)| slot)
                    .collect();
                ready.push((request, slots));
            }
        }
        ready
    }
}

/// Builder for [`Producer`].
#[derive(Debug)]
pub struct ProducerBuilder {
    broker: String,
    connect_timeout: Option<Duration>,
    batch_size: usize,
    linger: Duration,
}

impl ProducerBuilder {
    pub fn new(broker: impl Into<String>) -> Self {
        Self {
            broker: broker.into(),
            connect_timeout: None,
            batch_size: DEFAULT_BATCH_SIZE,
            linger: DEFAULT_LINGER,
        }
    }

    /// Bounds the TCP connection attempt.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Serialized batch size at which a batch is shipped without waiting
    /// for [`Producer::flush`].
    pub fn batch_size(mut self, bytes: usize) -> Self {
        self.batch_size = bytes;
        self
    }

    /// Interval at which the background sender checks for ready batches.
    pub fn linger(mut self, linger: Duration) -> Self {
        self.linger = linger;
        self
    }

    /// Connects and starts the dispatcher and sender tasks.
    pub async fn build(self) -> Result<Producer> {
        let (conn, frames) = BrokerConnection::connect(&self.broker, self.connect_timeout).await?;
        let conn = Arc::new(conn);
        let dispatcher = Arc::new(ProduceDispatcher::default());
        let accumulator = Arc::new(RecordAccumulator::default());
        let next_correlation_id = Arc::new(AtomicU32::new(1));

        let dispatch_task = tokio::spawn({
            let dispatcher = Arc::clone(&dispatcher);
            async move { dispatcher.run(frames).await }
        });

        let sender_task = tokio::spawn({
            let conn = Arc::clone(&conn);
            let dispatcher = Arc::clone(&dispatcher);
            let accumulator = Arc::clone(&accumulator);
            let next_correlation_id = Arc::clone(&next_correlation_id);
            let batch_size = self.batch_size;
            let linger = self.linger;
            async move {
                let mut interval = tokio::time::interval(linger);
                loop {
                    interval.tick().await;
                    let batches = accumulator.ready_batches(batch_size);
                    if let Err(err) =
                        send_batches(&conn, &dispatcher, &next_correlation_id, batches).await
                    {
                        warn!(%err, "background batch send failed");
                        break;
                    }
                }
            }
        });

        Ok(Producer {
            conn,
            dispatcher,
            accumulator,
            next_correlation_id,
            dispatch_task,
            sender_task,
        })
    }
}

/// A batching producer over one broker connection.
#[derive(Debug)]
pub struct Producer {
    conn: Arc<BrokerConnection>,
    dispatcher: Arc<ProduceDispatcher>,
    accumulator: Arc<RecordAccumulator>,
    next_correlation_id: Arc<AtomicU32>,
    dispatch_task: JoinHandle<()>,
    sender_task: JoinHandle<()>,
}

impl Drop for Producer {
    fn drop(&mut self) {
        self.sender_task.abort();
        self.dispatch_task.abort();
    }
}

impl Producer {
    /// Queues one record. The returned [`Delivery`] resolves once the broker
    /// acknowledges the batch the record was shipped in.
    pub fn send(&self, record: ProducerRecord) -> Delivery {
        let timestamp = record
            .timestamp
            .unwrap_or_else(|| chrono::Utc::now().timestamp());
        let contents = RecordContents {
            value: record.value,
            key: record.key,
            timestamp: Some(timestamp),
            headers: record.headers,
        };

        let (tx, rx) = oneshot::channel();
        self.accumulator.add(
            (record.topic, record.partition),
            contents,
            ProduceSlot { timestamp, tx },
        );
        Delivery { rx }
    }

    /// Ships every buffered batch regardless of size.
    pub async fn flush(&self) -> Result<()> {
        let batches = self.accumulator.drain();
        send_batches(
            &self.conn,
            &self.dispatcher,
            &self.next_correlation_id,
            batches,
        )
        .await
    }
}

async fn send_batches(
    conn: &BrokerConnection,
    dispatcher: &ProduceDispatcher,
    next_correlation_id: &AtomicU32,
    batches: Vec<(ProduceRequest, Vec<ProduceSlot>)>,
) -> Result<()> {
    for (request, slots) in batches {
        let correlation_id = next_correlation_id.fetch_add(1, Ordering::Relaxed);
        let payload = serde_json::to_vec(&request)?;

        // Link before sending so a fast response cannot race the slot table.
        dispatcher.link(correlation_id, slots)?;
        if let Err(err) = conn
            .send(&Frame::new(correlation_id, ApiKey::Produce, payload))
            .await
        {
            if let Some(slots) = dispatcher.unlink(correlation_id) {
                for slot in slots {
                    let _ = slot.tx.send(Err(Error::ConnectionClosed));
                }
            }
            return Err(err.into());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contents(value: &[u8]) -> RecordContents {
        RecordContents {
            value: value.to_vec(),
            key: None,
            timestamp: Some(1),
            headers: BTreeMap::new(),
        }
    }

    fn slot() -> (ProduceSlot, oneshot::Receiver<Result<RecordMetadata>>) {
        let (tx, rx) = oneshot::channel();
        (ProduceSlot { timestamp: 1, tx }, rx)
    }

    #[test]
    fn test_accumulator_batches_per_partition() {
        let accumulator = RecordAccumulator::default();
        let (s1, _r1) = slot();
        let (s2, _r2) = slot();
        let (s3, _r3) = slot();

        accumulator.add(("t1".to_owned(), 0), contents(b"a"), s1);
        accumulator.add(("t1".to_owned(), 0), contents(b"b"), s2);
        accumulator.add(("t1".to_owned(), 1), contents(b"c"), s3);

        let mut batches = accumulator.drain();
        batches.sort_by_key(|(request, _)| request.partition);

        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].0.records.len(), 2);
        assert_eq!(batches[0].1.len(), 2);
        assert_eq!(batches[1].0.records.len(), 1);

        // Draining empties the accumulator.
        assert!(accumulator.drain().is_empty());
    }

    #[test]
    fn test_ready_batches_respects_threshold() {
        let accumulator = RecordAccumulator::default();
        let (s1, _r1) = slot();
        accumulator.add(("t1".to_owned(), 0), contents(b"tiny"), s1);

        assert!(accumulator.ready_batches(10_000).is_empty());

        let batches = accumulator.ready_batches(1);
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].0.topic, "t1");
    }
}
