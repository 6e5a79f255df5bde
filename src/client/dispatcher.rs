//! Correlation-id dispatch of broker responses.
//!
//! Each outstanding request owns a slot keyed by its correlation id. A
//! dispatcher task reads response frames off the connection and completes
//! the matching slot; the slot is removed before it is completed, so at most
//! one response is ever outstanding per correlation id.

use std::collections::HashMap;

use bytes::Bytes;
use parking_lot::Mutex;
use tokio::io::AsyncRead;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::client::error::{Error, Result};
use crate::protocol::frame::FrameReader;
use crate::protocol::messages::{error_code, ProduceResponse};
use crate::record::RecordMetadata;

/// Dispatches response payloads to correlated requests.
#[derive(Debug, Default)]
pub struct ResponseDispatcher {
    pending: Mutex<HashMap<u32, oneshot::Sender<Bytes>>>,
}

impl ResponseDispatcher {
    /// Registers a pending slot and returns its completion future.
    ///
    /// Fails when the correlation id is already linked.
    pub fn link(&self, correlation_id: u32) -> Result<oneshot::Receiver<Bytes>> {
        let mut pending = self.pending.lock();
        if pending.contains_key(&correlation_id) {
            return Err(Error::InvalidCorrelationId(correlation_id));
        }
        let (tx, rx) = oneshot::channel();
        pending.insert(correlation_id, tx);
        Ok(rx)
    }

    /// Reads one response frame and completes its slot.
    pub async fn dispatch<R>(&self, frames: &mut FrameReader<R>) -> Result<()>
    where
        R: AsyncRead + Unpin,
    {
        let frame = frames.read_frame().await?.ok_or(Error::ConnectionClosed)?;
        let correlation_id = frame.header.correlation_id;
        let Some(slot) = self.pending.lock().remove(&correlation_id) else {
            return Err(Error::InvalidCorrelationId(correlation_id));
        };
        // The waiting side may have given up; nothing left to deliver then.
        let _ = slot.send(frame.payload);
        Ok(())
    }

    /// Dispatches until the stream closes, then releases every pending slot.
    ///
    /// Dropping the senders fails each waiting request with a closed-
    /// connection error.
    pub async fn run<R>(&self, mut frames: FrameReader<R>)
    where
        R: AsyncRead + Unpin,
    {
        loop {
            match self.dispatch(&mut frames).await {
                Ok(()) => {}
                Err(Error::ConnectionClosed) => break,
                Err(err) => {
                    warn!(%err, "response dispatch failed");
                    break;
                }
            }
        }
        let released = self.pending.lock().drain().count();
        if released > 0 {
            debug!(released, "released pending requests on connection close");
        }
    }
}

/// The completion slot for one record of a produce batch.
#[derive(Debug)]
pub(crate) struct ProduceSlot {
    /// Timestamp the record was sent with; echoed into the metadata because
    /// the Produce response does not carry one.
    pub timestamp: i64,

    pub tx: oneshot::Sender<Result<RecordMetadata>>,
}

/// Dispatches Produce responses, fanning one response out to the whole
/// batch: the completion at index `i` receives `base_offset + i`.
#[derive(Debug, Default)]
pub struct ProduceDispatcher {
    pending: Mutex<HashMap<u32, Vec<ProduceSlot>>>,
}

impl ProduceDispatcher {
    /// Registers the batch's completion slots under one correlation id.
    pub(crate) fn link(&self, correlation_id: u32, slots: Vec<ProduceSlot>) -> Result<()> {
        let mut pending = self.pending.lock();
        if pending.contains_key(&correlation_id) {
            return Err(Error::InvalidCorrelationId(correlation_id));
        }
        pending.insert(correlation_id, slots);
        Ok(())
    }

    /// Removes a linked batch, e.g. when its request could not be sent.
    pub(crate) fn unlink(&self, correlation_id: u32) -> Option<Vec<ProduceSlot>> {
        self.pending.lock().remove(&correlation_id)
    }

    /// Reads one response frame and completes the batch it belongs to.
    pub async fn dispatch<R>(&self, frames: &mut FrameReader<R>) -> Result<()>
    where
        R: AsyncRead + Unpin,
    {
        let frame = frames.read_frame().await?.ok_or(Error::ConnectionClosed)?;
        let correlation_id = frame.header.correlation_id;
        let Some(slots) = self.pending.lock().remove(&correlation_id) else {
            return Err(Error::InvalidCorrelationId(correlation_id));
        };

        let response: ProduceResponse = serde_json::from_slice(&frame.payload)?;
        if response.error_code != error_code::NONE {
            for slot in slots {
                let _ = slot.tx.send(Err(Error::Broker {
                    code: response.error_code,
                    message: response.error_message.clone().unwrap_or_default(),
                }));
            }
            return Ok(());
        }

        for (idx, slot) in slots.into_iter().enumerate() {
            let metadata = RecordMetadata {
                topic: response.topic.clone(),
                partition: response.partition,
                offset: response.base_offset as u64 + idx as u64,
                timestamp: slot.timestamp,
            };
            let _ = slot.tx.send(Ok(metadata));
        }
        Ok(())
    }

    /// Dispatches until the stream closes, then releases every pending slot.
    pub async fn run<R>(&self, mut frames: FrameReader<R>)
    where
        R: AsyncRead + Unpin,
    {
        loop {
            match self.dispatch(&mut frames).await {
                Ok(()) => {}
                Err(Error::ConnectionClosed) => break,
                Err(err) => {
                    warn!(%err, "produce dispatch failed");
                    break;
                }
            }
        }
        let released = self.pending.lock().drain().count();
        if released > 0 {
            debug!(released, "released pending produce batches on connection close");
        }
    }
}
