//! A single-node, Kafka-style message broker and client.
//!
//! Producers append records to topic/partitions, consumers fetch ranges of
//! records by offset, consumer groups commit progress, and an admin surface
//! creates topics. The broker persists records durably in a segmented,
//! append-only log on local disk and speaks a length-prefixed
//! request/response protocol over a single TCP listener.
//!
//! The pieces:
//!
//! - [`protocol`] — frame codec and per-API JSON payload schemas;
//! - [`storage`] — segmented partition logs with index sidecars, recovery,
//!   and the committed-offset store;
//! - [`broker`] — the accept loop, per-connection request pipeline, and
//!   API-key dispatch;
//! - [`client`] — correlated request/response clients, including a batching
//!   producer.

pub mod broker;
pub mod client;
pub mod constants;
pub mod protocol;
pub mod record;
pub mod storage;
