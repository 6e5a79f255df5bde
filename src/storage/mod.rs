//! Durable storage: the partition map and the committed-offset store.
//!
//! [`LogStorage`] owns every partition under one root directory, using the
//! layout `root/<topic>-<partition>/<base_offset>.log|.index`. It is shared
//! process-wide; writes to a partition are serialized by a per-partition
//! lock, and reads take the same lock so they observe a consistent snapshot.

pub mod error;
pub mod offsets;
pub mod partition;
pub mod segment;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, info};

use crate::record::Record;
use error::{Result, StorageError};
use partition::Partition;

/// A fetch request as seen by the storage layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchQuery {
    pub topic: String,
    pub partition: u32,
    pub offset: u64,
    pub max_bytes: u64,
}

/// Owns the partitions under one root directory and routes appends and
/// fetches to them.
#[derive(Debug)]
pub struct LogStorage {
    root: PathBuf,
    segment_size_limit: u64,
    partitions: RwLock<HashMap<(String, u32), Arc<Mutex<Partition>>>>,
}

impl LogStorage {
    /// Scans `root` (creating it if missing) and rebuilds the partition map.
    ///
    /// Every directory named `<topic>-<partition>` containing log files
    /// becomes a partition, its log-end offset restored from the active
    /// segment.
    pub fn load_from_root(root: impl Into<PathBuf>, segment_size_limit: u64) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;

        let mut partitions = HashMap::new();
        for entry in std::fs::read_dir(&root)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let dirname = entry.file_name();
            let Some(dirname) = dirname.to_str() else {
                continue;
            };
            let Some((topic, num)) = parse_partition_dirname(dirname) else {
                continue;
            };
            if let Some(partition) = Partition::open(&root, topic, num, segment_size_limit)? {
                partitions.insert(
                    (topic.to_owned(), num),
                    Arc::new(Mutex::new(partition)),
                );
            }
        }

        info!(
            root = %root.display(),
            partitions = partitions.len(),
            "loaded log storage"
        );
        Ok(Self {
            root,
            segment_size_limit,
            partitions: RwLock::new(partitions),
        })
    }

    /// Creates partitions `0..num_partitions` for a topic.
    ///
    /// Idempotent: partitions that already exist, on disk or in memory, are
    /// left untouched.
    pub fn init_topic(&self, topic: &str, num_partitions: i32) -> Result<()> {
        if num_partitions <= 0 {
            return Err(StorageError::InvalidAdminCommand(
                "number of partitions must be greater than 0".to_owned(),
            ));
        }
        for num in 0..num_partitions as u32 {
            self.init_partition(topic, num)?;
        }
        Ok(())
    }

    /// Grows an existing topic by `num_partitions` new partitions, numbered
    /// after the current maximum.
    pub fn append_partitions(&self, topic: &str, num_partitions: i32) -> Result<()> {
        if num_partitions <= 0 {
            return Err(StorageError::InvalidAdminCommand(
                "number of partitions must be greater than 0".to_owned(),
            ));
        }
        let existing = {
            let partitions = self.partitions.read();
            partitions.keys().filter(|(t, _)| t == topic).count() as u32
        };
        for num in existing..existing + num_partitions as u32 {
            self.init_partition(topic, num)?;
        }
        Ok(())
    }

    fn init_partition(&self, topic: &str, num: u32) -> Result<()> {
        let mut partitions = self.partitions.write();
        if partitions.contains_key(&(topic.to_owned(), num)) {
            return Ok(());
        }

        // A directory left over from a previous run is recovered, never
        // clobbered.
        let dir = self.root.join(format!("{topic}-{num}"));
        let partition = if dir.is_dir() {
            match Partition::open(&self.root, topic, num, self.segment_size_limit)? {
                Some(partition) => partition,
                None => Partition::create(&self.root, topic, num, self.segment_size_limit)?,
            }
        } else {
            Partition::create(&self.root, topic, num, self.segment_size_limit)?
        };

        debug!(topic, partition = num, leo = partition.leo(), "initialized partition");
        partitions.insert((topic.to_owned(), num), Arc::new(Mutex::new(partition)));
        Ok(())
    }

    /// Appends one record with an unset offset; returns the assigned offset.
    pub fn append_log(&self, record: &Record) -> Result<u64> {
        let partition = self.partition(&record.topic, record.partition)?;
        let mut partition = partition.lock();
        partition.append(record)
    }

    /// Appends a batch to one partition while holding its writer lock, so
    /// the assigned offsets are consecutive starting at the returned base
    /// offset. On failure, records appended before the error remain.
    pub fn append_batch(&self, topic: &str, partition_num: u32, records: &[Record]) -> Result<u64> {
        let partition = self.partition(topic, partition_num)?;
        let mut partition = partition.lock();
        let base_offset = partition.leo();
        for record in records {
            partition.append(record)?;
        }
        Ok(base_offset)
    }

    /// Reads records per the query, in offset order, within the byte budget.
    pub fn list_logs(&self, query: &FetchQuery) -> Result<Vec<Record>> {
        let partition = self.partition(&query.topic, query.partition)?;
        let partition = partition.lock();
        partition.fetch(query.offset, query.max_bytes)
    }

    /// Deduplicated, sorted topic names.
    pub fn list_topics(&self) -> Vec<String> {
        let partitions = self.partitions.read();
        let mut topics: Vec<String> = partitions.keys().map(|(topic, _)| topic.clone()).collect();
        topics.sort_unstable();
        topics.dedup();
        topics
    }

    /// The log-end offset of one partition.
    pub fn leo(&self, topic: &str, partition: u32) -> Result<u64> {
        let partition = self.partition(topic, partition)?;
        let partition = partition.lock();
        Ok(partition.leo())
    }

    /// Whether the partition exists.
    pub fn has_partition(&self, topic: &str, partition: u32) -> bool {
        self.partitions
            .read()
            .contains_key(&(topic.to_owned(), partition))
    }

    fn partition(&self, topic: &str, num: u32) -> Result<Arc<Mutex<Partition>>> {
        self.partitions
            .read()
            .get(&(topic.to_owned(), num))
            .cloned()
            .ok_or_else(|| StorageError::PartitionNotFound {
                topic: topic.to_owned(),
                partition: num,
            })
    }
}

/// Splits a `<topic>-<partition>` directory name. The partition number is
/// the digits after the last dash, so topic names may contain dashes.
fn parse_partition_dirname(name: &str) -> Option<(&str, u32)> {
    let (topic, partition) = name.rsplit_once('-')?;
    if topic.is_empty() || partition.is_empty() || !partition.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some((topic, partition.parse().ok()?))
}
