//! Persisted consumer-group progress.
//!
//! One broker-wide map `(group, topic, partition) -> offset`, held in memory
//! and persisted as a single JSON file that is replaced atomically on every
//! commit. A concurrent reader of the file sees either the pre- or the
//! post-commit state, never a partial write.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::constants::COMMITTED_OFFSETS_FILENAME;
use crate::storage::error::Result;

/// One consumer group's committed position in one partition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CommittedOffset {
    pub group_id: String,
    pub topic: String,
    pub partition: u32,
    pub offset: u64,
}

type OffsetKey = (String, String, u32);

/// The committed-offset store backing OffsetCommit.
#[derive(Debug)]
pub struct OffsetStore {
    path: PathBuf,
    cache: Mutex<BTreeMap<OffsetKey, u64>>,
}

impl OffsetStore {
    /// Reads the persisted mapping under `root` if present, otherwise starts
    /// empty.
    pub fn load_from_root(root: impl AsRef<Path>) -> Result<Self> {
        let path = root.as_ref().join(COMMITTED_OFFSETS_FILENAME);
        let cache = match std::fs::read(&path) {
            Ok(data) => {
                let entries: Vec<CommittedOffset> = serde_json::from_slice(&data)?;
                entries
                    .into_iter()
                    .map(|e| ((e.group_id, e.topic, e.partition), e.offset))
                    .collect()
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(err) => return Err(err.into()),
        };
        Ok(Self {
            path,
            cache: Mutex::new(cache),
        })
    }

    /// Updates the in-memory mapping. Last writer wins.
    pub fn update(&self, committed: CommittedOffset) {
        let mut cache = self.cache.lock();
        cache.insert(
            (committed.group_id, committed.topic, committed.partition),
            committed.offset,
        );
    }

    /// Persists the whole mapping atomically: written to a temp sibling,
    /// then renamed over the committed file.
    pub fn commit(&self) -> Result<()> {
        let cache = self.cache.lock();
        self.persist(&cache)
    }

    /// [`update`](Self::update) and [`commit`](Self::commit) under a single
    /// lock hold.
    pub fn update_and_commit(&self, committed: CommittedOffset) -> Result<()> {
        let mut cache = self.cache.lock();
        cache.insert(
            (committed.group_id, committed.topic, committed.partition),
            committed.offset,
        );
        self.persist(&cache)
    }

    /// The committed offset for one group/partition, if any.
    pub fn get(&self, group_id: &str, topic: &str, partition: u32) -> Option<u64> {
        let cache = self.cache.lock();
        cache
            .get(&(group_id.to_owned(), topic.to_owned(), partition))
            .copied()
    }

    /// A copy of the full mapping.
    pub fn snapshot(&self) -> BTreeMap<OffsetKey, u64> {
        self.cache.lock().clone()
    }

    fn persist(&self, cache: &BTreeMap<OffsetKey, u64>) -> Result<()> {
        let entries: Vec<CommittedOffset> = cache
            .iter()
            .map(|((group_id, topic, partition), offset)| CommittedOffset {
                group_id: group_id.clone(),
                topic: topic.clone(),
                partition: *partition,
                offset: *offset,
            })
            .collect();

        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, serde_json::to_vec(&entries)?)?;
        std::fs::rename(&tmp, &self.path)?;

        debug!(path = %self.path.display(), entries = entries.len(), "committed offsets");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn committed(group_id: &str, topic: &str, partition: u32, offset: u64) -> CommittedOffset {
        CommittedOffset {
            group_id: group_id.to_owned(),
            topic: topic.to_owned(),
            partition,
            offset,
        }
    }

    #[test]
    fn test_empty_root_loads_empty() {
        let root = tempfile::tempdir().unwrap();
        let store = OffsetStore::load_from_root(root.path()).unwrap();
        assert!(store.snapshot().is_empty());
    }

    #[test]
    fn test_commit_then_reload() {
        let root = tempfile::tempdir().unwrap();
        {
            let store = OffsetStore::load_from_root(root.path()).unwrap();
            store.update(committed("g", "t1", 0, 7));
            store.update(committed("g", "t2", 1, 42));
            store.commit().unwrap();
        }

        let store = OffsetStore::load_from_root(root.path()).unwrap();
        assert_eq!(store.get("g", "t1", 0), Some(7));
        assert_eq!(store.get("g", "t2", 1), Some(42));
        assert_eq!(store.get("other", "t1", 0), None);
    }

    #[test]
    fn test_last_writer_wins() {
        let root = tempfile::tempdir().unwrap();
        let store = OffsetStore::load_from_root(root.path()).unwrap();

        store.update(committed("g", "t1", 0, 1));
        store.update(committed("g", "t1", 0, 9));
        store.commit().unwrap();

        let reloaded = OffsetStore::load_from_root(root.path()).unwrap();
        assert_eq!(reloaded.get("g", "t1", 0), Some(9));
    }

    #[test]
    fn test_uncommitted_updates_are_not_persisted() {
        let root = tempfile::tempdir().unwrap();
        {
            let store = OffsetStore::load_from_root(root.path()).unwrap();
            store.update_and_commit(committed("g", "t1", 0, 3)).unwrap();
            store.update(committed("g", "t1", 0, 99));
            // No commit for the second update.
        }

        let store = OffsetStore::load_from_root(root.path()).unwrap();
        assert_eq!(store.get("g", "t1", 0), Some(3));
    }

    #[test]
    fn test_commit_replaces_previous_file() {
        let root = tempfile::tempdir().unwrap();
        let store = OffsetStore::load_from_root(root.path()).unwrap();

        store.update_and_commit(committed("g", "t1", 0, 1)).unwrap();
        store.update_and_commit(committed("g", "t1", 1, 2)).unwrap();

        let reloaded = OffsetStore::load_from_root(root.path()).unwrap();
        assert_eq!(reloaded.snapshot().len(), 2);
    }
}
