//! An append-only partition: ordered segments plus the log-end offset.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::record::Record;
use crate::storage::error::{Result, StorageError};
use crate::storage::segment::Segment;

/// One partition of a topic.
///
/// Segments are sorted by base offset; the last one is "active" and the only
/// one appended to. `leo` (log-end offset) is the offset the next record
/// will receive.
#[derive(Debug)]
pub struct Partition {
    topic: String,
    num: u32,
    dir: PathBuf,
    size_limit: u64,
    segments: Vec<Segment>,
    leo: u64,
}

impl Partition {
    /// Creates the partition directory with one empty segment at offset 0.
    pub fn create(root: &Path, topic: &str, num: u32, size_limit: u64) -> Result<Self> {
        let dir = root.join(format!("{topic}-{num}"));
        std::fs::create_dir_all(&dir)?;
        let segment = Segment::create(&dir, topic, num, 0, size_limit)?;
        Ok(Self {
            topic: topic.to_owned(),
            num,
            dir,
            size_limit,
            segments: vec![segment],
            leo: 0,
        })
    }

    /// Recovers a partition from its directory.
    ///
    /// Segments are rebuilt from the `.log` file names sorted by base
    /// offset; the log-end offset is restored by counting the records of the
    /// active segment. Returns `None` when the directory holds no log files.
    pub fn open(root: &Path, topic: &str, num: u32, size_limit: u64) -> Result<Option<Self>> {
        let dir = root.join(format!("{topic}-{num}"));
        let mut base_offsets = Vec::new();
        for entry in std::fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("log") {
                continue;
            }
            match path
                .file_stem()
                .and_then(|stem| stem.to_str())
                .and_then(|stem| stem.parse::<u64>().ok())
            {
                Some(base_offset) => base_offsets.push(base_offset),
                None => warn!(path = %path.display(), "skipping unparsable log file name"),
            }
        }
        if base_offsets.is_empty() {
            return Ok(None);
        }
        base_offsets.sort_unstable();

        let segments: Vec<Segment> = base_offsets
            .into_iter()
            .map(|base_offset| Segment::open(&dir, topic, num, base_offset, size_limit))
            .collect();
        let leo = match segments.last() {
            Some(active) => active.base_offset() + active.record_count_from_log()?,
            None => 0,
        };

        debug!(
            topic,
            partition = num,
            segments = segments.len(),
            leo,
            "recovered partition"
        );
        Ok(Some(Self {
            topic: topic.to_owned(),
            num,
            dir,
            size_limit,
            segments,
            leo,
        }))
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn num(&self) -> u32 {
        self.num
    }

    /// The offset the next appended record will receive.
    pub fn leo(&self) -> u64 {
        self.leo
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    fn active(&self) -> &Segment {
        match self.segments.last() {
            Some(segment) => segment,
            None => unreachable!("partition always holds at least one segment"),
        }
    }

    /// Appends a record with an unset offset, assigning it the current
    /// log-end offset. Rolls to a new segment when the active one would
    /// exceed its size limit, except when the record alone cannot fit any
    /// segment.
    pub fn append(&mut self, record: &Record) -> Result<u64> {
        let offset = self.leo;
        let record = record.with_offset(offset)?;

        if let Err(err) = self.active().append(&record) {
            match err {
                StorageError::ExceedSegmentSize { .. } if self.active().log_size()? > 0 => {
                    self.roll()?;
                    self.active().append(&record)?;
                }
                err => return Err(err),
            }
        }

        self.leo += 1;
        Ok(offset)
    }

    fn roll(&mut self) -> Result<()> {
        debug!(
            topic = %self.topic,
            partition = self.num,
            base_offset = self.leo,
            "rolling to a new segment"
        );
        let segment = Segment::create(&self.dir, &self.topic, self.num, self.leo, self.size_limit)?;
        self.segments.push(segment);
        Ok(())
    }

    /// Reads records starting at `start_offset`, in offset order, stopping
    /// before the first record that would push the cumulative on-disk size
    /// past `max_bytes`.
    pub fn fetch(&self, start_offset: u64, max_bytes: u64) -> Result<Vec<Record>> {
        // The last segment whose base offset is <= start_offset may contain
        // the start; every later segment only holds higher offsets.
        let first = self
            .segments
            .partition_point(|segment| segment.base_offset() <= start_offset)
            .saturating_sub(1);

        let mut records = Vec::new();
        let mut remaining = max_bytes;
        for segment in &self.segments[first..] {
            let batch = segment.read(start_offset, remaining)?;
            let returned = batch.len() as u64;
            for record in batch {
                remaining = remaining.saturating_sub(record.encoded_len()?);
                records.push(record);
            }

            // The segment holds qualifying records it did not return, so the
            // byte budget was the limiting factor. Later segments only hold
            // higher offsets; including them would break contiguity.
            let end_offset = segment.base_offset() + segment.record_count()?;
            let qualifying = end_offset.saturating_sub(start_offset.max(segment.base_offset()));
            if returned < qualifying {
                break;
            }
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::BTreeMap;

    use assert_matches::assert_matches;

    fn record(value: &[u8]) -> Record {
        Record {
            topic: "t1".to_owned(),
            partition: 0,
            value: value.to_vec(),
            key: None,
            timestamp: 1,
            headers: BTreeMap::new(),
            offset: None,
        }
    }

    #[test]
    fn test_append_assigns_dense_offsets() {
        let root = tempfile::tempdir().unwrap();
        let mut partition = Partition::create(root.path(), "t1", 0, 1024 * 1024).unwrap();

        for expected in 0..10 {
            let offset = partition.append(&record(b"payload")).unwrap();
            assert_eq!(offset, expected);
            assert_eq!(partition.leo(), expected + 1);
        }
    }

    #[test]
    fn test_append_rejects_preassigned_offset() {
        let root = tempfile::tempdir().unwrap();
        let mut partition = Partition::create(root.path(), "t1", 0, 1024 * 1024).unwrap();

        let mut preassigned = record(b"payload");
        preassigned.offset = Some(7);
        assert_matches!(
            partition.append(&preassigned),
            Err(StorageError::Record(_))
        );
        assert_eq!(partition.leo(), 0);
    }

    #[test]
    fn test_roll_on_size_limit() {
        let root = tempfile::tempdir().unwrap();
        // Two records of ~89 bytes each against a 100 byte limit: the second
        // append must roll.
        let value = [b'x'; 18];
        let mut partition = Partition::create(root.path(), "t1", 0, 100).unwrap();

        partition.append(&record(&value)).unwrap();
        assert_eq!(partition.segments().len(), 1);

        partition.append(&record(&value)).unwrap();
        let bases: Vec<u64> = partition.segments().iter().map(|s| s.base_offset()).collect();
        assert_eq!(bases, vec![0, 1]);
        assert_eq!(partition.leo(), 2);

        // Both records stay fetchable across the roll.
        let records = partition.fetch(0, 10_000).unwrap();
        assert_eq!(
            records.iter().map(|r| r.offset).collect::<Vec<_>>(),
            vec![Some(0), Some(1)]
        );
    }

    #[test]
    fn test_oversized_record_does_not_roll_forever() {
        let root = tempfile::tempdir().unwrap();
        let mut partition = Partition::create(root.path(), "t1", 0, 32).unwrap();

        assert_matches!(
            partition.append(&record(&[b'x'; 64])),
            Err(StorageError::ExceedSegmentSize { .. })
        );
        assert_eq!(partition.segments().len(), 1);
        assert_eq!(partition.leo(), 0);
    }

    #[test]
    fn test_fetch_across_segments_respects_budget() {
        let root = tempfile::tempdir().unwrap();
        let value = [b'x'; 18];
        let mut partition = Partition::create(root.path(), "t1", 0, 100).unwrap();
        for _ in 0..4 {
            partition.append(&record(&value)).unwrap();
        }
        assert_eq!(partition.segments().len(), 4);

        let one_record = partition.fetch(0, u64::MAX).unwrap()[0]
            .encoded_len()
            .unwrap();

        // Budget for two records: fetch stops after the first two segments.
        let records = partition.fetch(0, 2 * one_record).unwrap();
        assert_eq!(
            records.iter().map(|r| r.offset).collect::<Vec<_>>(),
            vec![Some(0), Some(1)]
        );

        // Starting mid-stream skips earlier segments entirely.
        let records = partition.fetch(2, u64::MAX).unwrap();
        assert_eq!(
            records.iter().map(|r| r.offset).collect::<Vec<_>>(),
            vec![Some(2), Some(3)]
        );
    }

    #[test]
    fn test_fetch_past_end_is_empty() {
        let root = tempfile::tempdir().unwrap();
        let mut partition = Partition::create(root.path(), "t1", 0, 1024 * 1024).unwrap();
        partition.append(&record(b"only")).unwrap();

        assert!(partition.fetch(1, u64::MAX).unwrap().is_empty());
        assert!(partition.fetch(100, u64::MAX).unwrap().is_empty());
    }

    #[test]
    fn test_open_restores_leo() {
        let root = tempfile::tempdir().unwrap();
        {
            let mut partition = Partition::create(root.path(), "t1", 0, 100).unwrap();
            for _ in 0..5 {
                partition.append(&record(&[b'x'; 18])).unwrap();
            }
            assert_eq!(partition.leo(), 5);
        }

        let partition = Partition::open(root.path(), "t1", 0, 100).unwrap().unwrap();
        assert_eq!(partition.leo(), 5);
        assert_eq!(partition.segments().len(), 5);

        let records = partition.fetch(0, u64::MAX).unwrap();
        assert_eq!(records.len(), 5);
    }

    #[test]
    fn test_open_empty_dir_is_none() {
        let root = tempfile::tempdir().unwrap();
        std::fs::create_dir(root.path().join("t1-0")).unwrap();
        assert!(Partition::open(root.path(), "t1", 0, 100).unwrap().is_none());
    }
}
