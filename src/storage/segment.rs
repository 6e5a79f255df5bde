//! A single log segment: one `.log`/`.index` file pair.
//!
//! The log file is a concatenation of length-prefixed record bodies. The
//! index file holds one fixed-width entry per record, `offset` then
//! `position`, where `position` is the byte offset of the record's length
//! prefix within the log file. Entries are strictly increasing in both
//! halves.

use std::fs::{File, OpenOptions};
use std::io::{BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use tracing::{trace, warn};

use crate::constants::{
    INDEX_ENTRY_WIDTH, LOG_FILENAME_LENGTH, LOG_RECORD_OFFSET_WIDTH, LOG_RECORD_POSITION_WIDTH,
    PAYLOAD_LENGTH_WIDTH,
};
use crate::record::{Record, RecordError};
use crate::storage::error::{Result, StorageError};

#[derive(Debug)]
pub struct Segment {
    topic: String,
    partition: u32,
    log_path: PathBuf,
    index_path: PathBuf,
    base_offset: u64,
    size_limit: u64,
}

impl Segment {
    /// Binds to the file pair for `base_offset` inside `dir` without
    /// touching the filesystem.
    pub fn open(
        dir: &Path,
        topic: impl Into<String>,
        partition: u32,
        base_offset: u64,
        size_limit: u64,
    ) -> Self {
        let stem = format!("{:0width$}", base_offset, width = LOG_FILENAME_LENGTH);
        Self {
            topic: topic.into(),
            partition,
            log_path: dir.join(format!("{stem}.log")),
            index_path: dir.join(format!("{stem}.index")),
            base_offset,
            size_limit,
        }
    }

    /// Binds to the file pair and creates both files if missing.
    pub fn create(
        dir: &Path,
        topic: impl Into<String>,
        partition: u32,
        base_offset: u64,
        size_limit: u64,
    ) -> Result<Self> {
        let segment = Self::open(dir, topic, partition, base_offset, size_limit);
        OpenOptions::new()
            .append(true)
            .create(true)
            .open(&segment.log_path)?;
        OpenOptions::new()
            .append(true)
            .create(true)
            .open(&segment.index_path)?;
        Ok(segment)
    }

    pub fn base_offset(&self) -> u64 {
        self.base_offset
    }

    /// Current size of the log file in bytes.
    pub fn log_size(&self) -> Result<u64> {
        Ok(std::fs::metadata(&self.log_path)?.len())
    }

    /// Number of records, derived from the index file length.
    pub fn record_count(&self) -> Result<u64> {
        Ok(std::fs::metadata(&self.index_path)?.len() / INDEX_ENTRY_WIDTH as u64)
    }

    /// Counts complete records by walking the log file's length prefixes.
    ///
    /// A truncated trailing record (interrupted last write) is not counted.
    pub fn record_count_from_log(&self) -> Result<u64> {
        let mut reader = BufReader::new(File::open(&self.log_path)?);
        let mut count = 0u64;
        let mut prefix = [0u8; PAYLOAD_LENGTH_WIDTH];
        loop {
            let n = read_full(&mut reader, &mut prefix)?;
            if n == 0 {
                break;
            }
            if n < PAYLOAD_LENGTH_WIDTH {
                warn!(
                    path = %self.log_path.display(),
                    "log file ends in a partial length prefix"
                );
                break;
            }
            let len = parse_ascii_number(&prefix)?;
            let skipped = std::io::copy(&mut reader.by_ref().take(len), &mut std::io::sink())?;
            if skipped < len {
                warn!(
                    path = %self.log_path.display(),
                    "log file ends in a partial record"
                );
                break;
            }
            count += 1;
        }
        Ok(count)
    }

    /// Appends an offset-assigned record to the log file, then records it in
    /// the index. Rejects the write if it would push the log file past the
    /// segment's size limit.
    pub fn append(&self, record: &Record) -> Result<()> {
        let offset = record.offset.ok_or(RecordError::UnsetOffset)?;
        let encoded = record.encode()?;

        let mut log_file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(&self.log_path)?;
        let position = log_file.metadata()?.len();
        if position + encoded.len() as u64 > self.size_limit {
            return Err(StorageError::ExceedSegmentSize {
                record_size: encoded.len() as u64,
                limit: self.size_limit,
            });
        }
        log_file.write_all(&encoded)?;
        log_file.flush()?;

        let mut index_file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(&self.index_path)?;
        index_file.write_all(encode_index_entry(offset, position).as_bytes())?;
        index_file.flush()?;

        trace!(
            topic = %self.topic,
            partition = self.partition,
            offset,
            position,
            "appended record"
        );
        Ok(())
    }

    /// Reads records with `offset >= start_offset` in index order,
    /// accumulating until adding another would exceed `max_bytes` (measured
    /// in on-disk record sizes). The first over-budget record is excluded.
    pub fn read(&self, start_offset: u64, max_bytes: u64) -> Result<Vec<Record>> {
        let mut index = BufReader::new(File::open(&self.index_path)?);
        let mut log = BufReader::new(File::open(&self.log_path)?);

        let mut records = Vec::new();
        let mut total = 0u64;
        let mut entry = [0u8; INDEX_ENTRY_WIDTH];
        loop {
            let n = read_full(&mut index, &mut entry)?;
            if n == 0 {
                break;
            }
            if n < INDEX_ENTRY_WIDTH {
                warn!(
                    path = %self.index_path.display(),
                    "index file ends in a partial entry"
                );
                break;
            }
            let (offset, position) = decode_index_entry(&entry)?;
            if offset < start_offset {
                continue;
            }

            log.seek(SeekFrom::Start(position))?;
            let mut prefix = [0u8; PAYLOAD_LENGTH_WIDTH];
            log.read_exact(&mut prefix)?;
            let len = parse_ascii_number(&prefix)?;
            let mut body = vec![0u8; len as usize];
            log.read_exact(&mut body)?;

            let size = PAYLOAD_LENGTH_WIDTH as u64 + len;
            if total + size > max_bytes {
                break;
            }
            records.push(Record::decode(&self.topic, self.partition, &body)?);
            total += size;
        }
        Ok(records)
    }
}

/// 32 ASCII digits: offset then position, each zero-padded to 16.
pub fn encode_index_entry(offset: u64, position: u64) -> String {
    format!(
        "{:0owidth$}{:0pwidth$}",
        offset,
        position,
        owidth = LOG_RECORD_OFFSET_WIDTH,
        pwidth = LOG_RECORD_POSITION_WIDTH,
    )
}

pub fn decode_index_entry(entry: &[u8; INDEX_ENTRY_WIDTH]) -> Result<(u64, u64)> {
    let offset = parse_ascii_number(&entry[..LOG_RECORD_OFFSET_WIDTH])?;
    let position = parse_ascii_number(&entry[LOG_RECORD_OFFSET_WIDTH..])?;
    Ok((offset, position))
}

fn parse_ascii_number(digits: &[u8]) -> Result<u64> {
    std::str::from_utf8(digits)
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .ok_or_else(|| {
            StorageError::Corrupt(format!(
                "expected ASCII digits, found {:?}",
                String::from_utf8_lossy(digits)
            ))
        })
}

/// Reads until the buffer is full or the stream ends; returns bytes read.
fn read_full(reader: &mut impl Read, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::BTreeMap;

    use assert_matches::assert_matches;

    fn record(offset: u64, value: &[u8]) -> Record {
        Record {
            topic: "t1".to_owned(),
            partition: 0,
            value: value.to_vec(),
            key: None,
            timestamp: 1,
            headers: BTreeMap::new(),
            offset: Some(offset),
        }
    }

    fn segment(dir: &Path, size_limit: u64) -> Segment {
        Segment::create(dir, "t1", 0, 0, size_limit).unwrap()
    }

    #[test]
    fn test_append_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let segment = segment(dir.path(), 1024 * 1024);

        segment.append(&record(0, b"first")).unwrap();
        segment.append(&record(1, b"second")).unwrap();

        let records = segment.read(0, u64::MAX).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].offset, Some(0));
        assert_eq!(records[0].value, b"first");
        assert_eq!(records[1].offset, Some(1));
        assert_eq!(records[1].value, b"second");
    }

    #[test]
    fn test_read_from_start_offset() {
        let dir = tempfile::tempdir().unwrap();
        let segment = segment(dir.path(), 1024 * 1024);

        for offset in 0..4 {
            segment.append(&record(offset, b"x")).unwrap();
        }

        let records = segment.read(2, u64::MAX).unwrap();
        assert_eq!(
            records.iter().map(|r| r.offset).collect::<Vec<_>>(),
            vec![Some(2), Some(3)]
        );
    }

    #[test]
    fn test_read_respects_byte_budget() {
        let dir = tempfile::tempdir().unwrap();
        let segment = segment(dir.path(), 1024 * 1024);

        let first = record(0, b"first");
        segment.append(&first).unwrap();
        segment.append(&record(1, b"second")).unwrap();

        let budget = first.encoded_len().unwrap();
        let records = segment.read(0, budget).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].offset, Some(0));

        // A budget smaller than the first record returns nothing.
        assert!(segment.read(0, budget - 1).unwrap().is_empty());
    }

    #[test]
    fn test_append_rejects_when_over_size_limit() {
        let dir = tempfile::tempdir().unwrap();
        let first = record(0, b"0123456789");
        let limit = first.encoded_len().unwrap() + 10;
        let segment = segment(dir.path(), limit);

        segment.append(&first).unwrap();
        assert_matches!(
            segment.append(&record(1, b"0123456789")),
            Err(StorageError::ExceedSegmentSize { .. })
        );

        // The rejected record left no trace.
        assert_eq!(segment.record_count().unwrap(), 1);
        assert_eq!(segment.log_size().unwrap(), first.encoded_len().unwrap());
    }

    #[test]
    fn test_index_entries_resolve_to_their_records() {
        let dir = tempfile::tempdir().unwrap();
        let segment = segment(dir.path(), 1024 * 1024);

        for offset in 0..5 {
            segment
                .append(&record(offset, format!("value-{offset}").as_bytes()))
                .unwrap();
        }

        // Every index entry, followed through the log file, yields a record
        // with the entry's offset.
        let index = std::fs::read(dir.path().join(format!(
            "{:0width$}.index",
            0,
            width = LOG_FILENAME_LENGTH
        )))
        .unwrap();
        let log = std::fs::read(dir.path().join(format!(
            "{:0width$}.log",
            0,
            width = LOG_FILENAME_LENGTH
        )))
        .unwrap();

        assert_eq!(index.len(), 5 * INDEX_ENTRY_WIDTH);
        for chunk in index.chunks(INDEX_ENTRY_WIDTH) {
            let entry: [u8; INDEX_ENTRY_WIDTH] = chunk.try_into().unwrap();
            let (offset, position) = decode_index_entry(&entry).unwrap();
            let position = position as usize;
            let len: usize = std::str::from_utf8(&log[position..position + PAYLOAD_LENGTH_WIDTH])
                .unwrap()
                .parse()
                .unwrap();
            let body = &log[position + PAYLOAD_LENGTH_WIDTH..position + PAYLOAD_LENGTH_WIDTH + len];
            let decoded = Record::decode("t1", 0, body).unwrap();
            assert_eq!(decoded.offset, Some(offset));
        }
    }

    #[test]
    fn test_record_count_from_log_ignores_partial_tail() {
        let dir = tempfile::tempdir().unwrap();
        let segment = segment(dir.path(), 1024 * 1024);

        segment.append(&record(0, b"whole")).unwrap();
        segment.append(&record(1, b"also whole")).unwrap();
        assert_eq!(segment.record_count_from_log().unwrap(), 2);

        // Simulate an interrupted write: a length prefix promising more
        // bytes than the file holds.
        let log_path = dir.path().join(format!(
            "{:0width$}.log",
            0,
            width = LOG_FILENAME_LENGTH
        ));
        let mut file = OpenOptions::new().append(true).open(log_path).unwrap();
        file.write_all(b"0042{\"value\":").unwrap();

        assert_eq!(segment.record_count_from_log().unwrap(), 2);
    }

    #[test]
    fn test_encode_index_entry_width() {
        let entry = encode_index_entry(3, 128);
        assert_eq!(entry, "00000000000000030000000000000128");
        assert_eq!(entry.len(), INDEX_ENTRY_WIDTH);
    }
}
