//! Widths and names that define the wire format and the on-disk layout.
//!
//! Every value here is part of a persisted or transmitted format; changing
//! any of them is a breaking change for both the protocol and existing log
//! directories.

/// ASCII-decimal digits of the correlation id in a frame header.
pub const CORRELATION_ID_WIDTH: usize = 10;

/// ASCII-decimal digits of the API key in a frame header.
pub const API_KEY_WIDTH: usize = 2;

/// ASCII-decimal digits of the payload length, in frame headers and as the
/// length prefix of every record in a log file.
pub const PAYLOAD_LENGTH_WIDTH: usize = 4;

/// Total frame header width.
pub const HEADER_WIDTH: usize = CORRELATION_ID_WIDTH + API_KEY_WIDTH + PAYLOAD_LENGTH_WIDTH;

/// Largest payload the 4-digit length field can describe.
pub const MAX_PAYLOAD_LENGTH: usize = 9999;

/// Zero-padded width of a segment's base offset in its file names.
pub const LOG_FILENAME_LENGTH: usize = 20;

/// ASCII-decimal digits of the offset half of an index entry.
pub const LOG_RECORD_OFFSET_WIDTH: usize = 16;

/// ASCII-decimal digits of the position half of an index entry.
pub const LOG_RECORD_POSITION_WIDTH: usize = 16;

/// Full width of one index entry.
pub const INDEX_ENTRY_WIDTH: usize = LOG_RECORD_OFFSET_WIDTH + LOG_RECORD_POSITION_WIDTH;

/// Name of the committed-offsets file under the storage root.
pub const COMMITTED_OFFSETS_FILENAME: &str = "__committed_offsets";

/// Default size limit of a single log segment, in bytes.
pub const DEFAULT_SEGMENT_SIZE_LIMIT: u64 = 1024 * 1024 * 1024;
