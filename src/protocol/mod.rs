//! The wire protocol.
//!
//! Requests and responses travel as [`frame::Frame`]s: a fixed-width
//! ASCII-decimal header (correlation id, API key, payload length) followed
//! by a JSON payload. [`messages`] defines the payload schema per API key.

pub mod api_key;
pub mod frame;
pub mod messages;
