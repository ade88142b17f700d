//! Source adapters for acquiring raw measurement data.
//!
//! A source produces a [`RawSample`] - opaque bytes plus provenance -
//! or a typed [`ScrapeError`](crate::ScrapeError). Two variants exist:
//! [`CommandSource`] runs an external tool under a timeout, and
//! [`FileSource`] reads a watched file when its modification time
//! moves. Decoding is deliberately not a source concern; it happens in
//! the exporter-specific decoder downstream.

mod command;
mod file;

pub use command::CommandSource;
pub use file::{FilePoll, FileSource};

use std::time::SystemTime;

/// An undecoded payload captured from a source.
#[derive(Debug, Clone)]
pub struct RawSample {
    /// The payload as captured, byte for byte.
    pub bytes: Vec<u8>,
    /// Human-readable identifier of where the bytes came from.
    pub source: String,
    /// When the capture completed.
    pub captured_at: SystemTime,
}

impl RawSample {
    pub fn new(bytes: Vec<u8>, source: impl Into<String>) -> Self {
        Self {
            bytes,
            source: source.into(),
            captured_at: SystemTime::now(),
        }
    }
}
