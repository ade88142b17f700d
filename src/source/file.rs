//! File-based data source.
//!
//! Reads a watched file when its modification time moves.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use super::RawSample;
use crate::error::ScrapeError;

/// Outcome of a single modification-time check.
#[derive(Debug)]
pub enum FilePoll {
    /// The file has not changed since the last read; nothing to decode.
    Unchanged,
    /// The file changed and was read in full.
    Changed(RawSample),
}

/// A data source that polls a file for changes.
///
/// The source tracks the file's modification time and only returns a
/// sample when the file has been updated. The watermark advances when
/// the file is *read*, not when the caller manages to decode it: a
/// payload that fails to decode downstream is not re-read every tick,
/// only once the file's mtime moves again. This rate-limits retries
/// against a broken file at the cost of not retrying a transient parse
/// failure until the file is touched.
#[derive(Debug)]
pub struct FileSource {
    path: PathBuf,
    description: String,
    last_modified: Option<SystemTime>,
}

impl FileSource {
    /// Create a new file source for the given path.
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref().to_path_buf();
        let description = format!("file: {}", path.display());
        Self {
            path,
            description,
            last_modified: None,
        }
    }

    /// Returns the path being watched.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Human-readable identifier for logs.
    pub fn description(&self) -> &str {
        &self.description
    }

    fn modified_time(&self) -> Result<SystemTime, ScrapeError> {
        let metadata = fs::metadata(&self.path).map_err(|err| {
            ScrapeError::Unavailable(format!("stat {}: {}", self.path.display(), err))
        })?;
        metadata.modified().map_err(|err| {
            ScrapeError::Unavailable(format!("mtime of {}: {}", self.path.display(), err))
        })
    }

    /// Check the modification time and read the file if it changed.
    ///
    /// The first poll always reads. A missing or unreadable file is
    /// reported as [`ScrapeError::Unavailable`] and leaves the
    /// watermark untouched.
    pub fn poll(&mut self) -> Result<FilePoll, ScrapeError> {
        let modified = self.modified_time()?;
        let changed = match self.last_modified {
            None => true,
            Some(last) => modified > last,
        };
        if !changed {
            return Ok(FilePoll::Unchanged);
        }
        self.read_at(modified).map(FilePoll::Changed)
    }

    /// Read the file unconditionally, advancing the watermark.
    ///
    /// Used for the best-effort load at startup, before the poll loop
    /// starts ticking.
    pub fn read_now(&mut self) -> Result<RawSample, ScrapeError> {
        let modified = self.modified_time()?;
        self.read_at(modified)
    }

    fn read_at(&mut self, modified: SystemTime) -> Result<RawSample, ScrapeError> {
        // Advance the watermark before the caller decodes: a bad
        // payload is retried only when the file changes again.
        self.last_modified = Some(modified);
        let bytes = fs::read(&self.path).map_err(|err| {
            ScrapeError::Unavailable(format!("read {}: {}", self.path.display(), err))
        })?;
        Ok(RawSample::new(bytes, &self.description))
    }
}
