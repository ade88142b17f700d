//! Error types for the scrape pipeline.

use std::time::Duration;

use thiserror::Error;

/// Failures that can occur while acquiring or decoding a sample.
///
/// The variants mirror the stages of the pipeline: the source could not
/// be reached at all, the source ran past its wall-clock budget, the
/// payload did not parse, or it parsed but is semantically unusable.
/// None of these are fatal; the refresher catches them, records them in
/// the state holder, and keeps serving.
#[derive(Debug, Clone, Error)]
pub enum ScrapeError {
    /// The external command failed to start or exited non-zero, or the
    /// source file is missing or unreadable.
    #[error("source unavailable: {0}")]
    Unavailable(String),

    /// The external command exceeded its execution budget.
    #[error("source timed out after {0:?}")]
    Timeout(Duration),

    /// The payload does not parse as the expected structure.
    #[error("malformed payload: {0}")]
    Malformed(String),

    /// The payload parses but required fields are zero, missing, or
    /// semantically invalid.
    #[error("incomplete payload: {0}")]
    Incomplete(String),
}
