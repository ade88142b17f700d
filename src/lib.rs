//! # gaugepost
//!
//! Small Prometheus exporters built around a shared poll-parse-publish
//! pipeline:
//!
//! ```text
//!  Source Adapter ──▶ Decoder ──▶ StateHolder ──▶ Collector ──▶ /metrics
//!  (command/file)     (serde)     (RwLock swap)   (const gauges)
//! ```
//!
//! Two binaries instantiate the pipeline:
//!
//! - **speedtest-exporter** runs the Ookla `speedtest` CLI on every
//!   scrape (on-demand refresh) and publishes bandwidth, latency and
//!   packet-loss gauges.
//! - **timetable-exporter** watches a schedule file on a background
//!   interval (timer refresh) and publishes start/end/duration/active
//!   gauges per event.
//!
//! The pieces are deliberately decoupled: sources know nothing about
//! decoding, the [`StateHolder`] knows nothing about metrics, and the
//! collectors only ever read an already-validated record. A refresh
//! failure of any kind is recorded in the state and surfaced through
//! the metrics themselves; it never fails a scrape request or the
//! process.

pub mod duration;
pub mod error;
pub mod server;
pub mod source;
pub mod speedtest;
pub mod state;
pub mod timetable;

pub use error::ScrapeError;
pub use source::{CommandSource, FilePoll, FileSource, RawSample};
pub use state::{StateHolder, StateView};
