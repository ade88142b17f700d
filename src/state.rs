//! Shared last-known-good state between a refresher and scrape handlers.

use std::time::{Duration, SystemTime};

use parking_lot::RwLock;

use crate::error::ScrapeError;

#[derive(Debug)]
struct Inner<T> {
    record: Option<T>,
    refreshed_at: Option<SystemTime>,
    last_elapsed: Option<Duration>,
    last_error: Option<ScrapeError>,
    failures: u64,
}

/// The handoff point between the refresh pipeline and metric rendering.
///
/// A `StateHolder` stores the last record that decoded successfully,
/// together with the outcome of the most recent refresh attempt. The
/// refresher is the sole writer; any number of scrape handlers read
/// concurrently. No I/O happens under the lock - a refresh does its
/// subprocess or file work first and only then swaps the result in, so
/// the critical section is bounded by the clone/swap.
///
/// A failed refresh never discards the stored record: it records the
/// error and bumps the failure counter, and the previous data keeps
/// serving.
#[derive(Debug)]
pub struct StateHolder<T> {
    inner: RwLock<Inner<T>>,
}

/// A consistent point-in-time view of a [`StateHolder`].
///
/// Cloned out under the read lock, so the record can never mix fields
/// from two different updates.
#[derive(Debug, Clone)]
pub struct StateView<T> {
    /// The last record that decoded successfully, if any.
    pub record: Option<T>,
    /// When `record` was last replaced.
    pub refreshed_at: Option<SystemTime>,
    /// Wall-clock duration of the most recent refresh attempt.
    pub last_elapsed: Option<Duration>,
    /// The error from the most recent refresh attempt, if it failed.
    pub last_error: Option<ScrapeError>,
    /// Total number of failed refresh attempts since startup.
    pub failures: u64,
}

impl<T> Default for StateHolder<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> StateHolder<T> {
    /// Create an empty holder ("no data yet").
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner {
                record: None,
                refreshed_at: None,
                last_elapsed: None,
                last_error: None,
                failures: 0,
            }),
        }
    }
}

impl<T: Clone> StateHolder<T> {
    /// Record the outcome of a refresh attempt.
    ///
    /// A success replaces the record, stamps the freshness time and
    /// clears any previous error. A failure keeps the record, stores
    /// the error and increments the failure counter. Either way the
    /// elapsed time of the attempt is remembered for the duration
    /// metric.
    pub fn update(&self, result: Result<T, ScrapeError>, elapsed: Duration) {
        let mut inner = self.inner.write();
        inner.last_elapsed = Some(elapsed);
        match result {
            Ok(record) => {
                inner.record = Some(record);
                inner.refreshed_at = Some(SystemTime::now());
                inner.last_error = None;
            }
            Err(err) => {
                inner.last_error = Some(err);
                inner.failures += 1;
            }
        }
    }

    /// Take a consistent snapshot of the current state.
    pub fn read(&self) -> StateView<T> {
        let inner = self.inner.read();
        StateView {
            record: inner.record.clone(),
            refreshed_at: inner.refreshed_at,
            last_elapsed: inner.last_elapsed,
            last_error: inner.last_error.clone(),
            failures: inner.failures,
        }
    }
}
