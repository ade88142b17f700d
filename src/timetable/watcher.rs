//! Background polling of the schedule file.

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::schedule::{decode_schedule, ScheduleItem};
use crate::source::{FilePoll, FileSource, RawSample};
use crate::state::StateHolder;

/// Timer-driven refresher for the schedule file.
///
/// Every tick checks the file's modification time; an unchanged file
/// costs one stat call and nothing else. A changed file is read and
/// decoded, and only a successful decode replaces the published
/// schedule - a failed decode is logged and recorded, the previous
/// schedule keeps serving, and the file is not re-read until its mtime
/// moves again.
pub struct ScheduleWatcher {
    source: FileSource,
    state: Arc<StateHolder<Vec<ScheduleItem>>>,
    interval: Duration,
}

impl ScheduleWatcher {
    pub fn new<P: AsRef<Path>>(
        path: P,
        interval: Duration,
        state: Arc<StateHolder<Vec<ScheduleItem>>>,
    ) -> Self {
        Self {
            source: FileSource::new(path),
            state,
            interval,
        }
    }

    /// Best-effort synchronous load, used once at startup so the first
    /// scrape usually has data. A failure is logged and recorded; the
    /// process starts serving regardless.
    pub fn load_now(&mut self) {
        let started = Instant::now();
        match self.source.read_now() {
            Ok(sample) => self.apply_sample(sample, started),
            Err(err) => {
                tracing::warn!(source = %self.source.description(), %err, "initial load failed");
                self.state.update(Err(err), started.elapsed());
            }
        }
    }

    /// One poll tick: stat, and decode only if the file changed.
    fn poll_tick(&mut self) {
        let started = Instant::now();
        match self.source.poll() {
            Ok(FilePoll::Unchanged) => {}
            Ok(FilePoll::Changed(sample)) => self.apply_sample(sample, started),
            Err(err) => {
                tracing::warn!(source = %self.source.description(), %err, "schedule poll failed");
                self.state.update(Err(err), started.elapsed());
            }
        }
    }

    /// Decode a freshly read payload and hand the outcome to the state
    /// holder. Factored out of the tick so tests can drive it without
    /// depending on filesystem mtime granularity.
    fn apply_sample(&self, sample: RawSample, started: Instant) {
        let result = decode_schedule(&sample.bytes);
        let elapsed = started.elapsed();
        match &result {
            Ok(items) => {
                tracing::info!(
                    source = %self.source.description(),
                    events = items.len(),
                    "loaded schedule"
                );
            }
            Err(err) => {
                tracing::warn!(
                    source = %self.source.description(),
                    %err,
                    "schedule decode failed; keeping previous schedule"
                );
            }
        }
        self.state.update(result, elapsed);
    }

    /// Spawn the polling loop as a background task.
    ///
    /// Returns the task handle and a stop signal; send `true` and
    /// await the handle for a cooperative shutdown.
    pub fn spawn(mut self) -> (JoinHandle<()>, watch::Sender<bool>) {
        let (stop_tx, mut stop_rx) = watch::channel(false);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => self.poll_tick(),
                    _ = stop_rx.changed() => {
                        if *stop_rx.borrow() {
                            break;
                        }
                    }
                }
            }
            tracing::debug!("schedule watcher stopped");
        });
        (handle, stop_tx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ScrapeError;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn valid_schedule() -> &'static str {
        r#"{
            "events": [
                {
                    "id": "e1",
                    "name": "Opening",
                    "location": "Hall A",
                    "start": "2024-05-01T10:00:00Z",
                    "end": "2024-05-01T11:00:00Z"
                }
            ]
        }"#
    }

    fn watcher_for(
        file: &NamedTempFile,
    ) -> (ScheduleWatcher, Arc<StateHolder<Vec<ScheduleItem>>>) {
        let state = Arc::new(StateHolder::new());
        let watcher = ScheduleWatcher::new(file.path(), Duration::from_secs(10), state.clone());
        (watcher, state)
    }

    #[test]
    fn test_load_now_populates_state() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", valid_schedule()).unwrap();
        file.flush().unwrap();

        let (mut watcher, state) = watcher_for(&file);
        watcher.load_now();

        let view = state.read();
        let items = view.record.expect("schedule should be loaded");
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id, "e1");
        assert!(view.last_error.is_none());
    }

    #[test]
    fn test_load_now_with_missing_file_records_error() {
        let state = Arc::new(StateHolder::new());
        let mut watcher = ScheduleWatcher::new(
            "/nonexistent/events.json",
            Duration::from_secs(10),
            state.clone(),
        );
        watcher.load_now();

        let view = state.read();
        assert!(view.record.is_none());
        assert!(matches!(view.last_error, Some(ScrapeError::Unavailable(_))));
    }

    #[test]
    fn test_decode_failure_keeps_previous_schedule() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", valid_schedule()).unwrap();
        file.flush().unwrap();

        let (mut watcher, state) = watcher_for(&file);
        watcher.load_now();
        assert!(state.read().record.is_some());

        watcher.apply_sample(
            RawSample::new(b"{\"events\": [{\"id\": \"x\"}]}".to_vec(), "test"),
            Instant::now(),
        );

        let view = state.read();
        let items = view.record.expect("previous schedule must keep serving");
        assert_eq!(items[0].id, "e1");
        assert!(matches!(view.last_error, Some(ScrapeError::Malformed(_))));
        assert_eq!(view.failures, 1);
    }

    #[test]
    fn test_unchanged_file_skips_decode() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", valid_schedule()).unwrap();
        file.flush().unwrap();

        let (mut watcher, state) = watcher_for(&file);
        watcher.load_now();
        let first = state.read();

        // Tick with no file change: state must not be touched at all.
        watcher.poll_tick();
        let second = state.read();
        assert_eq!(first.refreshed_at, second.refreshed_at);
        assert_eq!(second.failures, 0);
    }

    #[tokio::test]
    async fn test_spawned_watcher_stops_on_signal() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", valid_schedule()).unwrap();
        file.flush().unwrap();

        let (watcher, state) = watcher_for(&file);
        let (handle, stop) = watcher.spawn();

        // First tick fires immediately and loads the file.
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(state.read().record.is_some());

        stop.send(true).unwrap();
        handle.await.unwrap();
    }
}
