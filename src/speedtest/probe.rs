//! On-demand refresher driving the command -> decode -> state pipeline.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;

use super::report::{decode_report, SpeedtestRecord};
use crate::error::ScrapeError;
use crate::server::ScrapeHook;
use crate::source::CommandSource;
use crate::state::StateHolder;

/// Runs one speedtest per scrape and hands the outcome to the state
/// holder.
///
/// The subprocess and decode run before the state lock is touched, so
/// a slow measurement never blocks concurrent readers. A failed run
/// still updates the holder (error plus elapsed time); it never
/// escapes to fail the HTTP request.
pub struct SpeedtestProbe {
    source: CommandSource,
    state: Arc<StateHolder<SpeedtestRecord>>,
}

impl SpeedtestProbe {
    pub fn new(source: CommandSource, state: Arc<StateHolder<SpeedtestRecord>>) -> Self {
        Self { source, state }
    }

    /// Run the full pipeline once and record the outcome.
    pub async fn refresh(&self) {
        let started = Instant::now();
        let result = self.run_once().await;
        let elapsed = started.elapsed();

        match &result {
            Ok(record) => tracing::info!(
                download_bps = record.download_bits_per_second,
                upload_bps = record.upload_bits_per_second,
                elapsed_s = elapsed.as_secs_f64(),
                "speedtest finished"
            ),
            Err(err) => tracing::warn!(
                command = %self.source.description(),
                elapsed_s = elapsed.as_secs_f64(),
                %err,
                "speedtest scrape failed"
            ),
        }

        self.state.update(result, elapsed);
    }

    async fn run_once(&self) -> Result<SpeedtestRecord, ScrapeError> {
        let sample = self.source.sample().await?;
        decode_report(&sample.bytes)
    }
}

#[async_trait]
impl ScrapeHook for SpeedtestProbe {
    async fn before_scrape(&self) {
        self.refresh().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn probe_for(script: &str) -> (SpeedtestProbe, Arc<StateHolder<SpeedtestRecord>>) {
        let state = Arc::new(StateHolder::new());
        let source = CommandSource::new(
            "sh",
            vec!["-c".into(), script.into()],
            Duration::from_secs(5),
        );
        (SpeedtestProbe::new(source, state.clone()), state)
    }

    #[tokio::test]
    async fn test_refresh_stores_record_on_success() {
        let json = r#"{\"download\": {\"bandwidth\": 1000000}, \"upload\": {\"bandwidth\": 1000000}}"#;
        let (probe, state) = probe_for(&format!("echo \"{json}\""));

        probe.refresh().await;

        let view = state.read();
        let record = view.record.expect("record should be stored");
        assert_eq!(record.download_bits_per_second, 8_000_000.0);
        assert!(view.last_error.is_none());
        assert!(view.last_elapsed.is_some());
    }

    #[tokio::test]
    async fn test_refresh_records_error_on_command_failure() {
        let (probe, state) = probe_for("exit 2");

        probe.refresh().await;

        let view = state.read();
        assert!(view.record.is_none());
        assert!(matches!(view.last_error, Some(ScrapeError::Unavailable(_))));
        assert_eq!(view.failures, 1);
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_previous_record() {
        let json = r#"{\"download\": {\"bandwidth\": 500}, \"upload\": {\"bandwidth\": 500}}"#;
        let (probe, state) = probe_for(&format!("echo \"{json}\""));
        probe.refresh().await;
        assert!(state.read().record.is_some());

        let failing_probe = SpeedtestProbe::new(
            CommandSource::new(
                "sh",
                vec!["-c".into(), "echo not json".into()],
                Duration::from_secs(5),
            ),
            state.clone(),
        );
        failing_probe.refresh().await;

        let view = state.read();
        assert!(view.record.is_some(), "last good record must be retained");
        assert!(matches!(view.last_error, Some(ScrapeError::Malformed(_))));
    }
}
