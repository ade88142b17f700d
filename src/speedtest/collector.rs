//! Scrape-time publication of the speedtest state.

use std::fmt;
use std::sync::Arc;

use prometheus_client::collector::Collector;
use prometheus_client::encoding::{DescriptorEncoder, EncodeLabelSet, EncodeMetric};
use prometheus_client::metrics::gauge::ConstGauge;
use prometheus_client::metrics::MetricType;

use super::report::SpeedtestRecord;
use crate::state::StateHolder;

#[derive(Debug, Clone, Hash, PartialEq, Eq, EncodeLabelSet)]
struct StatLabels {
    stat: &'static str,
}

/// Publishes the current speedtest state on every scrape.
///
/// The indicator metrics (`scrape_success`, `scrape_duration_seconds`)
/// are emitted unconditionally so a failed measurement is itself
/// observable; the measurement gauges are emitted only when the
/// refresh that this scrape triggered succeeded.
#[derive(Debug)]
pub struct SpeedtestCollector {
    state: Arc<StateHolder<SpeedtestRecord>>,
}

impl SpeedtestCollector {
    pub fn new(state: Arc<StateHolder<SpeedtestRecord>>) -> Self {
        Self { state }
    }
}

impl Collector for SpeedtestCollector {
    fn encode(&self, mut encoder: DescriptorEncoder<'_>) -> Result<(), fmt::Error> {
        let view = self.state.read();
        let success = view.last_error.is_none() && view.record.is_some();

        encode_gauge(
            &mut encoder,
            "scrape_success",
            "Whether the latest speedtest run finished successfully (1) or failed (0)",
            if success { 1.0 } else { 0.0 },
        )?;
        encode_gauge(
            &mut encoder,
            "scrape_duration_seconds",
            "Duration of the latest speedtest CLI invocation in seconds",
            view.last_elapsed.unwrap_or_default().as_secs_f64(),
        )?;

        let Some(record) = view.record.filter(|_| success) else {
            return Ok(());
        };

        encode_gauge(
            &mut encoder,
            "download_bandwidth_bits_per_second",
            "Download bandwidth reported by the speedtest CLI in bits per second",
            record.download_bits_per_second,
        )?;
        encode_gauge(
            &mut encoder,
            "upload_bandwidth_bits_per_second",
            "Upload bandwidth reported by the speedtest CLI in bits per second",
            record.upload_bits_per_second,
        )?;

        encode_stat_family(
            &mut encoder,
            "download_latency_seconds",
            "Download latency statistics in seconds",
            &[
                ("iqm", record.download_latency.iqm),
                ("low", record.download_latency.low),
                ("high", record.download_latency.high),
                ("jitter", record.download_latency.jitter),
            ],
        )?;
        encode_stat_family(
            &mut encoder,
            "upload_latency_seconds",
            "Upload latency statistics in seconds",
            &[
                ("iqm", record.upload_latency.iqm),
                ("low", record.upload_latency.low),
                ("high", record.upload_latency.high),
                ("jitter", record.upload_latency.jitter),
            ],
        )?;
        encode_stat_family(
            &mut encoder,
            "ping_latency_seconds",
            "Idle ping latency statistics in seconds",
            &[
                ("latency", record.ping.latency),
                ("low", record.ping.low),
                ("high", record.ping.high),
            ],
        )?;

        encode_gauge(
            &mut encoder,
            "ping_jitter_seconds",
            "Idle ping jitter in seconds",
            record.ping.jitter,
        )?;
        encode_gauge(
            &mut encoder,
            "packet_loss_ratio",
            "Packet loss reported by the speedtest CLI, 0 when absent",
            record.packet_loss_ratio,
        )?;

        Ok(())
    }
}

fn encode_gauge(
    encoder: &mut DescriptorEncoder<'_>,
    name: &str,
    help: &str,
    value: f64,
) -> Result<(), fmt::Error> {
    let gauge = ConstGauge::new(value);
    let metric_encoder = encoder.encode_descriptor(name, help, None, gauge.metric_type())?;
    gauge.encode(metric_encoder)?;
    Ok(())
}

fn encode_stat_family(
    encoder: &mut DescriptorEncoder<'_>,
    name: &str,
    help: &str,
    stats: &[(&'static str, f64)],
) -> Result<(), fmt::Error> {
    let mut family_encoder = encoder.encode_descriptor(name, help, None, MetricType::Gauge)?;
    for &(stat, value) in stats {
        let gauge = ConstGauge::new(value);
        let labels = StatLabels { stat };
        let metric_encoder = family_encoder.encode_family(&labels)?;
        gauge.encode(metric_encoder)?;
    }
    Ok(())
}
