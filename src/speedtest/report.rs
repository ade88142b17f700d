//! Decoding and validation of the speedtest CLI's JSON report.
//!
//! Unit normalization happens here, exactly once: the CLI reports
//! latency in milliseconds and bandwidth in bytes per second, while the
//! published record carries seconds and bits per second.

use serde::Deserialize;

use crate::error::ScrapeError;

const MILLIS_PER_SECOND: f64 = 1_000.0;
const BITS_PER_BYTE: f64 = 8.0;

// Wire structs mirroring the CLI's JSON. Missing fields default to
// zero like the upstream tool's own failure output does; validation
// below decides what is acceptable.

#[derive(Debug, Default, Deserialize)]
struct WireLatency {
    #[serde(default)]
    iqm: f64,
    #[serde(default)]
    low: f64,
    #[serde(default)]
    high: f64,
    #[serde(default)]
    jitter: f64,
}

#[derive(Debug, Default, Deserialize)]
struct WireTransfer {
    #[serde(default)]
    bandwidth: f64,
    #[serde(default)]
    latency: WireLatency,
}

#[derive(Debug, Default, Deserialize)]
struct WirePing {
    #[serde(default)]
    jitter: f64,
    #[serde(default)]
    latency: f64,
    #[serde(default)]
    low: f64,
    #[serde(default)]
    high: f64,
}

#[derive(Debug, Default, Deserialize)]
struct WireReport {
    #[serde(default)]
    download: WireTransfer,
    #[serde(default)]
    upload: WireTransfer,
    #[serde(default)]
    ping: WirePing,
    #[serde(rename = "packetLoss")]
    packet_loss: Option<f64>,
}

/// Latency statistics for one transfer direction, in seconds.
#[derive(Debug, Clone, PartialEq)]
pub struct LatencyStats {
    pub iqm: f64,
    pub low: f64,
    pub high: f64,
    pub jitter: f64,
}

/// Idle ping statistics, in seconds.
#[derive(Debug, Clone, PartialEq)]
pub struct PingStats {
    pub latency: f64,
    pub low: f64,
    pub high: f64,
    pub jitter: f64,
}

/// A validated measurement, already in published units.
#[derive(Debug, Clone, PartialEq)]
pub struct SpeedtestRecord {
    /// Download bandwidth in bits per second.
    pub download_bits_per_second: f64,
    /// Upload bandwidth in bits per second.
    pub upload_bits_per_second: f64,
    pub download_latency: LatencyStats,
    pub upload_latency: LatencyStats,
    pub ping: PingStats,
    /// Packet loss ratio as reported; 0 when the CLI omitted it.
    pub packet_loss_ratio: f64,
}

/// Decode and validate one CLI report.
///
/// A payload where download and upload bandwidth are both zero is
/// rejected as incomplete rather than accepted as a zero reading - the
/// CLI emits all-zero structures on several of its own failure modes.
pub fn decode_report(bytes: &[u8]) -> Result<SpeedtestRecord, ScrapeError> {
    let report: WireReport = serde_json::from_slice(bytes)
        .map_err(|err| ScrapeError::Malformed(format!("speedtest output: {err}")))?;

    if report.download.bandwidth == 0.0 && report.upload.bandwidth == 0.0 {
        return Err(ScrapeError::Incomplete(
            "download and upload bandwidth are both zero".into(),
        ));
    }

    let record = SpeedtestRecord {
        download_bits_per_second: report.download.bandwidth * BITS_PER_BYTE,
        upload_bits_per_second: report.upload.bandwidth * BITS_PER_BYTE,
        download_latency: latency_seconds(&report.download.latency),
        upload_latency: latency_seconds(&report.upload.latency),
        ping: PingStats {
            latency: report.ping.latency / MILLIS_PER_SECOND,
            low: report.ping.low / MILLIS_PER_SECOND,
            high: report.ping.high / MILLIS_PER_SECOND,
            jitter: report.ping.jitter / MILLIS_PER_SECOND,
        },
        packet_loss_ratio: report.packet_loss.unwrap_or(0.0),
    };

    if !record_is_finite(&record) {
        return Err(ScrapeError::Incomplete(
            "report contains non-finite values".into(),
        ));
    }

    Ok(record)
}

fn latency_seconds(latency: &WireLatency) -> LatencyStats {
    LatencyStats {
        iqm: latency.iqm / MILLIS_PER_SECOND,
        low: latency.low / MILLIS_PER_SECOND,
        high: latency.high / MILLIS_PER_SECOND,
        jitter: latency.jitter / MILLIS_PER_SECOND,
    }
}

fn record_is_finite(record: &SpeedtestRecord) -> bool {
    let SpeedtestRecord {
        download_bits_per_second,
        upload_bits_per_second,
        download_latency,
        upload_latency,
        ping,
        packet_loss_ratio,
    } = record;
    [
        *download_bits_per_second,
        *upload_bits_per_second,
        download_latency.iqm,
        download_latency.low,
        download_latency.high,
        download_latency.jitter,
        upload_latency.iqm,
        upload_latency.low,
        upload_latency.high,
        upload_latency.jitter,
        ping.latency,
        ping.low,
        ping.high,
        ping.jitter,
        *packet_loss_ratio,
    ]
    .iter()
    .all(|value| value.is_finite())
}
