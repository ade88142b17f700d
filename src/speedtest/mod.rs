//! The speedtest exporter: runs the Ookla CLI on demand and publishes
//! bandwidth, latency and packet-loss gauges.

mod collector;
mod probe;
mod report;

pub use collector::SpeedtestCollector;
pub use probe::SpeedtestProbe;
pub use report::{decode_report, LatencyStats, PingStats, SpeedtestRecord};
