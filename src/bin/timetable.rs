//! Prometheus exporter that watches a schedule file of timed events.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use prometheus_client::registry::Registry;
use tracing_subscriber::EnvFilter;

use gaugepost::duration::parse_duration;
use gaugepost::server::{self, MetricsApp};
use gaugepost::state::StateHolder;
use gaugepost::timetable::{EventCollector, ScheduleWatcher};

#[derive(Parser, Debug)]
#[command(name = "timetable-exporter")]
#[command(about = "Exposes start/end/duration/active gauges for events in a schedule file")]
struct Args {
    /// Address to serve /metrics and /healthz on
    #[arg(long, env = "LISTEN_ADDRESS", default_value = "0.0.0.0:9100")]
    listen: SocketAddr,

    /// Path to the schedule document
    #[arg(long, env = "EVENTS_FILE", default_value = "events.json")]
    events: PathBuf,

    /// Polling interval for schedule file changes (e.g. "10s")
    #[arg(long, env = "RELOAD_INTERVAL", default_value = "10s", value_parser = parse_duration)]
    reload_interval: Duration,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    let state = Arc::new(StateHolder::new());
    let mut watcher = ScheduleWatcher::new(&args.events, args.reload_interval, state.clone());

    // Best-effort initial load; the exporter serves either way.
    watcher.load_now();
    let (watcher_task, stop) = watcher.spawn();

    let mut registry = Registry::default();
    registry.register_collector(Box::new(EventCollector::new(state)));
    let app = MetricsApp::new(registry);

    tracing::info!(
        listen = %args.listen,
        events = %args.events.display(),
        interval_s = args.reload_interval.as_secs_f64(),
        "starting timetable exporter"
    );

    tokio::select! {
        result = server::serve(args.listen, app) => result,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("received ctrl-c, shutting down");
            let _ = stop.send(true);
            let _ = watcher_task.await;
            Ok(())
        }
    }
}
