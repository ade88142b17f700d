//! Prometheus exporter that runs the Ookla speedtest CLI on demand.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use prometheus_client::registry::Registry;
use tracing_subscriber::EnvFilter;

use gaugepost::duration::parse_duration;
use gaugepost::server::{self, MetricsApp};
use gaugepost::source::CommandSource;
use gaugepost::speedtest::{SpeedtestCollector, SpeedtestProbe};
use gaugepost::state::StateHolder;

#[derive(Parser, Debug)]
#[command(name = "speedtest-exporter")]
#[command(about = "Runs the Ookla speedtest CLI per scrape and exposes the results as metrics")]
struct Args {
    /// Speedtest command to invoke
    #[arg(long, env = "SPEEDTEST_COMMAND", default_value = "speedtest")]
    command: String,

    /// Extra arguments appended after the fixed template, whitespace separated
    #[arg(long = "args", env = "SPEEDTEST_ARGS", default_value = "")]
    extra_args: String,

    /// Wall-clock budget for one invocation (e.g. "90s", "2m")
    #[arg(long, env = "SPEEDTEST_TIMEOUT", default_value = "90s", value_parser = parse_duration)]
    timeout: Duration,

    /// Address to serve /metrics on
    #[arg(long, env = "LISTEN_ADDRESS", default_value = "0.0.0.0:9801")]
    listen: SocketAddr,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    let mut command_args = vec![
        "-f".to_string(),
        "json-pretty".to_string(),
        "--accept-license".to_string(),
    ];
    command_args.extend(args.extra_args.split_whitespace().map(str::to_string));

    let source = CommandSource::new(args.command, command_args, args.timeout);
    tracing::info!(
        command = %source.description(),
        timeout_s = args.timeout.as_secs_f64(),
        "configured speedtest source"
    );

    let state = Arc::new(StateHolder::new());
    let probe = Arc::new(SpeedtestProbe::new(source, state.clone()));

    let mut registry = Registry::default();
    registry.register_collector(Box::new(SpeedtestCollector::new(state)));

    let app = MetricsApp::new(registry).with_scrape_hook(probe);

    tracing::info!(listen = %args.listen, "starting speedtest exporter");
    tokio::select! {
        result = server::serve(args.listen, app) => result,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("received ctrl-c, shutting down");
            Ok(())
        }
    }
}
