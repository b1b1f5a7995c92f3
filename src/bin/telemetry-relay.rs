use std::fmt::Display;
use std::future::Future;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use telemetry_relay::error::log_relay_error;
use telemetry_relay::{init_logging, AppConfig, Relay};
use tracing::level_filters::LevelFilter;

#[derive(Parser, Debug)]
#[command(
    name = "telemetry-relay",
    about = "Relay detection telemetry from UDP datagrams to WebSocket dashboards"
)]
struct Cli {
    /// JSON config file; missing or invalid files fall back to defaults
    #[arg(long)]
    config: Option<PathBuf>,
    /// Override the datagram ingress address
    #[arg(long)]
    udp_addr: Option<String>,
    /// Override the WebSocket listen address
    #[arg(long)]
    ws_addr: Option<String>,
    /// Override the WebSocket path
    #[arg(long)]
    ws_path: Option<String>,
    #[arg(long, default_value_t = LevelFilter::INFO)]
    log_level: LevelFilter,
}

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::from(1)
        }
    }
}

fn run() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_logging(cli.log_level);

    let mut config = AppConfig::load(cli.config.as_deref()).relay;
    if let Some(addr) = cli.udp_addr {
        config.udp_addr = addr;
    }
    if let Some(addr) = cli.ws_addr {
        config.ws_addr = addr;
    }
    if let Some(path) = cli.ws_path {
        config.ws_path = path;
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("building tokio runtime")?;

    runtime.block_on(async move {
        let relay = match Relay::bind(&config).await {
            Ok(relay) => relay,
            Err(err) => {
                log_relay_error(&err, "startup");
                return Ok(ExitCode::from(2));
            }
        };

        let shutdown = wait_for_shutdown(tokio::signal::ctrl_c());

        match relay.run_until(shutdown).await {
            Ok(()) => Ok(ExitCode::SUCCESS),
            Err(err) => {
                log_relay_error(&err, "serve");
                Ok(ExitCode::from(1))
            }
        }
    })
}

/// Resolve when `signal` fires. A signal that cannot be installed never
/// resolves, so the relay keeps serving until it is killed.
async fn wait_for_shutdown<F, E>(signal: F)
where
    F: Future<Output = Result<(), E>>,
    E: Display,
{
    match signal.await {
        Ok(()) => log::info!("Shutdown requested"),
        Err(err) => {
            log::warn!("Ctrl-C handler unavailable ({}); running until killed", err);
            std::future::pending::<()>().await;
        }
    }
}
