use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use futures::StreamExt;
use telemetry_relay::session::SessionEvent;
use telemetry_relay::{init_logging, AppConfig, DashboardSession, DisplayRect, SessionCommand};
use time::UtcOffset;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::level_filters::LevelFilter;

#[derive(Parser, Debug)]
#[command(
    name = "dashboard",
    about = "Headless dashboard: drive a session from stdin, print events as JSON lines"
)]
struct Cli {
    /// JSON config file; missing or invalid files fall back to defaults
    #[arg(long)]
    config: Option<PathBuf>,
    /// Override the relay WebSocket URL
    #[arg(long)]
    relay_url: Option<String>,
    #[arg(long)]
    reconnect_delay_ms: Option<u64>,
    /// Render timestamps in the machine's local offset instead of the configured one
    #[arg(long)]
    local_time: bool,
    /// Start the session immediately
    #[arg(long)]
    autostart: bool,
    #[arg(long, default_value_t = LevelFilter::WARN)]
    log_level: LevelFilter,
}

/// One line of stdin input.
#[derive(Debug, PartialEq)]
enum ShellCommand {
    Session(SessionCommand),
    Resize(DisplayRect),
    Status,
    Quit,
}

fn parse_line(line: &str) -> Result<ShellCommand, String> {
    let mut words = line.split_whitespace();
    let Some(head) = words.next() else {
        return Err("empty command".to_string());
    };
    match head {
        "status" => Ok(ShellCommand::Status),
        "quit" | "exit" => Ok(ShellCommand::Quit),
        "resize" => {
            let numbers: Vec<f64> = words
                .map(|word| word.parse::<f64>().map_err(|err| format!("{word}: {err}")))
                .collect::<Result<_, _>>()?;
            match numbers.as_slice() {
                [w, h] => Ok(ShellCommand::Resize(DisplayRect::sized(*w, *h))),
                [x, y, w, h] => Ok(ShellCommand::Resize(DisplayRect::new(*x, *y, *w, *h))),
                _ => Err("usage: resize W H | resize X Y W H".to_string()),
            }
        }
        other => other.parse::<SessionCommand>().map(ShellCommand::Session),
    }
}

fn main() -> ExitCode {
    // Must run before any threads exist.
    let local_offset = UtcOffset::current_local_offset().ok();
    match run(local_offset) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::from(1)
        }
    }
}

fn run(local_offset: Option<UtcOffset>) -> Result<ExitCode> {
    let cli = Cli::parse();
    init_logging(cli.log_level);

    let mut config = AppConfig::load(cli.config.as_deref()).session;
    if let Some(url) = cli.relay_url {
        config.relay_url = url;
    }
    if let Some(delay) = cli.reconnect_delay_ms {
        config.reconnect_delay_ms = delay;
    }
    if cli.local_time {
        match local_offset {
            Some(offset) => config.utc_offset_minutes = i32::from(offset.whole_minutes()),
            None => log::warn!("Local offset unavailable; using configured offset"),
        }
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("building tokio runtime")?;

    runtime.block_on(async move {
        let session = DashboardSession::new(config);
        let printer = tokio::spawn(print_events(session.event_stream()));

        if cli.autostart {
            report(session.start());
        }

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Some(line) = lines.next_line().await.context("reading stdin")? {
            if line.trim().is_empty() {
                continue;
            }
            match parse_line(&line) {
                Ok(ShellCommand::Session(command)) => report(session.command(command)),
                Ok(ShellCommand::Resize(rect)) => {
                    if let Err(err) = session.resize(rect) {
                        eprintln!("{err}");
                    }
                }
                Ok(ShellCommand::Status) => match session.snapshot() {
                    Ok(snapshot) => print_json(&snapshot),
                    Err(err) => eprintln!("{err}"),
                },
                Ok(ShellCommand::Quit) => break,
                Err(err) => eprintln!("{err}"),
            }
        }

        drop(session);
        printer.abort();
        Ok::<_, anyhow::Error>(ExitCode::SUCCESS)
    })
}

fn report<T, E: std::fmt::Display>(result: Result<T, E>) {
    if let Err(err) = result {
        eprintln!("{err}");
    }
}

async fn print_events(
    mut events: impl futures::Stream<Item = SessionEvent> + Unpin,
) {
    while let Some(event) = events.next().await {
        if matches!(event, SessionEvent::Alert(_)) {
            // Audible cue; one per alert entry.
            let mut stderr = std::io::stderr();
            let _ = stderr.write_all(b"\x07");
            let _ = stderr.flush();
        }
        print_json(&event);
    }
}

fn print_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string(value) {
        Ok(line) => println!("{line}"),
        Err(err) => log::warn!("Failed to encode event: {}", err),
    }
}
