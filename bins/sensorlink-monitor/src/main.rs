mod input;

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use sensorlink_client::{ChannelClient, ChannelState};
use sensorlink_core::{ChannelConfig, Endpoint, ReconnectPolicy};
use sensorlink_protocol::{decode_snapshot, ControllerSnapshot};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::input::{parse_line, InputLine};

/// Watch live bioreactor telemetry and send controller commands.
///
/// Lines typed on stdin are sent to the controller: either raw JSON or one of
/// the shorthands `start`, `stop`, `program <name>`.
#[derive(Parser, Debug)]
#[command(name = "sensorlink-monitor", version, about, long_about = None)]
struct Cli {
    /// WebSocket endpoint (e.g. ws://raspberrypi.local:8000/ws)
    #[arg(short, long, env = "SENSORLINK_ENDPOINT")]
    endpoint: Option<String>,

    /// JSON channel configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Fixed reconnect delay in milliseconds (overrides the config file)
    #[arg(long = "reconnect-ms")]
    reconnect_ms: Option<u64>,

    /// Print payloads as received instead of decoding controller snapshots
    #[arg(long)]
    raw: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,sensorlink_client=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = build_config(&cli)?;

    tracing::info!("Connecting to {}", config.endpoint);
    let mut client = ChannelClient::connect(config)?;

    let mut status_rx = client.publisher().watch_status();
    let mut message_rx = client.publisher().watch_last_message();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                tracing::info!("Received Ctrl+C, shutting down...");
                break;
            }

            changed = status_rx.changed() => {
                if changed.is_err() {
                    tracing::warn!("Channel worker stopped");
                    break;
                }
                match *status_rx.borrow_and_update() {
                    ChannelState::Connected => tracing::info!("Channel connected"),
                    ChannelState::Disconnected => tracing::warn!("Channel disconnected, reconnecting..."),
                }
            }

            changed = message_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let payload = message_rx.borrow_and_update().clone();
                if let Some(payload) = payload {
                    print_payload(&payload, cli.raw);
                }
            }

            line = lines.next_line() => {
                match line {
                    Ok(Some(line)) => forward_line(&client, &line),
                    Ok(None) => {
                        tracing::info!("stdin closed, shutting down...");
                        break;
                    }
                    Err(e) => {
                        tracing::error!("Failed to read stdin: {}", e);
                        break;
                    }
                }
            }
        }
    }

    client.deactivate().await;

    let stats = client.statistics();
    tracing::info!(
        "Session: {} connection attempts, {} messages received, {} frames sent",
        stats.connection_attempts,
        stats.messages_received,
        stats.frames_sent
    );
    tracing::debug!("Statistics: {}", serde_json::to_string(&stats)?);
    Ok(())
}

/// Merge the config file with command-line overrides.
fn build_config(cli: &Cli) -> anyhow::Result<ChannelConfig> {
    let mut config = match (&cli.config, &cli.endpoint) {
        (Some(path), _) => ChannelConfig::load(path)?,
        (None, Some(endpoint)) => ChannelConfig::new(Endpoint::parse(endpoint)?),
        (None, None) => anyhow::bail!("either --endpoint or --config is required"),
    };

    if let (Some(_), Some(endpoint)) = (&cli.config, &cli.endpoint) {
        config.endpoint = Endpoint::parse(endpoint)?;
    }
    if let Some(ms) = cli.reconnect_ms {
        config.reconnect = ReconnectPolicy::fixed(Duration::from_millis(ms));
    }

    config.validate()?;
    Ok(config)
}

fn forward_line(client: &ChannelClient, line: &str) {
    match parse_line(line) {
        InputLine::Empty => {}
        InputLine::Message(message) => {
            if let Err(e) = client.send(&message) {
                tracing::warn!("Command not sent: {}", e);
            }
        }
        InputLine::Invalid(reason) => tracing::warn!("Ignoring input: {}", reason),
    }
}

fn print_payload(payload: &str, raw: bool) {
    let now = chrono::Local::now().format("%H:%M:%S");
    if !raw {
        if let Ok(snapshot) = decode_snapshot(payload) {
            println!("[{}] {}", now, format_snapshot(&snapshot));
            return;
        }
    }
    println!("[{}] {}", now, payload.trim_end());
}

fn format_snapshot(snapshot: &ControllerSnapshot) -> String {
    let sensors = &snapshot.sensors;
    let active = snapshot.actuators.active();
    format!(
        "{} ({}) | water {:.1}°C air {:.1}°C pH {:.2} O2 {:.1}% turbidity {:.2} airflow {:.2} | on: {}",
        snapshot.program,
        snapshot.status,
        sensors.water_temp,
        sensors.air_temp,
        sensors.ph,
        sensors.oxygen,
        sensors.turbidity,
        sensors.air_flow,
        if active.is_empty() { "none".to_string() } else { active.join(", ") }
    )
}
