//! `mcc`: talk to a MeshCore companion radio over a TCP byte stream.

mod config;
mod output;

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use mcc_link::{Client, Link, LinkEvent};
use mcc_protocol::{PublicKey, PublicKeyPrefix, PushNotification, RadioParams, PUB_KEY_SIZE};
use serde_json::json;
use tokio::net::TcpStream;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::CliConfig;

#[derive(Parser, Debug)]
#[command(name = "mcc", version, about = "MeshCore companion protocol client")]
struct Cli {
    /// Device address (host:port)
    #[arg(long, global = true)]
    tcp: Option<String>,

    /// YAML config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Per-response timeout in milliseconds
    #[arg(long, global = true)]
    timeout_ms: Option<u64>,

    /// App name sent when the session starts
    #[arg(long, global = true)]
    app_name: Option<String>,

    /// Log filter (overrides RUST_LOG)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Serve Prometheus metrics on this address (host:port)
    #[cfg(feature = "prometheus")]
    #[arg(long, global = true)]
    metrics_addr: Option<std::net::SocketAddr>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start a session and show the device's identity and radio settings
    Info,

    /// List contacts
    Contacts {
        /// Only contacts modified after this watermark
        #[arg(long)]
        since: Option<u32>,
    },

    /// Drain queued messages
    Sync,

    /// Send a direct message
    Send {
        /// Recipient public key or 6-byte prefix, hex
        recipient: String,
        /// Message text
        text: String,
    },

    /// Send a channel message
    SendChannel {
        /// Channel index
        channel: u8,
        /// Message text
        text: String,
    },

    /// Read the device clock
    Time,

    /// Set the device clock (defaults to now)
    SetTime {
        /// Unix time in seconds
        epoch: Option<u32>,
    },

    /// Broadcast this node's advertisement
    Advert {
        /// Flood instead of zero-hop
        #[arg(long)]
        flood: bool,
    },

    /// Rename this node
    SetName { name: String },

    /// Set radio parameters
    SetRadio {
        /// Frequency in kHz
        freq_khz: u32,
        /// Bandwidth in Hz
        bandwidth_hz: u32,
        /// Spreading factor
        sf: u8,
        /// Coding rate
        cr: u8,
    },

    /// Set transmit power
    SetTxPower { dbm: u8 },

    /// Print push notifications until Ctrl-C, syncing messages as they arrive
    Watch,
}

fn init_logging(cli_level: Option<&str>, config_level: Option<&str>) {
    let filter = match cli_level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(config_level.unwrap_or("info"))),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[cfg(feature = "prometheus")]
fn init_metrics(addr: Option<std::net::SocketAddr>) -> Result<()> {
    let Some(addr) = addr else {
        return Ok(());
    };
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .context("installing prometheus exporter")?;
    mcc_link::metrics::describe_metrics();
    info!(%addr, "serving metrics");
    Ok(())
}

fn now_secs() -> Result<u32> {
    u32::try_from(chrono::Utc::now().timestamp()).context("system clock outside u32 epoch range")
}

fn parse_recipient(text: &str) -> Result<PublicKeyPrefix> {
    if text.len() == PUB_KEY_SIZE * 2 {
        let key = PublicKey::from_hex(text).context("invalid public key")?;
        return Ok(key.prefix());
    }
    PublicKeyPrefix::from_hex(text).context("invalid public key prefix")
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => CliConfig::load(path)?,
        None => CliConfig::default(),
    };
    if let Some(tcp) = &cli.tcp {
        config.tcp = Some(tcp.clone());
    }
    if let Some(timeout_ms) = cli.timeout_ms {
        config.link.response_timeout_ms = timeout_ms;
    }
    if let Some(app_name) = &cli.app_name {
        config.link.app_name = app_name.clone();
    }
    init_logging(cli.log_level.as_deref(), config.log_level.as_deref());
    debug!(?config, "configuration loaded");
    #[cfg(feature = "prometheus")]
    init_metrics(cli.metrics_addr)?;

    let addr = config.tcp().to_string();
    let stream = TcpStream::connect(&addr)
        .await
        .with_context(|| format!("connecting to {addr}"))?;
    info!(%addr, "connected");

    let client = Client::new(Link::from_stream(stream, config.link.clone()));
    let result = run(&client, cli.command, cli.json).await;
    client.link().close();
    result
}

async fn run(client: &Client, command: Commands, json: bool) -> Result<()> {
    let info = client.app_start().await.context("starting session")?;
    let ok = json!({ "status": "ok" });
    let done = |_: &serde_json::Value| "ok".to_string();

    match command {
        Commands::Info => output::emit(json, &info, output::self_info)?,
        Commands::Contacts { since } => {
            let list = client.get_contacts(since).await?;
            output::emit(json, &list, output::contacts)?;
        }
        Commands::Sync => {
            let messages = client.sync_all_messages().await?;
            output::emit(json, &messages, |m| output::messages(m))?;
        }
        Commands::Send { recipient, text } => {
            let recipient = parse_recipient(&recipient)?;
            let sent = client
                .send_text_message(recipient, &text, now_secs()?, 0)
                .await?;
            output::emit(json, &sent, output::sent)?;
        }
        Commands::SendChannel { channel, text } => {
            client.send_channel_message(channel, &text, now_secs()?).await?;
            output::emit(json, &ok, done)?;
        }
        Commands::Time => {
            let epoch = client.get_device_time().await?;
            let value = json!({
                "epoch_secs": epoch,
                "utc": chrono::DateTime::from_timestamp(i64::from(epoch), 0).map(|t| t.to_rfc3339()),
            });
            output::emit(json, &value, |v| {
                format!("{} ({})", v["epoch_secs"], v["utc"].as_str().unwrap_or("invalid"))
            })?;
        }
        Commands::SetTime { epoch } => {
            let epoch = match epoch {
                Some(epoch) => epoch,
                None => now_secs()?,
            };
            client.set_device_time(epoch).await?;
            output::emit(json, &ok, done)?;
        }
        Commands::Advert { flood } => {
            client.send_self_advert(flood).await?;
            output::emit(json, &ok, done)?;
        }
        Commands::SetName { name } => {
            client.set_advert_name(&name).await?;
            output::emit(json, &ok, done)?;
        }
        Commands::SetRadio {
            freq_khz,
            bandwidth_hz,
            sf,
            cr,
        } => {
            let params = RadioParams {
                freq_khz,
                bandwidth_hz,
                spreading_factor: sf,
                coding_rate: cr,
            };
            client.set_radio_params(params).await?;
            output::emit(json, &ok, done)?;
        }
        Commands::SetTxPower { dbm } => {
            client.set_tx_power(dbm).await?;
            output::emit(json, &ok, done)?;
        }
        Commands::Watch => watch(client, json).await?,
    }
    Ok(())
}

async fn watch(client: &Client, json: bool) -> Result<()> {
    let mut events = client.link().events();
    // Pick up anything queued before we subscribed.
    for message in client.sync_all_messages().await? {
        output::emit(json, &message, output::message)?;
    }
    info!("watching for push notifications, Ctrl-C to stop");

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    loop {
        tokio::select! {
            _ = &mut ctrl_c => break,
            event = events.recv() => match event {
                Ok(LinkEvent::Push(frame)) => {
                    let push = PushNotification::from_frame(&frame)?;
                    output::emit(json, &push, output::push)?;
                    if push == PushNotification::MsgWaiting {
                        for message in client.sync_all_messages().await? {
                            output::emit(json, &message, output::message)?;
                        }
                    }
                }
                Ok(LinkEvent::Disconnected { reason }) => bail!("link closed: {reason}"),
                Ok(LinkEvent::Connected) => {}
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "event receiver lagged"),
                Err(RecvError::Closed) => break,
            },
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["mcc", "time", "--tcp", "10.0.0.2:5000", "--json"]).unwrap();
        assert_eq!(cli.tcp.as_deref(), Some("10.0.0.2:5000"));
        assert!(cli.json);
        assert!(matches!(cli.command, Commands::Time));
    }

    #[test]
    fn test_parse_recipient() {
        let key = "ab".repeat(PUB_KEY_SIZE);
        assert_eq!(parse_recipient(&key).unwrap().to_hex(), "abababababab");
        assert_eq!(parse_recipient("0102030405ff").unwrap().to_hex(), "0102030405ff");
        assert!(parse_recipient("0102").is_err());
    }

    #[cfg(feature = "prometheus")]
    #[test]
    fn test_metrics_addr_flag() {
        let cli =
            Cli::try_parse_from(["mcc", "--metrics-addr", "127.0.0.1:9187", "info"]).unwrap();
        assert_eq!(cli.metrics_addr, Some("127.0.0.1:9187".parse().unwrap()));
        // Without an address no recorder is installed.
        init_metrics(None).unwrap();
    }
}
