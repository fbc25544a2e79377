use actor_protocol::{ConnectionState, Focus, MediaMetadata, PlaybackState, SystemEvent};
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use clap::Parser;
use connection_actors::{Bridge, BridgeConfig, MediaControlSink};
use core_types::LinkId;
use futures::StreamExt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;
use transport_mock::MockTransport;

/// Module output used when no script is given
const DEFAULT_SCRIPT: &[&str] = &[
    "OK",
    "OK",
    "OK",
    "LIST 20FABB010203 A2DP AVRCP HFP",
    "STATE CONNECTED[1] CONNECTABLE[ON] DISCOVERABLE[OFF] BLE[ADVERTISING]",
    "LINK 11 CONNECTED A2DP 20FABB010203 SBC 48000",
    "NAME 20FABB010203 \"Pixel\"",
    "AVRCP_MEDIA TITLE:Intro",
    "AVRCP_PLAY 11",
    "AVRCP_MEDIA ARTIST:Band",
    "ABS_VOL 11 96",
    "PB_PULL PB_PULL_START 11",
    "BEGIN:VCARD",
    "END:VCARDPB_PULL_END",
    "AVRCP_PAUSE 11",
    "LINK_LOSS 11 1",
];

/// Melody Audio bridge demo against a scripted module
#[derive(Parser, Debug)]
#[command(name = "melody-bridge", version, long_about = None)]
struct Args {
    /// JSON bridge configuration (defaults apply to missing fields)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Module response lines to replay, one per line
    #[arg(short, long)]
    script: Option<PathBuf>,

    /// Delay between replayed lines in milliseconds
    #[arg(long, default_value_t = 20)]
    line_delay_ms: u64,
}

/// Sink that logs what a host media session would show
struct LoggingSink;

#[async_trait]
impl MediaControlSink for LoggingSink {
    async fn on_playback_state_changed(&self, link_id: LinkId, state: PlaybackState) {
        info!(link_id, ?state, "playback");
    }

    async fn on_metadata_changed(&self, link_id: LinkId, metadata: &MediaMetadata) {
        info!(
            link_id,
            title = metadata.title.as_deref().unwrap_or("-"),
            artist = metadata.artist.as_deref().unwrap_or("-"),
            album = metadata.album.as_deref().unwrap_or("-"),
            "metadata"
        );
    }

    async fn request_focus(&self) -> Focus {
        info!("focus granted");
        Focus::Granted
    }

    async fn release_focus(&self) {
        info!("focus released");
    }
}

fn load_config(path: Option<&PathBuf>) -> Result<BridgeConfig> {
    let Some(path) = path else {
        return Ok(BridgeConfig::default());
    };
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    Ok(BridgeConfig::from_json_str(&json)?)
}

fn load_script(path: Option<&PathBuf>) -> Result<Vec<String>> {
    match path {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading script {}", path.display()))?;
            Ok(text
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(String::from)
                .collect())
        }
        None => Ok(DEFAULT_SCRIPT.iter().map(|l| l.to_string()).collect()),
    }
}

fn log_event(source: &str, event: SystemEvent) {
    match event {
        SystemEvent::StateChanged { state } => info!(source, %state, "state"),
        SystemEvent::ConnectionFailed { reason } => warn!(source, %reason, "connection failed"),
        SystemEvent::Protocol { event } => debug!(source, ?event, "protocol"),
        SystemEvent::CommandResolved {
            command,
            sequence,
            outcome,
        } => info!(source, %command, sequence, ?outcome, "resolved"),
        SystemEvent::Error { message } => warn!(source, %message, "error"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = load_config(args.config.as_ref())?;
    let script = load_script(args.script.as_ref())?;

    let mock = MockTransport::new(config.device);
    mock.set_present(true);

    let mut bridge = Bridge::spawn(Arc::new(mock.clone()), Arc::new(LoggingSink), config)?;

    let mut host_events = bridge.take_event_receiver();
    tokio::spawn(async move {
        while let Some(event) = host_events.next().await {
            log_event("host", event);
        }
    });
    let (_, mut protocol_events) = bridge.subscribe_events()?;
    tokio::spawn(async move {
        while let Some(event) = protocol_events.next().await {
            log_event("session", event);
        }
    });

    bridge.open()?;
    let connected = tokio::time::timeout(Duration::from_secs(10), async {
        while bridge.state() != ConnectionState::Connected {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    if connected.is_err() {
        bail!("bridge did not connect");
    }

    info!(lines = script.len(), "replaying module output");
    for line in &script {
        mock.push_line(line);
        tokio::time::sleep(Duration::from_millis(args.line_delay_ms)).await;
    }

    for line in mock.written_lines() {
        info!(%line, "sent to module");
    }

    bridge.shutdown().await;
    info!("done");
    Ok(())
}
