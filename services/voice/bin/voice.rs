//! Command-line voice client
//!
//! This binary is responsible for:
//! 1. Loading configuration from the environment and the command line.
//! 2. Initializing logging.
//! 3. Opening a realtime session over WebSocket.
//! 4. Streaming one audio file as a voice turn.
//! 5. Printing the resulting transcript and closing the connection.

use anyhow::Context;
use clap::{Parser, ValueEnum};
use nargis_core::{RealtimeSession, SessionEvent};
use nargis_realtime::{ConnectionManager, WebSocketTransport};
use nargis_realtime_types::{Role, VoiceMode};
use nargis_voice::{
    audio::{DEFAULT_CHUNK_SIZE, FileAudioSource},
    config::Config,
    stream::{TurnEnd, stream_turn},
};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Mode {
    Chat,
    Agent,
}

impl From<Mode> for VoiceMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Chat => VoiceMode::Chat,
            Mode::Agent => VoiceMode::Agent,
        }
    }
}

#[derive(Parser, Debug)]
#[command(version, about = "Stream an audio file to the realtime voice agent")]
struct Args {
    /// Raw audio file to send as one turn
    audio: PathBuf,

    /// Overrides REALTIME_WS_URL
    #[arg(long)]
    url: Option<String>,

    /// Overrides REALTIME_MAX_RETRIES
    #[arg(long)]
    retries: Option<u32>,

    #[arg(long, value_enum, default_value_t = Mode::Chat)]
    mode: Mode,

    /// Bytes per audio message
    #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE)]
    chunk_size: usize,

    /// How long to wait for the agent to finish the turn, in seconds
    #[arg(long, default_value_t = 60)]
    turn_timeout: u64,
}

/// Listens for the `Ctrl+C` signal so a turn can be abandoned.
async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        warn!("Failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
    info!("Received shutdown signal. Stopping the turn...");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // --- 1. Load Configuration ---
    let args = Args::parse();
    let mut config = Config::from_env().context("Failed to load configuration")?;
    if let Some(url) = &args.url {
        config.set_ws_url(url).context("Invalid --url")?;
    }
    if let Some(retries) = args.retries {
        config.max_retries = retries;
    }

    // --- 2. Initialize Logging ---
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
        .init();
    info!(url = %config.ws_url, max_retries = config.max_retries, "Configuration loaded.");

    // --- 3. Open Session ---
    let manager = ConnectionManager::new(WebSocketTransport::new(), config.reconnect_policy());
    let session = RealtimeSession::new(manager);
    let progress = session.on_event(|event| match event {
        SessionEvent::Status(status) => info!("{}", status.label()),
        SessionEvent::ToolCompleted { tool, .. } => info!(%tool, "Tool completed"),
        SessionEvent::TurnCancelled => warn!("Turn was cancelled"),
        _ => {}
    });

    session.connect(config.connect_url(), config.max_retries)?;
    session
        .wait_until_open(config.open_timeout)
        .await
        .context("Realtime connection did not open")?;

    // --- 4. Stream the Turn ---
    let mut source = FileAudioSource::open(&args.audio, args.chunk_size).await?;
    let turn = async {
        let turn_end = TurnEnd::watch(&session);
        stream_turn(&session, &mut source, args.mode.into()).await?;
        anyhow::Ok(turn_end.wait(Duration::from_secs(args.turn_timeout)).await)
    };
    tokio::select! {
        result = turn => {
            if !result? {
                warn!("Timed out waiting for the agent to finish");
            }
        }
        _ = shutdown_signal() => {
            session.stop();
        }
    }

    // --- 5. Report and Close ---
    for message in session.messages() {
        let speaker = match message.role {
            Role::User => "you",
            Role::Assistant => "agent",
        };
        for thought in &message.thoughts {
            println!("         · {thought}");
        }
        println!("{speaker:>8}: {}", message.text);
    }

    progress.dispose();
    session.close();
    info!("Session closed.");
    Ok(())
}
