//! # uplink
//!
//! Streams the camera to one SFU channel:
//! - `uplink stream` runs a full session until the channel closes
//! - `uplink ticket` only issues a ticket, for checking credentials
//!
//! Configuration comes from `uplink.toml` and `UPLINK_*` environment
//! variables; see `uplink_common::config`.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use uplink_api::{AuthClient, RoomClient, TicketService, TokenService};
use uplink_common::config::{self, AppConfig};
use uplink_media::{CommandHooks, HeadlessPreview, ProcessCapture, RtpSettings, WebRtcTransport};
use uplink_session::{BootstrapSettings, MediaStack, SessionBootstrap, SessionOutcome};

#[derive(Parser)]
#[command(name = "uplink", version, about = "Stream a camera to an SFU channel")]
struct Cli {
    /// Config file; defaults to an optional ./uplink.toml.
    #[arg(long, global = true, env = "UPLINK_CONFIG")]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run one streaming session and report how it ended.
    Stream {
        #[arg(long)]
        channel_id: Option<String>,
    },
    /// Issue a ticket for the channel and print it.
    Ticket {
        #[arg(long)]
        channel_id: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.json_logs);

    let mut config = config::load(cli.config.as_deref()).context("loading configuration")?;
    tracing::info!("uplink v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Command::Stream { channel_id } => {
            override_channel(&mut config, channel_id);
            stream(&config).await
        }
        Command::Ticket { channel_id } => {
            override_channel(&mut config, channel_id);
            ticket(&config).await
        }
    }
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "uplink=debug".into());
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn override_channel(config: &mut AppConfig, channel_id: Option<String>) {
    if channel_id.is_some() {
        config.room.channel_id = channel_id;
    }
}

async fn stream(config: &AppConfig) -> anyhow::Result<ExitCode> {
    let settings = BootstrapSettings::from_config(config)?;
    let auth = AuthClient::new(&config.auth.token_url, config.auth.scope.clone())?;
    let rooms = RoomClient::new(&config.room.api_base)?;

    let media = MediaStack {
        transport: Arc::new(WebRtcTransport::new(
            settings.preferences,
            RtpSettings {
                bind_host: config.rtp.bind_host.clone(),
                video_port: config.rtp.video_port,
                audio_port: config.rtp.audio_port,
            },
        )),
        capture: Arc::new(ProcessCapture::new(
            config.capture.command.clone(),
            config.media.shooting_mode,
            config.rtp.video_port,
            config.rtp.audio_port,
        )),
        device: Arc::new(CommandHooks::new(
            config.device.close_command.clone(),
            config.device.open_command.clone(),
        )),
        preview: Arc::new(HeadlessPreview),
    };

    let bootstrap = SessionBootstrap::new(Arc::new(auth), Arc::new(rooms), settings);
    match bootstrap.run(media).await? {
        SessionOutcome::Closed { code, reason } => {
            println!("closed: {code} {reason}");
            Ok(ExitCode::SUCCESS)
        }
        SessionOutcome::NegotiationFailed { reason } => {
            eprintln!("negotiation failed: {reason}");
            Ok(ExitCode::FAILURE)
        }
    }
}

async fn ticket(config: &AppConfig) -> anyhow::Result<ExitCode> {
    let channel_id = config
        .room
        .channel_id
        .as_deref()
        .context("no channel id; pass --channel-id or set UPLINK_ROOM__CHANNEL_ID")?;
    let auth = AuthClient::new(&config.auth.token_url, config.auth.scope.clone())?;
    let rooms = RoomClient::new(&config.room.api_base)?;

    let token = auth
        .access_token(&config.auth.client_id, &config.auth.client_secret)
        .await
        .context("requesting access token")?;
    let ticket = rooms
        .create_ticket(&token, channel_id)
        .await
        .context("requesting ticket")?;

    println!("id:        {}", ticket.id);
    println!("direction: {:?}", ticket.direction);
    println!("url:       {}", ticket.url);
    Ok(ExitCode::SUCCESS)
}
