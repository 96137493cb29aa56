//! Application configuration loaded from environment variables and config files.
//!
//! Supports `.env` files for development and environment variables for production.
//! Config precedence: env vars > .env file > uplink.toml > defaults

use std::path::Path;
use std::time::Duration;

use config::builder::DefaultState;
use config::{ConfigBuilder, ConfigError};
use serde::Deserialize;

use crate::models::{AudioCodec, MediaPreferences, ShootingMode, VideoCodec};

/// Load the configuration.
///
/// When `file` is given it must exist; otherwise an optional `uplink.toml`
/// in the working directory is picked up.
pub fn load(file: Option<&Path>) -> Result<AppConfig, ConfigError> {
    // Load .env file if present (development)
    let _ = dotenvy::dotenv();

    let builder = defaults()?;
    let builder = match file {
        Some(path) => builder.add_source(config::File::from(path).required(true)),
        None => builder.add_source(config::File::with_name("uplink").required(false)),
    };

    builder
        // Environment variables (UPLINK_AUTH__CLIENT_ID, UPLINK_ROOM__CHANNEL_ID, etc.)
        .add_source(
            config::Environment::with_prefix("UPLINK")
                .separator("__")
                .try_parsing(true),
        )
        .build()?
        .try_deserialize()
}

/// Built-in defaults, the base layer of [`load`].
pub fn defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    config::Config::builder()
        .set_default("auth.token_url", "https://auth.api.ricoh/v1/token")?
        .set_default("auth.scope", "sfu.api.ricoh/v1/sfu")?
        .set_default("room.api_base", "https://sfu.api.ricoh/v1")?
        .set_default("media.video_codec", "VP9")?
        .set_default("media.video_bit_rate", 2000)? // kbps
        .set_default("media.audio_codec", "OPUS")?
        .set_default("media.target_fps", 30)?
        .set_default("media.shooting_mode", "RicMoviePreview1920")?
        .set_default("signaling.connect_timeout_secs", 10)?
        .set_default("signaling.idle_timeout_secs", 0)? // disabled
        .set_default("signaling.negotiation_timeout_secs", 15)?
        .set_default("rtp.bind_host", "127.0.0.1")?
        .set_default("rtp.video_port", 5004)?
        .set_default("rtp.audio_port", 5006)
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub auth: AuthConfig,
    pub room: RoomConfig,
    pub media: MediaConfig,
    pub signaling: SignalingConfig,
    #[serde(default)]
    pub device: DeviceConfig,
    #[serde(default)]
    pub capture: CaptureConfig,
    pub rtp: RtpConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    /// Client credentials for the token endpoint.
    pub client_id: String,
    pub client_secret: String,
    pub token_url: String,
    pub scope: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RoomConfig {
    /// Base URL of the room API that issues tickets.
    pub api_base: String,
    /// Channel to stream into. May also be given on the command line.
    pub channel_id: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct MediaConfig {
    pub video_codec: Option<VideoCodec>,
    /// Video bitrate in kbps.
    pub video_bit_rate: Option<u32>,
    pub audio_codec: Option<AudioCodec>,
    pub target_fps: u32,
    pub shooting_mode: ShootingMode,
}

impl MediaConfig {
    pub fn preferences(&self) -> MediaPreferences {
        MediaPreferences {
            video_codec: self.video_codec,
            video_bit_rate: self.video_bit_rate,
            audio_codec: self.audio_codec,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SignalingConfig {
    pub connect_timeout_secs: u64,
    /// Close the channel when nothing arrives for this long. 0 disables.
    pub idle_timeout_secs: u64,
    /// Upper bound for every asynchronous negotiation step.
    pub negotiation_timeout_secs: u64,
}

impl SignalingConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn idle_timeout(&self) -> Option<Duration> {
        (self.idle_timeout_secs > 0).then(|| Duration::from_secs(self.idle_timeout_secs))
    }

    pub fn negotiation_timeout(&self) -> Duration {
        Duration::from_secs(self.negotiation_timeout_secs)
    }
}

/// Shell hooks that hand the camera over to the streaming session and back.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct DeviceConfig {
    pub close_command: Option<String>,
    pub open_command: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct CaptureConfig {
    /// Command started when capture begins. Supports `{width}`, `{height}`,
    /// `{fps}`, `{mode}`, `{video_port}` and `{audio_port}` placeholders.
    pub command: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RtpConfig {
    /// Local address the encoded RTP feeds are read from.
    pub bind_host: String,
    pub video_port: u16,
    pub audio_port: u16,
}
