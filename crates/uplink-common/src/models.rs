//! Domain primitives shared by the signaling, media and session crates.

use serde::{Deserialize, Serialize};

/// Direction of a signaling session from the device's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Upstream,
    Downstream,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Upstream => "upstream",
            Role::Downstream => "downstream",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum VideoCodec {
    Vp8,
    Vp9,
    H264,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AudioCodec {
    Opus,
    Pcmu,
}

/// Codec and bitrate preferences announced in the `connect` message.
///
/// `video_bit_rate` is in kbps and only reaches the wire together with a
/// video codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MediaPreferences {
    pub video_codec: Option<VideoCodec>,
    pub video_bit_rate: Option<u32>,
    pub audio_codec: Option<AudioCodec>,
}

impl MediaPreferences {
    /// The preferences this deployment streams with: VP9 at 2 Mbps plus Opus.
    pub fn deployment_default() -> Self {
        Self {
            video_codec: Some(VideoCodec::Vp9),
            video_bit_rate: Some(2000),
            audio_codec: Some(AudioCodec::Opus),
        }
    }
}

/// Camera shooting mode. The capture dimensions are fixed by the mode and
/// cannot be renegotiated independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ShootingMode {
    RicMoviePreview640,
    RicMoviePreview1024,
    #[default]
    RicMoviePreview1920,
    RicMoviePreview3840,
}

impl ShootingMode {
    /// The name the camera firmware knows this mode by.
    pub fn value(self) -> &'static str {
        match self {
            ShootingMode::RicMoviePreview640 => "RicMoviePreview640",
            ShootingMode::RicMoviePreview1024 => "RicMoviePreview1024",
            ShootingMode::RicMoviePreview1920 => "RicMoviePreview1920",
            ShootingMode::RicMoviePreview3840 => "RicMoviePreview3840",
        }
    }

    pub fn width(self) -> u32 {
        match self {
            ShootingMode::RicMoviePreview640 => 640,
            ShootingMode::RicMoviePreview1024 => 1024,
            ShootingMode::RicMoviePreview1920 => 1920,
            ShootingMode::RicMoviePreview3840 => 3840,
        }
    }

    /// Equirectangular frames: always half the width.
    pub fn height(self) -> u32 {
        self.width() / 2
    }
}
