//! Signaling wire protocol: JSON objects tagged by a `type` field.
//!
//! ```text
//!   client ── connect ──▶ SFU
//!   client ◀── offer ─── SFU
//!   client ── answer ──▶ SFU
//!   client ── candidate ▶ SFU   (repeated)
//!   client ◀── ping ──── SFU
//!   client ── pong ────▶ SFU
//! ```
//!
//! Decoding is strict: a message that is not an object with a string `type`,
//! carries an unknown tag, or lacks a required field yields a [`DecodeError`]
//! instead of a partially filled message.

use serde::{Deserialize, Serialize};
use uplink_common::models::{AudioCodec, MediaPreferences, Role, VideoCodec};
use uplink_common::negotiation::{IceServer, IceTransportPolicy, MediaNegotiationConfig};

use crate::error::DecodeError;

/// Every tag this client understands, inbound or outbound.
const KNOWN_TYPES: &[&str] = &["connect", "offer", "answer", "candidate", "ping", "pong"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SignalingMessage {
    /// Client → SFU: join a channel.
    Connect(ConnectMessage),
    /// SFU → client: session description plus transport configuration.
    Offer(OfferMessage),
    /// Client → SFU: local session description.
    Answer(AnswerMessage),
    /// Client → SFU: one locally gathered ICE candidate.
    Candidate(CandidateMessage),
    /// SFU → client: liveness probe.
    Ping,
    /// Client → SFU: reply to `ping`.
    Pong,
}

impl SignalingMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            SignalingMessage::Connect(_) => "connect",
            SignalingMessage::Offer(_) => "offer",
            SignalingMessage::Answer(_) => "answer",
            SignalingMessage::Candidate(_) => "candidate",
            SignalingMessage::Ping => "ping",
            SignalingMessage::Pong => "pong",
        }
    }

    pub fn encode(&self) -> serde_json::Result<String> {
        encode(self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectMetadata {
    pub access_token: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoSetting {
    pub codec_type: VideoCodec,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioSetting {
    pub codec_type: AudioCodec,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectMessage {
    pub role: Role,
    pub channel_id: String,
    pub metadata: ConnectMetadata,
    /// Legacy multi-stream semantics; always requested.
    pub plan_b: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video: Option<VideoSetting>,
    /// Video bitrate in kbps. A sibling of `video`, not nested in it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bit_rate: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio: Option<AudioSetting>,
}

impl ConnectMessage {
    /// Build a connect request. The bitrate is only announced alongside a
    /// video codec.
    pub fn new(role: Role, channel_id: &str, access_token: &str, prefs: &MediaPreferences) -> Self {
        let video = prefs.video_codec.map(|codec_type| VideoSetting { codec_type });
        Self {
            role,
            channel_id: channel_id.to_owned(),
            metadata: ConnectMetadata { access_token: access_token.to_owned() },
            plan_b: true,
            bit_rate: video.and(prefs.video_bit_rate),
            video,
            audio: prefs.audio_codec.map(|codec_type| AudioSetting { codec_type }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceServerGroup {
    pub urls: Vec<String>,
    pub username: String,
    pub credential: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfferConfig {
    pub ice_transport_policy: String,
    pub ice_servers: Vec<IceServerGroup>,
}

impl OfferConfig {
    /// Flatten every url group into one [`IceServer`] per url, keeping the
    /// order of the offer.
    pub fn negotiation_config(&self) -> MediaNegotiationConfig {
        let ice_servers = self
            .ice_servers
            .iter()
            .flat_map(|group| {
                group.urls.iter().map(|url| IceServer {
                    url: url.clone(),
                    username: group.username.clone(),
                    credential: group.credential.clone(),
                })
            })
            .collect();
        MediaNegotiationConfig::new(ice_servers, IceTransportPolicy::parse(&self.ice_transport_policy))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfferMessage {
    pub sdp: String,
    pub client_id: String,
    pub config: OfferConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerMessage {
    pub sdp: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateMessage {
    pub candidate: String,
}

/// Parse one text frame.
pub fn decode(raw: &str) -> Result<SignalingMessage, DecodeError> {
    let value: serde_json::Value = serde_json::from_str(raw)?;
    let kind = value
        .get("type")
        .and_then(serde_json::Value::as_str)
        .ok_or(DecodeError::MissingOrInvalidType)?;
    let Some(kind) = KNOWN_TYPES.iter().copied().find(|known| *known == kind) else {
        return Err(DecodeError::UnknownType(kind.to_owned()));
    };
    serde_json::from_value(value).map_err(|source| DecodeError::Malformed { kind, source })
}

/// Serialize one message into a text frame.
pub fn encode(message: &SignalingMessage) -> serde_json::Result<String> {
    serde_json::to_string(message)
}
