//! Peer connection capability.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use uplink_common::models::ShootingMode;
use uplink_common::negotiation::MediaNegotiationConfig;
use uuid::Uuid;

use crate::capture::CaptureDriver;
use crate::error::Result;

/// Receives the SDP string of every locally gathered ICE candidate.
pub type CandidateSink = mpsc::UnboundedSender<String>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioSource {
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoSource {
    pub id: String,
    /// Fixes the capture dimensions for this source.
    pub shooting_mode: ShootingMode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackKind {
    Audio,
    Video,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaTrack {
    pub id: String,
    pub kind: TrackKind,
}

impl MediaTrack {
    pub fn new(kind: TrackKind) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            kind,
        }
    }
}

/// Tracks sent together under one stream label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalStream {
    pub label: String,
    pub tracks: Vec<MediaTrack>,
}

impl LocalStream {
    pub fn new() -> Self {
        Self {
            label: Uuid::new_v4().to_string(),
            tracks: Vec::new(),
        }
    }

    pub fn add_track(&mut self, track: MediaTrack) {
        self.tracks.push(track);
    }
}

impl Default for LocalStream {
    fn default() -> Self {
        Self::new()
    }
}

/// Factory for peer sessions. Owned by whoever starts the session and shut
/// down once it ends.
#[async_trait]
pub trait MediaTransport: Send + Sync {
    /// Create a peer session configured from a remote offer. Every candidate
    /// the session gathers is pushed into `candidates`.
    async fn create_session(
        &self,
        config: &MediaNegotiationConfig,
        candidates: CandidateSink,
    ) -> Result<Arc<dyn PeerSession>>;

    async fn shutdown(&self) {}
}

/// One negotiated peer connection.
///
/// Source, track and stream handles are backend agnostic; the defaults
/// mint fresh random ids and backends only bind them in [`attach_stream`].
///
/// [`attach_stream`]: PeerSession::attach_stream
#[async_trait]
pub trait PeerSession: Send + Sync {
    fn create_audio_source(&self) -> Result<AudioSource> {
        Ok(AudioSource {
            id: Uuid::new_v4().to_string(),
        })
    }

    fn create_audio_track(&self, _source: &AudioSource) -> Result<MediaTrack> {
        Ok(MediaTrack::new(TrackKind::Audio))
    }

    fn create_video_source(&self, capture: &dyn CaptureDriver) -> Result<VideoSource> {
        Ok(VideoSource {
            id: Uuid::new_v4().to_string(),
            shooting_mode: capture.shooting_mode(),
        })
    }

    fn create_video_track(&self, _source: &VideoSource) -> Result<MediaTrack> {
        Ok(MediaTrack::new(TrackKind::Video))
    }

    fn create_local_stream(&self) -> LocalStream {
        LocalStream::new()
    }

    async fn attach_stream(&self, stream: &LocalStream) -> Result<()>;

    async fn set_remote_description(&self, sdp: &str) -> Result<()>;

    /// Returns the answer SDP.
    async fn create_answer(&self) -> Result<String>;

    async fn set_local_description(&self, sdp: &str) -> Result<()>;

    async fn close(&self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handles_get_distinct_ids() {
        let a = MediaTrack::new(TrackKind::Audio);
        let b = MediaTrack::new(TrackKind::Audio);
        assert_ne!(a.id, b.id);
        assert_ne!(LocalStream::new().label, LocalStream::new().label);
    }

    #[test]
    fn stream_keeps_track_order() {
        let audio = MediaTrack::new(TrackKind::Audio);
        let video = MediaTrack::new(TrackKind::Video);
        let mut stream = LocalStream::new();
        stream.add_track(audio.clone());
        stream.add_track(video.clone());

        assert_eq!(stream.tracks, vec![audio, video]);
    }
}
