//! [`MediaTransport`] backed by the `webrtc` crate.
//!
//! Encoded media is not produced here. The capture process sends RTP to
//! local UDP ports and each attached track forwards what arrives on its
//! port into the peer connection.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::net::UdpSocket;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uplink_common::models::{AudioCodec, MediaPreferences, VideoCodec};
use uplink_common::negotiation::{IceTransportPolicy, MediaNegotiationConfig};
use webrtc::api::APIBuilder;
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::{
    MIME_TYPE_H264, MIME_TYPE_OPUS, MIME_TYPE_PCMU, MIME_TYPE_VP8, MIME_TYPE_VP9, MediaEngine,
};
use webrtc::ice_transport::ice_candidate::RTCIceCandidate;
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::policy::bundle_policy::RTCBundlePolicy;
use webrtc::peer_connection::policy::ice_transport_policy::RTCIceTransportPolicy;
use webrtc::peer_connection::policy::rtcp_mux_policy::RTCRtcpMuxPolicy;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::rtp_transceiver::rtp_codec::RTCRtpCodecCapability;
use webrtc::track::track_local::track_local_static_rtp::TrackLocalStaticRTP;
use webrtc::track::track_local::{TrackLocal, TrackLocalWriter};

use crate::error::{MediaError, Result};
use crate::transport::{CandidateSink, LocalStream, MediaTrack, MediaTransport, PeerSession, TrackKind};

const RTP_MTU: usize = 1500;

/// Where the capture process delivers RTP.
#[derive(Debug, Clone)]
pub struct RtpSettings {
    pub bind_host: String,
    pub video_port: u16,
    pub audio_port: u16,
}

impl RtpSettings {
    fn port(&self, kind: TrackKind) -> u16 {
        match kind {
            TrackKind::Audio => self.audio_port,
            TrackKind::Video => self.video_port,
        }
    }
}

/// webrtc-rs backed transport.
///
/// Each session builds and owns its own API object, so nothing outlives a
/// session and the default no-op `shutdown` is enough.
pub struct WebRtcTransport {
    preferences: MediaPreferences,
    rtp: RtpSettings,
}

impl WebRtcTransport {
    pub fn new(preferences: MediaPreferences, rtp: RtpSettings) -> Self {
        Self { preferences, rtp }
    }
}

#[async_trait]
impl MediaTransport for WebRtcTransport {
    async fn create_session(
        &self,
        config: &MediaNegotiationConfig,
        candidates: CandidateSink,
    ) -> Result<Arc<dyn PeerSession>> {
        let mut media_engine = MediaEngine::default();
        media_engine
            .register_default_codecs()
            .map_err(|e| MediaError::backend("register codecs", e))?;
        let registry = register_default_interceptors(Registry::new(), &mut media_engine)
            .map_err(|e| MediaError::backend("register interceptors", e))?;
        let api = APIBuilder::new()
            .with_media_engine(media_engine)
            .with_interceptor_registry(registry)
            .build();

        debug!(
            continual_gathering = ?config.continual_gathering,
            key_type = ?config.key_type,
            "gathering and certificate policy left to backend defaults"
        );
        let peer = Arc::new(
            api.new_peer_connection(rtc_configuration(config))
                .await
                .map_err(|e| MediaError::backend("create peer connection", e))?,
        );

        peer.on_ice_candidate(Box::new(move |candidate: Option<RTCIceCandidate>| {
            let candidates = candidates.clone();
            Box::pin(async move {
                let Some(candidate) = candidate else {
                    debug!("candidate gathering complete");
                    return;
                };
                match candidate.to_json() {
                    Ok(init) => {
                        let _ = candidates.send(init.candidate);
                    }
                    Err(e) => warn!(error = %e, "failed to serialize local candidate"),
                }
            })
        }));

        peer.on_peer_connection_state_change(Box::new(|state: RTCPeerConnectionState| {
            Box::pin(async move {
                info!(?state, "peer connection state changed");
            })
        }));

        info!(ice_servers = config.ice_servers.len(), policy = ?config.ice_transport_policy, "peer session created");
        Ok(Arc::new(WebRtcSession {
            peer,
            preferences: self.preferences,
            rtp: self.rtp.clone(),
            tasks: Mutex::new(Vec::new()),
        }))
    }
}

struct WebRtcSession {
    peer: Arc<RTCPeerConnection>,
    preferences: MediaPreferences,
    rtp: RtpSettings,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl WebRtcSession {
    fn track_for(&self, track: &MediaTrack, stream: &LocalStream) -> Arc<TrackLocalStaticRTP> {
        Arc::new(TrackLocalStaticRTP::new(
            codec_capability(track.kind, &self.preferences),
            track.id.clone(),
            stream.label.clone(),
        ))
    }

    fn keep(&self, task: JoinHandle<()>) {
        if let Ok(mut tasks) = self.tasks.lock() {
            tasks.push(task);
        }
    }
}

#[async_trait]
impl PeerSession for WebRtcSession {
    async fn attach_stream(&self, stream: &LocalStream) -> Result<()> {
        for track in &stream.tracks {
            let local = self.track_for(track, stream);
            let sender = self
                .peer
                .add_track(Arc::clone(&local) as Arc<dyn TrackLocal + Send + Sync>)
                .await
                .map_err(|e| MediaError::backend("add track", e))?;

            // Interceptors only run while RTCP is being read.
            self.keep(tokio::spawn(async move {
                let mut buf = vec![0u8; RTP_MTU];
                while sender.read(&mut buf).await.is_ok() {}
            }));

            let addr = format!("{}:{}", self.rtp.bind_host, self.rtp.port(track.kind));
            let socket = UdpSocket::bind(&addr).await?;
            info!(track = %track.id, kind = ?track.kind, %addr, "forwarding RTP into track");
            self.keep(tokio::spawn(forward_rtp(socket, local)));
        }
        Ok(())
    }

    async fn set_remote_description(&self, sdp: &str) -> Result<()> {
        let offer = RTCSessionDescription::offer(sdp.to_owned())
            .map_err(|e| MediaError::backend("parse offer", e))?;
        self.peer
            .set_remote_description(offer)
            .await
            .map_err(|e| MediaError::backend("set remote description", e))
    }

    async fn create_answer(&self) -> Result<String> {
        let answer = self
            .peer
            .create_answer(None)
            .await
            .map_err(|e| MediaError::backend("create answer", e))?;
        Ok(answer.sdp)
    }

    async fn set_local_description(&self, sdp: &str) -> Result<()> {
        let answer = RTCSessionDescription::answer(sdp.to_owned())
            .map_err(|e| MediaError::backend("parse answer", e))?;
        self.peer
            .set_local_description(answer)
            .await
            .map_err(|e| MediaError::backend("set local description", e))
    }

    async fn close(&self) {
        if let Ok(mut tasks) = self.tasks.lock() {
            for task in tasks.drain(..) {
                task.abort();
            }
        }
        if let Err(e) = self.peer.close().await {
            warn!(error = %e, "peer connection did not close cleanly");
        }
    }
}

async fn forward_rtp(socket: UdpSocket, track: Arc<TrackLocalStaticRTP>) {
    let mut buf = vec![0u8; RTP_MTU];
    loop {
        let n = match socket.recv(&mut buf).await {
            Ok(n) => n,
            Err(e) => {
                warn!(error = %e, "RTP socket failed");
                return;
            }
        };
        if let Err(e) = track.write(&buf[..n]).await {
            if matches!(e, webrtc::Error::ErrClosedPipe) {
                debug!(track = %track.id(), "track closed, stopping RTP forwarder");
                return;
            }
            debug!(track = %track.id(), error = %e, "dropping RTP packet");
        }
    }
}

/// Map the negotiated configuration onto the backend's configuration.
fn rtc_configuration(config: &MediaNegotiationConfig) -> RTCConfiguration {
    RTCConfiguration {
        ice_servers: config
            .ice_servers
            .iter()
            .map(|server| RTCIceServer {
                urls: vec![server.url.clone()],
                username: server.username.clone(),
                credential: server.credential.clone(),
                ..Default::default()
            })
            .collect(),
        ice_transport_policy: match config.ice_transport_policy {
            IceTransportPolicy::All => RTCIceTransportPolicy::All,
            IceTransportPolicy::Relay => RTCIceTransportPolicy::Relay,
        },
        bundle_policy: RTCBundlePolicy::MaxBundle,
        rtcp_mux_policy: RTCRtcpMuxPolicy::Require,
        ..Default::default()
    }
}

fn codec_capability(kind: TrackKind, preferences: &MediaPreferences) -> RTCRtpCodecCapability {
    let (mime_type, clock_rate, channels) = match kind {
        TrackKind::Video => match preferences.video_codec.unwrap_or(VideoCodec::Vp8) {
            VideoCodec::Vp8 => (MIME_TYPE_VP8, 90_000, 0),
            VideoCodec::Vp9 => (MIME_TYPE_VP9, 90_000, 0),
            VideoCodec::H264 => (MIME_TYPE_H264, 90_000, 0),
        },
        TrackKind::Audio => match preferences.audio_codec.unwrap_or(AudioCodec::Opus) {
            AudioCodec::Opus => (MIME_TYPE_OPUS, 48_000, 2),
            AudioCodec::Pcmu => (MIME_TYPE_PCMU, 8_000, 1),
        },
    };
    RTCRtpCodecCapability {
        mime_type: mime_type.to_owned(),
        clock_rate,
        channels,
        ..Default::default()
    }
}
