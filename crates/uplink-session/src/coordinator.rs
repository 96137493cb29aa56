//! Negotiation state machine.
//!
//! ```text
//!   Idle ──Open──▶ AwaitingOffer ──Offer──▶ AnsweringOffer ──answer sent──▶ Connected
//!     │                 │                          │                            │
//!     └─────────────────┴───────── Closed / failure ┴────────────────────────────┴──▶ Closed
//! ```
//!
//! [`NegotiationCoordinator::run`] is the only place state changes. Channel
//! events, locally gathered candidates and the answer chain all reach it
//! through one `select!`, and each handler commits its transition before
//! the next input is taken.

use std::future::Future;
use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use tokio::sync::{mpsc, watch};
use tokio::time::timeout;
use tracing::{debug, error, info, warn};
use uplink_common::models::MediaPreferences;
use uplink_common::negotiation::MediaNegotiationConfig;
use uplink_media::{CandidateSink, CaptureDriver, DeviceControl, MediaTransport, PeerSession, PreviewSink};
use uplink_signaling::{ChannelEvent, SignalingCommands};

use crate::error::NegotiationError;
use crate::session::Session;

/// Code and reason sent when negotiation gives up.
const FAILURE_CLOSE: (u16, &str) = (1000, "negotiation failed");

type AnswerChain = BoxFuture<'static, Result<String, NegotiationError>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegotiationState {
    Idle,
    AwaitingOffer,
    AnsweringOffer,
    Connected,
    Closed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    /// The channel closed; carries the close code and reason.
    Closed { code: u16, reason: String },
    /// Negotiation failed and the channel was asked to close.
    NegotiationFailed { reason: String },
}

#[derive(Debug, Clone, Copy)]
pub struct NegotiationSettings {
    /// Upper bound for every asynchronous media step.
    pub step_timeout: Duration,
    pub target_fps: u32,
}

impl Default for NegotiationSettings {
    fn default() -> Self {
        Self {
            step_timeout: Duration::from_secs(15),
            target_fps: 30,
        }
    }
}

/// The media capabilities a session drives.
#[derive(Clone)]
pub struct MediaStack {
    pub transport: Arc<dyn MediaTransport>,
    pub capture: Arc<dyn CaptureDriver>,
    pub device: Arc<dyn DeviceControl>,
    pub preview: Arc<dyn PreviewSink>,
}

pub struct NegotiationCoordinator {
    session: Session,
    preferences: MediaPreferences,
    settings: NegotiationSettings,
    signaling: Arc<dyn SignalingCommands>,
    media: MediaStack,
    state: watch::Sender<NegotiationState>,
    peer: Option<Arc<dyn PeerSession>>,
    answering: Option<AnswerChain>,
    /// Candidates gathered before the answer went out.
    held: Vec<String>,
    capture_started: bool,
    torn_down: bool,
}

impl NegotiationCoordinator {
    pub fn new(
        session: Session,
        preferences: MediaPreferences,
        settings: NegotiationSettings,
        signaling: Arc<dyn SignalingCommands>,
        media: MediaStack,
    ) -> Self {
        let (state, _) = watch::channel(NegotiationState::Idle);
        Self {
            session,
            preferences,
            settings,
            signaling,
            media,
            state,
            peer: None,
            answering: None,
            held: Vec::new(),
            capture_started: false,
            torn_down: false,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<NegotiationState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> NegotiationState {
        *self.state.borrow()
    }

    /// Drive the session until the channel closes or negotiation fails.
    pub async fn run(mut self, mut events: mpsc::Receiver<ChannelEvent>) -> SessionOutcome {
        let (candidate_tx, mut candidates) = mpsc::unbounded_channel();

        loop {
            let step = tokio::select! {
                biased;
                result = answer_ready(&mut self.answering) => {
                    self.answering = None;
                    self.on_answer(result).await
                }
                Some(candidate) = candidates.recv() => {
                    self.on_candidate(candidate);
                    ControlFlow::Continue(())
                }
                event = events.recv() => match event {
                    Some(event) => self.on_event(event, &candidate_tx).await,
                    None => {
                        warn!(channel = %self.session.channel_id, "signaling channel went away without closing");
                        self.teardown().await;
                        ControlFlow::Break(SessionOutcome::Closed {
                            code: 1006,
                            reason: "signaling channel dropped".to_owned(),
                        })
                    }
                },
            };
            if let ControlFlow::Break(outcome) = step {
                return outcome;
            }
        }
    }

    async fn on_event(&mut self, event: ChannelEvent, candidates: &CandidateSink) -> ControlFlow<SessionOutcome> {
        match event {
            ChannelEvent::Open => {
                if self.state() != NegotiationState::Idle {
                    warn!(state = ?self.state(), "ignoring repeated open");
                    return ControlFlow::Continue(());
                }
                let session = &self.session;
                if let Err(e) = self.signaling.send_connect(
                    session.role,
                    &session.channel_id,
                    &session.access_token,
                    &self.preferences,
                ) {
                    warn!(channel = %session.channel_id, error = %e, "connect not sent");
                }
                self.transition(NegotiationState::AwaitingOffer);
                ControlFlow::Continue(())
            }
            ChannelEvent::Offer { sdp, client_id, config } => {
                if self.state() != NegotiationState::AwaitingOffer {
                    warn!(state = ?self.state(), %client_id, "ignoring offer");
                    return ControlFlow::Continue(());
                }
                info!(channel = %self.session.channel_id, %client_id, "offer received");
                self.transition(NegotiationState::AnsweringOffer);
                match self.prepare(&config, candidates.clone()).await {
                    Ok(peer) => {
                        self.answering = Some(answer_chain(peer, sdp, self.settings.step_timeout));
                        ControlFlow::Continue(())
                    }
                    Err(e) => ControlFlow::Break(self.fail(e).await),
                }
            }
            ChannelEvent::Closed { code, reason } => {
                info!(channel = %self.session.channel_id, code, %reason, "session closed");
                self.teardown().await;
                ControlFlow::Break(SessionOutcome::Closed { code, reason })
            }
        }
    }

    /// Create the peer session and start sending local media.
    async fn prepare(
        &mut self,
        config: &MediaNegotiationConfig,
        candidates: CandidateSink,
    ) -> Result<Arc<dyn PeerSession>, NegotiationError> {
        let limit = self.settings.step_timeout;
        self.media.device.close_for_streaming();

        let peer = bounded("create session", limit, self.media.transport.create_session(config, candidates)).await?;
        self.peer = Some(Arc::clone(&peer));

        let audio_source = peer.create_audio_source()?;
        let audio = peer.create_audio_track(&audio_source)?;
        let video_source = peer.create_video_source(self.media.capture.as_ref())?;
        let video = peer.create_video_track(&video_source)?;
        self.media.preview.attach(&video);

        let mut stream = peer.create_local_stream();
        stream.add_track(audio);
        stream.add_track(video);
        bounded("attach stream", limit, peer.attach_stream(&stream)).await?;

        // A capture that stalls while starting may still hold the camera.
        self.capture_started = true;
        bounded("start capture", limit, self.media.capture.start_capture(self.settings.target_fps)).await?;
        info!(
            stream = %stream.label,
            mode = video_source.shooting_mode.value(),
            fps = self.settings.target_fps,
            "local media attached"
        );
        Ok(peer)
    }

    async fn on_answer(&mut self, result: Result<String, NegotiationError>) -> ControlFlow<SessionOutcome> {
        let sdp = match result {
            Ok(sdp) => sdp,
            Err(e) => return ControlFlow::Break(self.fail(e).await),
        };
        if let Err(e) = self.signaling.send_answer(&sdp) {
            warn!(channel = %self.session.channel_id, error = %e, "answer not sent");
        }
        self.transition(NegotiationState::Connected);

        for candidate in std::mem::take(&mut self.held) {
            self.forward(&candidate);
        }
        ControlFlow::Continue(())
    }

    fn on_candidate(&mut self, candidate: String) {
        match self.state() {
            NegotiationState::Connected => self.forward(&candidate),
            NegotiationState::Closed => debug!("dropping candidate gathered after close"),
            _ => self.held.push(candidate),
        }
    }

    fn forward(&self, candidate: &str) {
        if let Err(e) = self.signaling.send_candidate(candidate) {
            warn!(channel = %self.session.channel_id, error = %e, "candidate not sent");
        }
    }

    async fn fail(&mut self, e: NegotiationError) -> SessionOutcome {
        error!(channel = %self.session.channel_id, error = %e, "negotiation failed");
        self.teardown().await;
        let (code, reason) = FAILURE_CLOSE;
        self.signaling.close(code, reason);
        SessionOutcome::NegotiationFailed { reason: e.to_string() }
    }

    /// Release everything the session holds. Safe to call more than once.
    async fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;
        self.answering = None;
        self.held.clear();

        if self.capture_started {
            self.media.capture.stop_capture().await;
            self.capture_started = false;
        }
        self.media.device.reopen_after_streaming();
        if let Some(peer) = self.peer.take() {
            peer.close().await;
        }
        self.transition(NegotiationState::Closed);
    }

    fn transition(&self, next: NegotiationState) {
        let previous = self.state.send_replace(next);
        debug!(channel = %self.session.channel_id, from = ?previous, to = ?next, "negotiation state");
    }
}

/// Apply the remote offer and produce the local answer, strictly in order.
fn answer_chain(peer: Arc<dyn PeerSession>, offer: String, limit: Duration) -> AnswerChain {
    Box::pin(async move {
        bounded("set remote description", limit, peer.set_remote_description(&offer)).await?;
        let answer = bounded("create answer", limit, peer.create_answer()).await?;
        bounded("set local description", limit, peer.set_local_description(&answer)).await?;
        Ok(answer)
    })
}

async fn answer_ready(chain: &mut Option<AnswerChain>) -> Result<String, NegotiationError> {
    match chain {
        Some(chain) => chain.await,
        None => std::future::pending().await,
    }
}

async fn bounded<T, F>(step: &'static str, limit: Duration, fut: F) -> Result<T, NegotiationError>
where
    F: Future<Output = uplink_media::Result<T>>,
{
    match timeout(limit, fut).await {
        Ok(result) => Ok(result?),
        Err(_) => Err(NegotiationError::Timeout { step }),
    }
}
