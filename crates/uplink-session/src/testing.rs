//! In-memory fakes for the signaling and media capabilities.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use uplink_api::{ApiError, Direction, Ticket, TicketService, TokenService};
use uplink_common::models::{MediaPreferences, Role, ShootingMode};
use uplink_common::negotiation::MediaNegotiationConfig;
use uplink_media::{
    CandidateSink, CaptureDriver, DeviceControl, LocalStream, MediaError, MediaTrack, MediaTransport, PeerSession,
    PreviewSink, TrackKind,
};
use uplink_signaling::SignalingCommands;
use url::Url;

use crate::coordinator::{MediaStack, NegotiationCoordinator, NegotiationSettings};
use crate::session::Session;

pub fn session() -> Session {
    Session::from_ticket("room-a", ticket("wss://sfu.example.com/v1/signaling"))
}

pub fn ticket(url: &str) -> Ticket {
    Ticket {
        id: "t-1".into(),
        access_token: "ticket-token".into(),
        direction: Direction::Up,
        url: Url::parse(url).unwrap(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sent {
    Connect { role: Role, channel_id: String, access_token: String },
    Answer(String),
    Candidate(String),
    Close(u16, String),
}

impl Sent {
    pub fn connect() -> Self {
        Sent::Connect {
            role: Role::Upstream,
            channel_id: "room-a".into(),
            access_token: "ticket-token".into(),
        }
    }
}

#[derive(Default)]
pub struct FakeSignaling {
    sent: Mutex<Vec<Sent>>,
}

impl FakeSignaling {
    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    fn record(&self, sent: Sent) -> uplink_signaling::Result<()> {
        self.sent.lock().unwrap().push(sent);
        Ok(())
    }
}

impl SignalingCommands for FakeSignaling {
    fn send_connect(&self, role: Role, channel_id: &str, access_token: &str, _: &MediaPreferences) -> uplink_signaling::Result<()> {
        self.record(Sent::Connect {
            role,
            channel_id: channel_id.into(),
            access_token: access_token.into(),
        })
    }

    fn send_answer(&self, sdp: &str) -> uplink_signaling::Result<()> {
        self.record(Sent::Answer(sdp.into()))
    }

    fn send_candidate(&self, candidate: &str) -> uplink_signaling::Result<()> {
        self.record(Sent::Candidate(candidate.into()))
    }

    fn close(&self, code: u16, reason: &str) {
        let _ = self.record(Sent::Close(code, reason.into()));
    }
}

#[derive(Debug, Clone, Default)]
pub struct PeerBehavior {
    /// Never finish applying the remote description.
    pub hang_remote: bool,
    pub fail_answer: bool,
    /// Gathered while the answer is being created.
    pub early_candidate: Option<String>,
}

pub struct FakePeer {
    behavior: PeerBehavior,
    sink: CandidateSink,
    steps: Mutex<Vec<String>>,
    attached: Mutex<Vec<TrackKind>>,
    closes: AtomicUsize,
}

impl FakePeer {
    pub fn steps(&self) -> Vec<String> {
        self.steps.lock().unwrap().clone()
    }

    pub fn attached_kinds(&self) -> Vec<TrackKind> {
        self.attached.lock().unwrap().clone()
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    fn step(&self, step: String) {
        self.steps.lock().unwrap().push(step);
    }
}

#[async_trait]
impl PeerSession for FakePeer {
    async fn attach_stream(&self, stream: &LocalStream) -> uplink_media::Result<()> {
        self.attached
            .lock()
            .unwrap()
            .extend(stream.tracks.iter().map(|t: &MediaTrack| t.kind));
        Ok(())
    }

    async fn set_remote_description(&self, sdp: &str) -> uplink_media::Result<()> {
        self.step(format!("set_remote:{sdp}"));
        if self.behavior.hang_remote {
            std::future::pending::<()>().await;
        }
        Ok(())
    }

    async fn create_answer(&self) -> uplink_media::Result<String> {
        self.step("create_answer".into());
        if let Some(candidate) = &self.behavior.early_candidate {
            let _ = self.sink.send(candidate.clone());
        }
        if self.behavior.fail_answer {
            return Err(MediaError::backend("create answer", "no codecs in common"));
        }
        Ok("answer-sdp".into())
    }

    async fn set_local_description(&self, sdp: &str) -> uplink_media::Result<()> {
        self.step(format!("set_local:{sdp}"));
        Ok(())
    }

    async fn close(&self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}

pub struct FakeTransport {
    behavior: PeerBehavior,
    reject: AtomicBool,
    peers: Mutex<Vec<Arc<FakePeer>>>,
    configs: Mutex<Vec<MediaNegotiationConfig>>,
    shutdowns: AtomicUsize,
}

impl FakeTransport {
    pub fn new(behavior: PeerBehavior) -> Self {
        Self {
            behavior,
            reject: AtomicBool::new(false),
            peers: Mutex::new(Vec::new()),
            configs: Mutex::new(Vec::new()),
            shutdowns: AtomicUsize::new(0),
        }
    }

    pub fn reject_sessions(&self) {
        self.reject.store(true, Ordering::SeqCst);
    }

    pub fn sessions(&self) -> usize {
        self.peers.lock().unwrap().len()
    }

    pub fn peer(&self) -> Arc<FakePeer> {
        Arc::clone(self.peers.lock().unwrap().last().expect("no peer session created"))
    }

    pub fn last_config(&self) -> Option<MediaNegotiationConfig> {
        self.configs.lock().unwrap().last().cloned()
    }

    /// Simulate the backend gathering another candidate.
    pub fn emit_candidate(&self, candidate: &str) {
        self.peer().sink.send(candidate.into()).unwrap();
    }

    pub fn shutdowns(&self) -> usize {
        self.shutdowns.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MediaTransport for FakeTransport {
    async fn create_session(
        &self,
        config: &MediaNegotiationConfig,
        candidates: CandidateSink,
    ) -> uplink_media::Result<Arc<dyn PeerSession>> {
        if self.reject.load(Ordering::SeqCst) {
            return Err(MediaError::backend("create peer connection", "rejected"));
        }
        self.configs.lock().unwrap().push(config.clone());
        let peer = Arc::new(FakePeer {
            behavior: self.behavior.clone(),
            sink: candidates,
            steps: Mutex::new(Vec::new()),
            attached: Mutex::new(Vec::new()),
            closes: AtomicUsize::new(0),
        });
        self.peers.lock().unwrap().push(Arc::clone(&peer));
        Ok(peer)
    }

    async fn shutdown(&self) {
        self.shutdowns.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
pub struct FakeCapture {
    starts: Mutex<Vec<u32>>,
    stops: AtomicUsize,
    hang: AtomicBool,
}

impl FakeCapture {
    /// Never finish starting.
    pub fn hang_on_start(&self) {
        self.hang.store(true, Ordering::SeqCst);
    }

    pub fn starts(&self) -> Vec<u32> {
        self.starts.lock().unwrap().clone()
    }

    pub fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CaptureDriver for FakeCapture {
    fn shooting_mode(&self) -> ShootingMode {
        ShootingMode::RicMoviePreview1920
    }

    async fn start_capture(&self, target_fps: u32) -> uplink_media::Result<()> {
        self.starts.lock().unwrap().push(target_fps);
        if self.hang.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        Ok(())
    }

    async fn stop_capture(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
pub struct FakeDevice {
    closes: AtomicUsize,
    reopens: AtomicUsize,
}

impl FakeDevice {
    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn reopens(&self) -> usize {
        self.reopens.load(Ordering::SeqCst)
    }
}

impl DeviceControl for FakeDevice {
    fn close_for_streaming(&self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }

    fn reopen_after_streaming(&self) {
        self.reopens.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
pub struct FakePreview {
    attached: AtomicUsize,
}

impl FakePreview {
    pub fn attached(&self) -> usize {
        self.attached.load(Ordering::SeqCst)
    }
}

impl PreviewSink for FakePreview {
    fn attach(&self, _track: &MediaTrack) {
        self.attached.fetch_add(1, Ordering::SeqCst);
    }
}

/// Every fake a coordinator needs, kept for later inspection.
pub struct Fixture {
    pub signaling: Arc<FakeSignaling>,
    pub transport: Arc<FakeTransport>,
    pub capture: Arc<FakeCapture>,
    pub device: Arc<FakeDevice>,
    pub preview: Arc<FakePreview>,
}

impl Fixture {
    pub fn new(behavior: PeerBehavior) -> Self {
        Self {
            signaling: Arc::new(FakeSignaling::default()),
            transport: Arc::new(FakeTransport::new(behavior)),
            capture: Arc::new(FakeCapture::default()),
            device: Arc::new(FakeDevice::default()),
            preview: Arc::new(FakePreview::default()),
        }
    }

    pub fn media(&self) -> MediaStack {
        MediaStack {
            transport: self.transport.clone(),
            capture: self.capture.clone(),
            device: self.device.clone(),
            preview: self.preview.clone(),
        }
    }

    pub fn coordinator(&self, settings: NegotiationSettings) -> NegotiationCoordinator {
        NegotiationCoordinator::new(
            session(),
            MediaPreferences::deployment_default(),
            settings,
            self.signaling.clone(),
            self.media(),
        )
    }
}

pub struct FakeTokens {
    pub fail: bool,
    pub calls: AtomicUsize,
}

#[async_trait]
impl TokenService for FakeTokens {
    async fn access_token(&self, client_id: &str, _client_secret: &str) -> uplink_api::Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(ApiError::Status {
                status: 401,
                body: "invalid_client".into(),
            });
        }
        Ok(format!("account-token-{client_id}"))
    }
}

pub struct FakeTickets {
    pub url: String,
    pub calls: AtomicUsize,
}

#[async_trait]
impl TicketService for FakeTickets {
    async fn create_ticket(&self, _access_token: &str, _channel_id: &str) -> uplink_api::Result<Ticket> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(ticket(&self.url))
    }
}
