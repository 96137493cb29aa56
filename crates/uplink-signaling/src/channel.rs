//! Persistent signaling connection.
//!
//! One spawned task owns the socket. It is the only writer of the
//! connection state and the only writer to the socket: outbound messages
//! from the handle travel through an unbounded queue, so they hit the wire
//! in the order they were issued.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, sleep_until, timeout};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, warn};
use uplink_common::models::{MediaPreferences, Role};
use uplink_common::negotiation::MediaNegotiationConfig;
use url::Url;

use crate::error::{Result, SignalingError};
use crate::message::{AnswerMessage, CandidateMessage, ConnectMessage, SignalingMessage, decode};

/// Close code reported for every transport failure.
pub const CLOSE_ABNORMAL: u16 = 1006;
/// Close code reported when the peer closed without a status.
pub const CLOSE_NO_STATUS: u16 = 1005;

const EVENT_BUFFER: usize = 256;
/// How long a client-initiated close waits for the server's reply.
const CLOSE_GRACE: Duration = Duration::from_secs(2);

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Open,
    Closed { code: u16, reason: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    Open,
    Offer {
        sdp: String,
        client_id: String,
        config: MediaNegotiationConfig,
    },
    /// Always the last event of a channel.
    Closed { code: u16, reason: String },
}

#[derive(Debug, Clone, Copy)]
pub struct ChannelSettings {
    pub connect_timeout: Duration,
    /// Close the channel when no frame arrives for this long.
    pub idle_timeout: Option<Duration>,
}

impl Default for ChannelSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            idle_timeout: None,
        }
    }
}

/// Outbound half of the channel as seen by the negotiation logic.
pub trait SignalingCommands: Send + Sync {
    fn send_connect(
        &self,
        role: Role,
        channel_id: &str,
        access_token: &str,
        preferences: &MediaPreferences,
    ) -> Result<()>;

    fn send_answer(&self, sdp: &str) -> Result<()>;

    fn send_candidate(&self, candidate: &str) -> Result<()>;

    /// Request a graceful close. The channel still reports `Closed` once.
    fn close(&self, code: u16, reason: &str);
}

enum Outbound {
    Text { kind: &'static str, body: String },
    Close { code: u16, reason: String },
}

/// Handle to a running signaling connection.
pub struct SignalingChannel {
    endpoint: Url,
    outbound: mpsc::UnboundedSender<Outbound>,
    state: watch::Receiver<ConnectionState>,
}

impl SignalingChannel {
    /// Spawn the socket task and return immediately.
    ///
    /// The receiver yields `Open` or `Closed` first; `Closed` is always the
    /// final event, after which it yields `None`.
    pub fn open(endpoint: Url, settings: ChannelSettings) -> (Self, mpsc::Receiver<ChannelEvent>) {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(ConnectionState::Connecting);
        let (events_tx, events_rx) = mpsc::channel(EVENT_BUFFER);

        tokio::spawn(run(endpoint.clone(), settings, outbound_rx, state_tx, events_tx));

        let channel = Self {
            endpoint,
            outbound: outbound_tx,
            state: state_rx,
        };
        (channel, events_rx)
    }

    pub fn state(&self) -> ConnectionState {
        self.state.borrow().clone()
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    fn send(&self, message: SignalingMessage) -> Result<()> {
        let kind = message.kind();
        if *self.state.borrow() != ConnectionState::Open {
            warn!(endpoint = %self.endpoint, kind, "dropping outbound message, connection not open");
            return Err(SignalingError::NotOpen);
        }
        let body = message.encode()?;
        self.outbound.send(Outbound::Text { kind, body }).map_err(|_| {
            warn!(endpoint = %self.endpoint, kind, "dropping outbound message, socket task gone");
            SignalingError::NotOpen
        })
    }
}

impl SignalingCommands for SignalingChannel {
    fn send_connect(
        &self,
        role: Role,
        channel_id: &str,
        access_token: &str,
        preferences: &MediaPreferences,
    ) -> Result<()> {
        self.send(SignalingMessage::Connect(ConnectMessage::new(
            role,
            channel_id,
            access_token,
            preferences,
        )))
    }

    fn send_answer(&self, sdp: &str) -> Result<()> {
        self.send(SignalingMessage::Answer(AnswerMessage { sdp: sdp.to_owned() }))
    }

    fn send_candidate(&self, candidate: &str) -> Result<()> {
        self.send(SignalingMessage::Candidate(CandidateMessage {
            candidate: candidate.to_owned(),
        }))
    }

    fn close(&self, code: u16, reason: &str) {
        let _ = self.outbound.send(Outbound::Close {
            code,
            reason: reason.to_owned(),
        });
    }
}

async fn run(
    endpoint: Url,
    settings: ChannelSettings,
    mut outbound: mpsc::UnboundedReceiver<Outbound>,
    state: watch::Sender<ConnectionState>,
    events: mpsc::Sender<ChannelEvent>,
) {
    let (code, reason) = match timeout(settings.connect_timeout, connect_async(endpoint.as_str())).await {
        Ok(Ok((ws, _))) => {
            info!(%endpoint, "signaling connection open");
            state.send_replace(ConnectionState::Open);
            let _ = events.send(ChannelEvent::Open).await;
            serve(ws, &endpoint, settings.idle_timeout, &mut outbound, &events).await
        }
        Ok(Err(e)) => (CLOSE_ABNORMAL, format!("connect failed: {e}")),
        Err(_) => (CLOSE_ABNORMAL, "connect timed out".to_owned()),
    };

    info!(%endpoint, code, %reason, "signaling connection closed");
    state.send_replace(ConnectionState::Closed {
        code,
        reason: reason.clone(),
    });
    let _ = events.send(ChannelEvent::Closed { code, reason }).await;
}

/// Pump an open socket until it closes, returning the close code and reason.
async fn serve(
    ws: Socket,
    endpoint: &Url,
    idle_timeout: Option<Duration>,
    outbound: &mut mpsc::UnboundedReceiver<Outbound>,
    events: &mpsc::Sender<ChannelEvent>,
) -> (u16, String) {
    let (mut sink, mut stream) = ws.split();
    let mut deadline = idle_timeout.map(|d| Instant::now() + d);

    loop {
        tokio::select! {
            frame = stream.next() => {
                if let Some(d) = idle_timeout {
                    deadline = Some(Instant::now() + d);
                }
                let text = match frame {
                    Some(Ok(Message::Text(t))) => t,
                    Some(Ok(Message::Close(frame))) => {
                        // Flushes the close reply tungstenite queued for us.
                        let _ = sink.close().await;
                        return match frame {
                            Some(f) => (u16::from(f.code), f.reason.as_str().to_owned()),
                            None => (CLOSE_NO_STATUS, String::new()),
                        };
                    }
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => return (CLOSE_ABNORMAL, e.to_string()),
                    None => return (CLOSE_ABNORMAL, "stream ended without close frame".to_owned()),
                };
                debug!(%endpoint, frame = %text.as_str(), "<- signaling");

                match decode(text.as_str()) {
                    Ok(SignalingMessage::Ping) => {
                        let pong = match SignalingMessage::Pong.encode() {
                            Ok(body) => body,
                            Err(e) => return (CLOSE_ABNORMAL, e.to_string()),
                        };
                        debug!(%endpoint, frame = %pong, "-> signaling");
                        if let Err(e) = sink.send(Message::Text(pong.into())).await {
                            return (CLOSE_ABNORMAL, e.to_string());
                        }
                    }
                    Ok(SignalingMessage::Offer(offer)) => {
                        let config = offer.config.negotiation_config();
                        let _ = events
                            .send(ChannelEvent::Offer {
                                sdp: offer.sdp,
                                client_id: offer.client_id,
                                config,
                            })
                            .await;
                    }
                    Ok(other) => {
                        warn!(%endpoint, kind = other.kind(), "ignoring message not meant for this client");
                    }
                    Err(e) => warn!(%endpoint, error = %e, "dropping undecodable message"),
                }
            }
            command = outbound.recv() => match command {
                Some(Outbound::Text { kind, body }) => {
                    debug!(%endpoint, kind, frame = %body, "-> signaling");
                    if let Err(e) = sink.send(Message::Text(body.into())).await {
                        return (CLOSE_ABNORMAL, e.to_string());
                    }
                }
                Some(Outbound::Close { code, reason }) => {
                    info!(%endpoint, code, %reason, "closing signaling connection");
                    let frame = CloseFrame {
                        code: CloseCode::from(code),
                        reason: reason.clone().into(),
                    };
                    if sink.send(Message::Close(Some(frame))).await.is_ok() {
                        // Wait briefly for the server to acknowledge.
                        let _ = timeout(CLOSE_GRACE, async {
                            while let Some(Ok(msg)) = stream.next().await {
                                if msg.is_close() {
                                    break;
                                }
                            }
                        })
                        .await;
                    }
                    return (code, reason);
                }
                None => {
                    let _ = sink.send(Message::Close(None)).await;
                    return (1000, "channel handle dropped".to_owned());
                }
            },
            _ = idle(deadline) => {
                warn!(%endpoint, "no signaling traffic within idle timeout");
                return (CLOSE_ABNORMAL, "idle timeout".to_owned());
            }
        }
    }
}

async fn idle(deadline: Option<Instant>) {
    match deadline {
        Some(at) => sleep_until(at).await,
        None => std::future::pending().await,
    }
}
