//! Session start-up: token → ticket → signaling → negotiation.

use std::sync::Arc;

use tracing::{error, info};
use uplink_api::{TicketService, TokenService};
use uplink_common::config::AppConfig;
use uplink_common::models::MediaPreferences;
use uplink_signaling::{ChannelSettings, SignalingChannel};

use crate::coordinator::{MediaStack, NegotiationCoordinator, NegotiationSettings, SessionOutcome};
use crate::error::BootstrapError;
use crate::session::Session;

#[derive(Debug, Clone)]
pub struct BootstrapSettings {
    pub client_id: String,
    pub client_secret: String,
    pub channel_id: String,
    pub preferences: MediaPreferences,
    pub channel: ChannelSettings,
    pub negotiation: NegotiationSettings,
}

impl BootstrapSettings {
    pub fn from_config(config: &AppConfig) -> Result<Self, BootstrapError> {
        let channel_id = config
            .room
            .channel_id
            .clone()
            .filter(|id| !id.is_empty())
            .ok_or(BootstrapError::MissingChannelId)?;
        Ok(Self {
            client_id: config.auth.client_id.clone(),
            client_secret: config.auth.client_secret.clone(),
            channel_id,
            preferences: config.media.preferences(),
            channel: ChannelSettings {
                connect_timeout: config.signaling.connect_timeout(),
                idle_timeout: config.signaling.idle_timeout(),
            },
            negotiation: NegotiationSettings {
                step_timeout: config.signaling.negotiation_timeout(),
                target_fps: config.media.target_fps,
            },
        })
    }
}

pub struct SessionBootstrap {
    tokens: Arc<dyn TokenService>,
    tickets: Arc<dyn TicketService>,
    settings: BootstrapSettings,
}

impl SessionBootstrap {
    pub fn new(tokens: Arc<dyn TokenService>, tickets: Arc<dyn TicketService>, settings: BootstrapSettings) -> Self {
        Self {
            tokens,
            tickets,
            settings,
        }
    }

    /// Run one session to completion. The media transport is shut down on
    /// every path, including failures before the channel opens.
    pub async fn run(&self, media: MediaStack) -> Result<SessionOutcome, BootstrapError> {
        let transport = Arc::clone(&media.transport);
        let result = self.establish(media).await;
        transport.shutdown().await;
        result
    }

    async fn establish(&self, media: MediaStack) -> Result<SessionOutcome, BootstrapError> {
        let settings = &self.settings;

        let token = self
            .tokens
            .access_token(&settings.client_id, &settings.client_secret)
            .await
            .map_err(|e| {
                error!(error = %e, "could not obtain access token");
                BootstrapError::Token(e)
            })?;
        let ticket = self
            .tickets
            .create_ticket(&token, &settings.channel_id)
            .await
            .map_err(|e| {
                error!(channel = %settings.channel_id, error = %e, "could not obtain ticket");
                BootstrapError::Ticket(e)
            })?;

        let session = Session::from_ticket(settings.channel_id.clone(), ticket);
        info!(
            channel = %session.channel_id,
            ticket = %session.ticket_id,
            endpoint = %session.endpoint,
            role = session.role.as_str(),
            "starting session"
        );

        let (channel, events) = SignalingChannel::open(session.endpoint.clone(), settings.channel);
        let coordinator = NegotiationCoordinator::new(
            session,
            settings.preferences,
            settings.negotiation,
            Arc::new(channel),
            media,
        );
        Ok(coordinator.run(events).await)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use futures_util::{SinkExt, StreamExt};
    use serde_json::{Value, json};
    use tokio::net::TcpListener;
    use tokio_tungstenite::accept_async;
    use tokio_tungstenite::tungstenite::Message;
    use tokio_tungstenite::tungstenite::protocol::CloseFrame;
    use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
    use uplink_common::config;

    use super::*;
    use crate::testing::{FakeTickets, FakeTokens, Fixture, PeerBehavior};

    fn settings() -> BootstrapSettings {
        BootstrapSettings {
            client_id: "client".into(),
            client_secret: "secret".into(),
            channel_id: "room-a".into(),
            preferences: MediaPreferences::deployment_default(),
            channel: ChannelSettings::default(),
            negotiation: NegotiationSettings::default(),
        }
    }

    fn bootstrap(fail_token: bool, url: &str) -> (SessionBootstrap, Arc<FakeTokens>, Arc<FakeTickets>) {
        let tokens = Arc::new(FakeTokens {
            fail: fail_token,
            calls: AtomicUsize::new(0),
        });
        let tickets = Arc::new(FakeTickets {
            url: url.into(),
            calls: AtomicUsize::new(0),
        });
        let bootstrap = SessionBootstrap::new(tokens.clone(), tickets.clone(), settings());
        (bootstrap, tokens, tickets)
    }

    async fn next_json(ws: &mut tokio_tungstenite::WebSocketStream<tokio::net::TcpStream>) -> Value {
        loop {
            if let Message::Text(t) = ws.next().await.unwrap().unwrap() {
                return serde_json::from_str(t.as_str()).unwrap();
            }
        }
    }

    #[tokio::test]
    async fn token_failure_skips_ticket_and_shuts_transport_down() {
        let fixture = Fixture::new(PeerBehavior::default());
        let (bootstrap, tokens, tickets) = bootstrap(true, "ws://127.0.0.1:9/");

        let err = bootstrap.run(fixture.media()).await.unwrap_err();

        assert!(matches!(err, BootstrapError::Token(_)));
        assert_eq!(tokens.calls.load(Ordering::SeqCst), 1);
        assert_eq!(tickets.calls.load(Ordering::SeqCst), 0);
        assert_eq!(fixture.transport.shutdowns(), 1);
        assert_eq!(fixture.device.reopens(), 0);
    }

    #[tokio::test]
    async fn streams_through_a_signaling_server() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let mut ws = accept_async(tcp).await.unwrap();

            let connect = next_json(&mut ws).await;
            let offer = json!({
                "type": "offer",
                "sdp": "offer-sdp",
                "client_id": "client-9",
                "config": { "iceTransportPolicy": "all", "iceServers": [] }
            });
            ws.send(Message::Text(offer.to_string().into())).await.unwrap();
            let answer = next_json(&mut ws).await;

            ws.close(Some(CloseFrame {
                code: CloseCode::Normal,
                reason: "done".into(),
            }))
            .await
            .unwrap();
            while let Some(Ok(_)) = ws.next().await {}
            (connect, answer)
        });

        let fixture = Fixture::new(PeerBehavior::default());
        let (bootstrap, _, tickets) = bootstrap(false, &format!("ws://{addr}/v1/signaling"));

        let outcome = tokio::time::timeout(Duration::from_secs(10), bootstrap.run(fixture.media()))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(outcome, SessionOutcome::Closed { code: 1000, reason: "done".into() });
        let (connect, answer) = server.await.unwrap();
        assert_eq!(connect["type"], "connect");
        assert_eq!(connect["channel_id"], "room-a");
        assert_eq!(connect["metadata"]["access_token"], "ticket-token");
        assert_eq!(connect["video"]["codec_type"], "VP9");
        assert_eq!(connect["bit_rate"], 2000);
        assert_eq!(connect["audio"]["codec_type"], "OPUS");
        assert_eq!(answer, json!({ "type": "answer", "sdp": "answer-sdp" }));

        assert_eq!(tickets.calls.load(Ordering::SeqCst), 1);
        assert_eq!(fixture.transport.shutdowns(), 1);
        assert_eq!(fixture.device.reopens(), 1);
        assert_eq!(fixture.capture.stops(), 1);
    }

    #[test]
    fn settings_come_from_config() {
        let built = config::defaults()
            .unwrap()
            .set_override("auth.client_id", "client")
            .unwrap()
            .set_override("auth.client_secret", "secret")
            .unwrap()
            .set_override("room.channel_id", "room-z")
            .unwrap()
            .set_override("signaling.idle_timeout_secs", 45)
            .unwrap()
            .build()
            .unwrap()
            .try_deserialize::<AppConfig>()
            .unwrap();

        let settings = BootstrapSettings::from_config(&built).unwrap();
        assert_eq!(settings.channel_id, "room-z");
        assert_eq!(settings.channel.idle_timeout, Some(Duration::from_secs(45)));
        assert_eq!(settings.negotiation.step_timeout, Duration::from_secs(15));
        assert_eq!(settings.negotiation.target_fps, 30);
        assert_eq!(settings.preferences, MediaPreferences::deployment_default());
    }

    #[test]
    fn missing_channel_id_is_an_error() {
        let built = config::defaults()
            .unwrap()
            .set_override("auth.client_id", "client")
            .unwrap()
            .set_override("auth.client_secret", "secret")
            .unwrap()
            .build()
            .unwrap()
            .try_deserialize::<AppConfig>()
            .unwrap();
        assert!(matches!(
            BootstrapSettings::from_config(&built),
            Err(BootstrapError::MissingChannelId)
        ));
    }
}
