//! Ticket issuance for a room (channel).

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use url::Url;

use crate::TicketService;
use crate::error::{Result, ensure_success};

/// Media direction a ticket authorizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
}

/// Short-lived, channel-scoped credential authorizing one signaling session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    pub id: String,
    /// Ticket-scoped token sent in the `connect` message.
    pub access_token: String,
    pub direction: Direction,
    /// Signaling endpoint for this ticket.
    pub url: Url,
}

/// Client for the room API.
#[derive(Clone)]
pub struct RoomClient {
    client: Client,
    api_base: String,
}

impl RoomClient {
    pub fn new(api_base: &str) -> Result<Self> {
        // Validate early so a bad base fails at startup, not on first use.
        Url::parse(api_base)?;
        Ok(Self {
            client: Client::new(),
            api_base: api_base.trim_end_matches('/').to_owned(),
        })
    }
}

#[async_trait]
impl TicketService for RoomClient {
    async fn create_ticket(&self, access_token: &str, channel_id: &str) -> Result<Ticket> {
        let url = Url::parse(&format!("{}/rooms/{channel_id}/tickets", self.api_base))?;
        tracing::debug!(%url, channel = %channel_id, "requesting ticket");
        let resp = self
            .client
            .post(url)
            .bearer_auth(access_token)
            .json(&json!({ "direction": Direction::Up }))
            .send()
            .await?;
        let ticket: Ticket = ensure_success(resp).await?.json().await?;
        tracing::info!(ticket = %ticket.id, direction = ?ticket.direction, "ticket issued");
        Ok(ticket)
    }
}
