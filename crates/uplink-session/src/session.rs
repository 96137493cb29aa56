use uplink_api::{Direction, Ticket};
use uplink_common::models::Role;
use url::Url;

/// Everything the coordinator needs to join one channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub channel_id: String,
    pub role: Role,
    /// Ticket-scoped token, not the account token.
    pub access_token: String,
    pub endpoint: Url,
    pub ticket_id: String,
}

impl Session {
    pub fn from_ticket(channel_id: impl Into<String>, ticket: Ticket) -> Self {
        let role = match ticket.direction {
            Direction::Up => Role::Upstream,
            Direction::Down => Role::Downstream,
        };
        Self {
            channel_id: channel_id.into(),
            role,
            access_token: ticket.access_token,
            endpoint: ticket.url,
            ticket_id: ticket.id,
        }
    }
}
