//! # uplink-api
//!
//! Thin REST clients for the two calls that precede signaling:
//! issuing an access token (client credentials grant) and exchanging it
//! for a channel-scoped ticket.
//!
//! ```rust,no_run
//! use uplink_api::{AuthClient, RoomClient, TicketService, TokenService};
//!
//! # async fn run() -> uplink_api::Result<()> {
//! let auth = AuthClient::new("https://auth.example.com/v1/token", "sfu")?;
//! let token = auth.access_token("client-id", "client-secret").await?;
//!
//! let rooms = RoomClient::new("https://sfu.example.com/v1")?;
//! let ticket = rooms.create_ticket(&token, "my-channel").await?;
//! println!("signaling at {}", ticket.url);
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod error;
pub mod rooms;

use async_trait::async_trait;

pub use auth::AuthClient;
pub use error::{ApiError, Result};
pub use rooms::{Direction, RoomClient, Ticket};

/// Issues bearer access tokens.
#[async_trait]
pub trait TokenService: Send + Sync {
    async fn access_token(&self, client_id: &str, client_secret: &str) -> Result<String>;
}

/// Exchanges an access token for a ticket scoped to one channel.
#[async_trait]
pub trait TicketService: Send + Sync {
    async fn create_ticket(&self, access_token: &str, channel_id: &str) -> Result<Ticket>;
}
