//! # uplink-session
//!
//! Drives one streaming session end to end:
//!
//! ```text
//!   token ──▶ ticket ──▶ Session ──▶ SignalingChannel::open
//!                                         │ ChannelEvent
//!                                         ▼
//!                              NegotiationCoordinator ──▶ media capability
//! ```

pub mod bootstrap;
pub mod coordinator;
pub mod error;
pub mod session;

#[cfg(test)]
pub(crate) mod testing;

pub use bootstrap::{BootstrapSettings, SessionBootstrap};
pub use coordinator::{MediaStack, NegotiationCoordinator, NegotiationSettings, NegotiationState, SessionOutcome};
pub use error::{BootstrapError, NegotiationError};
pub use session::Session;
