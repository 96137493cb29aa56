//! # uplink-signaling
//!
//! The JSON signaling protocol spoken with the SFU and the persistent
//! WebSocket channel that carries it.
//!
//! [`SignalingChannel::open`] returns immediately with a handle and an
//! ordered stream of [`ChannelEvent`]s. The socket task behind it answers
//! `ping` on its own and reports the end of the connection exactly once.

pub mod channel;
pub mod error;
pub mod message;

pub use channel::{ChannelEvent, ChannelSettings, ConnectionState, SignalingChannel, SignalingCommands};
pub use error::{DecodeError, Result, SignalingError};
pub use message::{SignalingMessage, decode, encode};
