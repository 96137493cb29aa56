//! # uplink-common
//!
//! Shared models and configuration used across all uplink crates.
//! This is the foundation layer: no protocol logic, just primitives and contracts.

pub mod config;
pub mod models;
pub mod negotiation;

pub use models::{AudioCodec, MediaPreferences, Role, ShootingMode, VideoCodec};
pub use negotiation::{IceServer, IceTransportPolicy, MediaNegotiationConfig};
