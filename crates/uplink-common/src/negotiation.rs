//! Transport configuration handed to the media layer when an offer arrives.

use serde::{Deserialize, Serialize};

/// One STUN/TURN url with its credentials. Offers group several urls under a
/// single credential pair; those groups are flattened into one entry per url.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceServer {
    pub url: String,
    pub username: String,
    pub credential: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum IceTransportPolicy {
    #[default]
    All,
    Relay,
}

impl IceTransportPolicy {
    /// Only `"relay"` restricts gathering; every other value means all candidates.
    pub fn parse(value: &str) -> Self {
        if value == "relay" {
            IceTransportPolicy::Relay
        } else {
            IceTransportPolicy::All
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BundlePolicy {
    #[default]
    MaxBundle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RtcpMuxPolicy {
    #[default]
    Require,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ContinualGatheringPolicy {
    #[default]
    GatherContinually,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum KeyType {
    #[default]
    Ecdsa,
}

/// Immutable peer configuration derived from the remote offer.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MediaNegotiationConfig {
    pub ice_servers: Vec<IceServer>,
    pub ice_transport_policy: IceTransportPolicy,
    pub bundle_policy: BundlePolicy,
    pub rtcp_mux_policy: RtcpMuxPolicy,
    pub continual_gathering: ContinualGatheringPolicy,
    pub key_type: KeyType,
}

impl MediaNegotiationConfig {
    pub fn new(ice_servers: Vec<IceServer>, ice_transport_policy: IceTransportPolicy) -> Self {
        Self {
            ice_servers,
            ice_transport_policy,
            ..Self::default()
        }
    }
}
