//! ICE configuration handed to a peer connection

use jk_core::types::credentials::IceServer;
use serde::{Deserialize, Serialize};

/// ICE transport policy
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum IceTransportPolicy {
    /// Use all available candidates (host, srflx, relay)
    #[default]
    All,
    /// Only use relay candidates (TURN)
    Relay,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceConfig {
    pub servers: Vec<IceServer>,
    pub policy: IceTransportPolicy,
}

impl IceConfig {
    pub fn new(servers: Vec<IceServer>) -> Self {
        Self {
            servers,
            policy: IceTransportPolicy::All,
        }
    }

    /// Single STUN server, all candidate types
    pub fn stun(url: impl Into<String>) -> Self {
        Self::new(vec![IceServer::stun(url)])
    }

    /// Restrict gathering to one TURN server's relay candidates
    pub fn relay_only(server: IceServer) -> Self {
        Self {
            servers: vec![server],
            policy: IceTransportPolicy::Relay,
        }
    }

    pub fn urls(&self) -> Vec<&str> {
        self.servers.iter().flat_map(|s| s.urls.iter()).collect()
    }
}
