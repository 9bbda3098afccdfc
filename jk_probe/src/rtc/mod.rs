//! Peer connection capability
//!
//! Probes drive a peer connection through [`PeerFactory`] and [`PeerHandle`]
//! and observe it through a stream of [`PeerEvent`]s. The production
//! implementation lives in [`native`]; tests substitute scripted fakes.

pub mod config;
pub mod native;
#[cfg(test)]
pub(crate) mod testing;

pub use config::{IceConfig, IceTransportPolicy};
pub use native::NativePeerFactory;

use async_trait::async_trait;
use jk_core::types::candidate::Candidate;
use jk_core::types::signaling::CandidateInit;
use tokio::sync::mpsc;

#[derive(Debug, thiserror::Error)]
pub enum RtcError {
    #[error("WebRTC is not available: {0}")]
    Unavailable(String),

    #[error("peer connection failed: {0}")]
    Connection(String),

    #[error("SDP negotiation failed: {0}")]
    Negotiation(String),

    #[error("data channel error: {0}")]
    DataChannel(String),
}

/// A locally gathered candidate, parsed and in wire form
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalCandidate {
    pub candidate: Candidate,
    pub init: CandidateInit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerEvent {
    Candidate(LocalCandidate),
    GatheringComplete,
    Connected,
    Failed(String),
    ChannelOpen,
    ChannelMessage(String),
}

#[async_trait]
pub trait PeerHandle: Send + Sync {
    async fn create_data_channel(&self, label: &str) -> Result<(), RtcError>;

    /// Create an offer and apply it as the local description, returning the SDP
    async fn create_offer(&self) -> Result<String, RtcError>;

    async fn apply_answer(&self, sdp: &str) -> Result<(), RtcError>;

    async fn add_remote_candidate(&self, candidate: CandidateInit) -> Result<(), RtcError>;

    /// Send on the most recently created data channel
    async fn send_text(&self, text: &str) -> Result<(), RtcError>;

    async fn close(&self) -> Result<(), RtcError>;
}

/// A live peer connection and its event stream
pub struct PeerSession {
    pub handle: Box<dyn PeerHandle>,
    pub events: mpsc::UnboundedReceiver<PeerEvent>,
}

impl PeerSession {
    /// Close the connection, logging rather than propagating failures
    pub async fn close(&self) {
        if let Err(e) = self.handle.close().await {
            tracing::debug!(error = %e, "peer close failed");
        }
    }
}

#[async_trait]
pub trait PeerFactory: Send + Sync {
    fn is_available(&self) -> bool;

    async fn create(&self, config: &IceConfig) -> Result<PeerSession, RtcError>;
}
