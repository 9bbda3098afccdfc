//! Scripted peer connections for unit tests

use super::{IceConfig, PeerEvent, PeerFactory, PeerHandle, PeerSession, RtcError};
use async_trait::async_trait;
use jk_core::types::signaling::CandidateInit;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

#[derive(Default)]
pub struct ScriptedPeers {
    pub unavailable: bool,
    pub fail_create: bool,
    /// Events emitted as soon as the offer is created
    pub on_offer: Vec<PeerEvent>,
    /// Events emitted once the remote answer is applied
    pub on_answer: Vec<PeerEvent>,
    /// Echo data channel sends back as messages
    pub echo: bool,
    pub closed: Arc<AtomicUsize>,
    pub configs: Mutex<Vec<IceConfig>>,
}

impl ScriptedPeers {
    pub fn offering(events: Vec<PeerEvent>) -> Self {
        Self {
            on_offer: events,
            ..Default::default()
        }
    }

    pub fn closed_count(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }
}

struct ScriptedHandle {
    tx: mpsc::UnboundedSender<PeerEvent>,
    on_offer: Vec<PeerEvent>,
    on_answer: Vec<PeerEvent>,
    echo: bool,
    closed: Arc<AtomicUsize>,
}

impl ScriptedHandle {
    fn emit(&self, events: &[PeerEvent]) {
        for event in events {
            let _ = self.tx.send(event.clone());
        }
    }
}

#[async_trait]
impl PeerHandle for ScriptedHandle {
    async fn create_data_channel(&self, _label: &str) -> Result<(), RtcError> {
        Ok(())
    }

    async fn create_offer(&self) -> Result<String, RtcError> {
        self.emit(&self.on_offer);
        Ok("v=0\r\n".to_string())
    }

    async fn apply_answer(&self, _sdp: &str) -> Result<(), RtcError> {
        self.emit(&self.on_answer);
        Ok(())
    }

    async fn add_remote_candidate(&self, _candidate: CandidateInit) -> Result<(), RtcError> {
        Ok(())
    }

    async fn send_text(&self, text: &str) -> Result<(), RtcError> {
        if self.echo {
            let _ = self.tx.send(PeerEvent::ChannelMessage(text.to_string()));
        }
        Ok(())
    }

    async fn close(&self) -> Result<(), RtcError> {
        self.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl PeerFactory for ScriptedPeers {
    fn is_available(&self) -> bool {
        !self.unavailable
    }

    async fn create(&self, config: &IceConfig) -> Result<PeerSession, RtcError> {
        if self.unavailable || self.fail_create {
            return Err(RtcError::Unavailable("scripted".to_string()));
        }
        self.configs.lock().unwrap().push(config.clone());

        let (tx, events) = mpsc::unbounded_channel();
        let handle = ScriptedHandle {
            tx,
            on_offer: self.on_offer.clone(),
            on_answer: self.on_answer.clone(),
            echo: self.echo,
            closed: self.closed.clone(),
        };
        Ok(PeerSession {
            handle: Box::new(handle),
            events,
        })
    }
}

/// Local candidate event of the given SDP descriptor
pub fn candidate(descriptor: &str) -> PeerEvent {
    let parsed = jk_core::types::candidate::Candidate::parse(descriptor).unwrap();
    PeerEvent::Candidate(super::LocalCandidate {
        candidate: parsed,
        init: CandidateInit::new(descriptor),
    })
}

pub const HOST: &str = "candidate:1 1 udp 2122260223 192.168.1.4 54321 typ host";
pub const SRFLX: &str = "candidate:2 1 udp 1686052607 203.0.113.7 40001 typ srflx raddr 192.168.1.4 rport 54321";
pub const RELAY: &str = "candidate:3 1 udp 41885439 198.51.100.2 50000 typ relay raddr 203.0.113.7 rport 40001";
