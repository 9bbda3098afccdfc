use async_trait::async_trait;
use jk_core::types::candidate::Candidate;
use jk_core::types::signaling::CandidateInit;
use jk_probe::media::{MediaDevice, MediaDevices, MediaError, MediaKind};
use jk_probe::rtc::LocalCandidate;
use jk_probe::{IceConfig, IceTransportPolicy, PeerEvent, PeerFactory, PeerHandle, PeerSession, RtcError};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

const HOST: &str = "candidate:1 1 udp 2122260223 192.168.1.4 54321 typ host";
const SRFLX: &str = "candidate:2 1 udp 1686052607 203.0.113.7 40001 typ srflx raddr 192.168.1.4 rport 54321";
const RELAY: &str = "candidate:3 1 udp 41885439 198.51.100.2 50000 typ relay raddr 203.0.113.7 rport 40001";

/// Simulated client network.
///
/// Gathering yields a host candidate, a srflx candidate per reachable STUN
/// server and a relay candidate per reachable TURN server, then completes.
/// A URL is unreachable when it contains one of the `blocked` fragments.
#[derive(Default)]
pub struct FakeNetwork {
    pub unavailable: bool,
    pub blocked: Vec<String>,
    /// ICE fails once the remote answer is applied
    pub media_blocked: bool,
    /// Gathering never completes
    pub stall_gathering: bool,
    created: AtomicUsize,
    closed: Arc<AtomicUsize>,
    configs: Mutex<Vec<IceConfig>>,
}

impl FakeNetwork {
    pub fn blocking(fragments: &[&str]) -> Self {
        Self {
            blocked: fragments.iter().map(|f| f.to_string()).collect(),
            ..Default::default()
        }
    }

    pub fn reachable(&self, url: &str) -> bool {
        !self.blocked.iter().any(|fragment| url.contains(fragment.as_str()))
    }

    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn configs(&self) -> Vec<IceConfig> {
        self.configs.lock().unwrap().clone()
    }

    fn gathering_events(&self, config: &IceConfig) -> Vec<PeerEvent> {
        let mut events = Vec::new();
        if config.policy == IceTransportPolicy::All {
            events.push(candidate(HOST));
        }
        for url in config.urls() {
            if !self.reachable(url) {
                continue;
            }
            if url.starts_with("turn:") || url.starts_with("turns:") {
                events.push(candidate(RELAY));
            } else if config.policy == IceTransportPolicy::All {
                events.push(candidate(SRFLX));
            }
        }
        if !self.stall_gathering {
            events.push(PeerEvent::GatheringComplete);
        }
        events
    }
}

fn candidate(descriptor: &str) -> PeerEvent {
    let parsed = Candidate::parse(descriptor).expect("fixture candidate parses");
    PeerEvent::Candidate(LocalCandidate {
        candidate: parsed,
        init: CandidateInit::new(descriptor),
    })
}

#[async_trait]
impl PeerFactory for FakeNetwork {
    fn is_available(&self) -> bool {
        !self.unavailable
    }

    async fn create(&self, config: &IceConfig) -> Result<PeerSession, RtcError> {
        if self.unavailable {
            return Err(RtcError::Unavailable("no WebRTC stack".to_string()));
        }
        self.created.fetch_add(1, Ordering::SeqCst);
        self.configs.lock().unwrap().push(config.clone());

        let (tx, events) = mpsc::unbounded_channel();
        let peer = FakePeer {
            tx,
            on_offer: self.gathering_events(config),
            media_blocked: self.media_blocked,
            closed: self.closed.clone(),
        };
        Ok(PeerSession {
            handle: Box::new(peer),
            events,
        })
    }
}

struct FakePeer {
    tx: mpsc::UnboundedSender<PeerEvent>,
    on_offer: Vec<PeerEvent>,
    media_blocked: bool,
    closed: Arc<AtomicUsize>,
}

impl FakePeer {
    fn emit(&self, event: PeerEvent) {
        let _ = self.tx.send(event);
    }
}

#[async_trait]
impl PeerHandle for FakePeer {
    async fn create_data_channel(&self, _label: &str) -> Result<(), RtcError> {
        Ok(())
    }

    async fn create_offer(&self) -> Result<String, RtcError> {
        for event in &self.on_offer {
            self.emit(event.clone());
        }
        Ok("v=0\r\no=- 0 0 IN IP4 127.0.0.1\r\n".to_string())
    }

    async fn apply_answer(&self, _sdp: &str) -> Result<(), RtcError> {
        if self.media_blocked {
            self.emit(PeerEvent::Failed("ICE connection failed".to_string()));
        } else {
            self.emit(PeerEvent::Connected);
            self.emit(PeerEvent::ChannelOpen);
        }
        Ok(())
    }

    async fn add_remote_candidate(&self, _candidate: CandidateInit) -> Result<(), RtcError> {
        Ok(())
    }

    /// The echo peer returns everything it receives
    async fn send_text(&self, text: &str) -> Result<(), RtcError> {
        self.emit(PeerEvent::ChannelMessage(text.to_string()));
        Ok(())
    }

    async fn close(&self) -> Result<(), RtcError> {
        self.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Capture devices with a fixed permission answer
pub struct FakeMedia {
    pub access: Result<(), MediaError>,
    pub devices: Vec<MediaDevice>,
}

impl Default for FakeMedia {
    fn default() -> Self {
        Self {
            access: Ok(()),
            devices: vec![
                MediaDevice::new(MediaKind::AudioInput, "Built-in microphone"),
                MediaDevice::new(MediaKind::VideoInput, "USB camera"),
            ],
        }
    }
}

#[async_trait]
impl MediaDevices for FakeMedia {
    async fn request_access(&self) -> Result<(), MediaError> {
        self.access.clone()
    }

    async fn enumerate(&self) -> Result<Vec<MediaDevice>, MediaError> {
        Ok(self.devices.clone())
    }
}
