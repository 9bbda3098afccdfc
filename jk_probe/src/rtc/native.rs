//! Peer connections backed by webrtc-rs

use super::{IceConfig, IceTransportPolicy, LocalCandidate, PeerEvent, PeerFactory, PeerHandle, PeerSession, RtcError};
use async_trait::async_trait;
use jk_core::types::candidate::Candidate;
use jk_core::types::signaling::CandidateInit;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::api::{APIBuilder, API};
use webrtc::data_channel::data_channel_message::DataChannelMessage;
use webrtc::data_channel::RTCDataChannel;
use webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};
use webrtc::ice_transport::ice_gatherer_state::RTCIceGathererState;
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::policy::ice_transport_policy::RTCIceTransportPolicy;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::RTCPeerConnection;

pub struct NativePeerFactory {
    api: API,
}

impl NativePeerFactory {
    pub fn new() -> Result<Self, RtcError> {
        let mut media = MediaEngine::default();
        media
            .register_default_codecs()
            .map_err(|e| RtcError::Unavailable(e.to_string()))?;
        let registry = register_default_interceptors(Registry::new(), &mut media)
            .map_err(|e| RtcError::Unavailable(e.to_string()))?;

        let api = APIBuilder::new()
            .with_media_engine(media)
            .with_interceptor_registry(registry)
            .build();

        Ok(Self { api })
    }

    fn rtc_configuration(config: &IceConfig) -> RTCConfiguration {
        let ice_servers = config
            .servers
            .iter()
            .map(|s| RTCIceServer {
                urls: s.urls.iter().map(str::to_string).collect(),
                username: s.username.clone().unwrap_or_default(),
                credential: s.credential.clone().unwrap_or_default(),
                ..Default::default()
            })
            .collect();

        RTCConfiguration {
            ice_servers,
            ice_transport_policy: match config.policy {
                IceTransportPolicy::All => RTCIceTransportPolicy::All,
                IceTransportPolicy::Relay => RTCIceTransportPolicy::Relay,
            },
            ..Default::default()
        }
    }
}

#[async_trait]
impl PeerFactory for NativePeerFactory {
    fn is_available(&self) -> bool {
        true
    }

    async fn create(&self, config: &IceConfig) -> Result<PeerSession, RtcError> {
        let pc = self
            .api
            .new_peer_connection(Self::rtc_configuration(config))
            .await
            .map_err(|e| RtcError::Connection(e.to_string()))?;
        let pc = Arc::new(pc);
        let (tx, rx) = mpsc::unbounded_channel();

        let candidate_tx = tx.clone();
        pc.on_ice_candidate(Box::new(move |candidate: Option<RTCIceCandidate>| {
            if let Some(local) = candidate.and_then(to_local_candidate) {
                let _ = candidate_tx.send(PeerEvent::Candidate(local));
            }
            Box::pin(async {})
        }));

        let gathering_tx = tx.clone();
        pc.on_ice_gathering_state_change(Box::new(move |state: RTCIceGathererState| {
            if state == RTCIceGathererState::Complete {
                let _ = gathering_tx.send(PeerEvent::GatheringComplete);
            }
            Box::pin(async {})
        }));

        let state_tx = tx.clone();
        pc.on_peer_connection_state_change(Box::new(move |state: RTCPeerConnectionState| {
            tracing::debug!(%state, "peer connection state");
            match state {
                RTCPeerConnectionState::Connected => {
                    let _ = state_tx.send(PeerEvent::Connected);
                }
                RTCPeerConnectionState::Failed => {
                    let _ = state_tx.send(PeerEvent::Failed("connection failed".to_string()));
                }
                _ => {}
            }
            Box::pin(async {})
        }));

        let peer = NativePeer {
            pc,
            channel: Mutex::new(None),
            events: tx,
        };

        Ok(PeerSession {
            handle: Box::new(peer),
            events: rx,
        })
    }
}

fn to_local_candidate(candidate: RTCIceCandidate) -> Option<LocalCandidate> {
    let json = match candidate.to_json() {
        Ok(json) => json,
        Err(e) => {
            tracing::debug!(error = %e, "candidate could not be serialized");
            return None;
        }
    };
    match Candidate::parse(&json.candidate) {
        Ok(parsed) => Some(LocalCandidate {
            candidate: parsed,
            init: CandidateInit {
                candidate: json.candidate,
                sdp_mid: json.sdp_mid,
                sdp_mline_index: json.sdp_mline_index,
                username_fragment: json.username_fragment,
            },
        }),
        Err(e) => {
            tracing::debug!(error = %e, candidate = %json.candidate, "skipping unparseable candidate");
            None
        }
    }
}

struct NativePeer {
    pc: Arc<RTCPeerConnection>,
    channel: Mutex<Option<Arc<RTCDataChannel>>>,
    events: mpsc::UnboundedSender<PeerEvent>,
}

#[async_trait]
impl PeerHandle for NativePeer {
    async fn create_data_channel(&self, label: &str) -> Result<(), RtcError> {
        let dc = self
            .pc
            .create_data_channel(label, None)
            .await
            .map_err(|e| RtcError::DataChannel(e.to_string()))?;

        let open_tx = self.events.clone();
        dc.on_open(Box::new(move || {
            let _ = open_tx.send(PeerEvent::ChannelOpen);
            Box::pin(async {})
        }));

        let message_tx = self.events.clone();
        dc.on_message(Box::new(move |msg: DataChannelMessage| {
            let text = String::from_utf8_lossy(&msg.data).into_owned();
            let _ = message_tx.send(PeerEvent::ChannelMessage(text));
            Box::pin(async {})
        }));

        *self.channel.lock().await = Some(dc);
        Ok(())
    }

    async fn create_offer(&self) -> Result<String, RtcError> {
        let offer = self
            .pc
            .create_offer(None)
            .await
            .map_err(|e| RtcError::Negotiation(e.to_string()))?;
        let sdp = offer.sdp.clone();
        self.pc
            .set_local_description(offer)
            .await
            .map_err(|e| RtcError::Negotiation(e.to_string()))?;
        Ok(sdp)
    }

    async fn apply_answer(&self, sdp: &str) -> Result<(), RtcError> {
        let answer =
            RTCSessionDescription::answer(sdp.to_string()).map_err(|e| RtcError::Negotiation(e.to_string()))?;
        self.pc
            .set_remote_description(answer)
            .await
            .map_err(|e| RtcError::Negotiation(e.to_string()))
    }

    async fn add_remote_candidate(&self, candidate: CandidateInit) -> Result<(), RtcError> {
        let init = RTCIceCandidateInit {
            candidate: candidate.candidate,
            sdp_mid: candidate.sdp_mid,
            sdp_mline_index: candidate.sdp_mline_index,
            username_fragment: candidate.username_fragment,
        };
        self.pc
            .add_ice_candidate(init)
            .await
            .map_err(|e| RtcError::Negotiation(e.to_string()))
    }

    async fn send_text(&self, text: &str) -> Result<(), RtcError> {
        let guard = self.channel.lock().await;
        let dc = guard
            .as_ref()
            .ok_or_else(|| RtcError::DataChannel("no data channel".to_string()))?;
        dc.send_text(text.to_string())
            .await
            .map(|_| ())
            .map_err(|e| RtcError::DataChannel(e.to_string()))
    }

    async fn close(&self) -> Result<(), RtcError> {
        self.pc.close().await.map_err(|e| RtcError::Connection(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jk_core::types::credentials::IceServer;

    #[test]
    fn test_rtc_configuration_mapping() {
        let config = IceConfig::relay_only(IceServer::turn("turn:meet.example.org:3478?transport=udp", "u", "p"));
        let rtc = NativePeerFactory::rtc_configuration(&config);
        assert_eq!(rtc.ice_transport_policy, RTCIceTransportPolicy::Relay);
        assert_eq!(rtc.ice_servers.len(), 1);
        assert_eq!(rtc.ice_servers[0].username, "u");
        assert_eq!(rtc.ice_servers[0].urls, vec!["turn:meet.example.org:3478?transport=udp".to_string()]);
    }

    #[tokio::test]
    async fn test_offer_without_network() {
        // Host-only gathering needs no ICE servers
        let factory = NativePeerFactory::new().unwrap();
        let session = factory.create(&IceConfig::default()).await.unwrap();
        session.handle.create_data_channel("probe").await.unwrap();
        let sdp = session.handle.create_offer().await.unwrap();
        assert!(sdp.starts_with("v=0"));
        session.close().await;
    }
}
