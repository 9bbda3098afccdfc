//! Layer 3: peer connection and data channel through the echo peer
//!
//! Both probes open the signaling socket, send an offer and wait for the
//! echo peer. When the relay cannot host a media peer it answers in
//! `signaling-only` mode, which counts as a pass for the signaling path.

use super::{Capabilities, Outcome};
use crate::config::DiagConfig;
use crate::context::RunContext;
use crate::race::race;
use crate::rtc::{IceConfig, PeerEvent, PeerSession};
use crate::signaling::SignalingLink;
use jk_core::types::credentials::IceServer;
use jk_core::types::signaling::{AnswerMode, SignalingFrame};
use jk_core::Status;
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Goal {
    /// ICE reaches the connected state
    Connected,
    /// A data channel message comes back from the echo peer
    Echo,
}

pub async fn peer_connection(caps: &Capabilities, ctx: &RunContext, config: &DiagConfig) -> Outcome {
    run_session(caps, ctx, config, Goal::Connected).await
}

pub async fn data_channel(caps: &Capabilities, ctx: &RunContext, config: &DiagConfig) -> Outcome {
    run_session(caps, ctx, config, Goal::Echo).await
}

async fn run_session(caps: &Capabilities, ctx: &RunContext, config: &DiagConfig, goal: Goal) -> Outcome {
    let servers = match ctx.credentials() {
        Some(creds) if !creds.ice_servers.is_empty() => creds.ice_servers.clone(),
        _ => vec![IceServer::stun(config.stun_url())],
    };
    let url = config.signaling_url();

    let mut attempt = SessionAttempt::default();
    let outcome = race(
        ctx.token(),
        config.timeouts.session,
        attempt.exchange(caps, &url, IceConfig::new(servers), goal),
    )
    .await;
    attempt.close().await;

    Outcome::from_race(outcome, Status::Fail)
}

/// Resources opened by one exchange, closed whatever the outcome
#[derive(Default)]
struct SessionAttempt {
    link: Option<Box<dyn SignalingLink>>,
    peer: Option<PeerSession>,
}

impl SessionAttempt {
    async fn exchange(&mut self, caps: &Capabilities, url: &str, ice: IceConfig, goal: Goal) -> Outcome {
        let link = match caps.signaling.connect(url).await {
            Ok(link) => self.link.insert(link),
            Err(e) => {
                tracing::debug!(url, error = %e, "signaling connect failed");
                return Outcome::fail("WebSocket error");
            }
        };

        let peer = match caps.peers.create(&ice).await {
            Ok(peer) => self.peer.insert(peer),
            Err(e) => {
                tracing::debug!(error = %e, "peer construction failed");
                return Outcome::fail("Could not create peer connection");
            }
        };

        if let Err(e) = peer.handle.create_data_channel("diagnostics").await {
            return Outcome::fail(e.to_string());
        }
        let sdp = match peer.handle.create_offer().await {
            Ok(sdp) => sdp,
            Err(e) => return Outcome::fail(e.to_string()),
        };
        if let Err(e) = link.send(&SignalingFrame::offer(sdp, session_id())).await {
            tracing::debug!(error = %e, "offer not sent");
            return Outcome::fail("WebSocket error");
        }

        loop {
            tokio::select! {
                frame = link.recv() => match frame {
                    Some(Ok(frame)) => {
                        if let Some(outcome) = on_frame(peer, frame).await {
                            return outcome;
                        }
                    }
                    Some(Err(e)) => {
                        tracing::debug!(error = %e, "signaling receive failed");
                        return Outcome::fail("WebSocket error");
                    }
                    None => return Outcome::fail("Signaling closed"),
                },
                event = peer.events.recv() => match event {
                    Some(PeerEvent::Candidate(local)) => {
                        let frame = SignalingFrame::IceCandidate { candidate: local.init };
                        if let Err(e) = link.send(&frame).await {
                            tracing::debug!(error = %e, "candidate not forwarded");
                        }
                    }
                    Some(PeerEvent::Connected) if goal == Goal::Connected => return Outcome::pass(""),
                    Some(PeerEvent::ChannelOpen) if goal == Goal::Echo => {
                        if let Err(e) = peer.handle.send_text("ping").await {
                            return Outcome::fail(e.to_string());
                        }
                    }
                    Some(PeerEvent::ChannelMessage(_)) if goal == Goal::Echo => {
                        return Outcome::pass("Echo received");
                    }
                    Some(PeerEvent::Failed(message)) => return Outcome::fail(message),
                    Some(_) => {}
                    None => return Outcome::fail("Peer connection closed"),
                },
            }
        }
    }

    async fn close(&mut self) {
        if let Some(peer) = self.peer.take() {
            peer.close().await;
        }
        if let Some(mut link) = self.link.take() {
            link.close().await;
        }
    }
}

/// Apply one signaling frame; `Some` ends the exchange
async fn on_frame(peer: &PeerSession, frame: SignalingFrame) -> Option<Outcome> {
    match frame {
        SignalingFrame::Answer { sdp, mode } => {
            // A synthetic answer cannot be applied as a remote description
            if mode == Some(AnswerMode::SignalingOnly) {
                return Some(Outcome::pass("Signaling OK"));
            }
            if let Err(e) = peer.handle.apply_answer(&sdp).await {
                return Some(Outcome::fail(e.to_string()));
            }
            None
        }
        SignalingFrame::IceCandidate { candidate } => {
            if let Err(e) = peer.handle.add_remote_candidate(candidate).await {
                tracing::debug!(error = %e, "remote candidate rejected");
            }
            None
        }
        SignalingFrame::Error { message } | SignalingFrame::WebrtcError { message } => Some(Outcome::fail(message)),
        _ => None,
    }
}

fn session_id() -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default();
    format!("diag-{}-{:08x}", millis, rand::random::<u32>())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{ApiError, DiagnosticsApi};
    use crate::media::NativeMediaDevices;
    use crate::rtc::testing::ScriptedPeers;
    use crate::signaling::{SignalingConnector, SignalingError};
    use async_trait::async_trait;
    use jk_core::types::credentials::TurnCredentials;
    use jk_core::types::report::{ResultStats, SaveResultRequest, SavedResult, StoredResult};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::mpsc;

    /// Echo peer that answers every offer with fixed frames
    struct ScriptedSignaling {
        refuse: bool,
        replies: Vec<SignalingFrame>,
    }

    struct ScriptedLink {
        replies: Vec<SignalingFrame>,
        tx: mpsc::UnboundedSender<SignalingFrame>,
        rx: mpsc::UnboundedReceiver<SignalingFrame>,
    }

    #[async_trait]
    impl SignalingLink for ScriptedLink {
        async fn send(&mut self, frame: &SignalingFrame) -> Result<(), SignalingError> {
            if matches!(frame, SignalingFrame::Offer { .. }) {
                for reply in &self.replies {
                    let _ = self.tx.send(reply.clone());
                }
            }
            Ok(())
        }

        async fn recv(&mut self) -> Option<Result<SignalingFrame, SignalingError>> {
            self.rx.recv().await.map(Ok)
        }

        async fn close(&mut self) {}
    }

    #[async_trait]
    impl SignalingConnector for ScriptedSignaling {
        async fn connect(&self, _url: &str) -> Result<Box<dyn SignalingLink>, SignalingError> {
            if self.refuse {
                return Err(SignalingError::Connect("refused".to_string()));
            }
            let (tx, rx) = mpsc::unbounded_channel();
            Ok(Box::new(ScriptedLink {
                replies: self.replies.clone(),
                tx,
                rx,
            }))
        }
    }

    struct NoApi;

    #[async_trait]
    impl DiagnosticsApi for NoApi {
        async fn turn_credentials(&self) -> Result<TurnCredentials, ApiError> {
            Err(ApiError::Status(503))
        }
        async fn download_payload(&self) -> Result<usize, ApiError> {
            Err(ApiError::Status(503))
        }
        async fn ping(&self) -> Result<(), ApiError> {
            Err(ApiError::Status(503))
        }
        async fn head(&self, _url: &str) -> Result<u16, ApiError> {
            Err(ApiError::Status(503))
        }
        async fn save_results(&self, _request: &SaveResultRequest) -> Result<SavedResult, ApiError> {
            Err(ApiError::Status(503))
        }
        async fn stats(&self) -> Result<ResultStats, ApiError> {
            Err(ApiError::Status(503))
        }
        async fn fetch_result(&self, _id: &str) -> Result<StoredResult, ApiError> {
            Err(ApiError::Status(503))
        }
    }

    fn caps(peers: ScriptedPeers, signaling: ScriptedSignaling) -> (Capabilities, Arc<ScriptedPeers>) {
        let peers = Arc::new(peers);
        let caps = Capabilities {
            peers: peers.clone(),
            media: Arc::new(NativeMediaDevices::new()),
            signaling: Arc::new(signaling),
            api: Arc::new(NoApi),
        };
        (caps, peers)
    }

    fn answer(mode: AnswerMode) -> SignalingFrame {
        SignalingFrame::Answer {
            sdp: "v=0\r\n".to_string(),
            mode: Some(mode),
        }
    }

    #[tokio::test]
    async fn test_signaling_only_answer_passes() {
        let (caps, _) = caps(
            ScriptedPeers::default(),
            ScriptedSignaling {
                refuse: false,
                replies: vec![answer(AnswerMode::SignalingOnly)],
            },
        );
        let ctx = RunContext::new(2);
        let config = DiagConfig::default();

        assert_eq!(peer_connection(&caps, &ctx, &config).await, Outcome::pass("Signaling OK"));
        assert_eq!(data_channel(&caps, &ctx, &config).await, Outcome::pass("Signaling OK"));
    }

    #[tokio::test]
    async fn test_connected_and_echo() {
        let peers = ScriptedPeers {
            on_answer: vec![PeerEvent::Connected, PeerEvent::ChannelOpen],
            echo: true,
            ..Default::default()
        };
        let (caps, peers) = caps(
            peers,
            ScriptedSignaling {
                refuse: false,
                replies: vec![answer(AnswerMode::Werift)],
            },
        );
        let ctx = RunContext::new(2);
        let config = DiagConfig::default();

        assert_eq!(peer_connection(&caps, &ctx, &config).await, Outcome::pass(""));
        assert_eq!(data_channel(&caps, &ctx, &config).await, Outcome::pass("Echo received"));
        assert_eq!(peers.closed_count(), 2);
    }

    #[tokio::test]
    async fn test_socket_refused() {
        let (caps, _) = caps(
            ScriptedPeers::default(),
            ScriptedSignaling {
                refuse: true,
                replies: vec![],
            },
        );
        let outcome = peer_connection(&caps, &RunContext::new(1), &DiagConfig::default()).await;
        assert_eq!(outcome, Outcome::fail("WebSocket error"));
    }

    #[tokio::test]
    async fn test_error_frame() {
        let (caps, _) = caps(
            ScriptedPeers::default(),
            ScriptedSignaling {
                refuse: false,
                replies: vec![SignalingFrame::WebrtcError {
                    message: "Peer setup failed".to_string(),
                }],
            },
        );
        let outcome = data_channel(&caps, &RunContext::new(1), &DiagConfig::default()).await;
        assert_eq!(outcome, Outcome::fail("Peer setup failed"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_silent_peer_times_out() {
        let (caps, peers) = caps(
            ScriptedPeers::default(),
            ScriptedSignaling {
                refuse: false,
                replies: vec![],
            },
        );
        let config = DiagConfig::default();
        assert_eq!(config.timeouts.session, Duration::from_secs(15));

        let outcome = peer_connection(&caps, &RunContext::new(1), &config).await;
        assert_eq!(outcome, Outcome::fail("Timeout"));
        assert_eq!(peers.closed_count(), 1);
    }

    #[test]
    fn test_session_ids_differ() {
        assert_ne!(session_id(), session_id());
    }
}
