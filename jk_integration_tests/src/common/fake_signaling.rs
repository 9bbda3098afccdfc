use async_trait::async_trait;
use jk_core::types::signaling::{AnswerMode, SignalingFrame};
use jk_probe::signaling::{SignalingConnector, SignalingError, SignalingLink};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// How the backend's echo peer answers offers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EchoPeer {
    /// Full media peer, the answer is applied
    #[default]
    Media,
    /// Relay without a media peer
    SignalingOnly,
    /// Socket refuses connections
    Down,
}

/// Signaling socket and XMPP WebSocket endpoint
#[derive(Default)]
pub struct FakeSignaling {
    pub echo: EchoPeer,
    pub xmpp_down: bool,
    offers: Arc<AtomicUsize>,
    closed: Arc<AtomicUsize>,
    connected: Mutex<Vec<String>>,
}

impl FakeSignaling {
    pub fn with_echo(echo: EchoPeer) -> Self {
        Self {
            echo,
            ..Default::default()
        }
    }

    /// URLs of every accepted connection, in order
    pub fn connected(&self) -> Vec<String> {
        self.connected.lock().unwrap().clone()
    }

    pub fn offer_count(&self) -> usize {
        self.offers.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SignalingConnector for FakeSignaling {
    async fn connect(&self, url: &str) -> Result<Box<dyn SignalingLink>, SignalingError> {
        let refused = if url.contains("xmpp-websocket") {
            self.xmpp_down
        } else {
            self.echo == EchoPeer::Down
        };
        if refused {
            return Err(SignalingError::Connect(format!("{}: connection refused", url)));
        }

        self.connected.lock().unwrap().push(url.to_string());
        let (tx, rx) = mpsc::unbounded_channel();
        Ok(Box::new(FakeLink {
            echo: self.echo,
            tx,
            rx,
            offers: self.offers.clone(),
            closed: self.closed.clone(),
        }))
    }
}

/// Answers offers through an internal queue; `recv` waits while it is empty
struct FakeLink {
    echo: EchoPeer,
    tx: mpsc::UnboundedSender<SignalingFrame>,
    rx: mpsc::UnboundedReceiver<SignalingFrame>,
    offers: Arc<AtomicUsize>,
    closed: Arc<AtomicUsize>,
}

#[async_trait]
impl SignalingLink for FakeLink {
    async fn send(&mut self, frame: &SignalingFrame) -> Result<(), SignalingError> {
        if let SignalingFrame::Offer { .. } = frame {
            self.offers.fetch_add(1, Ordering::SeqCst);
            let mode = match self.echo {
                EchoPeer::SignalingOnly => Some(AnswerMode::SignalingOnly),
                _ => None,
            };
            let answer = SignalingFrame::Answer {
                sdp: "v=0\r\n".to_string(),
                mode,
            };
            let _ = self.tx.send(answer);
        }
        Ok(())
    }

    async fn recv(&mut self) -> Option<Result<SignalingFrame, SignalingError>> {
        self.rx.recv().await.map(Ok)
    }

    async fn close(&mut self) {
        self.closed.fetch_add(1, Ordering::SeqCst);
    }
}
