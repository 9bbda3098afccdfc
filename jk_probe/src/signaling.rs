//! Signaling socket
//!
//! JSON [`SignalingFrame`]s over a WebSocket. Frames the diagnostics
//! backend sends that the probes have no use for (welcome banners, unknown
//! types, binary data) are skipped.

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use jk_core::types::signaling::SignalingFrame;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

#[derive(Debug, thiserror::Error)]
pub enum SignalingError {
    #[error("connection failed: {0}")]
    Connect(String),

    #[error("send failed: {0}")]
    Send(String),

    #[error("receive failed: {0}")]
    Receive(String),

    #[error("frame encoding failed: {0}")]
    Encode(#[from] serde_json::Error),
}

#[async_trait]
pub trait SignalingLink: Send {
    async fn send(&mut self, frame: &SignalingFrame) -> Result<(), SignalingError>;

    /// Next frame, `None` once the peer closed the socket
    async fn recv(&mut self) -> Option<Result<SignalingFrame, SignalingError>>;

    async fn close(&mut self);
}

#[async_trait]
pub trait SignalingConnector: Send + Sync {
    /// Open a socket; completing the handshake is itself a reachability signal
    async fn connect(&self, url: &str) -> Result<Box<dyn SignalingLink>, SignalingError>;
}

/// WebSocket connector backed by tokio-tungstenite
#[derive(Debug, Clone, Copy, Default)]
pub struct WsConnector;

#[async_trait]
impl SignalingConnector for WsConnector {
    async fn connect(&self, url: &str) -> Result<Box<dyn SignalingLink>, SignalingError> {
        let (stream, response) = tokio_tungstenite::connect_async(url)
            .await
            .map_err(|e| SignalingError::Connect(e.to_string()))?;
        tracing::debug!(url, status = %response.status(), "websocket connected");
        Ok(Box::new(WsLink { stream }))
    }
}

struct WsLink {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl SignalingLink for WsLink {
    async fn send(&mut self, frame: &SignalingFrame) -> Result<(), SignalingError> {
        let text = frame.to_json()?;
        self.stream
            .send(Message::Text(text))
            .await
            .map_err(|e| SignalingError::Send(e.to_string()))
    }

    async fn recv(&mut self) -> Option<Result<SignalingFrame, SignalingError>> {
        loop {
            match self.stream.next().await? {
                Ok(Message::Text(text)) => match SignalingFrame::from_json(&text) {
                    Ok(frame) => return Some(Ok(frame)),
                    Err(e) => tracing::debug!(error = %e, "skipping signaling frame"),
                },
                Ok(Message::Close(_)) => return None,
                Ok(_) => continue,
                Err(e) => return Some(Err(SignalingError::Receive(e.to_string()))),
            }
        }
    }

    async fn close(&mut self) {
        if let Err(e) = self.stream.close(None).await {
            tracing::debug!(error = %e, "websocket close failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    /// One-connection echo server speaking the backend's framing
    async fn spawn_server() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
            ws.send(Message::Text(r#"{"type":"welcome","clientIp":"127.0.0.1"}"#.to_string()))
                .await
                .unwrap();
            while let Some(Ok(Message::Text(text))) = ws.next().await {
                if text.contains("\"offer\"") {
                    let answer = r#"{"type":"answer","sdp":"v=0","mode":"signaling-only"}"#;
                    ws.send(Message::Text(answer.to_string())).await.unwrap();
                }
            }
        });

        format!("ws://{}/ws", addr)
    }

    #[tokio::test]
    async fn test_offer_answer_over_websocket() {
        let url = spawn_server().await;
        let mut link = WsConnector.connect(&url).await.unwrap();

        link.send(&SignalingFrame::offer("v=0", "1")).await.unwrap();
        // The welcome frame is not a SignalingFrame and gets skipped
        let frame = link.recv().await.unwrap().unwrap();
        assert!(matches!(frame, SignalingFrame::Answer { .. }));
        link.close().await;
    }

    #[tokio::test]
    async fn test_connect_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let result = WsConnector.connect(&format!("ws://{}/ws", addr)).await;
        assert!(matches!(result, Err(SignalingError::Connect(_))));
    }
}
