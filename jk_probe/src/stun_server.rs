//! STUN binding responder
//!
//! Answers RFC 5389 Binding requests with the observed source address.
//! Deployed on the media port (UDP 10000) so the `udp-10000` probe can prove
//! outbound UDP reaches it.

use crate::udp::UdpTransport;
use anyhow::Result;
use jk_core::types::stun::{looks_like_stun, StunAttribute, StunMessage, StunMessageType};
use std::net::SocketAddr;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

const SOFTWARE: &str = concat!("jitsi-kollen ", env!("CARGO_PKG_VERSION"));

pub struct StunServer {
    transport: UdpTransport,
    shutdown: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl StunServer {
    pub async fn new(bind_addr: &str) -> Result<Self> {
        let transport = UdpTransport::bind(bind_addr).await?;

        Ok(Self {
            transport,
            shutdown: CancellationToken::new(),
            task: None,
        })
    }

    pub fn start(&mut self) {
        if self.task.is_some() {
            return;
        }

        let transport = self.transport.clone();
        let shutdown = self.shutdown.clone();

        let task = tokio::spawn(async move {
            let mut buf = vec![0u8; 2048];

            loop {
                let received = tokio::select! {
                    _ = shutdown.cancelled() => break,
                    received = transport.recv_from(&mut buf) => received,
                };

                match received {
                    Ok((len, peer_addr)) => {
                        if let Err(e) = Self::handle_request(&transport, &buf[..len], peer_addr).await {
                            tracing::warn!(peer = %peer_addr, "STUN request handling failed: {}", e);
                        }
                    }
                    Err(e) => {
                        tracing::error!("STUN server recv error: {}", e);
                        break;
                    }
                }
            }

            tracing::info!("STUN server stopped");
        });

        self.task = Some(task);
        if let Ok(addr) = self.local_addr() {
            tracing::info!(addr = %addr, "STUN server started");
        }
    }

    /// Build the reply for one datagram, `None` when it must be ignored
    pub fn respond(data: &[u8], peer_addr: SocketAddr) -> Option<StunMessage> {
        if !looks_like_stun(data) {
            return None;
        }

        match StunMessage::decode(data) {
            Ok(request) if request.msg_type == StunMessageType::BindingRequest => {
                // Comprehension-required attributes (< 0x8000) we do not know must be rejected
                let unknown_required = request
                    .attributes
                    .iter()
                    .any(|a| matches!(a, StunAttribute::Unknown { attr_type, .. } if *attr_type < 0x8000));
                let reply = if unknown_required {
                    StunMessage::binding_error(request.transaction_id, 420, "Unknown Attribute")
                } else {
                    StunMessage::binding_response(request.transaction_id, peer_addr)
                };
                Some(reply.with_software(SOFTWARE))
            }
            Ok(_) => None,
            Err(e) => {
                tracing::debug!(peer = %peer_addr, error = %e, "ignoring malformed STUN message");
                None
            }
        }
    }

    async fn handle_request(transport: &UdpTransport, data: &[u8], peer_addr: SocketAddr) -> Result<()> {
        let Some(reply) = Self::respond(data, peer_addr) else {
            return Ok(());
        };

        transport.send_to(&reply.encode(), peer_addr).await?;

        tracing::debug!(peer = %peer_addr, "STUN binding response sent");
        Ok(())
    }

    /// Serve until `token` is cancelled
    pub async fn run_until(mut self, token: CancellationToken) {
        self.start();
        token.cancelled().await;
        self.stop();
    }

    pub fn stop(&mut self) {
        self.shutdown.cancel();
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.transport.local_addr()
    }
}

impl Drop for StunServer {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use std::time::Duration;

    #[tokio::test]
    async fn test_stun_server_creation() {
        let server = StunServer::new("127.0.0.1:0").await;
        assert!(server.is_ok());
    }

    #[test]
    fn test_respond_to_binding_request() {
        let request = StunMessage::binding_request().unwrap();
        let peer: SocketAddr = "203.0.113.5:40000".parse().unwrap();

        let reply = StunServer::respond(&request.encode(), peer).unwrap();
        assert_eq!(reply.msg_type, StunMessageType::BindingResponse);
        assert_eq!(reply.transaction_id, request.transaction_id);
        assert_eq!(reply.get_mapped_address(), Some(peer));
    }

    #[test]
    fn test_ignores_garbage_and_responses() {
        let peer: SocketAddr = "203.0.113.5:40000".parse().unwrap();
        assert!(StunServer::respond(b"hello world, not stun", peer).is_none());

        let response = StunMessage::binding_response([1u8; 12], peer).encode();
        assert!(StunServer::respond(&response, peer).is_none());
    }

    #[test]
    fn test_unknown_required_attribute() {
        let mut request = StunMessage::binding_request().unwrap();
        request.attributes.push(StunAttribute::Unknown {
            attr_type: 0x0024,
            value: Bytes::from_static(&[0, 0, 0, 1]),
        });
        let peer: SocketAddr = "127.0.0.1:1".parse().unwrap();
        let reply = StunServer::respond(&request.encode(), peer).unwrap();
        assert_eq!(reply.get_error(), Some((420, "Unknown Attribute")));
    }

    #[tokio::test]
    async fn test_udp_round_trip() {
        let mut server = StunServer::new("127.0.0.1:0").await.unwrap();
        server.start();
        let server_addr = server.local_addr().unwrap();

        let client = UdpTransport::bind("127.0.0.1:0").await.unwrap();
        let request = StunMessage::binding_request().unwrap();
        client.send_to(&request.encode(), server_addr).await.unwrap();

        let mut buf = [0u8; 512];
        let (len, _) = tokio::time::timeout(Duration::from_secs(2), client.recv_from(&mut buf))
            .await
            .unwrap()
            .unwrap();
        let reply = StunMessage::decode(&buf[..len]).unwrap();
        assert_eq!(reply.get_mapped_address(), Some(client.local_addr().unwrap()));

        server.stop();
    }
}
