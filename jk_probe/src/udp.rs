//! UDP socket setup for the STUN responder

use anyhow::Result;
use socket2::{Domain, Protocol, Socket, Type};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::UdpSocket;

const BUFFER_SIZE: usize = 1024 * 1024;

/// UDP socket configured through socket2 and shared between tasks
#[derive(Clone)]
pub struct UdpTransport {
    socket: Arc<UdpSocket>,
}

impl UdpTransport {
    pub async fn bind(addr: &str) -> Result<Self> {
        let addr: SocketAddr = addr.parse()?;

        let socket = Socket::new(
            if addr.is_ipv4() { Domain::IPV4 } else { Domain::IPV6 },
            Type::DGRAM,
            Some(Protocol::UDP),
        )?;
        Self::configure_socket(&socket)?;

        socket.bind(&addr.into())?;
        socket.set_nonblocking(true)?;

        let std_socket: std::net::UdpSocket = socket.into();
        let tokio_socket = UdpSocket::from_std(std_socket)?;

        tracing::debug!(addr = %addr, "UDP socket bound");

        Ok(Self {
            socket: Arc::new(tokio_socket),
        })
    }

    fn configure_socket(socket: &Socket) -> Result<()> {
        socket.set_reuse_address(true)?;

        // Kernels may clamp the size, which is fine for small STUN datagrams
        if let Err(e) = socket.set_recv_buffer_size(BUFFER_SIZE) {
            tracing::debug!(error = %e, "SO_RCVBUF not applied");
        }
        if let Err(e) = socket.set_send_buffer_size(BUFFER_SIZE) {
            tracing::debug!(error = %e, "SO_SNDBUF not applied");
        }

        Ok(())
    }

    pub async fn send_to(&self, data: &[u8], addr: SocketAddr) -> Result<usize> {
        Ok(self.socket.send_to(data, addr).await?)
    }

    pub async fn recv_from(&self, buf: &mut [u8]) -> Result<(usize, SocketAddr)> {
        Ok(self.socket.recv_from(buf).await?)
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_send_receive() {
        let a = UdpTransport::bind("127.0.0.1:0").await.unwrap();
        let b = UdpTransport::bind("127.0.0.1:0").await.unwrap();

        a.send_to(b"hello", b.local_addr().unwrap()).await.unwrap();
        let mut buf = [0u8; 16];
        let (len, from) = b.recv_from(&mut buf).await.unwrap();
        assert_eq!(&buf[..len], b"hello");
        assert_eq!(from, a.local_addr().unwrap());
    }

    #[tokio::test]
    async fn test_bind_invalid_address() {
        assert!(UdpTransport::bind("not-an-address").await.is_err());
    }
}
