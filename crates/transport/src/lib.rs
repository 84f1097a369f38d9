use std::{
    future::Future,
    net::{Ipv4Addr, SocketAddr},
    time::Duration,
};

use async_trait::async_trait;
use shared::error::TransportError;
use tokio::net::UdpSocket;
use tracing::{debug, error, warn};

/// Datagrams longer than this are truncated on receive; commands are short
/// text lines, so longer payloads are unsupported.
pub const MAX_DATAGRAM_LEN: usize = 1024;
const RECEIVE_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// Fire-and-forget delivery of text commands to devices.
///
/// Implementations log failures instead of returning them; a failed send never
/// changes the caller's state.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, message: &str, destination: SocketAddr);
}

/// Sends datagrams from one ephemeral, broadcast-enabled socket.
pub struct UdpTransport {
    socket: UdpSocket,
}

impl UdpTransport {
    pub async fn bind() -> Result<Self, TransportError> {
        let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0));
        let socket = UdpSocket::bind(addr)
            .await
            .map_err(|source| TransportError::Bind { addr, source })?;
        socket
            .set_broadcast(true)
            .map_err(TransportError::Broadcast)?;
        Ok(Self { socket })
    }

    pub async fn try_send(
        &self,
        message: &str,
        destination: SocketAddr,
    ) -> Result<(), TransportError> {
        self.socket
            .send_to(message.as_bytes(), destination)
            .await
            .map_err(|source| TransportError::Send {
                destination,
                source,
            })?;
        Ok(())
    }
}

#[async_trait]
impl Transport for UdpTransport {
    async fn send(&self, message: &str, destination: SocketAddr) {
        match self.try_send(message, destination).await {
            Ok(()) => debug!(%destination, command = message, "udp sent"),
            Err(error) => warn!(%error, "udp send failed"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Datagram {
    pub payload: String,
    pub sender: SocketAddr,
}

/// The single consumer of inbound datagrams.
pub struct UdpListener {
    socket: UdpSocket,
}

impl UdpListener {
    pub async fn bind(port: u16) -> Result<Self, TransportError> {
        let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, port));
        let socket = UdpSocket::bind(addr)
            .await
            .map_err(|source| TransportError::Bind { addr, source })?;
        Ok(Self { socket })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    pub async fn recv(&self) -> Result<Datagram, TransportError> {
        let mut buf = [0u8; MAX_DATAGRAM_LEN];
        let (len, sender) = self
            .socket
            .recv_from(&mut buf)
            .await
            .map_err(TransportError::Receive)?;
        if len == MAX_DATAGRAM_LEN {
            debug!(%sender, max = MAX_DATAGRAM_LEN, "datagram filled the buffer; payload may be truncated");
        }
        let text = String::from_utf8_lossy(&buf[..len]);
        Ok(Datagram {
            payload: trim_line_ending(&text).to_string(),
            sender,
        })
    }

    /// Hands every non-empty datagram to `handler`, in arrival order. Receive
    /// errors are logged and retried after a short pause; this never returns.
    pub async fn run<F, Fut>(&self, mut handler: F)
    where
        F: FnMut(Datagram) -> Fut,
        Fut: Future<Output = ()>,
    {
        loop {
            match self.recv().await {
                Ok(datagram) if datagram.payload.is_empty() => {
                    debug!(sender = %datagram.sender, "ignoring empty datagram");
                }
                Ok(datagram) => handler(datagram).await,
                Err(error) => {
                    error!(%error, "udp receive failed");
                    tokio::time::sleep(RECEIVE_ERROR_BACKOFF).await;
                }
            }
        }
    }
}

/// Strips every trailing `\r` and `\n`; other whitespace is payload.
pub fn trim_line_ending(text: &str) -> &str {
    text.trim_end_matches(['\r', '\n'])
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
