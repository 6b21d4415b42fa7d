//! Description of the remote end of a connection.

use std::fmt;
use std::net::SocketAddr;

/// Which transport a connection arrived on.
///
/// Only used for logging: routing never branches on the transport kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    Tcp,
    WebSocket,
    /// In-memory transport used by tests.
    Memory,
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TransportKind::Tcp => "tcp",
            TransportKind::WebSocket => "websocket",
            TransportKind::Memory => "memory",
        })
    }
}

/// What the server knows about a connected peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerInfo {
    pub kind: TransportKind,
    /// Socket address of the peer, when the transport has one.
    pub remote_addr: Option<SocketAddr>,
    /// `Origin` header of a WebSocket handshake.
    pub origin: Option<String>,
}

impl PeerInfo {
    pub fn tcp(remote_addr: SocketAddr) -> Self {
        Self {
            kind: TransportKind::Tcp,
            remote_addr: Some(remote_addr),
            origin: None,
        }
    }

    pub fn websocket(remote_addr: SocketAddr, origin: Option<String>) -> Self {
        Self {
            kind: TransportKind::WebSocket,
            remote_addr: Some(remote_addr),
            origin,
        }
    }

    pub fn memory() -> Self {
        Self {
            kind: TransportKind::Memory,
            remote_addr: None,
            origin: None,
        }
    }

    /// The remote address rendered for `devices` results.
    pub fn remote_address(&self) -> Option<String> {
        self.remote_addr.map(|a| a.ip().to_string())
    }
}

impl fmt::Display for PeerInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.remote_addr, &self.origin) {
            (Some(addr), Some(origin)) => write!(f, "{} {addr} (origin {origin})", self.kind),
            (Some(addr), None) => write!(f, "{} {addr}", self.kind),
            (None, _) => write!(f, "{}", self.kind),
        }
    }
}
