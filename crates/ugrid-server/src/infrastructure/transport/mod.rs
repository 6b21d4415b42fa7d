//! Transport Adapter: one duplex byte-stream interface for every transport.
//!
//! The session driver and router never know whether a connection is a raw
//! TCP socket, a WebSocket or an in-memory test pipe.  Each transport is
//! split into a [`ByteSource`] (read side) and a [`ByteSink`] (write side)
//! and bundled with a [`PeerInfo`] into a [`Transport`].
//!
//! # Adapters
//!
//! | Module        | Built from                                  |
//! |---------------|---------------------------------------------|
//! | [`tcp`]       | `tokio::net::TcpStream` (any `AsyncRead`/`AsyncWrite`) |
//! | [`websocket`] | `tokio_tungstenite::WebSocketStream`        |
//! | [`mock`]      | in-memory `tokio::io::duplex` pipe          |

pub mod mock;
pub mod tcp;
pub mod websocket;

use async_trait::async_trait;
use thiserror::Error;
use tokio_tungstenite::tungstenite;

use crate::domain::PeerInfo;

/// Errors raised by a transport.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),

    #[error("WebSocket handshake not completed within {0:?}")]
    HandshakeTimeout(std::time::Duration),
}

/// Read side of a transport.
#[async_trait]
pub trait ByteSource: Send {
    /// Returns the next chunk of bytes, or `None` once the peer has closed.
    ///
    /// Chunk boundaries carry no meaning: a chunk may hold part of a frame or
    /// several frames.
    async fn read_chunk(&mut self) -> Result<Option<Vec<u8>>, TransportError>;
}

/// Write side of a transport.
#[async_trait]
pub trait ByteSink: Send {
    /// Writes all of `bytes`, resolving once they have been handed to the
    /// transport.
    async fn write_all(&mut self, bytes: &[u8]) -> Result<(), TransportError>;

    /// Closes the write direction.
    async fn shutdown(&mut self) -> Result<(), TransportError>;
}

/// A connected transport, ready to be handed to a session.
pub struct Transport {
    pub peer: PeerInfo,
    pub source: Box<dyn ByteSource>,
    pub sink: Box<dyn ByteSink>,
}

impl Transport {
    pub fn new(
        peer: PeerInfo,
        source: impl ByteSource + 'static,
        sink: impl ByteSink + 'static,
    ) -> Self {
        Self {
            peer,
            source: Box::new(source),
            sink: Box::new(sink),
        }
    }
}

impl std::fmt::Debug for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transport")
            .field("peer", &self.peer)
            .finish_non_exhaustive()
    }
}
