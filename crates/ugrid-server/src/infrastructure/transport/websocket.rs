//! WebSocket transport.
//!
//! Browsers cannot open raw TCP sockets, so the broker also accepts
//! WebSocket connections.  The WebSocket is treated as one more byte stream:
//! the payload of every binary (or text) message is appended to the same
//! stream the frame decoder reads, so a broker frame may span several
//! WebSocket messages or share one with other frames.  Outbound frames are
//! sent as one binary message each.
//!
//! Ping/pong is answered by `tokio-tungstenite` itself.

use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{accept_hdr_async, WebSocketStream};
use tracing::{debug, info};

use super::{ByteSink, ByteSource, Transport, TransportError};
use crate::domain::PeerInfo;

/// Read half of a WebSocket.
pub struct WsSource<S> {
    stream: SplitStream<WebSocketStream<S>>,
}

#[async_trait]
impl<S: AsyncRead + AsyncWrite + Unpin + Send> ByteSource for WsSource<S> {
    async fn read_chunk(&mut self) -> Result<Option<Vec<u8>>, TransportError> {
        loop {
            let Some(message) = self.stream.next().await else {
                return Ok(None);
            };
            match message? {
                Message::Binary(bytes) => return Ok(Some(bytes)),
                Message::Text(text) => return Ok(Some(text.into_bytes())),
                Message::Close(_) => return Ok(None),
                // Ping/Pong/raw frames carry no stream bytes.
                _ => continue,
            }
        }
    }
}

/// Write half of a WebSocket.
pub struct WsSink<S> {
    sink: SplitSink<WebSocketStream<S>, Message>,
}

#[async_trait]
impl<S: AsyncRead + AsyncWrite + Unpin + Send> ByteSink for WsSink<S> {
    async fn write_all(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        self.sink.send(Message::Binary(bytes.to_vec())).await?;
        Ok(())
    }

    async fn shutdown(&mut self) -> Result<(), TransportError> {
        self.sink.close().await?;
        Ok(())
    }
}

/// Wraps an established WebSocket.
pub fn from_websocket<S>(ws: WebSocketStream<S>, peer: PeerInfo) -> Transport
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (sink, stream) = ws.split();
    Transport::new(peer, WsSource { stream }, WsSink { sink })
}

/// How long a peer has to complete the upgrade request after connecting.
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Performs the server side of the WebSocket handshake on an accepted TCP
/// stream and wraps the result as a [`Transport`].
///
/// The `Origin` request header, if any, is logged and kept in the peer info.
///
/// # Errors
///
/// Returns [`TransportError::WebSocket`] if the handshake fails and
/// [`TransportError::HandshakeTimeout`] if it does not finish within
/// [`HANDSHAKE_TIMEOUT`].
pub async fn accept(stream: TcpStream, remote_addr: SocketAddr) -> Result<Transport, TransportError> {
    if let Err(e) = stream.set_nodelay(true) {
        debug!("could not set TCP_NODELAY for {remote_addr}: {e}");
    }
    handshake(stream, remote_addr, HANDSHAKE_TIMEOUT).await
}

async fn handshake<S>(
    stream: S,
    remote_addr: SocketAddr,
    limit: Duration,
) -> Result<Transport, TransportError>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let mut origin = None;
    let capture_origin = |request: &Request, response: Response| -> Result<Response, ErrorResponse> {
        origin = request
            .headers()
            .get("origin")
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned);
        Ok(response)
    };
    let ws = timeout(limit, accept_hdr_async(stream, capture_origin))
        .await
        .map_err(|_| TransportError::HandshakeTimeout(limit))??;

    match &origin {
        Some(origin) => info!("websocket handshake from {remote_addr}, origin {origin}"),
        None => info!("websocket handshake from {remote_addr}"),
    }
    Ok(from_websocket(ws, PeerInfo::websocket(remote_addr, origin)))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
