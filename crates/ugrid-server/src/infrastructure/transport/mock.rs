//! In-memory transport for tests.
//!
//! [`memory_pair`] returns a server-side [`Transport`] plus the client end of
//! the same pipe.  The client end is a plain `DuplexStream`, so tests write
//! encoded frames into it exactly as a TCP client would.

use tokio::io::DuplexStream;

use super::tcp::{IoSink, IoSource};
use super::Transport;
use crate::domain::PeerInfo;

/// Bytes buffered in each direction before writes wait for the reader.
pub const DEFAULT_PIPE_CAPACITY: usize = 64 * 1024;

/// Creates a connected in-memory transport.
///
/// Returns `(server_transport, client_end)`.
pub fn memory_pair(capacity: usize) -> (Transport, DuplexStream) {
    let (client_end, server_end) = tokio::io::duplex(capacity);
    let (reader, writer) = tokio::io::split(server_end);
    let transport = Transport::new(PeerInfo::memory(), IoSource::new(reader), IoSink::new(writer));
    (transport, client_end)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TransportKind;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[tokio::test]
    async fn test_bytes_flow_both_ways() {
        let (mut transport, mut client) = memory_pair(DEFAULT_PIPE_CAPACITY);
        assert_eq!(transport.peer.kind, TransportKind::Memory);

        client.write_all(b"ping").await.unwrap();
        let chunk = transport.source.read_chunk().await.unwrap();
        assert_eq!(chunk.as_deref(), Some(&b"ping"[..]));

        transport.sink.write_all(b"pong").await.unwrap();
        let mut buf = [0u8; 4];
        client.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"pong");
    }
}
