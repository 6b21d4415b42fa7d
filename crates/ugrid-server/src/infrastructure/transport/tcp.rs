//! Byte-stream transport: TCP sockets and anything else that is
//! `AsyncRead + AsyncWrite`.
//!
//! TCP is a *stream* protocol: a single `read()` may return less than one
//! frame or several frames at once.  This adapter makes no attempt to find
//! frame boundaries; it hands raw chunks to the session, whose
//! `FrameDecoder` reassembles them.

use std::net::SocketAddr;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, warn};

use super::{ByteSink, ByteSource, Transport, TransportError};
use crate::domain::PeerInfo;

/// Size of the temporary buffer for each `read()` call.
const READ_BUF_SIZE: usize = 8 * 1024;

/// Read half of a byte stream.
pub struct IoSource<R> {
    reader: R,
    buf: Vec<u8>,
}

impl<R> IoSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buf: vec![0u8; READ_BUF_SIZE],
        }
    }
}

#[async_trait]
impl<R: AsyncRead + Unpin + Send> ByteSource for IoSource<R> {
    async fn read_chunk(&mut self) -> Result<Option<Vec<u8>>, TransportError> {
        // `read()` returning 0 means the peer closed its write side (EOF).
        let n = self.reader.read(&mut self.buf).await?;
        if n == 0 {
            return Ok(None);
        }
        Ok(Some(self.buf[..n].to_vec()))
    }
}

/// Write half of a byte stream.
pub struct IoSink<W> {
    writer: W,
}

impl<W> IoSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }
}

#[async_trait]
impl<W: AsyncWrite + Unpin + Send> ByteSink for IoSink<W> {
    async fn write_all(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        self.writer.write_all(bytes).await?;
        Ok(())
    }

    async fn shutdown(&mut self) -> Result<(), TransportError> {
        self.writer.shutdown().await?;
        Ok(())
    }
}

/// Wraps an accepted TCP connection.
pub fn from_tcp(stream: TcpStream, remote_addr: SocketAddr) -> Transport {
    // Frames are usually small and latency matters more than batching.
    if let Err(e) = stream.set_nodelay(true) {
        warn!("could not set TCP_NODELAY for {remote_addr}: {e}");
    }
    debug!("tcp transport for {remote_addr}");
    let (read_half, write_half) = stream.into_split();
    Transport::new(
        PeerInfo::tcp(remote_addr),
        IoSource::new(read_half),
        IoSink::new(write_half),
    )
}
