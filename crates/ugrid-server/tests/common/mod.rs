//! Shared helpers for the ugrid-server integration tests.
//!
//! [`TestClient`] speaks the broker's frame protocol over any byte stream
//! (in-memory pipe or real TCP socket).

#![allow(dead_code)]

use std::time::Duration;

use serde_json::Value;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::timeout;
use ugrid_core::protocol::codec::DEFAULT_MAX_PAYLOAD_LEN;
use ugrid_core::protocol::CommandName;
use ugrid_core::{encode_frame, CommandRequest, Frame, FrameDecoder, Reply};

/// How long a test waits for an expected frame.
pub const RECV_TIMEOUT: Duration = Duration::from_secs(2);

/// How long a test waits to be sure no frame arrives.
pub const QUIET_PERIOD: Duration = Duration::from_millis(150);

pub struct TestClient<S> {
    stream: S,
    decoder: FrameDecoder,
}

impl<S: AsyncRead + AsyncWrite + Unpin> TestClient<S> {
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            decoder: FrameDecoder::new(DEFAULT_MAX_PAYLOAD_LEN),
        }
    }

    pub async fn send_raw(&mut self, bytes: &[u8]) {
        self.stream.write_all(bytes).await.expect("write to broker");
        self.stream.flush().await.expect("flush to broker");
    }

    pub async fn send(&mut self, destination: u32, payload: &[u8]) {
        let bytes = encode_frame(destination, payload).unwrap();
        self.send_raw(&bytes).await;
    }

    /// Waits for the next frame, or `None` if the broker closed the stream.
    pub async fn try_recv(&mut self, wait: Duration) -> Option<Frame> {
        let read = async {
            loop {
                if let Some(frame) = self.decoder.next_frame().expect("valid frame from broker") {
                    return Some(frame);
                }
                let mut buf = [0u8; 4096];
                let n = self.stream.read(&mut buf).await.ok()?;
                if n == 0 {
                    return None;
                }
                self.decoder.push(&buf[..n]);
            }
        };
        timeout(wait, read).await.ok().flatten()
    }

    pub async fn recv(&mut self) -> Frame {
        self.try_recv(RECV_TIMEOUT)
            .await
            .expect("expected a frame from the broker")
    }

    /// Asserts that nothing arrives within [`QUIET_PERIOD`].
    pub async fn expect_silence(&mut self) {
        if let Some(frame) = self.try_recv(QUIET_PERIOD).await {
            panic!("unexpected frame to {}", frame.destination());
        }
    }

    /// Sends a server command and returns the reply.
    pub async fn command(&mut self, cmd: CommandName, data: Value) -> Reply {
        self.request(CommandRequest::new(cmd, data)).await
    }

    pub async fn request(&mut self, request: CommandRequest) -> Reply {
        let bytes = request.to_frame_bytes().unwrap();
        self.send_raw(&bytes).await;
        let frame = self.recv().await;
        assert_eq!(frame.destination(), 0, "replies are addressed to 0");
        serde_json::from_slice(frame.payload()).expect("reply is JSON")
    }

    /// Runs `connect` and returns `(client id, registry index)`.
    pub async fn connect(&mut self, data: Value) -> (String, u32) {
        let reply = self.command(CommandName::Connect, data).await;
        assert!(!reply.is_error(), "connect failed: {:?}", reply.error);
        let data = reply.data.expect("connect returns data");
        let id = data["id"].as_str().expect("id").to_string();
        let index = data["registryIndex"].as_u64().expect("registryIndex") as u32;
        (id, index)
    }

    /// Resolves a topic name to its multicast address.
    pub async fn topic_address(&mut self, name: &str) -> u32 {
        let reply = self.command(CommandName::Tid, Value::from(name)).await;
        let tid = reply.data.and_then(|d| d.as_u64()).expect("tid returns a number");
        ugrid_core::MULTICAST_BASE + tid as u32
    }

    pub async fn subscribe(&mut self, name: &str) {
        let reply = self.command(CommandName::Subscribe, Value::from(name)).await;
        assert!(!reply.is_error(), "subscribe failed: {:?}", reply.error);
    }

    pub fn into_inner(self) -> S {
        self.stream
    }
}
