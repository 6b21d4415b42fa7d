//! Integration tests for the ugrid-core protocol codec.
//!
//! These tests drive the public API the way a connection reader does: bytes
//! arrive in arbitrary chunks, the streaming decoder reassembles frames, and
//! server-command payloads are parsed from the reassembled frames.

use serde_json::json;
use ugrid_core::{
    protocol::{
        codec::DEFAULT_MAX_PAYLOAD_LEN,
        messages::{CommandName, REPLY_CMD},
    },
    Address, CommandRequest, ConnectionHandle, FrameDecoder, Reply, TopicId, MULTICAST_BASE,
};

/// Feeds `bytes` to a fresh decoder in chunks of `chunk` bytes and collects
/// every frame it produces.
fn decode_in_chunks(bytes: &[u8], chunk: usize) -> Vec<ugrid_core::Frame> {
    let mut decoder = FrameDecoder::new(DEFAULT_MAX_PAYLOAD_LEN);
    let mut frames = Vec::new();
    for piece in bytes.chunks(chunk) {
        decoder.push(piece);
        while let Some(frame) = decoder.next_frame().expect("stream must stay valid") {
            frames.push(frame);
        }
    }
    assert_eq!(decoder.buffered_len(), 0, "no trailing bytes may remain");
    frames
}

#[test]
fn test_mixed_stream_decodes_every_address_kind() {
    // Arrange: one command, one unicast and one multicast frame back to back.
    let request = CommandRequest::new(CommandName::Subscribe, json!("room1"));
    let mut stream = request.to_frame_bytes().unwrap();
    stream.extend_from_slice(&ugrid_core::encode_frame(4, b"direct").unwrap());
    stream.extend_from_slice(&ugrid_core::encode_frame(MULTICAST_BASE + 1, b"fanout").unwrap());

    // Act: deliver the stream three bytes at a time.
    let frames = decode_in_chunks(&stream, 3);

    // Assert
    assert_eq!(frames.len(), 3);
    assert_eq!(frames[0].address(), Address::Server);
    assert_eq!(
        frames[1].address(),
        Address::Unicast(ConnectionHandle::FIRST)
    );
    assert_eq!(frames[2].address(), Address::Multicast(TopicId(1)));
    assert_eq!(frames[2].payload(), b"fanout");
}

#[test]
fn test_command_request_survives_chunked_transport() {
    let request = CommandRequest::new(CommandName::Connect, json!({"room": "1", "name": "sensor"}));
    let bytes = request.to_frame_bytes().unwrap();

    let frames = decode_in_chunks(&bytes, 1);
    let parsed = CommandRequest::parse(frames[0].payload()).unwrap();

    assert_eq!(parsed, request);
}

#[test]
fn test_reply_frame_is_addressed_to_server_and_parses_back() {
    let bytes = Reply::err("unknown command: bogus").to_frame_bytes().unwrap();

    let frames = decode_in_chunks(&bytes, 64);
    let reply: Reply = serde_json::from_slice(frames[0].payload()).unwrap();

    assert_eq!(frames[0].destination(), 0);
    assert_eq!(reply.cmd, REPLY_CMD);
    assert!(reply.is_error());
    assert!(reply.data.is_none());
}

#[test]
fn test_forwarded_frame_bytes_are_identical_to_received_bytes() {
    // The router forwards `Frame::as_bytes()` verbatim; header bytes 4..8
    // must survive unchanged.
    let original = ugrid_core::encode_frame(MULTICAST_BASE, &[0xde, 0xad, 0xbe, 0xef]).unwrap();

    let frames = decode_in_chunks(&original, 5);

    assert_eq!(frames[0].as_bytes(), original.as_slice());
}
