//! Binary codec for ugrid frames.
//!
//! Wire format:
//! ```text
//! [destination:4][payload_len:4][payload:N]
//! ```
//! Total header size: 8 bytes. Both header integers are little-endian.
//!
//! The router only interprets the destination.  A decoded [`Frame`] keeps its
//! exact raw bytes so unicast and multicast forwarding can write them out
//! verbatim, header included.

use serde::Serialize;
use thiserror::Error;

use crate::protocol::address::Address;

/// Size of the frame header in bytes.
pub const HEADER_SIZE: usize = 8;

/// Default upper bound for a single frame's payload (16 MiB).
pub const DEFAULT_MAX_PAYLOAD_LEN: usize = 16 * 1024 * 1024;

/// Errors that can occur during frame encoding or decoding.
#[derive(Debug, Error, PartialEq)]
pub enum CodecError {
    /// The byte slice does not yet hold a complete frame.
    ///
    /// This is the normal "wait for more bytes" signal of a streaming decoder.
    #[error("insufficient data: need at least {needed} bytes, got {available}")]
    InsufficientData { needed: usize, available: usize },

    /// The header declares a payload larger than the configured maximum.
    #[error("frame too large: payload of {declared} bytes exceeds limit of {max}")]
    FrameTooLarge { declared: usize, max: usize },

    /// A payload to encode does not fit the 32-bit length field.
    #[error("payload of {0} bytes does not fit in a frame")]
    PayloadTooLong(usize),

    /// A JSON payload could not be serialized.
    #[error("JSON encoding failed: {0}")]
    Json(String),
}

/// One discrete routed message: header plus payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Complete wire bytes, header included.  Always at least `HEADER_SIZE`
    /// long and consistent with the length field.
    raw: Vec<u8>,
}

impl Frame {
    /// Builds a frame for `destination` carrying `payload`.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::PayloadTooLong`] if `payload` exceeds `u32::MAX` bytes.
    pub fn new(destination: u32, payload: &[u8]) -> Result<Self, CodecError> {
        Ok(Self {
            raw: encode_frame(destination, payload)?,
        })
    }

    /// The raw destination field.
    pub fn destination(&self) -> u32 {
        read_u32_le(&self.raw[0..4])
    }

    /// The destination classified into the address space.
    pub fn address(&self) -> Address {
        Address::from(self.destination())
    }

    /// The bytes following the header.
    pub fn payload(&self) -> &[u8] {
        &self.raw[HEADER_SIZE..]
    }

    /// The complete wire bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.raw
    }

    /// Consumes the frame, returning its wire bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.raw
    }

    /// Total encoded length including the header.
    pub fn len(&self) -> usize {
        self.raw.len()
    }

    /// Returns `true` if the payload is empty.
    pub fn is_empty(&self) -> bool {
        self.raw.len() == HEADER_SIZE
    }
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Encodes `payload` for `destination` into a byte vector including the
/// 8-byte header.
///
/// # Errors
///
/// Returns [`CodecError::PayloadTooLong`] if the payload length overflows the
/// 32-bit length field.
///
/// # Examples
///
/// ```rust
/// use ugrid_core::protocol::{decode_frame, encode_frame};
/// use ugrid_core::protocol::codec::DEFAULT_MAX_PAYLOAD_LEN;
///
/// let bytes = encode_frame(42, b"hello").unwrap();
/// let (frame, consumed) = decode_frame(&bytes, DEFAULT_MAX_PAYLOAD_LEN).unwrap();
/// assert_eq!(frame.destination(), 42);
/// assert_eq!(frame.payload(), b"hello");
/// assert_eq!(consumed, bytes.len());
/// ```
pub fn encode_frame(destination: u32, payload: &[u8]) -> Result<Vec<u8>, CodecError> {
    let payload_len =
        u32::try_from(payload.len()).map_err(|_| CodecError::PayloadTooLong(payload.len()))?;

    let mut buf = Vec::with_capacity(HEADER_SIZE + payload.len());
    buf.extend_from_slice(&destination.to_le_bytes());
    buf.extend_from_slice(&payload_len.to_le_bytes());
    buf.extend_from_slice(payload);
    Ok(buf)
}

/// Serializes `value` as JSON and encodes it as a frame for `destination`.
///
/// # Errors
///
/// Returns [`CodecError::Json`] if serialization fails.
pub fn encode_json<T: Serialize>(destination: u32, value: &T) -> Result<Vec<u8>, CodecError> {
    let payload = serde_json::to_vec(value).map_err(|e| CodecError::Json(e.to_string()))?;
    encode_frame(destination, &payload)
}

/// Decodes one [`Frame`] from the beginning of `bytes`.
///
/// Returns the frame and the total number of bytes consumed (header +
/// payload), so the caller can advance their read cursor.
///
/// # Errors
///
/// - [`CodecError::InsufficientData`] if `bytes` does not hold a whole frame yet.
/// - [`CodecError::FrameTooLarge`] if the declared payload exceeds
///   `max_payload_len`.  A stream that produced such a header cannot be
///   resynchronised and should be closed.
pub fn decode_frame(bytes: &[u8], max_payload_len: usize) -> Result<(Frame, usize), CodecError> {
    if bytes.len() < HEADER_SIZE {
        return Err(CodecError::InsufficientData {
            needed: HEADER_SIZE,
            available: bytes.len(),
        });
    }

    let payload_len = read_u32_le(&bytes[4..8]) as usize;
    if payload_len > max_payload_len {
        return Err(CodecError::FrameTooLarge {
            declared: payload_len,
            max: max_payload_len,
        });
    }

    let total = HEADER_SIZE + payload_len;
    if bytes.len() < total {
        return Err(CodecError::InsufficientData {
            needed: total,
            available: bytes.len(),
        });
    }

    Ok((
        Frame {
            raw: bytes[..total].to_vec(),
        },
        total,
    ))
}

// ── Streaming decoder ─────────────────────────────────────────────────────────

/// Incremental decoder turning arbitrary byte chunks into frames.
///
/// Stream transports give no guarantee that one read returns exactly one
/// frame: a read may carry half a frame, or several.  The decoder accumulates
/// chunks and hands out complete frames in arrival order.
///
/// ```rust
/// use ugrid_core::protocol::{encode_frame, FrameDecoder};
///
/// let bytes = encode_frame(5, b"abc").unwrap();
/// let mut decoder = FrameDecoder::default();
///
/// decoder.push(&bytes[..3]);
/// assert!(decoder.next_frame().unwrap().is_none());
///
/// decoder.push(&bytes[3..]);
/// let frame = decoder.next_frame().unwrap().unwrap();
/// assert_eq!(frame.payload(), b"abc");
/// ```
#[derive(Debug)]
pub struct FrameDecoder {
    buf: Vec<u8>,
    max_payload_len: usize,
}

impl FrameDecoder {
    /// Creates a decoder rejecting payloads larger than `max_payload_len`.
    pub fn new(max_payload_len: usize) -> Self {
        Self {
            buf: Vec::with_capacity(4096),
            max_payload_len,
        }
    }

    /// Appends newly received bytes.
    pub fn push(&mut self, chunk: &[u8]) {
        self.buf.extend_from_slice(chunk);
    }

    /// Removes and returns the next complete frame, if one is buffered.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::FrameTooLarge`] when the buffered header declares
    /// an oversized payload.
    pub fn next_frame(&mut self) -> Result<Option<Frame>, CodecError> {
        match decode_frame(&self.buf, self.max_payload_len) {
            Ok((frame, consumed)) => {
                self.buf.drain(..consumed);
                Ok(Some(frame))
            }
            Err(CodecError::InsufficientData { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Number of bytes buffered but not yet returned as frames.
    pub fn buffered_len(&self) -> usize {
        self.buf.len()
    }
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_PAYLOAD_LEN)
    }
}

fn read_u32_le(bytes: &[u8]) -> u32 {
    let mut word = [0u8; 4];
    word.copy_from_slice(&bytes[..4]);
    u32::from_le_bytes(word)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::address::{TopicId, MULTICAST_BASE};

    #[test]
    fn test_encode_frame_writes_little_endian_header() {
        let bytes = encode_frame(0x0102_0304, b"xy").unwrap();
        assert_eq!(&bytes[0..4], &[0x04, 0x03, 0x02, 0x01]);
        assert_eq!(&bytes[4..8], &[2, 0, 0, 0]);
        assert_eq!(&bytes[8..], b"xy");
    }

    #[test]
    fn test_decode_frame_with_short_header_returns_insufficient_data() {
        let result = decode_frame(&[1, 2, 3], DEFAULT_MAX_PAYLOAD_LEN);
        assert_eq!(
            result,
            Err(CodecError::InsufficientData {
                needed: HEADER_SIZE,
                available: 3
            })
        );
    }

    #[test]
    fn test_decode_frame_with_partial_payload_reports_full_length_needed() {
        let bytes = encode_frame(4, b"0123456789").unwrap();
        let result = decode_frame(&bytes[..12], DEFAULT_MAX_PAYLOAD_LEN);
        assert_eq!(
            result,
            Err(CodecError::InsufficientData {
                needed: 18,
                available: 12
            })
        );
    }

    #[test]
    fn test_decode_frame_rejects_oversized_payload() {
        let bytes = encode_frame(4, &[0u8; 32]).unwrap();
        let result = decode_frame(&bytes, 16);
        assert_eq!(
            result,
            Err(CodecError::FrameTooLarge {
                declared: 32,
                max: 16
            })
        );
    }

    #[test]
    fn test_decoded_frame_keeps_raw_bytes() {
        let bytes = encode_frame(MULTICAST_BASE + 2, b"payload").unwrap();
        let (frame, _) = decode_frame(&bytes, DEFAULT_MAX_PAYLOAD_LEN).unwrap();
        assert_eq!(frame.as_bytes(), bytes.as_slice());
        assert_eq!(frame.address(), Address::Multicast(TopicId(2)));
    }

    #[test]
    fn test_empty_payload_frame_is_header_only() {
        let frame = Frame::new(9, b"").unwrap();
        assert!(frame.is_empty());
        assert_eq!(frame.len(), HEADER_SIZE);
        assert!(frame.payload().is_empty());
    }

    #[test]
    fn test_decoder_yields_nothing_until_frame_complete() {
        let bytes = encode_frame(7, b"hello world").unwrap();
        let mut decoder = FrameDecoder::default();

        for byte in &bytes[..bytes.len() - 1] {
            decoder.push(std::slice::from_ref(byte));
            assert!(decoder.next_frame().unwrap().is_none());
        }
        decoder.push(&bytes[bytes.len() - 1..]);

        let frame = decoder.next_frame().unwrap().expect("frame must be complete");
        assert_eq!(frame.payload(), b"hello world");
        assert_eq!(decoder.buffered_len(), 0);
    }

    #[test]
    fn test_decoder_splits_coalesced_frames_in_order() {
        let mut buf = encode_frame(4, b"first").unwrap();
        buf.extend_from_slice(&encode_frame(5, b"second").unwrap());
        buf.extend_from_slice(&encode_frame(6, b"thi").unwrap()[..10]);

        let mut decoder = FrameDecoder::default();
        decoder.push(&buf);

        assert_eq!(decoder.next_frame().unwrap().unwrap().payload(), b"first");
        assert_eq!(decoder.next_frame().unwrap().unwrap().payload(), b"second");
        assert!(decoder.next_frame().unwrap().is_none());
        assert_eq!(decoder.buffered_len(), 10);
    }

    #[test]
    fn test_decoder_propagates_frame_too_large() {
        let mut decoder = FrameDecoder::new(4);
        decoder.push(&encode_frame(4, b"too long").unwrap());
        assert!(matches!(
            decoder.next_frame(),
            Err(CodecError::FrameTooLarge { declared: 8, max: 4 })
        ));
    }

    #[test]
    fn test_encode_json_produces_decodable_json_payload() {
        let bytes = encode_json(0, &serde_json::json!({"cmd": "reply"})).unwrap();
        let (frame, _) = decode_frame(&bytes, DEFAULT_MAX_PAYLOAD_LEN).unwrap();
        let value: serde_json::Value = serde_json::from_slice(frame.payload()).unwrap();
        assert_eq!(value["cmd"], "reply");
        assert_eq!(frame.destination(), 0);
    }
}
