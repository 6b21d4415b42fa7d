//! # ugrid-core
//!
//! Shared library for the ugrid message broker containing the address space,
//! the binary frame codec, and the JSON envelopes exchanged with the server.
//!
//! This crate is used by the server and by any Rust client that wants to talk
//! to it.  It has zero dependencies on sockets, async runtimes, or OS APIs.
//!
//! # Architecture overview (for beginners)
//!
//! ugrid is a connection-oriented message broker: many clients attach to one
//! server and exchange small binary frames.  Every frame starts with a 32-bit
//! *destination address*.  The server looks only at that address to decide
//! where the frame goes:
//!
//! - **`protocol::address`** – How a destination number is interpreted.  One
//!   value means "the server itself", a large range means "one connection"
//!   (unicast), and the top 2^16 values mean "every subscriber of a topic"
//!   (multicast).
//!
//! - **`protocol::codec`** – How bytes travel over the network.  Frames are an
//!   8-byte header plus an opaque payload, decoded incrementally from a byte
//!   stream.
//!
//! - **`protocol::messages`** – The JSON request/reply objects used when a
//!   frame is addressed to the server (register, subscribe, query, ...).

pub mod protocol;

// Re-export the most-used types at the crate root so callers can write
// `ugrid_core::Frame` instead of `ugrid_core::protocol::codec::Frame`.
pub use protocol::address::{Address, ConnectionHandle, TopicId, MULTICAST_BASE};
pub use protocol::codec::{decode_frame, encode_frame, CodecError, Frame, FrameDecoder};
pub use protocol::messages::{CommandRequest, ConnectReply, DeviceInfo, Reply};
