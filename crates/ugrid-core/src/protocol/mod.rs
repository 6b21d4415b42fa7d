//! Protocol module containing the address space, the frame codec and the
//! server-command envelopes.

pub mod address;
pub mod codec;
pub mod messages;

pub use address::{Address, ConnectionHandle, TopicId, MULTICAST_BASE};
pub use codec::{decode_frame, encode_frame, encode_json, CodecError, Frame, FrameDecoder};
pub use messages::*;
