//! Domain layer for ugrid-server.
//!
//! Pure types with no dependencies on sockets, async runtimes, or external
//! state, so they are trivially testable and shareable across layers.
//!
//! # What belongs in the domain layer?
//!
//! - Runtime configuration ([`ServerConfig`])
//! - The description of a connected peer ([`PeerInfo`])
//!
//! # What does NOT belong here?
//!
//! - Any `tokio`, `TcpStream`, or `WebSocket` types
//! - Registry state (that is the application layer)

pub mod config;
pub mod peer;

pub use config::{ConfigError, ServerConfig};
pub use peer::{PeerInfo, TransportKind};
