//! Infrastructure layer for ugrid-server.
//!
//! Everything that touches the network lives here:
//!
//! - [`transport`] – the Transport Adapter (TCP, WebSocket, in-memory)
//! - [`session`]   – drives one connection: read, decode, route, write
//! - [`listener`]  – TCP and WebSocket accept loops
//! - [`stats`]     – periodic statistics logging
//!
//! **Dependency rule**: this layer may depend on `application`, `domain` and
//! `ugrid_core`, but MUST NOT be imported by the `application` or `domain`
//! layers.

pub mod listener;
pub mod session;
pub mod stats;
pub mod transport;

pub use listener::{Listener, ListenerKind};
pub use session::run_session;
pub use stats::run_stats_reporter;
