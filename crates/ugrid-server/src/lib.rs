//! ugrid-server library crate.
//!
//! This crate provides the message-routing switchboard of the ugrid broker:
//! clients attach over raw TCP or WebSocket, and every frame they send is
//! routed to one connection, to every subscriber of a topic, or to the
//! server's own command dispatcher.
//!
//! # Architecture (clean architecture)
//!
//! ```text
//! Clients (binary frames over TCP or WebSocket)
//!         ↕
//! [ugrid-server]
//!   ├── domain/           Pure types: ServerConfig, PeerInfo
//!   ├── application/      The core: registries, Broker, Switchboard router,
//!   │                     CommandDispatcher, Outbox write completion
//!   └── infrastructure/
//!         ├── transport/  Uniform byte-stream adapter (TCP, WebSocket, mock)
//!         ├── session     Per-connection reader loop + writer task
//!         ├── listener    TCP and WebSocket accept loops
//!         └── stats       Periodic message-rate logging
//! ```
//!
//! # Layer rules
//!
//! - `domain` has no I/O and no async.
//! - `application` depends on `domain` and `ugrid-core`; it uses tokio only
//!   for channels and timers, never for sockets.
//! - `infrastructure` depends on all other layers plus sockets and
//!   `tokio-tungstenite`.

/// Domain layer: pure configuration and peer description types.
pub mod domain;

/// Application layer: registries, router and command dispatcher.
pub mod application;

/// Infrastructure layer: transports, sessions and listeners.
pub mod infrastructure;
