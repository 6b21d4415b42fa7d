//! Application layer for ugrid-server.
//!
//! Contains the broker's state and routing logic.  Nothing here touches a
//! socket directly: connections are reached through their [`Outbox`], so
//! every use case can be exercised in tests with plain channels.
//!
//! # Modules
//!
//! - [`registry`]  – connection, client and topic registries
//! - [`commands`]  – the server command dispatcher (`connect`, `devices`, …)
//! - [`router`]    – per-connection frame routing ([`Switchboard`])
//! - [`broker`]    – shared state handed to every session
//! - [`outbox`]    – per-connection outbound queue with write acknowledgement
//! - [`stats`]     – routing counters

pub mod broker;
pub mod commands;
pub mod outbox;
pub mod registry;
pub mod router;
pub mod stats;

pub use broker::Broker;
pub use commands::{Command, CommandDispatcher, CommandError};
pub use outbox::{Delivery, OutboundFrame, Outbox};
pub use registry::{RegistryError, Registries};
pub use router::{IgnoreReason, RouteOutcome, Switchboard};
pub use stats::{BrokerStats, StatsSnapshot};
