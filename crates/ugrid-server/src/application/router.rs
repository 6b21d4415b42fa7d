//! Per-connection message router ("switchboard").
//!
//! Every inbound frame is routed by its destination address alone:
//!
//! | destination            | action                                         |
//! |------------------------|------------------------------------------------|
//! | `0`                    | run the command, reply to the sender           |
//! | `1`–`3`                | reserved: ignored                              |
//! | `4`..`MULTICAST_BASE`  | forward verbatim to that one connection        |
//! | `MULTICAST_BASE`..     | forward verbatim to every topic subscriber     |
//!
//! Forwarded frames are byte-for-byte identical to what was received: the
//! destination header is preserved and the payload is never inspected.
//!
//! # Completion
//!
//! [`Switchboard::on_frame`] returns only after every recipient's write has
//! completed, failed, or timed out.  The session awaits it before reading
//! the next frame, which is how a sender is throttled to the pace of its
//! slowest live recipient.  Recipients that are not live are skipped.

use std::sync::Arc;

use futures_util::future::join_all;
use tracing::{debug, info, warn};
use ugrid_core::{Address, ConnectionHandle, Frame, TopicId};

use crate::application::broker::Broker;
use crate::application::commands::CommandDispatcher;
use crate::application::outbox::Delivery;

/// Why a frame was dropped without delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// Destination `1`, `2` or `3`.
    ReservedAddress(u32),
    /// Unicast/multicast from a connection that has not sent `connect`.
    NotRegistered,
}

/// What happened to one inbound frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteOutcome {
    /// Forwarded to a single connection.
    Unicast {
        target: ConnectionHandle,
        delivery: Delivery,
    },
    /// Forwarded to the subscribers of a topic.
    Multicast {
        topic: TopicId,
        /// Subscribers the frame was written to.
        delivered: usize,
        /// Subscribers that were not live, failed, or timed out.
        dropped: usize,
    },
    /// A server command was executed and its reply sent back.
    Command { ok: bool, delivery: Delivery },
    Ignored(IgnoreReason),
}

/// Router bound to one connection.
#[derive(Debug)]
pub struct Switchboard {
    broker: Arc<Broker>,
    handle: ConnectionHandle,
    dispatcher: CommandDispatcher,
}

impl Switchboard {
    pub fn new(broker: Arc<Broker>, handle: ConnectionHandle) -> Self {
        Self {
            broker,
            handle,
            dispatcher: CommandDispatcher::new(),
        }
    }

    /// The connection this router serves.
    pub fn handle(&self) -> ConnectionHandle {
        self.handle
    }

    pub fn broker(&self) -> &Arc<Broker> {
        &self.broker
    }

    /// Routes one complete frame received on this connection.
    pub async fn on_frame(&self, frame: Frame) -> RouteOutcome {
        let outcome = match frame.address() {
            Address::Server => self.run_command(&frame).await,
            Address::Unicast(target) => self.unicast(target, frame).await,
            Address::Multicast(topic) => self.multicast(topic, frame).await,
            reserved => {
                debug!(
                    "{}: frame to reserved address {} ignored",
                    self.handle,
                    reserved.to_wire()
                );
                RouteOutcome::Ignored(IgnoreReason::ReservedAddress(reserved.to_wire()))
            }
        };
        self.broker.stats().record(&outcome);
        outcome
    }

    /// Unregisters this connection.  Safe to call more than once.
    pub async fn on_close(&self) {
        let mut registries = self.broker.registries().await;
        if let Some(entry) = registries.drop_connection(self.handle) {
            match entry.client {
                Some(id) => info!(
                    "connection {} closed (client {id}); {} live",
                    self.handle,
                    registries.connections.len()
                ),
                None => info!(
                    "connection {} closed; {} live",
                    self.handle,
                    registries.connections.len()
                ),
            }
        }
    }

    async fn run_command(&self, frame: &Frame) -> RouteOutcome {
        let (reply, own_outbox) = {
            let mut registries = self.broker.registries().await;
            let reply = self
                .dispatcher
                .dispatch(&mut registries, self.handle, frame.payload());
            let outbox = registries
                .connections
                .get(self.handle)
                .map(|entry| entry.outbox.clone());
            (reply, outbox)
        };
        let ok = !reply.is_error();

        let bytes = match reply.to_frame_bytes() {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("{}: could not encode reply: {e}", self.handle);
                return RouteOutcome::Command {
                    ok: false,
                    delivery: Delivery::Closed,
                };
            }
        };
        let delivery = match own_outbox {
            Some(outbox) => {
                outbox
                    .deliver(Arc::from(bytes), self.broker.write_timeout())
                    .await
            }
            None => Delivery::Closed,
        };
        RouteOutcome::Command { ok, delivery }
    }

    async fn unicast(&self, target: ConnectionHandle, frame: Frame) -> RouteOutcome {
        let outbox = {
            let registries = self.broker.registries().await;
            if !registries.is_registered(self.handle) {
                debug!("{}: unicast before connect ignored", self.handle);
                return RouteOutcome::Ignored(IgnoreReason::NotRegistered);
            }
            registries
                .connections
                .get(target)
                .map(|entry| entry.outbox.clone())
        };
        let delivery = match outbox {
            Some(outbox) => {
                outbox
                    .deliver(Arc::from(frame.into_bytes()), self.broker.write_timeout())
                    .await
            }
            None => {
                debug!("{}: unicast to {target} which is not live", self.handle);
                Delivery::Closed
            }
        };
        if delivery == Delivery::TimedOut {
            warn!("{}: write to {target} timed out", self.handle);
        }
        RouteOutcome::Unicast { target, delivery }
    }

    async fn multicast(&self, topic: TopicId, frame: Frame) -> RouteOutcome {
        let recipients = {
            let mut registries = self.broker.registries().await;
            if !registries.is_registered(self.handle) {
                debug!("{}: multicast before connect ignored", self.handle);
                return RouteOutcome::Ignored(IgnoreReason::NotRegistered);
            }
            registries.record_publication(self.handle, topic);
            let registries = &*registries;
            let outboxes: Vec<_> = registries
                .topics
                .subscribers(topic)
                .iter()
                .map(|h| registries.connections.get(*h).map(|entry| entry.outbox.clone()))
                .collect();
            outboxes
        };

        let not_live = recipients.iter().filter(|r| r.is_none()).count();
        let bytes: Arc<[u8]> = Arc::from(frame.into_bytes());
        let deadline = self.broker.write_timeout();
        let deliveries = join_all(recipients.into_iter().flatten().map(|outbox| {
            let bytes = Arc::clone(&bytes);
            async move { outbox.deliver(bytes, deadline).await }
        }))
        .await;

        let delivered = deliveries.iter().filter(|d| d.is_written()).count();
        let timed_out = deliveries
            .iter()
            .filter(|d| **d == Delivery::TimedOut)
            .count();
        if timed_out > 0 {
            warn!("{}: {timed_out} write(s) to {topic} timed out", self.handle);
        }
        RouteOutcome::Multicast {
            topic,
            delivered,
            dropped: not_live + deliveries.len() - delivered,
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
