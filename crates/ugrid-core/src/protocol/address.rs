//! Destination address space.
//!
//! Every frame carries an unsigned 32-bit destination.  The value alone
//! decides how the server delivers the frame:
//!
//! ```text
//! 0                         server command (JSON request for the server)
//! 1                         broadcast        (reserved)
//! 2                         generic multicast (reserved)
//! 3                         foreign / relay  (reserved)
//! 4 .. 2^32 - 2^16 - 1      unicast: the value is a connection handle
//! 2^32 - 2^16 .. 2^32 - 1   multicast: value - 2^32 + 2^16 is a topic id
//! ```
//!
//! The multicast range reserves exactly 2^16 topic ids, so a [`TopicId`] is a
//! `u16` and every multicast address maps to a valid id.

use std::fmt;

use serde::{Deserialize, Serialize};

/// First address of the multicast range (`2^32 - 2^16`).
pub const MULTICAST_BASE: u32 = 0xFFFF_0000;

/// Address of the server itself.
pub const SERVER_ADDRESS: u32 = 0;

/// A connection handle: the unicast address of one live connection.
///
/// Handles are assigned sequentially starting at [`ConnectionHandle::FIRST`];
/// the values 0–3 are reserved address meanings and never name a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionHandle(u32);

impl ConnectionHandle {
    /// The first handle ever assigned.
    pub const FIRST: ConnectionHandle = ConnectionHandle(4);

    /// The last value that still falls inside the unicast range.
    pub const LAST: ConnectionHandle = ConnectionHandle(MULTICAST_BASE - 1);

    /// Wraps a raw value, returning `None` if it lies outside the unicast range.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use ugrid_core::ConnectionHandle;
    ///
    /// assert!(ConnectionHandle::new(4).is_some());
    /// assert!(ConnectionHandle::new(0).is_none());
    /// ```
    pub fn new(raw: u32) -> Option<Self> {
        if (Self::FIRST.0..=Self::LAST.0).contains(&raw) {
            Some(Self(raw))
        } else {
            None
        }
    }

    /// Returns the raw address value.
    pub fn get(self) -> u32 {
        self.0
    }

    /// Returns the handle that follows this one, or `None` once the unicast
    /// range is exhausted.
    pub fn next(self) -> Option<Self> {
        self.0.checked_add(1).and_then(Self::new)
    }
}

impl fmt::Display for ConnectionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A compact topic identifier, dense and assigned in creation order from 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TopicId(pub u16);

impl TopicId {
    /// Returns the multicast destination address for this topic.
    ///
    /// ```rust
    /// use ugrid_core::{TopicId, MULTICAST_BASE};
    ///
    /// assert_eq!(TopicId(3).address(), MULTICAST_BASE + 3);
    /// ```
    pub fn address(self) -> u32 {
        MULTICAST_BASE + u32::from(self.0)
    }

    /// Position of this topic in a dense topic table.
    pub fn index(self) -> usize {
        usize::from(self.0)
    }
}

impl fmt::Display for TopicId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "topic:{}", self.0)
    }
}

/// The delivery semantics of a destination address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Address {
    /// `0` – the payload is a request for the server's command dispatcher.
    Server,
    /// `1` – broadcast to every connection (reserved, not implemented).
    Broadcast,
    /// `2` – generic multicast (reserved, not implemented).
    GenericMulticast,
    /// `3` – foreign/relay delivery (reserved, not implemented).
    Relay,
    /// Deliver to exactly one connection.
    Unicast(ConnectionHandle),
    /// Deliver to every subscriber of a topic.
    Multicast(TopicId),
}

impl Address {
    /// Returns `true` for the three reserved, unimplemented addresses.
    pub fn is_reserved(self) -> bool {
        matches!(
            self,
            Address::Broadcast | Address::GenericMulticast | Address::Relay
        )
    }

    /// Converts the address back to its wire value.
    pub fn to_wire(self) -> u32 {
        match self {
            Address::Server => SERVER_ADDRESS,
            Address::Broadcast => 1,
            Address::GenericMulticast => 2,
            Address::Relay => 3,
            Address::Unicast(handle) => handle.get(),
            Address::Multicast(topic) => topic.address(),
        }
    }
}

impl From<u32> for Address {
    fn from(raw: u32) -> Self {
        match raw {
            0 => Address::Server,
            1 => Address::Broadcast,
            2 => Address::GenericMulticast,
            3 => Address::Relay,
            // The subtraction fits in u16 because the multicast range is
            // exactly 2^16 values wide.
            r if r >= MULTICAST_BASE => Address::Multicast(TopicId((r - MULTICAST_BASE) as u16)),
            r => Address::Unicast(ConnectionHandle(r)),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
