//! JSON envelopes for frames addressed to the server.
//!
//! A frame with destination `0` carries a [`CommandRequest`] as its payload.
//! The server answers on the same connection with a [`Reply`] frame, also
//! addressed `0`.
//!
//! # Request shape
//!
//! ```json
//! {"cmd":"connect","data":{"room":"1"}}
//! {"cmd":"connect","id":"6f1c...","data":{"room":"1"}}
//! {"cmd":"subscribe","data":"room1"}
//! ```
//!
//! # Reply shape
//!
//! ```json
//! {"cmd":"reply","data":{"id":"6f1c...","token":0,"registryIndex":4}}
//! {"cmd":"reply","error":"unknown command: bogus"}
//! ```
//!
//! On success `data` is always present (possibly `null`); on failure only
//! `error` is present.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::protocol::address::SERVER_ADDRESS;
use crate::protocol::codec::{encode_json, CodecError};

/// The `cmd` value of every server reply.
pub const REPLY_CMD: &str = "reply";

/// The closed set of operations the server's command dispatcher understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandName {
    /// Register (or re-attach) the calling connection as a client.
    Connect,
    /// Query live clients by metadata.
    Devices,
    /// Fetch a client's metadata by id.
    Get,
    /// Fetch a client's registry index by id.
    Id,
    /// Resolve (and lazily create) a topic id by name.
    Tid,
    /// Add the caller to a topic's subscriber list.
    Subscribe,
    /// Remove the caller from a topic's subscriber list.
    Unsubscribe,
}

impl CommandName {
    /// All commands, in a stable order.
    pub const ALL: [CommandName; 7] = [
        CommandName::Connect,
        CommandName::Devices,
        CommandName::Get,
        CommandName::Id,
        CommandName::Tid,
        CommandName::Subscribe,
        CommandName::Unsubscribe,
    ];

    /// The wire spelling of this command.
    pub fn as_str(self) -> &'static str {
        match self {
            CommandName::Connect => "connect",
            CommandName::Devices => "devices",
            CommandName::Get => "get",
            CommandName::Id => "id",
            CommandName::Tid => "tid",
            CommandName::Subscribe => "subscribe",
            CommandName::Unsubscribe => "unsubscribe",
        }
    }

    /// Looks up a command by its wire spelling.
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == name)
    }
}

impl fmt::Display for CommandName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Request ───────────────────────────────────────────────────────────────────

/// A request for the server, carried in a frame addressed to `0`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandRequest {
    /// Name of the operation (see [`CommandName`]).
    pub cmd: String,

    /// Operation-specific argument.  `null` when absent.
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub data: Value,

    /// Client id supplied to `connect` to re-attach an existing identity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
}

impl CommandRequest {
    /// Creates a request for `cmd` with the given argument.
    pub fn new(cmd: CommandName, data: Value) -> Self {
        Self {
            cmd: cmd.as_str().to_string(),
            data,
            id: None,
        }
    }

    /// Attaches a supplied client id (used by `connect`).
    pub fn with_id(mut self, id: Uuid) -> Self {
        self.id = Some(id);
        self
    }

    /// Parses a request from a frame payload.
    ///
    /// # Errors
    ///
    /// Returns the JSON error if the payload is not a valid request object.
    pub fn parse(payload: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(payload)
    }

    /// Encodes this request as a complete frame addressed to the server.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError`] if serialization fails.
    pub fn to_frame_bytes(&self) -> Result<Vec<u8>, CodecError> {
        encode_json(SERVER_ADDRESS, self)
    }
}

// ── Reply ─────────────────────────────────────────────────────────────────────

/// The reply envelope written back to the connection that sent a request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reply {
    /// Always [`REPLY_CMD`].
    pub cmd: String,

    /// Result of a successful command.  A present `null` decodes as
    /// `Some(Value::Null)`; only a missing key is `None`.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "present_value"
    )]
    pub data: Option<Value>,

    /// Failure description; present only when the command failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Reply {
    /// A successful reply carrying `data` (which may be `null`).
    pub fn ok(data: Value) -> Self {
        Self {
            cmd: REPLY_CMD.to_string(),
            data: Some(data),
            error: None,
        }
    }

    /// A failed reply carrying `message`.
    pub fn err(message: impl Into<String>) -> Self {
        Self {
            cmd: REPLY_CMD.to_string(),
            data: None,
            error: Some(message.into()),
        }
    }

    /// Returns `true` if this reply reports a failure.
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Encodes this reply as a complete frame (destination `0`).
    ///
    /// # Errors
    ///
    /// Returns [`CodecError`] if serialization fails.
    pub fn to_frame_bytes(&self) -> Result<Vec<u8>, CodecError> {
        encode_json(SERVER_ADDRESS, self)
    }
}

/// Maps any present value, `null` included, to `Some`.  Used with
/// `#[serde(default)]` so that an absent key stays `None`.
fn present_value<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

// ── Result payloads ───────────────────────────────────────────────────────────

/// Result of a successful `connect`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectReply {
    /// Durable client id (generated or supplied).
    pub id: Uuid,
    /// Session token; always `0`, there is no authentication.
    pub token: u32,
    /// Unicast address of the registered connection.
    pub registry_index: u32,
}

/// One entry of a `devices` query result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
    /// Durable client id.
    pub id: Uuid,
    /// Unicast address of the client's connection.
    pub registry_index: u32,
    /// Remote address of the client's transport, when known.
    pub remote_address: Option<String>,
}

// ── Tests ─────────────────────────────────────────────────────────────────────
