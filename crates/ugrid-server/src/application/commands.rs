//! Server command dispatcher.
//!
//! Frames addressed to `0` carry a JSON [`CommandRequest`].  The dispatcher
//! parses it into a typed [`Command`], applies it to the registries on
//! behalf of the calling connection, and produces the [`Reply`] that is
//! written back to the caller.
//!
//! | `cmd`         | `data`                   | result                          |
//! |---------------|--------------------------|---------------------------------|
//! | `connect`     | metadata object (opt.)   | `{id, token, registryIndex}`    |
//! | `devices`     | query object (opt.)      | `[{id, registryIndex, remoteAddress}]` |
//! | `get`         | client id                | metadata object or `null`       |
//! | `id`          | client id                | registry index or `null`        |
//! | `tid`         | topic name               | topic id                        |
//! | `subscribe`   | topic name               | `null`                          |
//! | `unsubscribe` | topic name               | `null`                          |
//!
//! A failing command never affects the connection: the caller simply gets a
//! reply carrying `error` instead of `data`.

use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::debug;
use ugrid_core::protocol::CommandName;
use ugrid_core::{CommandRequest, ConnectReply, ConnectionHandle, Reply};
use uuid::Uuid;

use crate::application::registry::{ClientRecord, RegistryError, Registries};

/// Errors a command can fail with.  The `Display` text becomes the reply's
/// `error` field.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("unknown command `{0}`")]
    UnknownCommand(String),

    #[error("malformed request: {0}")]
    MalformedRequest(#[from] serde_json::Error),

    #[error("invalid argument for `{command}`: {reason}")]
    InvalidArgument {
        command: CommandName,
        reason: &'static str,
    },

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("failed to encode result: {0}")]
    Encode(String),
}

/// A parsed, validated server command.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Register (or re-attach) the caller as a client.
    Connect {
        id: Option<Uuid>,
        data: Option<Map<String, Value>>,
    },
    /// List live clients whose metadata matches the query.
    Devices { query: Map<String, Value> },
    /// Metadata of a client.
    Get { client: String },
    /// Registry index of a client.
    Id { client: String },
    /// Id of a topic, creating it if needed.
    Tid { topic: String },
    Subscribe { topic: String },
    Unsubscribe { topic: String },
}

impl Command {
    /// Validates a raw request.
    ///
    /// # Errors
    ///
    /// [`CommandError::UnknownCommand`] for an unrecognised `cmd`, and
    /// [`CommandError::InvalidArgument`] when `data` has the wrong shape.
    pub fn from_request(request: CommandRequest) -> Result<Self, CommandError> {
        let name = CommandName::parse(&request.cmd)
            .ok_or_else(|| CommandError::UnknownCommand(request.cmd.clone()))?;
        let data = request.data;
        Ok(match name {
            CommandName::Connect => Command::Connect {
                id: request.id,
                data: optional_object(name, data)?,
            },
            CommandName::Devices => Command::Devices {
                query: optional_object(name, data)?.unwrap_or_default(),
            },
            CommandName::Get => Command::Get {
                client: client_argument(name, data)?,
            },
            CommandName::Id => Command::Id {
                client: client_argument(name, data)?,
            },
            CommandName::Tid => Command::Tid {
                topic: topic_argument(name, data)?,
            },
            CommandName::Subscribe => Command::Subscribe {
                topic: topic_argument(name, data)?,
            },
            CommandName::Unsubscribe => Command::Unsubscribe {
                topic: topic_argument(name, data)?,
            },
        })
    }

    pub fn name(&self) -> CommandName {
        match self {
            Command::Connect { .. } => CommandName::Connect,
            Command::Devices { .. } => CommandName::Devices,
            Command::Get { .. } => CommandName::Get,
            Command::Id { .. } => CommandName::Id,
            Command::Tid { .. } => CommandName::Tid,
            Command::Subscribe { .. } => CommandName::Subscribe,
            Command::Unsubscribe { .. } => CommandName::Unsubscribe,
        }
    }

    /// Executes the command for connection `caller` and returns the reply
    /// `data`.
    ///
    /// # Errors
    ///
    /// Propagates registry failures as [`CommandError::Registry`].
    pub fn apply(
        self,
        registries: &mut Registries,
        caller: ConnectionHandle,
    ) -> Result<Value, CommandError> {
        match self {
            Command::Connect { id, data } => {
                let id = registries.register_client(caller, id, data)?;
                to_json(&ConnectReply {
                    id,
                    token: 0,
                    registry_index: caller.get(),
                })
            }
            Command::Devices { query } => to_json(&registries.lookup_by_query(&query)),
            Command::Get { client } => Ok(find_client(registries, &client)
                .map(|c| Value::Object(c.data.clone()))
                .unwrap_or(Value::Null)),
            Command::Id { client } => Ok(find_client(registries, &client)
                .map(|c| Value::from(c.registry_index.get()))
                .unwrap_or(Value::Null)),
            Command::Tid { topic } => Ok(Value::from(registries.topic_id(&topic)?.0)),
            Command::Subscribe { topic } => {
                registries.subscribe(caller, &topic)?;
                Ok(Value::Null)
            }
            Command::Unsubscribe { topic } => {
                registries.unsubscribe(caller, &topic)?;
                Ok(Value::Null)
            }
        }
    }
}

/// Parses and executes server-directed requests.
#[derive(Debug, Clone, Copy, Default)]
pub struct CommandDispatcher;

impl CommandDispatcher {
    pub fn new() -> Self {
        Self
    }

    /// Runs one request payload and always produces a reply.
    pub fn dispatch(
        &self,
        registries: &mut Registries,
        caller: ConnectionHandle,
        payload: &[u8],
    ) -> Reply {
        match self.execute(registries, caller, payload) {
            Ok(data) => Reply::ok(data),
            Err(e) => {
                debug!("command from {caller} failed: {e}");
                Reply::err(e.to_string())
            }
        }
    }

    /// Like [`CommandDispatcher::dispatch`] but returns the typed result.
    ///
    /// # Errors
    ///
    /// Any [`CommandError`].
    pub fn execute(
        &self,
        registries: &mut Registries,
        caller: ConnectionHandle,
        payload: &[u8],
    ) -> Result<Value, CommandError> {
        let request = CommandRequest::parse(payload)?;
        let command = Command::from_request(request)?;
        debug!("{caller} -> {}", command.name());
        command.apply(registries, caller)
    }
}

// ── Argument helpers ──────────────────────────────────────────────────────────

fn optional_object(
    command: CommandName,
    data: Value,
) -> Result<Option<Map<String, Value>>, CommandError> {
    match data {
        Value::Null => Ok(None),
        Value::Object(map) => Ok(Some(map)),
        _ => Err(CommandError::InvalidArgument {
            command,
            reason: "expected an object",
        }),
    }
}

fn client_argument(command: CommandName, data: Value) -> Result<String, CommandError> {
    match data {
        Value::String(id) => Ok(id),
        _ => Err(CommandError::InvalidArgument {
            command,
            reason: "expected a client id string",
        }),
    }
}

/// Topic names are strings; numbers are accepted and used in their decimal
/// spelling.
fn topic_argument(command: CommandName, data: Value) -> Result<String, CommandError> {
    match data {
        Value::String(name) => Ok(name),
        Value::Number(n) => Ok(n.to_string()),
        _ => Err(CommandError::InvalidArgument {
            command,
            reason: "expected a topic name",
        }),
    }
}

/// A string that is not a valid id cannot name any client.
fn find_client<'a>(registries: &'a Registries, id: &str) -> Option<&'a ClientRecord> {
    let id = Uuid::parse_str(id).ok()?;
    registries.clients.get(&id)
}

fn to_json<T: Serialize>(value: &T) -> Result<Value, CommandError> {
    serde_json::to_value(value).map_err(|e| CommandError::Encode(e.to_string()))
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::outbox::Outbox;
    use crate::domain::PeerInfo;
    use serde_json::json;

    fn open(reg: &mut Registries) -> ConnectionHandle {
        let (outbox, _rx) = Outbox::channel(1);
        reg.register_connection(outbox, PeerInfo::memory()).unwrap()
    }

    fn run(reg: &mut Registries, caller: ConnectionHandle, request: Value) -> Reply {
        let payload = serde_json::to_vec(&request).unwrap();
        CommandDispatcher::new().dispatch(reg, caller, &payload)
    }

    fn connect(reg: &mut Registries, caller: ConnectionHandle, data: Value) -> Uuid {
        let reply = run(reg, caller, json!({"cmd": "connect", "data": data}));
        let data = reply.data.expect("connect succeeds");
        serde_json::from_value::<ConnectReply>(data).unwrap().id
    }

    #[test]
    fn test_connect_reply_shape() {
        // Arrange
        let mut reg = Registries::new();
        let caller = open(&mut reg);

        // Act
        let reply = run(&mut reg, caller, json!({"cmd": "connect", "data": {"room": "1"}}));

        // Assert
        assert_eq!(reply.cmd, "reply");
        assert!(reply.error.is_none());
        let data = reply.data.unwrap();
        assert_eq!(data["token"], json!(0));
        assert_eq!(data["registryIndex"], json!(caller.get()));
        assert!(data["id"].is_string());
    }

    #[test]
    fn test_connect_with_supplied_id_echoes_it() {
        let mut reg = Registries::new();
        let caller = open(&mut reg);
        let id = Uuid::new_v4();

        let reply = run(&mut reg, caller, json!({"cmd": "connect", "id": id}));

        assert_eq!(reply.data.unwrap()["id"], json!(id.to_string()));
    }

    #[test]
    fn test_unknown_command_yields_error_reply() {
        let mut reg = Registries::new();
        let caller = open(&mut reg);

        let reply = run(&mut reg, caller, json!({"cmd": "bogus"}));

        assert!(reply.is_error());
        assert!(reply.data.is_none());
        assert!(reply.error.unwrap().contains("bogus"));
    }

    #[test]
    fn test_non_json_payload_yields_error_reply() {
        let mut reg = Registries::new();
        let caller = open(&mut reg);

        let reply = CommandDispatcher::new().dispatch(&mut reg, caller, b"not json");

        assert!(reply.is_error());
    }

    #[test]
    fn test_devices_filters_by_metadata() {
        // Arrange: two clients in room 1, one in room 2.
        let mut reg = Registries::new();
        let a = open(&mut reg);
        let b = open(&mut reg);
        let c = open(&mut reg);
        let a_id = connect(&mut reg, a, json!({"room": "1"}));
        connect(&mut reg, b, json!({"room": "2"}));
        let c_id = connect(&mut reg, c, json!({"room": "1"}));

        // Act
        let reply = run(&mut reg, a, json!({"cmd": "devices", "data": {"room": "1"}}));

        // Assert
        let list = reply.data.unwrap();
        let ids: Vec<&str> = list
            .as_array()
            .unwrap()
            .iter()
            .map(|d| d["id"].as_str().unwrap())
            .collect();
        assert_eq!(ids, vec![a_id.to_string(), c_id.to_string()]);
        assert_eq!(list[0]["registryIndex"], json!(a.get()));
    }

    #[test]
    fn test_devices_without_query_lists_everyone() {
        let mut reg = Registries::new();
        let a = open(&mut reg);
        connect(&mut reg, a, json!({}));

        let reply = run(&mut reg, a, json!({"cmd": "devices"}));

        assert_eq!(reply.data.unwrap().as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_get_and_id_resolve_known_client() {
        let mut reg = Registries::new();
        let a = open(&mut reg);
        let id = connect(&mut reg, a, json!({"name": "lamp"}));

        let get = run(&mut reg, a, json!({"cmd": "get", "data": id.to_string()}));
        let idx = run(&mut reg, a, json!({"cmd": "id", "data": id.to_string()}));

        assert_eq!(get.data, Some(json!({"name": "lamp"})));
        assert_eq!(idx.data, Some(json!(a.get())));
    }

    #[test]
    fn test_get_unknown_client_is_null() {
        let mut reg = Registries::new();
        let a = open(&mut reg);

        let reply = run(&mut reg, a, json!({"cmd": "get", "data": "nobody"}));

        assert_eq!(reply.data, Some(Value::Null));
        assert!(reply.error.is_none());
    }

    #[test]
    fn test_id_with_non_string_argument_is_invalid() {
        let mut reg = Registries::new();
        let a = open(&mut reg);

        let reply = run(&mut reg, a, json!({"cmd": "id", "data": 12}));

        assert!(reply.is_error());
    }

    #[test]
    fn test_tid_is_stable_and_works_before_connect() {
        let mut reg = Registries::new();
        let a = open(&mut reg);

        let first = run(&mut reg, a, json!({"cmd": "tid", "data": "room1"}));
        let other = run(&mut reg, a, json!({"cmd": "tid", "data": "room2"}));
        let again = run(&mut reg, a, json!({"cmd": "tid", "data": "room1"}));

        assert_eq!(first.data, Some(json!(0)));
        assert_eq!(other.data, Some(json!(1)));
        assert_eq!(again.data, Some(json!(0)));
    }

    #[test]
    fn test_subscribe_before_connect_is_error() {
        let mut reg = Registries::new();
        let a = open(&mut reg);

        let reply = run(&mut reg, a, json!({"cmd": "subscribe", "data": "room1"}));

        assert!(reply.error.unwrap().contains("connect"));
    }

    #[test]
    fn test_subscribe_then_unsubscribe() {
        let mut reg = Registries::new();
        let a = open(&mut reg);
        connect(&mut reg, a, json!({}));

        let sub = run(&mut reg, a, json!({"cmd": "subscribe", "data": "room1"}));
        let topic = reg.topics.find("room1").unwrap();
        assert_eq!(sub.data, Some(Value::Null));
        assert_eq!(reg.topics.subscribers(topic), &[a]);

        let unsub = run(&mut reg, a, json!({"cmd": "unsubscribe", "data": "room1"}));
        assert_eq!(unsub.data, Some(Value::Null));
        assert!(reg.topics.subscribers(topic).is_empty());
    }

    #[test]
    fn test_numeric_topic_name_is_accepted() {
        let mut reg = Registries::new();
        let a = open(&mut reg);
        connect(&mut reg, a, json!({}));

        run(&mut reg, a, json!({"cmd": "subscribe", "data": 7}));

        assert!(reg.topics.find("7").is_some());
    }

    #[test]
    fn test_connect_with_non_object_data_is_invalid() {
        let result = Command::from_request(CommandRequest::new(CommandName::Connect, json!(5)));
        assert!(matches!(
            result,
            Err(CommandError::InvalidArgument {
                command: CommandName::Connect,
                ..
            })
        ));
    }
}
