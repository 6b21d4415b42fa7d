//! Client registry: durable client identities and their metadata.
//!
//! A client record outlives its connection.  When the connection drops, the
//! record's `connection` is cleared (the weak back-reference becomes absent)
//! but the identity, metadata and subscriptions stay, so the client can
//! re-attach later by supplying its id to `connect`.
//!
//! # HashMap choice
//!
//! A `HashMap<Uuid, ClientRecord>` provides O(1) lookup by id.  Iteration
//! order is not guaranteed, so query results are sorted by registry index
//! before they are returned.

use std::collections::{BTreeSet, HashMap};

use serde_json::{Map, Value};
use ugrid_core::{ConnectionHandle, TopicId};
use uuid::Uuid;

/// Everything the broker knows about one client.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientRecord {
    /// Durable identifier, generated or supplied on `connect`.
    pub id: Uuid,
    /// Externally visible index; equal to the handle of the connection that
    /// registered (or last re-attached) this client.
    pub registry_index: ConnectionHandle,
    /// Identity that created this client (the client itself unless delegated).
    pub owner: Uuid,
    /// Opaque metadata supplied on `connect`, matched by `devices` queries.
    pub data: Map<String, Value>,
    /// Topics this client subscribes to.
    pub subscriptions: BTreeSet<TopicId>,
    /// Topics this client has published to.
    pub published: BTreeSet<TopicId>,
    /// Live connection of this client; `None` once it disconnects.
    pub connection: Option<ConnectionHandle>,
}

impl ClientRecord {
    /// Creates a record owned by itself and attached to `handle`.
    pub fn new(id: Uuid, handle: ConnectionHandle, data: Map<String, Value>) -> Self {
        Self {
            id,
            registry_index: handle,
            owner: id,
            data,
            subscriptions: BTreeSet::new(),
            published: BTreeSet::new(),
            connection: Some(handle),
        }
    }

    /// Returns `true` while the client's connection is open.
    pub fn is_live(&self) -> bool {
        self.connection.is_some()
    }

    /// Returns `true` if every key of `query` is present in `data` with an
    /// equal value.  An empty query matches every record.
    pub fn matches(&self, query: &Map<String, Value>) -> bool {
        query
            .iter()
            .all(|(key, wanted)| self.data.get(key).is_some_and(|v| loosely_equal(v, wanted)))
    }
}

/// Compares metadata values, treating a number and its decimal string
/// spelling as equal (`1` matches `"1"`).
fn loosely_equal(stored: &Value, wanted: &Value) -> bool {
    match (stored, wanted) {
        (Value::String(s), Value::Number(n)) | (Value::Number(n), Value::String(s)) => {
            *s == n.to_string()
        }
        _ => stored == wanted,
    }
}

/// In-memory registry of every client seen during the process lifetime.
#[derive(Debug, Default)]
pub struct ClientRegistry {
    clients: HashMap<Uuid, ClientRecord>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a record.
    pub fn insert(&mut self, record: ClientRecord) {
        self.clients.insert(record.id, record);
    }

    /// Looks a client up by id.
    pub fn get(&self, id: &Uuid) -> Option<&ClientRecord> {
        self.clients.get(id)
    }

    pub fn get_mut(&mut self, id: &Uuid) -> Option<&mut ClientRecord> {
        self.clients.get_mut(id)
    }

    /// Returns the registry index of a client, if known.
    pub fn index_of(&self, id: &Uuid) -> Option<ConnectionHandle> {
        self.clients.get(id).map(|c| c.registry_index)
    }

    /// Returns every live client whose metadata matches `query`, ordered by
    /// registry index.
    pub fn lookup_by_query(&self, query: &Map<String, Value>) -> Vec<&ClientRecord> {
        let mut matches: Vec<&ClientRecord> = self
            .clients
            .values()
            .filter(|c| c.is_live() && c.matches(query))
            .collect();
        matches.sort_by_key(|c| c.registry_index);
        matches
    }

    /// Clears the connection of `id` if it is still attached to `handle`.
    pub fn detach(&mut self, id: &Uuid, handle: ConnectionHandle) {
        if let Some(client) = self.clients.get_mut(id) {
            if client.connection == Some(handle) {
                client.connection = None;
            }
        }
    }

    /// Number of known clients, live or not.
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}
