//! The broker's shared state: connections, clients and topics.
//!
//! The three registries are kept together in [`Registries`] because most
//! operations touch more than one of them (e.g. `subscribe` resolves the
//! caller's client through the connection table and then updates both the
//! topic and the client record).  The broker guards a single `Registries`
//! value with one lock, so every operation here is atomic with respect to
//! the others.
//!
//! # Identifiers
//!
//! A client's registry index **is** the handle of the connection it
//! registered on.  That keeps one address space for everything routable:
//! `devices` results, `id` replies, topic subscriber lists and unicast
//! destinations all carry the same number.

pub mod clients;
pub mod connections;
pub mod topics;

use serde_json::{Map, Value};
use thiserror::Error;
use ugrid_core::{ConnectionHandle, DeviceInfo, TopicId};
use uuid::Uuid;

use crate::application::outbox::Outbox;
use crate::domain::PeerInfo;

pub use clients::{ClientRecord, ClientRegistry};
pub use connections::{ConnectionEntry, ConnectionRegistry};
pub use topics::{Topic, TopicRegistry, MAX_TOPICS};

/// Errors raised by registry operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// Every unicast address has been assigned.
    #[error("connection handle space exhausted")]
    HandleSpaceExhausted,

    /// Every multicast address has been assigned.
    #[error("topic id space exhausted ({max} topics)")]
    TopicSpaceExhausted { max: usize },

    /// The connection has not sent `connect` yet.
    #[error("connection {0} is not registered; send `connect` first")]
    NotRegistered(ConnectionHandle),

    /// The connection already registered a client.
    #[error("connection {handle} is already registered as client {id}")]
    AlreadyRegistered { handle: ConnectionHandle, id: Uuid },

    /// A supplied client id belongs to a client that is still connected.
    #[error("client {id} is already attached to connection {handle}")]
    ClientAttached { id: Uuid, handle: ConnectionHandle },

    /// The handle does not name a live connection.
    #[error("unknown connection {0}")]
    UnknownConnection(ConnectionHandle),
}

/// Connection, client and topic registries.
#[derive(Debug, Default)]
pub struct Registries {
    pub connections: ConnectionRegistry,
    pub clients: ClientRegistry,
    pub topics: TopicRegistry,
}

impl Registries {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a newly accepted connection and returns its handle.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::HandleSpaceExhausted`] when no handle is left.
    pub fn register_connection(
        &mut self,
        outbox: Outbox,
        peer: PeerInfo,
    ) -> Result<ConnectionHandle, RegistryError> {
        self.connections.register(outbox, peer)
    }

    /// Removes a connection and detaches its client, if any.
    ///
    /// The client record, its metadata and subscriptions are kept; the
    /// handle simply stops being live.  Returns the removed entry so the
    /// caller can log it, or `None` if the handle was already gone.
    pub fn drop_connection(&mut self, handle: ConnectionHandle) -> Option<ConnectionEntry> {
        let entry = self.connections.remove(handle)?;
        if let Some(id) = entry.client {
            self.clients.detach(&id, handle);
        }
        Some(entry)
    }

    /// Registers (or re-attaches) a client on connection `handle`.
    ///
    /// - No `supplied` id: a fresh client with a random id is created.
    /// - `supplied` id unknown: a fresh client with that id is created.
    /// - `supplied` id of a detached client: the client is re-attached to
    ///   `handle`, its subscriptions follow it, and its metadata is replaced
    ///   when `data` is given.
    ///
    /// # Errors
    ///
    /// - [`RegistryError::UnknownConnection`] if `handle` is not live.
    /// - [`RegistryError::AlreadyRegistered`] if `handle` already has a client.
    /// - [`RegistryError::ClientAttached`] if the supplied client is connected
    ///   elsewhere.
    pub fn register_client(
        &mut self,
        handle: ConnectionHandle,
        supplied: Option<Uuid>,
        data: Option<Map<String, Value>>,
    ) -> Result<Uuid, RegistryError> {
        let entry = self
            .connections
            .get(handle)
            .ok_or(RegistryError::UnknownConnection(handle))?;
        if let Some(id) = entry.client {
            return Err(RegistryError::AlreadyRegistered { handle, id });
        }

        let id = supplied.unwrap_or_else(Uuid::new_v4);
        match self.clients.get_mut(&id) {
            Some(client) => {
                if let Some(live) = client.connection {
                    return Err(RegistryError::ClientAttached { id, handle: live });
                }
                let old = client.registry_index;
                client.registry_index = handle;
                client.connection = Some(handle);
                if let Some(data) = data {
                    client.data = data;
                }
                for topic in &client.subscriptions {
                    self.topics.repoint(*topic, old, handle);
                }
            }
            None => {
                self.clients
                    .insert(ClientRecord::new(id, handle, data.unwrap_or_default()));
            }
        }

        if let Some(entry) = self.connections.get_mut(handle) {
            entry.client = Some(id);
        }
        Ok(id)
    }

    /// Returns the client registered on `handle`.
    pub fn client_of(&self, handle: ConnectionHandle) -> Option<&ClientRecord> {
        let id = self.connections.get(handle)?.client?;
        self.clients.get(&id)
    }

    /// Returns `true` if `handle` has completed `connect`.
    pub fn is_registered(&self, handle: ConnectionHandle) -> bool {
        self.client_of(handle).is_some()
    }

    /// Live clients whose metadata matches `query`, ordered by registry
    /// index, with their remote addresses.
    pub fn lookup_by_query(&self, query: &Map<String, Value>) -> Vec<DeviceInfo> {
        self.clients
            .lookup_by_query(query)
            .into_iter()
            .map(|client| DeviceInfo {
                id: client.id,
                registry_index: client.registry_index.get(),
                remote_address: client
                    .connection
                    .and_then(|h| self.connections.get(h))
                    .and_then(|entry| entry.peer.remote_address()),
            })
            .collect()
    }

    /// Resolves (creating if needed) the id of topic `name`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::TopicSpaceExhausted`] when `name` is new and
    /// no id is left.
    pub fn topic_id(&mut self, name: &str) -> Result<TopicId, RegistryError> {
        self.topics.get_or_create(name)
    }

    /// Subscribes the client on `handle` to topic `name`, creating the topic
    /// if needed.  Subscribing twice has no further effect.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotRegistered`] before `connect`, or
    /// [`RegistryError::TopicSpaceExhausted`].
    pub fn subscribe(
        &mut self,
        handle: ConnectionHandle,
        name: &str,
    ) -> Result<TopicId, RegistryError> {
        let id = self.registered_client_id(handle)?;
        let topic = self.topics.get_or_create(name)?;
        self.topics.subscribe(topic, handle);
        if let Some(client) = self.clients.get_mut(&id) {
            client.subscriptions.insert(topic);
        }
        Ok(topic)
    }

    /// Unsubscribes the client on `handle` from topic `name`.
    ///
    /// Unsubscribing from a topic that does not exist, or that the client is
    /// not subscribed to, has no effect and returns `Ok(None)`/`Ok(Some(_))`
    /// respectively.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotRegistered`] before `connect`.
    pub fn unsubscribe(
        &mut self,
        handle: ConnectionHandle,
        name: &str,
    ) -> Result<Option<TopicId>, RegistryError> {
        let id = self.registered_client_id(handle)?;
        let Some(topic) = self.topics.find(name) else {
            return Ok(None);
        };
        self.topics.unsubscribe(topic, handle);
        if let Some(client) = self.clients.get_mut(&id) {
            client.subscriptions.remove(&topic);
        }
        Ok(Some(topic))
    }

    /// Records that the client on `handle` published to `topic`.
    pub fn record_publication(&mut self, handle: ConnectionHandle, topic: TopicId) {
        let Some(id) = self.connections.get(handle).and_then(|e| e.client) else {
            return;
        };
        if let Some(client) = self.clients.get_mut(&id) {
            client.published.insert(topic);
        }
    }

    fn registered_client_id(&self, handle: ConnectionHandle) -> Result<Uuid, RegistryError> {
        self.connections
            .get(handle)
            .and_then(|entry| entry.client)
            .ok_or(RegistryError::NotRegistered(handle))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
