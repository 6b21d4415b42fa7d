//! Topic registry.
//!
//! Topic ids are assigned on first sight of a name, starting at 0, and are
//! stable for the process lifetime.  A topic's multicast address is
//! `MULTICAST_BASE + id`, so at most 2^16 topics can exist.
//!
//! Topics are stored in a `Vec` indexed by id (for O(1) routing, which looks
//! topics up by address) alongside a name index (for `tid`/`subscribe`, which
//! look topics up by name).

use std::collections::HashMap;

use ugrid_core::{ConnectionHandle, TopicId};

use super::RegistryError;

/// Maximum number of distinct topics: one per multicast address.
pub const MAX_TOPICS: usize = u16::MAX as usize + 1;

/// A named multicast group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topic {
    pub name: String,
    pub id: TopicId,
    subscribers: Vec<ConnectionHandle>,
}

impl Topic {
    fn new(name: String, id: TopicId) -> Self {
        Self {
            name,
            id,
            subscribers: Vec::new(),
        }
    }

    /// Registry indexes of the subscribers, in subscription order.
    pub fn subscribers(&self) -> &[ConnectionHandle] {
        &self.subscribers
    }
}

/// All topics ever created.
#[derive(Debug, Default)]
pub struct TopicRegistry {
    topics: Vec<Topic>,
    by_name: HashMap<String, TopicId>,
}

impl TopicRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the id of `name`, creating the topic if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::TopicSpaceExhausted`] when `name` is new and
    /// all [`MAX_TOPICS`] ids are taken.
    pub fn get_or_create(&mut self, name: &str) -> Result<TopicId, RegistryError> {
        if let Some(id) = self.by_name.get(name) {
            return Ok(*id);
        }
        let raw = u16::try_from(self.topics.len())
            .map_err(|_| RegistryError::TopicSpaceExhausted { max: MAX_TOPICS })?;
        let id = TopicId(raw);
        self.topics.push(Topic::new(name.to_string(), id));
        self.by_name.insert(name.to_string(), id);
        Ok(id)
    }

    /// Looks a topic id up by name without creating it.
    pub fn find(&self, name: &str) -> Option<TopicId> {
        self.by_name.get(name).copied()
    }

    pub fn get(&self, id: TopicId) -> Option<&Topic> {
        self.topics.get(id.index())
    }

    /// Subscribers of `id`; empty for topics that were never created.
    pub fn subscribers(&self, id: TopicId) -> &[ConnectionHandle] {
        self.get(id).map(Topic::subscribers).unwrap_or(&[])
    }

    /// Adds `handle` to the subscribers of `id`.  Returns `false` if it was
    /// already subscribed (or the topic does not exist).
    pub fn subscribe(&mut self, id: TopicId, handle: ConnectionHandle) -> bool {
        match self.topics.get_mut(id.index()) {
            Some(topic) if !topic.subscribers.contains(&handle) => {
                topic.subscribers.push(handle);
                true
            }
            _ => false,
        }
    }

    /// Removes `handle` from the subscribers of `id`.  Returns `false` if it
    /// was not subscribed.
    pub fn unsubscribe(&mut self, id: TopicId, handle: ConnectionHandle) -> bool {
        let Some(topic) = self.topics.get_mut(id.index()) else {
            return false;
        };
        let before = topic.subscribers.len();
        topic.subscribers.retain(|h| *h != handle);
        topic.subscribers.len() != before
    }

    /// Replaces `old` by `new` in the subscribers of `id`, keeping its
    /// position.  Used when a client re-attaches on a different connection.
    pub fn repoint(&mut self, id: TopicId, old: ConnectionHandle, new: ConnectionHandle) {
        let Some(topic) = self.topics.get_mut(id.index()) else {
            return;
        };
        if topic.subscribers.contains(&new) {
            topic.subscribers.retain(|h| *h != old);
        } else if let Some(slot) = topic.subscribers.iter_mut().find(|h| **h == old) {
            *slot = new;
        } else {
            topic.subscribers.push(new);
        }
    }

    pub fn len(&self) -> usize {
        self.topics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.topics.is_empty()
    }
}
