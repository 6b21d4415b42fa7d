//! Connection registry ("crossbar").
//!
//! A dense table mapping a connection handle to the live transport of that
//! connection.  Handles are assigned sequentially from
//! [`ConnectionHandle::FIRST`] and are never reused, so the slot of a handle
//! is simply `handle - FIRST`: lookup and removal are O(1) vector accesses.
//!
//! ```text
//! handle:  4      5      6      7
//! slot:   [0]    [1]    [2]    [3]
//!         Some   None   Some   Some     None = connection closed
//! ```

use ugrid_core::ConnectionHandle;
use uuid::Uuid;

use super::RegistryError;
use crate::application::outbox::Outbox;
use crate::domain::PeerInfo;

/// One live connection.
#[derive(Debug)]
pub struct ConnectionEntry {
    /// Queue feeding the connection's writer task.
    pub outbox: Outbox,
    /// Who is on the other end.
    pub peer: PeerInfo,
    /// Client registered on this connection by `connect`, if any.
    pub client: Option<Uuid>,
}

/// Handle-indexed table of live connections.
#[derive(Debug)]
pub struct ConnectionRegistry {
    slots: Vec<Option<ConnectionEntry>>,
    next: Option<ConnectionHandle>,
    live: usize,
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self {
            slots: Vec::new(),
            next: Some(ConnectionHandle::FIRST),
            live: 0,
        }
    }
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a new connection under the next sequential handle.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::HandleSpaceExhausted`] once every unicast
    /// address has been handed out.
    pub fn register(
        &mut self,
        outbox: Outbox,
        peer: PeerInfo,
    ) -> Result<ConnectionHandle, RegistryError> {
        let handle = self.next.ok_or(RegistryError::HandleSpaceExhausted)?;
        self.next = handle.next();
        self.slots.push(Some(ConnectionEntry {
            outbox,
            peer,
            client: None,
        }));
        self.live += 1;
        Ok(handle)
    }

    /// Returns the live entry for `handle`.
    pub fn get(&self, handle: ConnectionHandle) -> Option<&ConnectionEntry> {
        self.slots.get(slot_of(handle))?.as_ref()
    }

    pub fn get_mut(&mut self, handle: ConnectionHandle) -> Option<&mut ConnectionEntry> {
        self.slots.get_mut(slot_of(handle))?.as_mut()
    }

    /// Clears the slot of `handle`, returning its entry.
    ///
    /// Safe to call for handles that were never registered or are already
    /// gone; those return `None`.
    pub fn remove(&mut self, handle: ConnectionHandle) -> Option<ConnectionEntry> {
        let entry = self.slots.get_mut(slot_of(handle))?.take();
        if entry.is_some() {
            self.live -= 1;
        }
        entry
    }

    /// Returns `true` if `handle` names a live connection.
    pub fn is_live(&self, handle: ConnectionHandle) -> bool {
        self.get(handle).is_some()
    }

    /// Number of live connections.
    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }
}

fn slot_of(handle: ConnectionHandle) -> usize {
    (handle.get() - ConnectionHandle::FIRST.get()) as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    fn register(registry: &mut ConnectionRegistry) -> ConnectionHandle {
        let (outbox, _rx) = Outbox::channel(1);
        registry.register(outbox, PeerInfo::memory()).unwrap()
    }

    #[test]
    fn test_handles_are_sequential_from_four() {
        let mut registry = ConnectionRegistry::new();
        let handles: Vec<u32> = (0..3).map(|_| register(&mut registry).get()).collect();
        assert_eq!(handles, vec![4, 5, 6]);
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn test_remove_clears_slot() {
        let mut registry = ConnectionRegistry::new();
        let handle = register(&mut registry);

        assert!(registry.remove(handle).is_some());

        assert!(!registry.is_live(handle));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_remove_twice_is_harmless() {
        let mut registry = ConnectionRegistry::new();
        let handle = register(&mut registry);
        registry.remove(handle);
        assert!(registry.remove(handle).is_none());
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn test_remove_never_registered_handle_is_harmless() {
        let mut registry = ConnectionRegistry::new();
        let unknown = ConnectionHandle::new(1000).unwrap();
        assert!(registry.remove(unknown).is_none());
        assert!(registry.get(unknown).is_none());
    }

    #[test]
    fn test_handles_are_not_reused_after_removal() {
        let mut registry = ConnectionRegistry::new();
        let first = register(&mut registry);
        registry.remove(first);
        let second = register(&mut registry);
        assert_ne!(first, second);
        assert_eq!(second.get(), 5);
    }

    #[test]
    fn test_new_entry_has_no_client() {
        let mut registry = ConnectionRegistry::new();
        let handle = register(&mut registry);
        assert!(registry.get(handle).unwrap().client.is_none());
    }
}
