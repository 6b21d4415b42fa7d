//! The broker: shared state plus the settings routing needs.
//!
//! One `Broker` is created at startup and shared (`Arc<Broker>`) by every
//! listener and session.  It owns the [`Registries`] behind a single async
//! mutex.  The lock is held only for the synchronous registry work of one
//! frame; it is always released before any write is awaited, so a slow
//! recipient never blocks routing for other connections.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Mutex, MutexGuard};
use tracing::info;

use crate::application::outbox::{OutboundFrame, Outbox};
use crate::application::registry::{RegistryError, Registries};
use crate::application::router::Switchboard;
use crate::application::stats::BrokerStats;
use crate::domain::{PeerInfo, ServerConfig};

/// Shared broker state.
#[derive(Debug)]
pub struct Broker {
    registries: Mutex<Registries>,
    stats: BrokerStats,
    write_timeout: Option<Duration>,
    outbox_capacity: usize,
    max_frame_len: usize,
}

impl Broker {
    pub fn new(config: &ServerConfig) -> Self {
        Self {
            registries: Mutex::new(Registries::new()),
            stats: BrokerStats::new(),
            write_timeout: config.write_timeout(),
            outbox_capacity: config.outbox_capacity,
            max_frame_len: config.max_frame_len,
        }
    }

    /// Locks the registries.  Do not hold the guard across a write.
    pub async fn registries(&self) -> MutexGuard<'_, Registries> {
        self.registries.lock().await
    }

    pub fn stats(&self) -> &BrokerStats {
        &self.stats
    }

    /// Per-recipient write deadline; `None` waits forever.
    pub fn write_timeout(&self) -> Option<Duration> {
        self.write_timeout
    }

    pub fn max_frame_len(&self) -> usize {
        self.max_frame_len
    }

    /// Registers a freshly accepted connection.
    ///
    /// Returns the connection's [`Switchboard`] (its router) and the receiver
    /// its writer task must drain.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::HandleSpaceExhausted`] when no handle is left;
    /// the caller should close the transport.
    pub async fn open_connection(
        self: &Arc<Self>,
        peer: PeerInfo,
    ) -> Result<(Switchboard, mpsc::Receiver<OutboundFrame>), RegistryError> {
        let (outbox, rx) = Outbox::channel(self.outbox_capacity);
        let handle = {
            let mut registries = self.registries().await;
            let handle = registries.register_connection(outbox, peer.clone())?;
            info!(
                "connection {handle} opened ({peer}); {} live",
                registries.connections.len()
            );
            handle
        };
        Ok((Switchboard::new(Arc::clone(self), handle), rx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_connection_assigns_sequential_handles() {
        let broker = Arc::new(Broker::new(&ServerConfig::default()));

        let (first, _rx1) = broker.open_connection(PeerInfo::memory()).await.unwrap();
        let (second, _rx2) = broker.open_connection(PeerInfo::memory()).await.unwrap();

        assert_eq!(first.handle().get(), 4);
        assert_eq!(second.handle().get(), 5);
        assert_eq!(broker.registries().await.connections.len(), 2);
    }

    #[test]
    fn test_settings_come_from_config() {
        let config = ServerConfig {
            write_timeout_secs: 0,
            max_frame_len: 1024,
            ..ServerConfig::default()
        };
        let broker = Broker::new(&config);
        assert_eq!(broker.write_timeout(), None);
        assert_eq!(broker.max_frame_len(), 1024);
    }
}
