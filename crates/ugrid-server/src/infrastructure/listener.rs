//! TCP and WebSocket listeners: accept loops and per-connection tasks.
//!
//! Both listeners feed the same [`Broker`].  Each accepted connection is
//! handed to a dedicated Tokio task so one slow peer never delays accepting
//! the next.  A WebSocket connection additionally completes the HTTP upgrade
//! handshake inside its own task before the session starts.
//!
//! # Shutdown
//!
//! The accept loop polls a shared `running` flag (cleared by the Ctrl-C
//! handler in `main.rs`) every 200 ms by putting a timeout on `accept()`.
//! Sessions already running are not interrupted; they end when their peers
//! disconnect or the process exits.

use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::application::Broker;
use crate::infrastructure::session::run_session;
use crate::infrastructure::transport::{tcp, websocket};

/// How often the accept loop re-checks the `running` flag.
const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Which protocol a listener speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerKind {
    Tcp,
    WebSocket,
}

impl fmt::Display for ListenerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ListenerKind::Tcp => "TCP",
            ListenerKind::WebSocket => "WebSocket",
        })
    }
}

/// A bound listener, ready to serve.
#[derive(Debug)]
pub struct Listener {
    kind: ListenerKind,
    inner: TcpListener,
}

impl Listener {
    /// Binds a listener on `addr`.  Port `0` picks a free port (see
    /// [`Listener::local_addr`]).
    ///
    /// # Errors
    ///
    /// Returns an error if the address cannot be bound (port in use, no
    /// permission, …).
    pub async fn bind(kind: ListenerKind, addr: SocketAddr) -> anyhow::Result<Self> {
        let inner = TcpListener::bind(addr)
            .await
            .with_context(|| format!("failed to bind {kind} listener on {addr}"))?;
        Ok(Self { kind, inner })
    }

    pub fn kind(&self) -> ListenerKind {
        self.kind
    }

    /// The address actually bound.
    ///
    /// # Errors
    ///
    /// Returns the OS error if the socket address cannot be queried.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.inner.local_addr()
    }

    /// Accepts connections until `running` is cleared.
    ///
    /// # Errors
    ///
    /// Currently infallible once bound; accept errors are logged and the
    /// loop continues.
    pub async fn serve(self, broker: Arc<Broker>, running: Arc<AtomicBool>) -> anyhow::Result<()> {
        match self.local_addr() {
            Ok(addr) => info!("{} listener on {addr}", self.kind),
            Err(_) => info!("{} listener started", self.kind),
        }

        loop {
            if !running.load(Ordering::Relaxed) {
                info!("{} listener: shutdown flag set; stopping accept loop", self.kind);
                break;
            }

            match timeout(ACCEPT_POLL_INTERVAL, self.inner.accept()).await {
                Ok(Ok((stream, remote_addr))) => {
                    debug!("{} connection from {remote_addr}", self.kind);
                    let broker = Arc::clone(&broker);
                    let kind = self.kind;
                    tokio::spawn(async move {
                        handle_connection(kind, broker, stream, remote_addr).await;
                    });
                }
                Ok(Err(e)) => {
                    // Transient (e.g. too many open files): keep serving.
                    error!("{} accept error: {e}", self.kind);
                }
                Err(_) => {
                    // Timeout: loop back to check the `running` flag.
                }
            }
        }

        Ok(())
    }
}

async fn handle_connection(
    kind: ListenerKind,
    broker: Arc<Broker>,
    stream: TcpStream,
    remote_addr: SocketAddr,
) {
    let transport = match kind {
        ListenerKind::Tcp => tcp::from_tcp(stream, remote_addr),
        ListenerKind::WebSocket => match websocket::accept(stream, remote_addr).await {
            Ok(transport) => transport,
            Err(e) => {
                warn!("WebSocket handshake with {remote_addr} failed: {e}");
                return;
            }
        },
    };
    run_session(broker, transport).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ServerConfig;

    #[tokio::test]
    async fn test_bind_port_zero_reports_real_port() {
        let listener = Listener::bind(ListenerKind::Tcp, "127.0.0.1:0".parse().unwrap())
            .await
            .unwrap();
        assert_ne!(listener.local_addr().unwrap().port(), 0);
        assert_eq!(listener.kind(), ListenerKind::Tcp);
    }

    #[tokio::test]
    async fn test_serve_returns_once_flag_is_cleared() {
        // Arrange
        let listener = Listener::bind(ListenerKind::WebSocket, "127.0.0.1:0".parse().unwrap())
            .await
            .unwrap();
        let broker = Arc::new(Broker::new(&ServerConfig::default()));
        let running = Arc::new(AtomicBool::new(true));
        let task = tokio::spawn(listener.serve(broker, Arc::clone(&running)));

        // Act
        running.store(false, Ordering::Relaxed);

        // Assert: the loop notices within a couple of poll intervals.
        let result = timeout(Duration::from_secs(2), task).await;
        assert!(matches!(result, Ok(Ok(Ok(())))));
    }

    #[tokio::test]
    async fn test_bind_in_use_port_fails_with_context() {
        let first = Listener::bind(ListenerKind::Tcp, "127.0.0.1:0".parse().unwrap())
            .await
            .unwrap();
        let addr = first.local_addr().unwrap();

        let err = Listener::bind(ListenerKind::Tcp, addr).await.unwrap_err();

        assert!(err.to_string().contains("failed to bind TCP listener"));
    }
}
