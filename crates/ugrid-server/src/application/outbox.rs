//! Per-connection outbound queue.
//!
//! Every connection owns exactly one writer task (see
//! `infrastructure::session`).  Anything that wants to send bytes to that
//! connection pushes an [`OutboundFrame`] into its [`Outbox`]; the writer
//! task performs the actual socket write and then signals completion on the
//! frame's `written` channel.
//!
//! ```text
//!  router (any task) ──► Outbox (mpsc) ──► writer task ──► socket
//!         ▲                                    │
//!         └──────────── oneshot "written" ◄────┘
//! ```
//!
//! Waiting on the `written` signal is what gives the broker its
//! back-pressure: a sender does not read its next frame until every
//! recipient of the current one has been written to (or timed out).

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;

/// A frame queued for one connection's writer task.
#[derive(Debug)]
pub struct OutboundFrame {
    /// Complete encoded frame, shared between all recipients of a multicast.
    pub bytes: Arc<[u8]>,
    /// Completed by the writer task once `bytes` has been written.
    pub written: oneshot::Sender<()>,
}

/// Result of handing a frame to one recipient.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// The recipient's writer reported the frame as written.
    Written,
    /// The recipient's connection is gone (or the write failed).
    Closed,
    /// The write did not complete before the deadline.
    TimedOut,
}

impl Delivery {
    pub fn is_written(self) -> bool {
        self == Delivery::Written
    }
}

/// Sending side of a connection's outbound queue.  Cheap to clone.
#[derive(Debug, Clone)]
pub struct Outbox {
    tx: mpsc::Sender<OutboundFrame>,
}

impl Outbox {
    /// Creates an outbox and the receiver its writer task drains.
    ///
    /// A `capacity` of zero is treated as one.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<OutboundFrame>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    /// Queues `bytes` and waits until the writer has written them.
    ///
    /// `deadline` bounds the whole operation (queueing plus writing); `None`
    /// waits indefinitely.
    pub async fn deliver(&self, bytes: Arc<[u8]>, deadline: Option<Duration>) -> Delivery {
        let (written, done) = oneshot::channel();
        let frame = OutboundFrame { bytes, written };
        let attempt = async {
            if self.tx.send(frame).await.is_err() {
                return Delivery::Closed;
            }
            // The writer drops the sender without signalling when the write
            // fails, which surfaces here as a receive error.
            match done.await {
                Ok(()) => Delivery::Written,
                Err(_) => Delivery::Closed,
            }
        };
        match deadline {
            Some(limit) => timeout(limit, attempt)
                .await
                .unwrap_or(Delivery::TimedOut),
            None => attempt.await,
        }
    }

    /// Returns `true` once the writer task has gone away.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_deliver_completes_when_writer_acknowledges() {
        // Arrange: a writer that acknowledges every frame.
        let (outbox, mut rx) = Outbox::channel(4);
        let writer = tokio::spawn(async move {
            let frame = rx.recv().await.unwrap();
            let _ = frame.written.send(());
            frame.bytes
        });

        // Act
        let delivery = outbox.deliver(Arc::from(&b"hello"[..]), None).await;

        // Assert
        assert_eq!(delivery, Delivery::Written);
        assert_eq!(&*writer.await.unwrap(), b"hello");
    }

    #[tokio::test]
    async fn test_deliver_to_dropped_receiver_is_closed() {
        let (outbox, rx) = Outbox::channel(4);
        drop(rx);

        let delivery = outbox.deliver(Arc::from(&b"x"[..]), None).await;

        assert_eq!(delivery, Delivery::Closed);
        assert!(outbox.is_closed());
    }

    #[tokio::test]
    async fn test_writer_failure_is_reported_as_closed() {
        // A writer that drops the ack sender without signalling.
        let (outbox, mut rx) = Outbox::channel(4);
        tokio::spawn(async move {
            let frame = rx.recv().await.unwrap();
            drop(frame.written);
        });

        let delivery = outbox.deliver(Arc::from(&b"x"[..]), None).await;

        assert_eq!(delivery, Delivery::Closed);
    }

    #[tokio::test]
    async fn test_stuck_writer_times_out() {
        // Keep the receiver alive but never drain it.
        let (outbox, _rx) = Outbox::channel(1);

        let delivery = outbox
            .deliver(Arc::from(&b"x"[..]), Some(Duration::from_millis(50)))
            .await;

        assert_eq!(delivery, Delivery::TimedOut);
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let (outbox, _rx) = Outbox::channel(0);
        assert!(!outbox.is_closed());
    }
}
