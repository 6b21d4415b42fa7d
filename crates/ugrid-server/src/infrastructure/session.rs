//! Per-connection session driver.
//!
//! A session owns one [`Transport`] for its whole lifetime:
//!
//! 1. Registers the connection with the broker (getting its handle and
//!    [`Switchboard`]).
//! 2. Spawns the writer task that drains the connection's outbox into the
//!    transport's sink and acknowledges each write.
//! 3. Reads chunks from the transport's source, reassembles frames with a
//!    [`FrameDecoder`], and routes them one at a time.  The next frame is not
//!    decoded until the current one has been fully delivered.
//! 4. On EOF or error, unregisters the connection and stops the writer.
//!
//! Transport and decode failures end only this session; they are logged and
//! never propagate further.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};
use ugrid_core::{CodecError, ConnectionHandle, FrameDecoder};

use crate::application::{Broker, OutboundFrame, Switchboard};
use crate::infrastructure::transport::{ByteSink, ByteSource, Transport, TransportError};

/// Why a session ended abnormally.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("invalid frame: {0}")]
    Codec(#[from] CodecError),
}

/// Runs a connection until the peer disconnects or fails.
pub async fn run_session(broker: Arc<Broker>, transport: Transport) {
    let Transport {
        peer,
        mut source,
        mut sink,
    } = transport;

    let (board, outbound) = match broker.open_connection(peer.clone()).await {
        Ok(opened) => opened,
        Err(e) => {
            warn!("rejecting connection from {peer}: {e}");
            let _ = sink.shutdown().await;
            return;
        }
    };
    let handle = board.handle();

    let writer = tokio::spawn(write_loop(handle, sink, outbound));

    match read_loop(&board, source.as_mut(), broker.max_frame_len()).await {
        Ok(()) => debug!("{handle}: peer closed the connection"),
        Err(e) => warn!("{handle}: session ended: {e}"),
    }

    board.on_close().await;
    // Frames still queued for a closed connection are discarded; their
    // senders observe the dropped acknowledgement as "not live".
    writer.abort();
}

async fn read_loop(
    board: &Switchboard,
    source: &mut dyn ByteSource,
    max_frame_len: usize,
) -> Result<(), SessionError> {
    let mut decoder = FrameDecoder::new(max_frame_len);
    while let Some(chunk) = source.read_chunk().await? {
        decoder.push(&chunk);
        while let Some(frame) = decoder.next_frame()? {
            let outcome = board.on_frame(frame).await;
            trace!("{}: {outcome:?}", board.handle());
        }
    }
    Ok(())
}

async fn write_loop(
    handle: ConnectionHandle,
    mut sink: Box<dyn ByteSink>,
    mut outbound: mpsc::Receiver<OutboundFrame>,
) {
    while let Some(frame) = outbound.recv().await {
        match sink.write_all(&frame.bytes).await {
            Ok(()) => {
                // The sender may have timed out and gone away; nothing to do.
                let _ = frame.written.send(());
            }
            Err(e) => {
                debug!("{handle}: write failed: {e}");
                break;
            }
        }
    }
    let _ = sink.shutdown().await;
}

// ── Tests ─────────────────────────────────────────────────────────────────────
