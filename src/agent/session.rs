//! One peer session: a single TCP connection to a single remote peer.
//!
//! The session is the sole owner of its socket. The receive loop holds the
//! read half; `send` serialises writers on a mutex over the write half, so
//! PDUs always reach the wire whole. Locally originated requests take their
//! sequence number from the session counter immediately before the write;
//! responses keep the sequence number of the request they answer.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use tokio::io::AsyncWriteExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::pdu::{Pdu, PduStreamReader, ReadError};

use super::registry::PeerRegistry;
use super::{AgentError, EventSink};

pub struct PeerSession {
    peer_name: String,
    writer: Mutex<OwnedWriteHalf>,
    next_request_seq: AtomicU32,
    cancel: CancellationToken,
    sink: EventSink,
}

impl PeerSession {
    pub fn new(peer_name: &str, writer: OwnedWriteHalf, sink: EventSink) -> Self {
        Self {
            peer_name: peer_name.to_string(),
            writer: Mutex::new(writer),
            next_request_seq: AtomicU32::new(1),
            cancel: CancellationToken::new(),
            sink,
        }
    }

    pub fn peer_name(&self) -> &str {
        &self.peer_name
    }

    /// Send one PDU to the peer. A request PDU has its sequence number
    /// overwritten from the session counter; a response keeps its own.
    /// Emits `SentPdu` on success.
    pub async fn send(&self, mut pdu: Pdu) -> Result<(), AgentError> {
        if pdu.is_request() {
            pdu.sequence_number = self.next_request_seq.fetch_add(1, Ordering::SeqCst);
        }

        self.write_encoded(&pdu).await?;

        trace!(peer = %self.peer_name, command = %pdu.command_id, seq = pdu.sequence_number, "pdu sent");
        self.sink.sent_pdu(&self.peer_name, pdu).await;
        Ok(())
    }

    /// Write a PDU exactly as given, without sequencing or events. Used by
    /// the bind sub-protocols, which manage both themselves.
    pub(crate) async fn write_unsequenced(&self, pdu: &Pdu) -> Result<(), AgentError> {
        self.write_encoded(pdu).await
    }

    async fn write_encoded(&self, pdu: &Pdu) -> Result<(), AgentError> {
        let bytes = pdu.encode();
        let mut writer = self.writer.lock().await;
        writer.write_all(&bytes).await?;
        Ok(())
    }

    /// Ask the receive loop to shut the session down. Idempotent.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.cancel.is_cancelled()
    }

    async fn close_transport(&self) -> std::io::Result<()> {
        let mut writer = self.writer.lock().await;
        writer.shutdown().await
    }
}

/// The standard receive loop, shared by both session variants.
///
/// Replays carry-over PDUs from the bind batch, then waits on either the
/// framed reader or the stop signal. Clean end-of-stream and transport errors
/// both terminate the session and cascade into a stop of every sibling
/// session on the owning agent.
pub(crate) async fn run_receive_loop(
    session: Arc<PeerSession>,
    mut reader: PduStreamReader<OwnedReadHalf>,
    carry_over: Vec<Pdu>,
    registry: Arc<PeerRegistry>,
) {
    let sink = session.sink.clone();
    let peer = session.peer_name.clone();

    for pdu in carry_over {
        sink.received_pdu(&peer, pdu).await;
    }

    loop {
        tokio::select! {
            biased;

            _ = session.cancel.cancelled() => {
                if let Err(e) = session.close_transport().await {
                    sink.transport_error(&peer, format!("on local connection close: {e}")).await;
                }
                registry.remove(&peer).await;
                debug!(peer = %peer, "session stopped");
                return;
            }

            result = reader.extract_next() => match result {
                Ok(pdus) => {
                    for pdu in pdus {
                        trace!(peer = %peer, command = %pdu.command_id, seq = pdu.sequence_number, "pdu received");
                        sink.received_pdu(&peer, pdu).await;
                    }
                }
                Err(ReadError::Closed) => {
                    sink.transport_closed(&peer).await;
                    registry.remove(&peer).await;
                    registry.stop_all().await;
                    debug!(peer = %peer, "peer closed transport");
                    return;
                }
                Err(e) => {
                    sink.transport_error(&peer, e.to_string()).await;
                    registry.remove(&peer).await;
                    registry.stop_all().await;
                    debug!(peer = %peer, error = %e, "session ended with transport error");
                    return;
                }
            }
        }
    }
}
