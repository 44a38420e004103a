//! The SMSC agent: the SMPP server role.
//!
//! On start an SMSC binds its listener and accepts connections until told to
//! stop, spawning one handler task per accepted transport. The handler
//! requires the peer's first PDU to be a bind_transceiver, answers it, and
//! only then registers the session under the peer's asserted system_id; up
//! to that point the peer is not reachable for outbound routing.

use std::net::SocketAddr;
use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::pdu::{CommandId, Pdu, PduStreamReader};

use super::registry::PeerRegistry;
use super::session::{run_receive_loop, PeerSession};
use super::{Agent, AgentError, AgentEvent, AgentKind, EventSink, MessageDescriptor};

/// system_id is a 16-octet field on the wire.
const SYSTEM_ID_MAX: usize = 16;

pub struct Smsc {
    name: String,
    listen_addr: SocketAddr,
    registry: Arc<PeerRegistry>,
    listener_cancel: tokio_util::sync::CancellationToken,
    events: OnceLock<mpsc::Sender<AgentEvent>>,
}

impl Smsc {
    pub fn new(name: &str, listen_addr: SocketAddr) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            listen_addr,
            registry: PeerRegistry::new(),
            listener_cancel: tokio_util::sync::CancellationToken::new(),
            events: OnceLock::new(),
        })
    }

    fn sink(&self) -> EventSink {
        EventSink::new(&self.name, AgentKind::Smsc, self.events.get().cloned())
    }

    fn truncated_system_id(&self) -> &str {
        if self.name.len() > SYSTEM_ID_MAX {
            &self.name[..SYSTEM_ID_MAX]
        } else {
            &self.name
        }
    }

    /// Stop accepting new transports, then signal every peer session to
    /// stop. The listener goes first so no session can register behind the
    /// teardown.
    pub async fn stop_and_unbind_all(&self) {
        self.listener_cancel.cancel();
        self.registry.stop_all().await;
    }

    async fn accept_loop(self: Arc<Self>, listener: TcpListener, sink: EventSink) {
        loop {
            tokio::select! {
                biased;

                _ = self.listener_cancel.cancelled() => {
                    debug!(agent = %self.name, "listener shutting down");
                    return;
                }

                result = listener.accept() => match result {
                    Ok((stream, peer_addr)) => {
                        debug!(agent = %self.name, peer_addr = %peer_addr, "connection accepted");
                        let smsc = self.clone();
                        let sink = sink.clone();
                        tokio::spawn(async move {
                            smsc.handle_connection(stream, peer_addr, sink).await;
                        });
                    }
                    Err(e) => {
                        // An accept failure racing shutdown is a normal exit,
                        // not a reportable transport fault.
                        if self.listener_cancel.is_cancelled() {
                            debug!(agent = %self.name, "accept interrupted by shutdown");
                            return;
                        }
                        sink.transport_error("", e.to_string()).await;
                        self.stop_and_unbind_all().await;
                        return;
                    }
                }
            }
        }
    }

    /// Serve one accepted transport: bind sub-protocol, then the standard
    /// receive loop.
    async fn handle_connection(
        self: Arc<Self>,
        stream: TcpStream,
        peer_addr: SocketAddr,
        sink: EventSink,
    ) {
        let (read_half, write_half) = stream.into_split();
        let mut reader = PduStreamReader::new(read_half);

        let mut pdus = match reader.extract_next().await {
            Ok(pdus) => pdus,
            Err(e) => {
                sink.application_error("", None, e.to_string()).await;
                return;
            }
        };

        let first = pdus.remove(0);
        if first.command_id != CommandId::BindTransceiver {
            let error = format!(
                "first PDU from peer ({peer_addr}) should be bind_transceiver, but was ({})",
                first.command_name()
            );
            sink.application_error("", Some(first), error).await;
            return;
        }

        // The peer is known by the system_id it asserts in its bind.
        let peer_name = first.first_cstring_param().unwrap_or_default().to_string();
        sink.received_pdu(&peer_name, first.clone()).await;

        let session = Arc::new(PeerSession::new(&peer_name, write_half, sink.clone()));

        let resp = Pdu::bind_transceiver_resp(first.sequence_number, self.truncated_system_id());
        if let Err(e) = session.write_unsequenced(&resp).await {
            sink.transport_error(&peer_name, e.to_string()).await;
            self.stop_and_unbind_all().await;
            return;
        }
        sink.sent_pdu(&peer_name, resp.clone()).await;
        sink.completed_bind(&peer_name, resp).await;

        // Registration makes the peer routable; it must not happen before
        // the bind response has been written.
        self.registry.insert(&peer_name, session.clone()).await;
        info!(agent = %self.name, peer = %peer_name, "transceiver bind completed");

        let carry_over = pdus;
        run_receive_loop(session, reader, carry_over, self.registry.clone()).await;
    }
}

#[async_trait]
impl Agent for Smsc {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> AgentKind {
        AgentKind::Smsc
    }

    fn set_event_sink(&self, sink: mpsc::Sender<AgentEvent>) {
        if self.events.set(sink).is_err() {
            warn!(agent = %self.name, "event sink already installed");
        }
    }

    async fn start(self: Arc<Self>) {
        let sink = self.sink();

        let listener = match TcpListener::bind(self.listen_addr).await {
            Ok(listener) => listener,
            Err(e) => {
                sink.transport_error("", format!("listen on ({}) failed: {e}", self.listen_addr))
                    .await;
                return;
            }
        };

        info!(agent = %self.name, address = %self.listen_addr, "listener started");

        let smsc = self.clone();
        tokio::spawn(smsc.accept_loop(listener, sink));
    }

    async fn send_to_peer(&self, message: MessageDescriptor) -> Result<(), AgentError> {
        let session = self.registry.get(&message.receiving_peer).await.ok_or(
            AgentError::NoSuchPeer {
                agent: self.name.clone(),
                peer: message.receiving_peer.clone(),
            },
        )?;

        session.send(message.pdu).await
    }

    async fn unbind_all(&self) {
        self.stop_and_unbind_all().await;
    }
}
