//! The ESME agent: the SMPP client role.
//!
//! On start an ESME works through its bind descriptors in declaration order,
//! dialing each SMSC from one shared local address and completing a
//! transceiver bind before spawning the session's receive loop. A failed
//! bind is local to that descriptor; the remaining descriptors still run.

use std::net::SocketAddr;
use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use tokio::net::{TcpSocket, TcpStream};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::pdu::{CommandId, Pdu, PduStreamReader};

use super::registry::PeerRegistry;
use super::session::{run_receive_loop, PeerSession};
use super::{Agent, AgentError, AgentEvent, AgentKind, EventSink, MessageDescriptor};

/// One planned transceiver bind: which SMSC to dial and the identity to
/// assert toward it.
#[derive(Debug, Clone)]
pub struct BindDescriptor {
    pub smsc_name: String,
    pub remote_addr: SocketAddr,
    pub system_id: String,
    pub password: String,
    pub system_type: String,
}

pub struct Esme {
    name: String,
    local_addr: SocketAddr,
    binds: Vec<BindDescriptor>,
    registry: Arc<PeerRegistry>,
    events: OnceLock<mpsc::Sender<AgentEvent>>,
}

impl Esme {
    pub fn new(name: &str, local_addr: SocketAddr, binds: Vec<BindDescriptor>) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            local_addr,
            binds,
            registry: PeerRegistry::new(),
            events: OnceLock::new(),
        })
    }

    fn sink(&self) -> EventSink {
        EventSink::new(&self.name, AgentKind::Esme, self.events.get().cloned())
    }

    /// Dial one SMSC. SO_REUSEADDR and SO_REUSEPORT let every bind of this
    /// ESME share the one configured local address.
    async fn connect(&self, remote: SocketAddr) -> std::io::Result<TcpStream> {
        let socket = if self.local_addr.is_ipv4() {
            TcpSocket::new_v4()?
        } else {
            TcpSocket::new_v6()?
        };
        socket.set_reuseaddr(true)?;
        #[cfg(unix)]
        socket.set_reuseport(true)?;
        socket.bind(self.local_addr)?;
        socket.connect(remote).await
    }

    /// Dial, bind, register and spawn the receive loop for one descriptor.
    async fn bind_to_peer(&self, descriptor: &BindDescriptor, sink: &EventSink) {
        let stream = match self.connect(descriptor.remote_addr).await {
            Ok(stream) => stream,
            Err(e) => {
                sink.application_error(
                    &descriptor.smsc_name,
                    None,
                    format!("connect to ({}) failed: {e}", descriptor.remote_addr),
                )
                .await;
                return;
            }
        };

        let (read_half, write_half) = stream.into_split();
        let mut reader = PduStreamReader::new(read_half);
        let session = Arc::new(PeerSession::new(
            &descriptor.smsc_name,
            write_half,
            sink.clone(),
        ));

        // The bind request carries a literal sequence number of 1 and does
        // not consume the session's request counter, so the first
        // user-originated request also goes out with sequence 1.
        let bind = Pdu::bind_transceiver(
            1,
            &descriptor.system_id,
            &descriptor.password,
            &descriptor.system_type,
        );

        if let Err(e) = session.write_unsequenced(&bind).await {
            sink.application_error(&descriptor.smsc_name, None, e.to_string())
                .await;
            return;
        }
        sink.sent_pdu(&descriptor.smsc_name, bind).await;

        let mut pdus = match reader.extract_next().await {
            Ok(pdus) => pdus,
            Err(e) => {
                sink.application_error(&descriptor.smsc_name, None, e.to_string())
                    .await;
                return;
            }
        };

        let first = pdus.remove(0);
        sink.received_pdu(&descriptor.smsc_name, first.clone()).await;

        if first.command_id != CommandId::BindTransceiverResp {
            let error = format!("expected bind_transceiver_resp, got {}", first.command_name());
            sink.application_error(&descriptor.smsc_name, Some(first), error)
                .await;
            return;
        }

        // Anything framed alongside the bind response is parked and replayed
        // once the bind completes.
        let carry_over = pdus;

        sink.completed_bind(&descriptor.smsc_name, first).await;

        self.registry.insert(&descriptor.smsc_name, session.clone()).await;
        info!(agent = %self.name, peer = %descriptor.smsc_name, "transceiver bind completed");

        let registry = self.registry.clone();
        tokio::spawn(run_receive_loop(session, reader, carry_over, registry));
    }
}

#[async_trait]
impl Agent for Esme {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> AgentKind {
        AgentKind::Esme
    }

    fn set_event_sink(&self, sink: mpsc::Sender<AgentEvent>) {
        if self.events.set(sink).is_err() {
            warn!(agent = %self.name, "event sink already installed");
        }
    }

    async fn start(self: Arc<Self>) {
        let sink = self.sink();

        for descriptor in &self.binds {
            debug!(
                agent = %self.name,
                peer = %descriptor.smsc_name,
                remote = %descriptor.remote_addr,
                "initiating transceiver bind"
            );
            self.bind_to_peer(descriptor, &sink).await;
        }
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
        self.registry.stop_all().await;
    }
}
