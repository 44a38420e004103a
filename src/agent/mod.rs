//! Agents and their shared event model.
//!
//! An agent is one logical SMPP endpoint, either an ESME (client role) or an
//! SMSC (server role), hosting one peer session per remote peer. Agents push
//! everything they observe onto a shared event channel; nothing in the agent
//! layer panics on failure.

mod esme;
mod group;
mod registry;
mod session;
mod smsc;

pub use esme::{BindDescriptor, Esme};
pub use group::{AgentGroup, RouteError};
pub use registry::PeerRegistry;
pub use session::PeerSession;
pub use smsc::Smsc;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::pdu::Pdu;

/// Which role an agent plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentKind {
    Esme,
    Smsc,
}

impl std::fmt::Display for AgentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AgentKind::Esme => f.write_str("esme"),
            AgentKind::Smsc => f.write_str("smsc"),
        }
    }
}

/// A name-addressed instruction to send one PDU.
#[derive(Debug, Clone)]
pub struct MessageDescriptor {
    pub sending_peer: String,
    pub receiving_peer: String,
    pub pdu: Pdu,
}

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("agent ({agent}) is not bound to a peer named ({peer})")]
    NoSuchPeer { agent: String, peer: String },

    #[error("transport write failed: {0}")]
    Write(#[from] std::io::Error),
}

/// Everything an agent publishes. Events identify their source by agent name
/// and kind rather than by reference; receivers that need the agent resolve
/// it through the owning `AgentGroup`.
///
/// `remote_peer` is empty only for transport errors raised before any peer
/// identity is known (listener setup, accept failures).
#[derive(Debug, Clone)]
pub enum AgentEvent {
    ReceivedPdu {
        source_agent: String,
        agent_kind: AgentKind,
        remote_peer: String,
        pdu: Pdu,
    },
    SentPdu {
        source_agent: String,
        agent_kind: AgentKind,
        remote_peer: String,
        pdu: Pdu,
    },
    CompletedBind {
        source_agent: String,
        agent_kind: AgentKind,
        remote_peer: String,
        pdu: Pdu,
    },
    CompletedUnbind {
        source_agent: String,
        agent_kind: AgentKind,
        remote_peer: String,
        pdu: Pdu,
    },
    PeerTransportClosed {
        source_agent: String,
        agent_kind: AgentKind,
        remote_peer: String,
    },
    TransportError {
        source_agent: String,
        agent_kind: AgentKind,
        remote_peer: String,
        error: String,
    },
    ApplicationError {
        source_agent: String,
        agent_kind: AgentKind,
        remote_peer: String,
        pdu: Option<Pdu>,
        error: String,
    },
}

impl AgentEvent {
    pub fn source_agent(&self) -> &str {
        match self {
            AgentEvent::ReceivedPdu { source_agent, .. }
            | AgentEvent::SentPdu { source_agent, .. }
            | AgentEvent::CompletedBind { source_agent, .. }
            | AgentEvent::CompletedUnbind { source_agent, .. }
            | AgentEvent::PeerTransportClosed { source_agent, .. }
            | AgentEvent::TransportError { source_agent, .. }
            | AgentEvent::ApplicationError { source_agent, .. } => source_agent,
        }
    }

    pub fn remote_peer(&self) -> &str {
        match self {
            AgentEvent::ReceivedPdu { remote_peer, .. }
            | AgentEvent::SentPdu { remote_peer, .. }
            | AgentEvent::CompletedBind { remote_peer, .. }
            | AgentEvent::CompletedUnbind { remote_peer, .. }
            | AgentEvent::PeerTransportClosed { remote_peer, .. }
            | AgentEvent::TransportError { remote_peer, .. }
            | AgentEvent::ApplicationError { remote_peer, .. } => remote_peer,
        }
    }

    pub fn pdu(&self) -> Option<&Pdu> {
        match self {
            AgentEvent::ReceivedPdu { pdu, .. }
            | AgentEvent::SentPdu { pdu, .. }
            | AgentEvent::CompletedBind { pdu, .. }
            | AgentEvent::CompletedUnbind { pdu, .. } => Some(pdu),
            AgentEvent::ApplicationError { pdu, .. } => pdu.as_ref(),
            AgentEvent::PeerTransportClosed { .. } | AgentEvent::TransportError { .. } => None,
        }
    }
}

/// Write handle onto the shared event channel, pre-bound to one agent's
/// identity. Absent a sink (no group attached yet), emits are dropped.
/// Sends block when the channel is full.
#[derive(Clone)]
pub struct EventSink {
    agent: String,
    kind: AgentKind,
    tx: Option<mpsc::Sender<AgentEvent>>,
}

impl EventSink {
    pub fn new(agent: &str, kind: AgentKind, tx: Option<mpsc::Sender<AgentEvent>>) -> Self {
        Self {
            agent: agent.to_string(),
            kind,
            tx,
        }
    }

    pub async fn emit(&self, event: AgentEvent) {
        if let Some(tx) = &self.tx {
            // A dropped receiver means the run is tearing down; the event has
            // nowhere to go.
            let _ = tx.send(event).await;
        }
    }

    pub async fn received_pdu(&self, peer: &str, pdu: Pdu) {
        self.emit(AgentEvent::ReceivedPdu {
            source_agent: self.agent.clone(),
            agent_kind: self.kind,
            remote_peer: peer.to_string(),
            pdu,
        })
        .await;
    }

    pub async fn sent_pdu(&self, peer: &str, pdu: Pdu) {
        self.emit(AgentEvent::SentPdu {
            source_agent: self.agent.clone(),
            agent_kind: self.kind,
            remote_peer: peer.to_string(),
            pdu,
        })
        .await;
    }

    pub async fn completed_bind(&self, peer: &str, pdu: Pdu) {
        self.emit(AgentEvent::CompletedBind {
            source_agent: self.agent.clone(),
            agent_kind: self.kind,
            remote_peer: peer.to_string(),
            pdu,
        })
        .await;
    }

    pub async fn transport_closed(&self, peer: &str) {
        self.emit(AgentEvent::PeerTransportClosed {
            source_agent: self.agent.clone(),
            agent_kind: self.kind,
            remote_peer: peer.to_string(),
        })
        .await;
    }

    pub async fn transport_error(&self, peer: &str, error: String) {
        self.emit(AgentEvent::TransportError {
            source_agent: self.agent.clone(),
            agent_kind: self.kind,
            remote_peer: peer.to_string(),
            error,
        })
        .await;
    }

    pub async fn application_error(&self, peer: &str, pdu: Option<Pdu>, error: String) {
        self.emit(AgentEvent::ApplicationError {
            source_agent: self.agent.clone(),
            agent_kind: self.kind,
            remote_peer: peer.to_string(),
            pdu,
            error,
        })
        .await;
    }
}

/// A test-harness agent, either an ESME or an SMSC.
#[async_trait]
pub trait Agent: Send + Sync {
    fn name(&self) -> &str;

    fn kind(&self) -> AgentKind;

    /// Install the shared event channel. Called at most once, before `start`.
    fn set_event_sink(&self, sink: mpsc::Sender<AgentEvent>);

    /// Bring the agent up: an SMSC binds its listener and spawns the accept
    /// loop; an ESME works through its bind descriptors in order. Failures
    /// surface as events, never as panics or returned errors.
    async fn start(self: Arc<Self>);

    /// Send one PDU to the named peer.
    async fn send_to_peer(&self, message: MessageDescriptor) -> Result<(), AgentError>;

    /// Signal every peer session to stop; for an SMSC this also closes the
    /// listener. Safe to call more than once.
    async fn unbind_all(&self);
}
