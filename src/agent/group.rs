//! The agent group: a flat namespace of agents sharing one event channel.

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{mpsc, Mutex, RwLock};
use tracing::debug;

use crate::pdu::Pdu;

use super::{Agent, AgentError, AgentEvent, AgentKind, MessageDescriptor};

/// Capacity of the shared event channel. Producers block when it is full,
/// which is acceptable back-pressure for a test harness.
const EVENT_CHANNEL_CAPACITY: usize = 512;

#[derive(Debug, Error)]
pub enum RouteError {
    #[error("this agent group is not managing an agent named ({0})")]
    NoSuchAgent(String),

    #[error(transparent)]
    Agent(#[from] AgentError),
}

pub struct AgentGroup {
    agents: RwLock<HashMap<String, Arc<dyn Agent>>>,
    event_tx: mpsc::Sender<AgentEvent>,
    event_rx: Mutex<Option<mpsc::Receiver<AgentEvent>>>,
}

impl AgentGroup {
    pub fn new(agents: Vec<Arc<dyn Agent>>) -> Arc<Self> {
        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);

        let map = agents
            .into_iter()
            .map(|agent| (agent.name().to_string(), agent))
            .collect();

        Arc::new(Self {
            agents: RwLock::new(map),
            event_tx,
            event_rx: Mutex::new(Some(event_rx)),
        })
    }

    /// Add an agent. Silently replaces a managed agent with the same name.
    pub async fn add(&self, agent: Arc<dyn Agent>) {
        let mut agents = self.agents.write().await;
        agents.insert(agent.name().to_string(), agent);
    }

    pub async fn add_many(&self, list: Vec<Arc<dyn Agent>>) {
        for agent in list {
            self.add(agent).await;
        }
    }

    /// Remove an agent by name. Unknown names are silently ignored.
    pub async fn remove(&self, name: &str) {
        let mut agents = self.agents.write().await;
        agents.remove(name);
    }

    pub async fn remove_many(&self, names: &[&str]) {
        for name in names {
            self.remove(name).await;
        }
    }

    pub async fn managed_agent_names(&self) -> Vec<String> {
        self.agents.read().await.keys().cloned().collect()
    }

    /// Take the read side of the shared event channel. There is exactly one;
    /// the second caller gets `None`.
    pub async fn take_event_stream(&self) -> Option<mpsc::Receiver<AgentEvent>> {
        self.event_rx.lock().await.take()
    }

    /// Install the shared channel on every agent, then start them: SMSCs
    /// first, awaited, so their listeners are up before any ESME dials out;
    /// then the ESMEs, concurrently, since their binds block on the network.
    pub async fn start_all(&self) {
        let agents: Vec<Arc<dyn Agent>> = self.agents.read().await.values().cloned().collect();

        for agent in &agents {
            agent.set_event_sink(self.event_tx.clone());
        }

        for agent in &agents {
            if agent.kind() == AgentKind::Smsc {
                debug!(agent = %agent.name(), "starting agent");
                agent.clone().start().await;
            }
        }

        for agent in agents {
            if agent.kind() == AgentKind::Esme {
                debug!(agent = %agent.name(), "starting agent");
                tokio::spawn(agent.start());
            }
        }
    }

    /// Stop every managed agent.
    pub async fn stop_all(&self) {
        let agents: Vec<Arc<dyn Agent>> = self.agents.read().await.values().cloned().collect();
        for agent in agents {
            agent.unbind_all().await;
        }
    }

    /// Hand `pdu` to the named sending agent for delivery to the named peer.
    pub async fn route(
        &self,
        sending_name: &str,
        receiving_name: &str,
        pdu: Pdu,
    ) -> Result<(), RouteError> {
        let agent = self
            .agents
            .read()
            .await
            .get(sending_name)
            .cloned()
            .ok_or_else(|| RouteError::NoSuchAgent(sending_name.to_string()))?;

        agent
            .send_to_peer(MessageDescriptor {
                sending_peer: sending_name.to_string(),
                receiving_peer: receiving_name.to_string(),
                pdu,
            })
            .await?;

        Ok(())
    }
}
