//! Peer registry: the per-agent map from remote peer name to live session.
//!
//! For an SMSC the map is written by accept-spawned tasks once a peer's bind
//! completes and read by any caller routing outbound traffic, so it sits
//! behind an async RwLock. An ESME populates it during startup only.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::debug;

use super::session::PeerSession;

#[derive(Default)]
pub struct PeerRegistry {
    sessions: RwLock<HashMap<String, Arc<PeerSession>>>,
}

impl PeerRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Register a session under the peer's name. An existing entry for the
    /// same name is replaced.
    pub async fn insert(&self, peer_name: &str, session: Arc<PeerSession>) {
        let mut sessions = self.sessions.write().await;
        sessions.insert(peer_name.to_string(), session);
        debug!(peer = %peer_name, "peer session registered");
    }

    pub async fn get(&self, peer_name: &str) -> Option<Arc<PeerSession>> {
        self.sessions.read().await.get(peer_name).cloned()
    }

    pub async fn remove(&self, peer_name: &str) {
        let mut sessions = self.sessions.write().await;
        if sessions.remove(peer_name).is_some() {
            debug!(peer = %peer_name, "peer session unregistered");
        }
    }

    /// Signal every registered session to stop. Idempotent: a session that
    /// has already stopped ignores further signals.
    pub async fn stop_all(&self) {
        let sessions: Vec<Arc<PeerSession>> =
            self.sessions.read().await.values().cloned().collect();

        for session in sessions {
            session.stop();
        }
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}
