//! Peer connections as the farmer sees them.
//!
//! The transport layer owns sockets and framing; the farmer only holds shared,
//! type-tagged handles it can push messages into or run request/response round trips
//! over. Handles stay valid after disconnect, sends just start failing.

use acre_protocol::{Message, NodeType, PeerId};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Outbound dispatch errors
#[derive(Debug, thiserror::Error)]
pub enum PeerError {
    /// Transport failed to deliver the message
    #[error("Dispatch to peer failed: {0}")]
    Dispatch(String),
    /// The peer did not answer within the deadline
    #[error("Peer did not answer within {0:?}")]
    Timeout(Duration),
}

/// A connected peer
#[async_trait]
pub trait FarmingPeer: fmt::Debug + Send + Sync {
    /// Stable identity of the peer
    fn peer_id(&self) -> PeerId;

    /// Kind of node behind the connection
    fn node_type(&self) -> NodeType;

    /// Fire-and-forget delivery
    async fn send(&self, message: Message) -> Result<(), PeerError>;

    /// Request/response round trip with a deadline
    async fn call(&self, message: Message, timeout: Duration) -> Result<Message, PeerError>;
}

/// Live peer handles keyed by peer id
#[derive(Debug, Default)]
pub struct PeerRegistry {
    peers: RwLock<HashMap<PeerId, Arc<dyn FarmingPeer>>>,
}

impl PeerRegistry {
    /// Track a freshly connected peer
    pub fn insert(&self, peer: Arc<dyn FarmingPeer>) {
        self.peers.write().insert(peer.peer_id(), peer);
    }

    /// Forget a peer, returning its handle if it was known
    pub fn remove(&self, peer_id: &PeerId) -> Option<Arc<dyn FarmingPeer>> {
        self.peers.write().remove(peer_id)
    }

    /// Handle of a specific peer
    pub fn get(&self, peer_id: &PeerId) -> Option<Arc<dyn FarmingPeer>> {
        self.peers.read().get(peer_id).cloned()
    }

    /// Handles of all connected peers of one kind
    pub fn of_type(&self, node_type: NodeType) -> Vec<Arc<dyn FarmingPeer>> {
        self.peers
            .read()
            .values()
            .filter(|peer| peer.node_type() == node_type)
            .cloned()
            .collect()
    }
}
