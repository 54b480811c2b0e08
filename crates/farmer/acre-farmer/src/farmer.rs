//! Farmer state and lifecycle.
//!
//! All caches live behind a single non-async mutex that is never held across an
//! await: handlers mutate state synchronously and only then suspend on outbound
//! sends. That makes every handler's cache section atomic with respect to every
//! other handler without any further coordination.

mod api;

use crate::config::FarmerConfig;
use crate::keystore::Keystore;
use crate::peers::{FarmingPeer, PeerRegistry};
use acre_core_primitives::constants::ConsensusConstants;
use acre_core_primitives::hashes::Blake3Hash;
use acre_core_primitives::pos::ProofOfSpace;
use acre_protocol::farmer::{DeclareProofOfSpace, FarmingInfo, NewSignagePoint};
use acre_protocol::harvester::{HarvesterHandshake, PartialProof, PartialProofsData};
use acre_protocol::{Message, NodeType, PeerId, ProtocolMessageType};
use parity_scale_codec::Encode;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::Notify;
use tracing::{debug, info, warn};

/// Proofs accepted per signage point before further candidates are dropped.
///
/// Only a farmer controlling a large share of netspace ever gets here; the cap keeps
/// small test networks from flooding themselves.
pub const MAX_POS_PER_SP: u32 = 5;

/// Timestamp gap up to this multiple of the signage point interval is tolerated
/// across a challenge transition before signage points count as missed
const MISSING_SP_ALLOWANCE: f64 = 1.6;

/// Observer events, delivered best-effort to the registered callback
#[derive(Debug, Clone)]
pub enum StateChange {
    /// A signage point was accepted and fanned out
    NewSignagePoint {
        /// Challenge chain signage point hash
        sp_hash: Blake3Hash,
    },
    /// A proof of space was declared to the full nodes
    Proof {
        /// The declaration that was sent
        declaration: DeclareProofOfSpace,
        /// The proof passed the plot filter
        passed_filter: bool,
    },
    /// Harvester lookup statistics arrived
    NewFarmingInfo {
        /// The statistics as received
        info: FarmingInfo,
    },
    /// The detector concluded signage points were missed
    MissingSignagePoints {
        /// Arrival time of the signage point that revealed the gap
        timestamp: u64,
        /// Estimated number of missed signage points
        count: u32,
    },
    /// A peer went away
    CloseConnection {
        /// The peer that disconnected
        peer_id: PeerId,
    },
}

/// Observer callback
pub type StateChangeCallback = Arc<dyn Fn(&StateChange) + Send + Sync>;

/// Canonical serialization of a partial proof, the identity of a pending solver
/// request
pub(crate) type PartialProofKey = [u8; 32];

pub(crate) fn partial_proof_key(partial_proof: &PartialProof) -> PartialProofKey {
    partial_proof
        .encode()
        .try_into()
        .expect("Four u64 encode to exactly 32 bytes; qed")
}

/// Key of the janitor's add-time index
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub(crate) enum CacheKey {
    /// Signage point hash or quality string
    Hash(Blake3Hash),
    /// Pending solver request
    PartialProof(PartialProofKey),
}

/// Where a quality string came from; addresses the harvester for the foliage
/// signature round
#[derive(Debug, Clone)]
pub(crate) struct QualityIdentifier {
    pub(crate) plot_identifier: String,
    pub(crate) challenge_hash: Blake3Hash,
    pub(crate) sp_hash: Blake3Hash,
    pub(crate) peer_id: PeerId,
}

/// A partial proof forwarded to solvers and awaiting an answer
#[derive(Debug, Clone)]
pub(crate) struct PendingSolverRequest {
    pub(crate) proof_data: PartialProofsData,
    /// The harvester that owns the plot, not the solver
    pub(crate) peer: Arc<dyn FarmingPeer>,
}

/// All mutable farmer state, guarded by one mutex
#[derive(Debug, Default)]
pub(crate) struct FarmerState {
    /// Signage points keyed by challenge chain sp hash; multiple sub-slots can
    /// produce the same position
    pub(crate) sps: HashMap<Blake3Hash, Vec<NewSignagePoint>>,
    /// Accepted proof candidates per signage point
    pub(crate) proofs_of_space: HashMap<Blake3Hash, Vec<(String, ProofOfSpace)>>,
    /// Quality string to candidate origin
    pub(crate) quality_to_identifiers: HashMap<Blake3Hash, QualityIdentifier>,
    /// Proof responses seen per signage point, for the submission cap
    pub(crate) number_of_responses: HashMap<Blake3Hash, u32>,
    /// Insertion times of every key above, driving janitor eviction
    pub(crate) cache_add_time: HashMap<CacheKey, u64>,
    /// Partial proofs forwarded to solvers
    pub(crate) pending_solver_requests: HashMap<PartialProofKey, PendingSolverRequest>,
    /// Most recent signage point, for gap detection
    pub(crate) prev_signage_point: Option<(u64, NewSignagePoint)>,
}

impl FarmerState {
    /// Track a signage point arrival and estimate how many were missed before it.
    ///
    /// Within one challenge the signage point index advances by one per arrival, so a
    /// gap is plain index arithmetic. Across a challenge transition the indices are
    /// unrelated and the estimate falls back to timestamps, with some allowance for
    /// jitter.
    pub(crate) fn check_missing_signage_points(
        &mut self,
        now: u64,
        sp: &NewSignagePoint,
        constants: &ConsensusConstants,
    ) -> Option<(u64, u32)> {
        let Some((prev_time, prev_sp)) = self.prev_signage_point.replace((now, sp.clone()))
        else {
            return None;
        };

        if sp.challenge_hash == prev_sp.challenge_hash {
            let num_sps = u32::from(constants.num_sps_sub_slot);
            let index = u32::from(sp.signage_point_index);
            let prev_index = u32::from(prev_sp.signage_point_index);
            if index == (prev_index + 1) % num_sps {
                return None;
            }
            let skipped = (index + num_sps - prev_index - 1) % num_sps;
            Some((now, skipped))
        } else {
            let elapsed = now.saturating_sub(prev_time) as f64;
            let interval = constants.sub_slot_time_target as f64
                / f64::from(constants.num_sps_sub_slot);
            if elapsed < interval * MISSING_SP_ALLOWANCE {
                return None;
            }
            Some((now, (elapsed / interval) as u32))
        }
    }
}

/// The farming coordinator
pub struct Farmer {
    pub(crate) constants: ConsensusConstants,
    pub(crate) config: FarmerConfig,
    pub(crate) keystore: Keystore,
    pub(crate) peers: PeerRegistry,
    pub(crate) state: Mutex<FarmerState>,
    state_changed_callback: RwLock<Option<StateChangeCallback>>,
    shut_down: AtomicBool,
    shutdown_signal: Notify,
}

impl fmt::Debug for Farmer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Farmer")
            .field("constants", &self.constants)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Farmer {
    /// Create a farmer over an already-derived keystore
    pub fn new(constants: ConsensusConstants, config: FarmerConfig, keystore: Keystore) -> Self {
        Self {
            constants,
            config,
            keystore,
            peers: PeerRegistry::default(),
            state: Mutex::default(),
            state_changed_callback: RwLock::new(None),
            shut_down: AtomicBool::new(false),
            shutdown_signal: Notify::new(),
        }
    }

    /// Consensus constants the farmer operates under
    pub fn constants(&self) -> &ConsensusConstants {
        &self.constants
    }

    /// Registry of connected peers
    pub fn peers(&self) -> &PeerRegistry {
        &self.peers
    }

    /// Register the observer callback
    pub fn set_state_changed_callback(&self, callback: StateChangeCallback) {
        *self.state_changed_callback.write() = Some(callback);
    }

    pub(crate) fn state_changed(&self, change: StateChange) {
        if let Some(callback) = &*self.state_changed_callback.read() {
            callback(&change);
        }
    }

    /// Track a new peer connection; harvesters get the key handshake
    pub async fn on_connect(&self, peer: Arc<dyn FarmingPeer>) {
        self.peers.insert(Arc::clone(&peer));
        if peer.node_type() != NodeType::Harvester {
            return;
        }
        let handshake = HarvesterHandshake {
            farmer_public_keys: self.keystore.public_keys(),
            pool_public_keys: self.config.pool_public_keys.clone(),
        };
        let message = Message::make(ProtocolMessageType::HarvesterHandshake, &handshake);
        if let Err(error) = peer.send(message).await {
            warn!(%error, peer_id = %peer.peer_id(), "Failed to send harvester handshake");
        }
    }

    /// Forget a peer that went away
    pub fn on_disconnect(&self, peer_id: &PeerId) {
        if self.peers.remove(peer_id).is_some() {
            info!(%peer_id, "Peer disconnected");
        }
        self.state_changed(StateChange::CloseConnection { peer_id: *peer_id });
    }

    /// Detector passthrough, see [`FarmerState::check_missing_signage_points`]
    pub fn check_missing_signage_points(
        &self,
        now: u64,
        sp: &NewSignagePoint,
    ) -> Option<(u64, u32)> {
        self.state
            .lock()
            .check_missing_signage_points(now, sp, &self.constants)
    }

    /// Request shutdown; the janitor exits within one sleep cycle
    pub fn shutdown(&self) {
        self.shut_down.store(true, Ordering::SeqCst);
        self.shutdown_signal.notify_waiters();
    }

    /// Periodic cache eviction, run until [`Farmer::shutdown`].
    ///
    /// Wakes every second and sweeps once per sub-slot time target, dropping
    /// everything older than two sub-slots.
    pub async fn run_cache_janitor(&self) {
        let mut time_slept = 0_u64;
        while !self.shut_down.load(Ordering::SeqCst) {
            if time_slept > self.constants.sub_slot_time_target {
                time_slept = 0;
                self.sweep_caches(unix_now());
            }
            time_slept += 1;
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_secs(1)) => {}
                _ = self.shutdown_signal.notified() => break,
            }
        }
    }

    pub(crate) fn sweep_caches(&self, now: u64) {
        let expiry = self.constants.sub_slot_time_target * 2;
        let mut state = self.state.lock();
        let expired = state
            .cache_add_time
            .iter()
            .filter(|&(_, &added)| now.saturating_sub(added) > expiry)
            .map(|(key, _)| key.clone())
            .collect::<Vec<_>>();
        for key in expired {
            match &key {
                CacheKey::Hash(hash) => {
                    state.sps.remove(hash);
                    state.proofs_of_space.remove(hash);
                    state.quality_to_identifiers.remove(hash);
                    state.number_of_responses.remove(hash);
                }
                CacheKey::PartialProof(pending_key) => {
                    state.pending_solver_requests.remove(pending_key);
                }
            }
            state.cache_add_time.remove(&key);
        }
        debug!(
            signage_points = state.sps.len(),
            proofs = state.proofs_of_space.len(),
            qualities = state.quality_to_identifiers.len(),
            pending_solver_requests = state.pending_solver_requests.len(),
            "Cleared farmer cache"
        );
    }
}

pub(crate) fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or_default()
}
