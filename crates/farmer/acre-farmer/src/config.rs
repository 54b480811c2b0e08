//! Farmer configuration, read once at startup.

use acre_core_primitives::hashes::Blake3Hash;
use acre_core_primitives::keys::PublicKey;
use serde::{Deserialize, Serialize};

/// Static farmer configuration.
///
/// Loading and persisting this (file format, reward address management) is the
/// embedder's business; the farmer only reads it.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct FarmerConfig {
    /// Puzzle hash farmer block rewards are sent to
    pub farmer_reward_address: Blake3Hash,
    /// Puzzle hash pool rewards of OG plots are sent to
    pub pool_reward_address: Blake3Hash,
    /// Pool public keys OG plots on attached harvesters may be bound to
    #[serde(default)]
    pub pool_public_keys: Vec<PublicKey>,
}
