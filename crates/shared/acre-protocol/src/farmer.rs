//! Protocol between farmer and full node.

use acre_core_primitives::hashes::Blake3Hash;
use acre_core_primitives::keys::Signature;
use acre_core_primitives::pool::PoolTarget;
use acre_core_primitives::pos::ProofOfSpace;
use parity_scale_codec::{Decode, Encode};

/// A signage point entered the chain and proofs of space may now compete for it
#[derive(Debug, Clone, Eq, PartialEq, Encode, Decode)]
pub struct NewSignagePoint {
    /// Challenge of the sub-slot the signage point belongs to
    pub challenge_hash: Blake3Hash,
    /// Challenge chain signage point hash; the primary key of the signage point
    pub challenge_chain_sp: Blake3Hash,
    /// Reward chain signage point hash
    pub reward_chain_sp: Blake3Hash,
    /// Current difficulty
    pub difficulty: u64,
    /// Current sub-slot iterations, divisible by the number of signage points per
    /// sub-slot
    pub sub_slot_iters: u64,
    /// Index of the signage point within its sub-slot
    pub signage_point_index: u8,
    /// Height of the current peak
    pub peak_height: u32,
    /// Height of the last transaction block before the signage point, if any
    pub last_tx_height: Option<u32>,
}

/// Farmer declares a winning proof of space together with the aggregate signage point
/// signatures
#[derive(Debug, Clone, Eq, PartialEq, Encode, Decode)]
pub struct DeclareProofOfSpace {
    /// Challenge of the sub-slot
    pub challenge_hash: Blake3Hash,
    /// Challenge chain signage point hash
    pub challenge_chain_sp: Blake3Hash,
    /// Index of the signage point within its sub-slot
    pub signage_point_index: u8,
    /// Reward chain signage point hash
    pub reward_chain_sp: Blake3Hash,
    /// The winning proof
    pub proof_of_space: ProofOfSpace,
    /// Aggregate signature over the challenge chain signage point
    pub challenge_chain_sp_signature: Signature,
    /// Aggregate signature over the reward chain signage point
    pub reward_chain_sp_signature: Signature,
    /// Where farmer rewards for this block go
    pub farmer_puzzle_hash: Blake3Hash,
    /// Pool reward target for OG plots; absent for pool-contract plots
    pub pool_target: Option<PoolTarget>,
    /// Pool key signature over the target; absent for pool-contract plots
    pub pool_signature: Option<Signature>,
}

/// Full node asks the farmer to sign the foliage of an assembled block
#[derive(Debug, Clone, Eq, PartialEq, Encode, Decode)]
pub struct RequestSignedValues {
    /// Quality string identifying the winning proof
    pub quality_string: Blake3Hash,
    /// Hash of the foliage block data to sign
    pub foliage_block_data_hash: Blake3Hash,
    /// Hash of the foliage transaction block to sign
    pub foliage_transaction_block_hash: Blake3Hash,
    /// Serialized foliage block data, for harvesters that verify before signing
    pub foliage_block_data: Option<Vec<u8>>,
    /// Serialized foliage transaction block, for harvesters that verify before signing
    pub foliage_transaction_block_data: Option<Vec<u8>>,
}

/// Aggregate foliage signatures closing the second signing phase
#[derive(Debug, Clone, Eq, PartialEq, Encode, Decode)]
pub struct SignedValues {
    /// Quality string identifying the winning proof
    pub quality_string: Blake3Hash,
    /// Aggregate signature over the foliage block data hash
    pub foliage_block_data_signature: Signature,
    /// Aggregate signature over the foliage transaction block hash
    pub foliage_transaction_block_signature: Signature,
}

/// Harvester lookup statistics for one signage point, forwarded to observers
#[derive(Debug, Copy, Clone, Eq, PartialEq, Encode, Decode)]
pub struct FarmingInfo {
    /// Challenge of the sub-slot
    pub challenge_hash: Blake3Hash,
    /// Challenge chain signage point hash
    pub sp_hash: Blake3Hash,
    /// When the harvester finished the lookup
    pub timestamp: u64,
    /// Plots that passed the plot filter
    pub passed: u32,
    /// Proofs found
    pub proofs: u32,
    /// Plots eligible overall
    pub total_plots: u32,
}
