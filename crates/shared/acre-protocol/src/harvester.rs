//! Protocol between harvester and farmer.

use acre_core_primitives::hashes::Blake3Hash;
use acre_core_primitives::keys::{PublicKey, Signature};
use acre_core_primitives::pos::ProofOfSpace;
use parity_scale_codec::{Decode, Encode};

/// A v2 partial proof: four table-1 entry indices the solver expands into a full proof
pub type PartialProof = [u64; 4];

/// Difficulty override a pool assigns to its contract plots
#[derive(Debug, Copy, Clone, Eq, PartialEq, Encode, Decode)]
pub struct PoolDifficulty {
    /// Difficulty the pool accepts partials at
    pub difficulty: u64,
    /// Sub-slot iterations the pool accepts partials at
    pub sub_slot_iters: u64,
    /// Contract the override applies to
    pub pool_contract_puzzle_hash: Blake3Hash,
}

/// Sent by the farmer on every new harvester connection
#[derive(Debug, Clone, Eq, PartialEq, Encode, Decode)]
pub struct HarvesterHandshake {
    /// Farmer public keys plots may be bound to
    pub farmer_public_keys: Vec<PublicKey>,
    /// Pool public keys OG plots may be bound to
    pub pool_public_keys: Vec<PublicKey>,
}

/// Signage point fan-out to harvesters
#[derive(Debug, Clone, Eq, PartialEq, Encode, Decode)]
pub struct NewSignagePointHarvester {
    /// Challenge of the sub-slot
    pub challenge_hash: Blake3Hash,
    /// Current difficulty
    pub difficulty: u64,
    /// Current sub-slot iterations
    pub sub_slot_iters: u64,
    /// Index of the signage point within its sub-slot
    pub signage_point_index: u8,
    /// Challenge chain signage point hash
    pub sp_hash: Blake3Hash,
    /// Per-pool difficulty overrides
    pub pool_difficulties: Vec<PoolDifficulty>,
    /// Height of the current peak
    pub peak_height: u32,
    /// Height of the last transaction block before the signage point, if any
    pub last_tx_height: Option<u32>,
}

/// Fee the harvester applied when selecting this proof
#[derive(Debug, Copy, Clone, Eq, PartialEq, Encode, Decode)]
pub struct ProofOfSpaceFeeInfo {
    /// Fee threshold in effect
    pub applied_fee_threshold: u32,
}

/// Harvester found a proof of space for a signage point
#[derive(Debug, Clone, Eq, PartialEq, Encode, Decode)]
pub struct NewProofOfSpace {
    /// Challenge of the sub-slot
    pub challenge_hash: Blake3Hash,
    /// Challenge chain signage point hash
    pub sp_hash: Blake3Hash,
    /// Harvester-local identifier of the plot holding the proof
    pub plot_identifier: String,
    /// The proof itself
    pub proof: ProofOfSpace,
    /// Index of the signage point within its sub-slot
    pub signage_point_index: u8,
    /// Ask the farmer to echo source data along with signature requests
    pub include_source_signature_data: bool,
    /// Harvester-requested override of the farmer reward address
    pub farmer_reward_address_override: Option<Blake3Hash>,
    /// Fee info of third-party harvesters
    pub fee_info: Option<ProofOfSpaceFeeInfo>,
}

/// Source data record echoed with a signature request so remote signers can inspect
/// what they sign
#[derive(Debug, Clone, Eq, PartialEq, Encode, Decode)]
pub struct SigningDataRecord {
    /// Kind tag of the signed structure
    pub kind: u8,
    /// Serialized structure the requested message hash commits to
    pub data: Vec<u8>,
}

/// Farmer asks a harvester to sign messages with a plot's local key
#[derive(Debug, Clone, Eq, PartialEq, Encode, Decode)]
pub struct RequestSignatures {
    /// Plot to sign with
    pub plot_identifier: String,
    /// Challenge of the sub-slot
    pub challenge_hash: Blake3Hash,
    /// Challenge chain signage point hash
    pub sp_hash: Blake3Hash,
    /// Message hashes to sign
    pub messages: Vec<Blake3Hash>,
    /// Source data of the message hashes, when requested during proof submission
    pub message_data: Option<Vec<SigningDataRecord>>,
    /// Serialized unfinished reward chain block, when requested
    pub rc_block_unfinished: Option<Vec<u8>>,
}

/// Harvester's signature shares over requested messages
#[derive(Debug, Clone, Eq, PartialEq, Encode, Decode)]
pub struct RespondSignatures {
    /// Plot that signed
    pub plot_identifier: String,
    /// Challenge of the sub-slot
    pub challenge_hash: Blake3Hash,
    /// Challenge chain signage point hash
    pub sp_hash: Blake3Hash,
    /// Plot-local public key
    pub local_pk: PublicKey,
    /// Farmer public key the plot is bound to
    pub farmer_pk: PublicKey,
    /// One share per requested message hash
    pub message_signatures: Vec<(Blake3Hash, Signature)>,
    /// Echo of the request's source-data flag
    pub include_source_signature_data: bool,
    /// Harvester-requested override of the farmer reward address
    pub farmer_reward_address_override: Option<Blake3Hash>,
}

/// Partial proofs of a v2 plot, to be finished by a solver
#[derive(Debug, Clone, Eq, PartialEq, Encode, Decode)]
pub struct PartialProofsData {
    /// Challenge of the sub-slot
    pub challenge_hash: Blake3Hash,
    /// Challenge chain signage point hash
    pub sp_hash: Blake3Hash,
    /// Harvester-local identifier of the plot holding the partials
    pub plot_identifier: String,
    /// The partial proofs
    pub partial_proofs: Vec<PartialProof>,
    /// Index of the signage point within its sub-slot
    pub signage_point_index: u8,
    /// k-size of the plot
    pub plot_size: u8,
    /// Proof strength the plot was created with
    pub strength: u8,
    /// Plot id
    pub plot_id: Blake3Hash,
    /// Pool key of OG plots
    pub pool_public_key: Option<PublicKey>,
    /// Pool contract puzzle hash
    pub pool_contract_puzzle_hash: Blake3Hash,
    /// Aggregate public key owning the plot
    pub plot_public_key: PublicKey,
}
