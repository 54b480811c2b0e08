//! Proof-of-space structures and quality derivation.
//!
//! The harvester owns plot files and the lookup tables inside them; what crosses the
//! wire is the compact [`ProofOfSpace`] below. The farmer re-derives the quality
//! string from it before trusting any candidate.

#[cfg(test)]
mod tests;

use crate::constants::ConsensusConstants;
use crate::hashes::{Blake3Hash, blake3_hash_list};
use crate::keys::PublicKey;
use parity_scale_codec::{Decode, Encode};
use std::fmt;

/// Plot size descriptor.
///
/// v1 plots carry the classic k-size, v2 plots additionally commit to the proof
/// strength the plotter chose.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Encode, Decode)]
pub enum PlotSize {
    /// Original plot format
    #[codec(index = 0)]
    V1 {
        /// k-size
        k: u8,
    },
    /// Partial-proof plot format finished by solvers
    #[codec(index = 1)]
    V2 {
        /// k-size
        k: u8,
        /// Proof strength
        strength: u8,
    },
}

impl PlotSize {
    /// k-size of the plot
    pub fn k(&self) -> u8 {
        match self {
            Self::V1 { k } | Self::V2 { k, .. } => *k,
        }
    }
}

/// Proof that a plot holds space eligible for a signage point
#[derive(Clone, Eq, PartialEq, Encode, Decode)]
pub struct ProofOfSpace {
    /// Challenge this proof answers, bound to the plot id and signage point
    pub challenge: Blake3Hash,
    /// Pool key for OG plots; mutually exclusive with the contract puzzle hash
    pub pool_public_key: Option<PublicKey>,
    /// Pool contract puzzle hash for portable plots
    pub pool_contract_puzzle_hash: Option<Blake3Hash>,
    /// Aggregate public key owning the plot
    pub plot_public_key: PublicKey,
    /// Plot size descriptor
    pub size: PlotSize,
    /// Proof body
    pub proof: Vec<u8>,
}

impl fmt::Debug for ProofOfSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProofOfSpace")
            .field("challenge", &self.challenge)
            .field("pool_public_key", &self.pool_public_key)
            .field("pool_contract_puzzle_hash", &self.pool_contract_puzzle_hash)
            .field("plot_public_key", &self.plot_public_key)
            .field("size", &self.size)
            .field("proof", &hex::encode(&self.proof))
            .finish()
    }
}

impl ProofOfSpace {
    /// Plot id of this proof, or `None` when the pool commitment is malformed (not
    /// exactly one of pool key / contract puzzle hash)
    pub fn plot_id(&self) -> Option<Blake3Hash> {
        match (&self.pool_public_key, &self.pool_contract_puzzle_hash) {
            (Some(pool_public_key), None) => Some(calculate_plot_id_pk(
                pool_public_key,
                &self.plot_public_key,
            )),
            (None, Some(pool_contract_puzzle_hash)) => Some(calculate_plot_id_ph(
                pool_contract_puzzle_hash,
                &self.plot_public_key,
            )),
            _ => None,
        }
    }
}

/// Plot id of an OG plot, committed to the pool public key
pub fn calculate_plot_id_pk(
    pool_public_key: &PublicKey,
    plot_public_key: &PublicKey,
) -> Blake3Hash {
    blake3_hash_list(&[pool_public_key.as_bytes(), plot_public_key.as_bytes()])
}

/// Plot id of a portable plot, committed to the pool contract puzzle hash
pub fn calculate_plot_id_ph(
    pool_contract_puzzle_hash: &Blake3Hash,
    plot_public_key: &PublicKey,
) -> Blake3Hash {
    blake3_hash_list(&[pool_contract_puzzle_hash.as_ref(), plot_public_key.as_bytes()])
}

/// Challenge a plot must answer for a given signage point.
///
/// The leading bits of the same hash double as the plot filter.
pub fn calculate_pos_challenge(
    plot_id: &Blake3Hash,
    challenge_hash: &Blake3Hash,
    sp_hash: &Blake3Hash,
) -> Blake3Hash {
    blake3_hash_list(&[plot_id.as_ref(), challenge_hash.as_ref(), sp_hash.as_ref()])
}

/// Whether a plot participates in a signage point at all
pub fn passes_plot_filter(
    constants: &ConsensusConstants,
    plot_id: &Blake3Hash,
    challenge_hash: &Blake3Hash,
    sp_hash: &Blake3Hash,
) -> bool {
    let filter_hash = calculate_pos_challenge(plot_id, challenge_hash, sp_hash);
    filter_hash.leading_zero_bits() >= u32::from(constants.number_zero_bits_plot_filter)
}

/// Validate a proof of space against a signage point and derive its quality string.
///
/// Returns `None` for any structurally or cryptographically unacceptable proof: a
/// malformed pool commitment, a k-size out of bounds, a v2 proof before activation, a
/// plot that fails the filter, a challenge that does not match the plot/signage point
/// binding, or a proof body of the wrong length.
pub fn verify_and_get_quality_string(
    pos: &ProofOfSpace,
    constants: &ConsensusConstants,
    original_challenge_hash: &Blake3Hash,
    sp_hash: &Blake3Hash,
    peak_height: u32,
) -> Option<Blake3Hash> {
    let plot_id = pos.plot_id()?;

    let k = pos.size.k();
    if k < constants.min_plot_size || k > constants.max_plot_size {
        return None;
    }
    if matches!(pos.size, PlotSize::V2 { .. }) && peak_height < constants.hard_fork2_height {
        return None;
    }
    if !passes_plot_filter(constants, &plot_id, original_challenge_hash, sp_hash) {
        return None;
    }
    if pos.challenge != calculate_pos_challenge(&plot_id, original_challenge_hash, sp_hash) {
        return None;
    }
    // 64 proof entries of k bits each
    if pos.proof.len() != usize::from(k) * 8 {
        return None;
    }

    Some(blake3_hash_list(&[
        plot_id.as_ref(),
        pos.challenge.as_ref(),
        &pos.proof,
    ]))
}
