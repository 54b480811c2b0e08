//! Pool reward target.

use crate::hashes::Blake3Hash;
use parity_scale_codec::{Decode, Encode};

/// Where pool rewards of an OG plot go.
///
/// Signed by the pool secret key as part of a proof-of-space declaration; the signed
/// bytes are the canonical encoding of this struct.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Encode, Decode)]
pub struct PoolTarget {
    /// Pool reward puzzle hash
    pub puzzle_hash: Blake3Hash,
    /// Height until which this target is valid; 0 means unrestricted
    pub max_height: u32,
}
