//! Hashing primitives.
//!
//! All 32-byte hashes on the network (challenges, signage point hashes, quality
//! strings, puzzle hashes, peer ids) are BLAKE3 outputs.

use derive_more::{From, Into};
use parity_scale_codec::{Decode, Encode};
use serde::{Deserialize, Serialize};
use std::fmt;

/// BLAKE3 hash output
#[derive(
    Default,
    Copy,
    Clone,
    Eq,
    PartialEq,
    Ord,
    PartialOrd,
    Hash,
    From,
    Into,
    Encode,
    Decode,
    Serialize,
    Deserialize,
)]
pub struct Blake3Hash(#[serde(with = "hex")] [u8; Blake3Hash::SIZE]);

impl fmt::Debug for Blake3Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl fmt::Display for Blake3Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl AsRef<[u8]> for Blake3Hash {
    #[inline]
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl Blake3Hash {
    /// Size of the hash output in bytes
    pub const SIZE: usize = 32;

    /// Access the raw bytes
    #[inline]
    pub fn as_bytes(&self) -> &[u8; Self::SIZE] {
        &self.0
    }

    /// Number of leading zero bits of the hash, used by the plot filter
    pub fn leading_zero_bits(&self) -> u32 {
        let mut bits = 0;
        for byte in self.0 {
            if byte == 0 {
                bits += 8;
            } else {
                bits += byte.leading_zeros();
                break;
            }
        }
        bits
    }
}

/// BLAKE3 hash of a single byte slice
pub fn blake3_hash(bytes: &[u8]) -> Blake3Hash {
    Blake3Hash(*blake3::hash(bytes).as_bytes())
}

/// BLAKE3 hash of a concatenation of byte slices, without materializing the
/// concatenation
pub fn blake3_hash_list(parts: &[&[u8]]) -> Blake3Hash {
    let mut hasher = blake3::Hasher::new();
    for part in parts {
        hasher.update(part);
    }
    Blake3Hash(*hasher.finalize().as_bytes())
}
