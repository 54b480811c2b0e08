//! BLS12-381 key material and the aggregate-signature helpers of the plot key
//! protocol.
//!
//! Plots are owned by an aggregate of a harvester-local key and a farmer key (plus a
//! taproot key for pool-contract plots). Farming signatures are produced as shares by
//! each key holder under the augmented scheme, with the aggregate public key prepended
//! to the message, and combined into a single signature that verifies under the
//! aggregate public key.


use crate::hashes::{Blake3Hash, blake3_hash_list};
use blst::BLST_ERROR;
use blst::min_pk as bls;
use derive_more::{From, Into};
use parity_scale_codec::{Decode, Encode};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Domain separation tag of the augmented BLS signature scheme
pub const AUG_SCHEME_DST: &[u8] = b"BLS_SIG_BLS12381G2_XMD:SHA-256_SSWU_RO_AUG_";

/// Errors of BLS key handling
#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
pub enum KeyError {
    /// Bytes do not encode a valid G1 point
    #[error("Invalid public key: {0:?}")]
    InvalidPublicKey(BLST_ERROR),
    /// Bytes do not encode a valid G2 point
    #[error("Invalid signature: {0:?}")]
    InvalidSignature(BLST_ERROR),
    /// Bytes do not encode a valid secret scalar
    #[error("Invalid secret key: {0:?}")]
    InvalidSecretKey(BLST_ERROR),
    /// Aggregation over the given points failed
    #[error("Failed to aggregate: {0:?}")]
    AggregationFailed(BLST_ERROR),
}

/// Compressed G1 public key
#[derive(
    Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, From, Into, Encode, Decode, Serialize,
    Deserialize,
)]
pub struct PublicKey(#[serde(with = "hex")] [u8; PublicKey::SIZE]);

impl Default for PublicKey {
    /// Point at infinity
    fn default() -> Self {
        let mut bytes = [0; Self::SIZE];
        bytes[0] = 0xc0;
        Self(bytes)
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl PublicKey {
    /// Size of the compressed encoding in bytes
    pub const SIZE: usize = 48;

    /// Access the raw compressed bytes
    #[inline]
    pub fn as_bytes(&self) -> &[u8; Self::SIZE] {
        &self.0
    }

    /// Aggregate public keys by point addition
    pub fn aggregate(public_keys: &[PublicKey]) -> Result<PublicKey, KeyError> {
        let points = public_keys
            .iter()
            .map(|public_key| public_key.to_point())
            .collect::<Result<Vec<_>, _>>()?;
        let refs = points.iter().collect::<Vec<_>>();
        let aggregate = bls::AggregatePublicKey::aggregate(&refs, false)
            .map_err(KeyError::AggregationFailed)?;
        Ok(Self(aggregate.to_public_key().to_bytes()))
    }

    fn to_point(self) -> Result<bls::PublicKey, KeyError> {
        bls::PublicKey::from_bytes(&self.0).map_err(KeyError::InvalidPublicKey)
    }
}

/// Compressed G2 signature
#[derive(Copy, Clone, Eq, PartialEq, Hash, From, Into, Encode, Decode, Serialize, Deserialize)]
pub struct Signature(#[serde(with = "hex")] [u8; Signature::SIZE]);

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl Signature {
    /// Size of the compressed encoding in bytes
    pub const SIZE: usize = 96;

    /// Access the raw compressed bytes
    #[inline]
    pub fn as_bytes(&self) -> &[u8; Self::SIZE] {
        &self.0
    }

    /// Aggregate signature shares into a single signature
    pub fn aggregate(signatures: &[Signature]) -> Result<Signature, KeyError> {
        let points = signatures
            .iter()
            .map(|signature| signature.to_point())
            .collect::<Result<Vec<_>, _>>()?;
        let refs = points.iter().collect::<Vec<_>>();
        let aggregate = bls::AggregateSignature::aggregate(&refs, true)
            .map_err(KeyError::AggregationFailed)?;
        Ok(Self(aggregate.to_signature().to_bytes()))
    }

    /// Verify under the augmented scheme with `public_key` itself as the prepended
    /// augmentation, the shape every aggregate farming signature has
    pub fn verify(&self, public_key: &PublicKey, message: &[u8]) -> bool {
        let Ok(signature) = self.to_point() else {
            return false;
        };
        let Ok(public_key_point) = public_key.to_point() else {
            return false;
        };
        signature.verify(
            true,
            message,
            AUG_SCHEME_DST,
            public_key.as_bytes(),
            &public_key_point,
            true,
        ) == BLST_ERROR::BLST_SUCCESS
    }

    fn to_point(self) -> Result<bls::Signature, KeyError> {
        bls::Signature::from_bytes(&self.0).map_err(KeyError::InvalidSignature)
    }
}

/// BLS secret scalar.
///
/// The scalar bytes are kept and re-expanded per operation, which keeps the type
/// cheaply clonable and comparable for map storage.
#[derive(Clone, Eq, PartialEq, Hash)]
pub struct SecretKey([u8; SecretKey::SIZE]);

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretKey(…)")
    }
}

impl SecretKey {
    /// Size of the scalar encoding in bytes
    pub const SIZE: usize = 32;

    /// Derive a master secret key from seed material (at least 32 bytes) per EIP-2333
    pub fn from_seed(seed: &[u8]) -> Result<Self, KeyError> {
        let secret_key =
            bls::SecretKey::derive_master_eip2333(seed).map_err(KeyError::InvalidSecretKey)?;
        Ok(Self(secret_key.to_bytes()))
    }

    /// Derive a child secret key per EIP-2333
    pub fn derive_child(&self, index: u32) -> Self {
        Self(self.to_scalar().derive_child_eip2333(index).to_bytes())
    }

    /// Derive a child secret key along a full EIP-2333 path
    pub fn derive_path(&self, path: &[u32]) -> Self {
        path.iter()
            .fold(self.clone(), |secret_key, &index| {
                secret_key.derive_child(index)
            })
    }

    /// Public key of this secret key
    pub fn public_key(&self) -> PublicKey {
        PublicKey(self.to_scalar().sk_to_pk().to_bytes())
    }

    /// Plain augmented-scheme signature, with our own public key as augmentation
    pub fn sign(&self, message: &[u8]) -> Signature {
        let scalar = self.to_scalar();
        let public_key = scalar.sk_to_pk().to_bytes();
        Signature(scalar.sign(message, AUG_SCHEME_DST, &public_key).to_bytes())
    }

    /// Signature share over `message` with the plot's aggregate public key prepended
    /// instead of our own
    pub fn sign_prepend(&self, message: &[u8], aggregate_public_key: &PublicKey) -> Signature {
        Signature(
            self.to_scalar()
                .sign(message, AUG_SCHEME_DST, aggregate_public_key.as_bytes())
                .to_bytes(),
        )
    }

    fn to_scalar(&self) -> bls::SecretKey {
        bls::SecretKey::from_bytes(&self.0)
            .expect("Bytes were produced by blst and round-trip losslessly; qed")
    }
}

/// Compute the aggregate public key owning a plot.
///
/// Pool-contract plots commit to an additional taproot key derived from the two base
/// keys, OG plots are owned by the plain local+farmer aggregate.
pub fn generate_plot_public_key(
    local_public_key: &PublicKey,
    farmer_public_key: &PublicKey,
    include_taproot: bool,
) -> Result<PublicKey, KeyError> {
    if include_taproot {
        let taproot_secret_key = generate_taproot_sk(local_public_key, farmer_public_key)?;
        PublicKey::aggregate(&[
            *local_public_key,
            *farmer_public_key,
            taproot_secret_key.public_key(),
        ])
    } else {
        PublicKey::aggregate(&[*local_public_key, *farmer_public_key])
    }
}

/// Derive the taproot secret key of a pool-contract plot.
///
/// Deterministic in the two base keys, so both the harvester and the farmer can
/// produce the taproot share locally.
pub fn generate_taproot_sk(
    local_public_key: &PublicKey,
    farmer_public_key: &PublicKey,
) -> Result<SecretKey, KeyError> {
    let base_aggregate = PublicKey::aggregate(&[*local_public_key, *farmer_public_key])?;
    let seed: Blake3Hash = blake3_hash_list(&[
        base_aggregate.as_bytes(),
        local_public_key.as_bytes(),
        farmer_public_key.as_bytes(),
    ]);
    SecretKey::from_seed(seed.as_ref())
}
