//! Signing keys of the farmer process.
//!
//! From each master seed two keys are derived along EIP-2333 paths: a farmer key that
//! signs farming shares, and a pool key that OG plots may be bound to. The farmer
//! refuses to start without any keys, there is nothing it could do.

#[cfg(test)]
mod tests;

use acre_core_primitives::keys::{KeyError, PublicKey, SecretKey};
use std::collections::HashMap;

const PURPOSE: u32 = 12381;
const COIN_TYPE: u32 = 8544;
const FARMER_USE: u32 = 0;
const POOL_USE: u32 = 1;

/// Keystore construction errors
#[derive(Debug, thiserror::Error)]
pub enum KeystoreError {
    /// No master seeds were provided
    #[error("No keys exist, generate keys before starting the farmer")]
    NoKeys,
    /// A seed failed key derivation
    #[error(transparent)]
    Key(#[from] KeyError),
}

/// Farmer and pool signing keys derived from the operator's master seeds
#[derive(Debug)]
pub struct Keystore {
    private_keys: Vec<SecretKey>,
    pool_secret_keys: HashMap<PublicKey, SecretKey>,
}

impl Keystore {
    /// Derive all signing keys from master seeds (32 bytes or more each).
    ///
    /// Fails with [`KeystoreError::NoKeys`] when `seeds` is empty.
    pub fn from_master_seeds(seeds: &[impl AsRef<[u8]>]) -> Result<Self, KeystoreError> {
        if seeds.is_empty() {
            return Err(KeystoreError::NoKeys);
        }
        let mut farmer_keys = Vec::with_capacity(seeds.len());
        let mut pool_keys = Vec::with_capacity(seeds.len());
        for seed in seeds {
            let master = SecretKey::from_seed(seed.as_ref())?;
            farmer_keys.push(master.derive_path(&[PURPOSE, COIN_TYPE, FARMER_USE, 0]));
            pool_keys.push(master.derive_path(&[PURPOSE, COIN_TYPE, POOL_USE, 0]));
        }
        let private_keys = farmer_keys
            .into_iter()
            .chain(pool_keys)
            .collect::<Vec<_>>();
        let pool_secret_keys = private_keys
            .iter()
            .map(|secret_key| (secret_key.public_key(), secret_key.clone()))
            .collect();
        Ok(Self {
            private_keys,
            pool_secret_keys,
        })
    }

    /// Public keys of all signing keys, farmer and pool derivations alike
    pub fn public_keys(&self) -> Vec<PublicKey> {
        self.private_keys
            .iter()
            .map(SecretKey::public_key)
            .collect()
    }

    /// All signing keys
    pub fn secret_keys(&self) -> impl Iterator<Item = &SecretKey> {
        self.private_keys.iter()
    }

    /// Signing key matching a pool public key a plot is bound to
    pub fn pool_secret_key(&self, public_key: &PublicKey) -> Option<&SecretKey> {
        self.pool_secret_keys.get(public_key)
    }
}
