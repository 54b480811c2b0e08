use super::*;
use acre_core_primitives::hashes::blake3_hash;

#[test]
fn empty_seed_list_is_refused() {
    assert!(matches!(
        Keystore::from_master_seeds(&Vec::<Vec<u8>>::new()),
        Err(KeystoreError::NoKeys)
    ));
}

#[test]
fn two_keys_per_seed() {
    let seeds = [blake3_hash(b"seed one"), blake3_hash(b"seed two")];
    let keystore = Keystore::from_master_seeds(&seeds).unwrap();

    let public_keys = keystore.public_keys();
    assert_eq!(public_keys.len(), 4);
    // Farmer and pool derivations must not collide
    let unique = public_keys.iter().collect::<std::collections::HashSet<_>>();
    assert_eq!(unique.len(), 4);
}

#[test]
fn pool_secret_keys_are_indexed_by_public_key() {
    let keystore = Keystore::from_master_seeds(&[blake3_hash(b"seed")]).unwrap();

    for public_key in keystore.public_keys() {
        let secret_key = keystore.pool_secret_key(&public_key).unwrap();
        assert_eq!(secret_key.public_key(), public_key);
    }
    assert!(
        keystore
            .pool_secret_key(&PublicKey::default())
            .is_none()
    );
}

#[test]
fn derivation_is_deterministic() {
    let first = Keystore::from_master_seeds(&[blake3_hash(b"seed")]).unwrap();
    let second = Keystore::from_master_seeds(&[blake3_hash(b"seed")]).unwrap();
    assert_eq!(first.public_keys(), second.public_keys());
}
