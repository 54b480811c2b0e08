use super::*;
use crate::hashes::blake3_hash;
use crate::keys::SecretKey;

fn test_constants() -> ConsensusConstants {
    ConsensusConstants {
        sub_slot_time_target: 600,
        num_sps_sub_slot: 64,
        num_sp_intervals_extra: 3,
        difficulty_constant_factor: 2_u128.pow(67),
        number_zero_bits_plot_filter: 0,
        min_plot_size: 18,
        max_plot_size: 50,
        hard_fork2_height: 1000,
    }
}

fn plot_public_key() -> PublicKey {
    SecretKey::from_seed(blake3_hash(b"plot key").as_ref())
        .unwrap()
        .public_key()
}

fn valid_pos(challenge_hash: &Blake3Hash, sp_hash: &Blake3Hash) -> ProofOfSpace {
    let pool_contract_puzzle_hash = blake3_hash(b"pool contract");
    let plot_public_key = plot_public_key();
    let plot_id = calculate_plot_id_ph(&pool_contract_puzzle_hash, &plot_public_key);
    let k = 20;
    ProofOfSpace {
        challenge: calculate_pos_challenge(&plot_id, challenge_hash, sp_hash),
        pool_public_key: None,
        pool_contract_puzzle_hash: Some(pool_contract_puzzle_hash),
        plot_public_key,
        size: PlotSize::V1 { k },
        proof: vec![0xAB; usize::from(k) * 8],
    }
}

#[test]
fn valid_proof_yields_a_quality_string() {
    let constants = test_constants();
    let challenge_hash = blake3_hash(b"challenge");
    let sp_hash = blake3_hash(b"sp");
    let pos = valid_pos(&challenge_hash, &sp_hash);

    let quality =
        verify_and_get_quality_string(&pos, &constants, &challenge_hash, &sp_hash, 1);
    assert!(quality.is_some());
    // Deterministic
    assert_eq!(
        quality,
        verify_and_get_quality_string(&pos, &constants, &challenge_hash, &sp_hash, 1)
    );
}

#[test]
fn malformed_pool_commitment_is_rejected() {
    let constants = test_constants();
    let challenge_hash = blake3_hash(b"challenge");
    let sp_hash = blake3_hash(b"sp");

    let mut both = valid_pos(&challenge_hash, &sp_hash);
    both.pool_public_key = Some(plot_public_key());
    assert_eq!(
        verify_and_get_quality_string(&both, &constants, &challenge_hash, &sp_hash, 1),
        None
    );

    let mut neither = valid_pos(&challenge_hash, &sp_hash);
    neither.pool_contract_puzzle_hash = None;
    assert_eq!(
        verify_and_get_quality_string(&neither, &constants, &challenge_hash, &sp_hash, 1),
        None
    );
}

#[test]
fn wrong_challenge_binding_is_rejected() {
    let constants = test_constants();
    let challenge_hash = blake3_hash(b"challenge");
    let sp_hash = blake3_hash(b"sp");

    let mut pos = valid_pos(&challenge_hash, &sp_hash);
    pos.challenge = blake3_hash(b"unrelated");
    assert_eq!(
        verify_and_get_quality_string(&pos, &constants, &challenge_hash, &sp_hash, 1),
        None
    );
    // Same proof against a different signage point must not validate either
    let pos = valid_pos(&challenge_hash, &sp_hash);
    assert_eq!(
        verify_and_get_quality_string(
            &pos,
            &constants,
            &challenge_hash,
            &blake3_hash(b"other sp"),
            1,
        ),
        None
    );
}

#[test]
fn proof_body_length_must_match_k() {
    let constants = test_constants();
    let challenge_hash = blake3_hash(b"challenge");
    let sp_hash = blake3_hash(b"sp");

    let mut pos = valid_pos(&challenge_hash, &sp_hash);
    pos.proof.truncate(10);
    assert_eq!(
        verify_and_get_quality_string(&pos, &constants, &challenge_hash, &sp_hash, 1),
        None
    );
}

#[test]
fn k_size_bounds_are_enforced() {
    let constants = test_constants();
    let challenge_hash = blake3_hash(b"challenge");
    let sp_hash = blake3_hash(b"sp");

    let mut pos = valid_pos(&challenge_hash, &sp_hash);
    pos.size = PlotSize::V1 { k: 17 };
    pos.proof = vec![0xAB; 17 * 8];
    assert_eq!(
        verify_and_get_quality_string(&pos, &constants, &challenge_hash, &sp_hash, 1),
        None
    );
}

#[test]
fn v2_proofs_only_validate_past_activation() {
    let constants = test_constants();
    let challenge_hash = blake3_hash(b"challenge");
    let sp_hash = blake3_hash(b"sp");

    let mut pos = valid_pos(&challenge_hash, &sp_hash);
    pos.size = PlotSize::V2 { k: 20, strength: 5 };

    assert_eq!(
        verify_and_get_quality_string(&pos, &constants, &challenge_hash, &sp_hash, 999),
        None
    );
    assert!(
        verify_and_get_quality_string(
            &pos,
            &constants,
            &challenge_hash,
            &sp_hash,
            constants.hard_fork2_height,
        )
        .is_some()
    );
}

#[test]
fn strict_plot_filter_rejects() {
    let mut constants = test_constants();
    constants.number_zero_bits_plot_filter = 255;
    let challenge_hash = blake3_hash(b"challenge");
    let sp_hash = blake3_hash(b"sp");
    let pos = valid_pos(&challenge_hash, &sp_hash);

    assert_eq!(
        verify_and_get_quality_string(&pos, &constants, &challenge_hash, &sp_hash, 1),
        None
    );
}

#[test]
fn plot_filter_counts_leading_zero_bits() {
    let mut bytes = [0u8; 32];
    bytes[2] = 0x20;
    assert_eq!(Blake3Hash::from(bytes).leading_zero_bits(), 18);
    assert_eq!(Blake3Hash::from([0; 32]).leading_zero_bits(), 256);
    let mut bytes = [0u8; 32];
    bytes[0] = 0x80;
    assert_eq!(Blake3Hash::from(bytes).leading_zero_bits(), 0);
}

#[test]
fn plot_ids_commit_to_the_pool() {
    let plot_public_key = plot_public_key();
    assert_ne!(
        calculate_plot_id_ph(&blake3_hash(b"contract a"), &plot_public_key),
        calculate_plot_id_ph(&blake3_hash(b"contract b"), &plot_public_key),
    );
}
