use super::*;
use crate::harvester::{PartialProofsData, RespondSignatures};
use acre_core_primitives::hashes::blake3_hash;
use acre_core_primitives::keys::PublicKey;

fn sample_partials() -> PartialProofsData {
    PartialProofsData {
        challenge_hash: blake3_hash(b"challenge"),
        sp_hash: blake3_hash(b"sp"),
        plot_identifier: "plot_1".to_string(),
        partial_proofs: vec![[100, 200, 300, 400], [2222, 3333, 4444, 5555]],
        signage_point_index: 2,
        plot_size: 32,
        strength: 5,
        plot_id: blake3_hash(b"plot id"),
        pool_public_key: None,
        pool_contract_puzzle_hash: blake3_hash(b"contract"),
        plot_public_key: PublicKey::default(),
    }
}

#[test]
fn message_round_trips_through_a_frame() {
    let message = Message::make(ProtocolMessageType::PartialProofs, &sample_partials());
    let frame = message.encode_frame();

    let mut buffer = BytesMut::from(frame.as_ref());
    let decoded = Message::decode_frame(&mut buffer).unwrap().unwrap();
    assert!(buffer.is_empty());
    assert_eq!(decoded, message);
    assert_eq!(decoded.parse::<PartialProofsData>().unwrap(), sample_partials());
}

#[test]
fn incomplete_frames_are_left_in_the_buffer() {
    let message = Message::make(ProtocolMessageType::NewSignagePoint, &blake3_hash(b"x"));
    let frame = message.encode_frame();

    let mut buffer = BytesMut::new();
    for &byte in &frame[..frame.len() - 1] {
        buffer.extend_from_slice(&[byte]);
        assert!(Message::decode_frame(&mut buffer).unwrap().is_none());
    }
    buffer.extend_from_slice(&frame[frame.len() - 1..]);
    assert!(Message::decode_frame(&mut buffer).unwrap().is_some());
    assert!(buffer.is_empty());
}

#[test]
fn two_frames_decode_in_order() {
    let first = Message::make(ProtocolMessageType::FarmingInfo, &1_u32);
    let second = Message::make_reply(ProtocolMessageType::SignedValues, Some(7), &2_u32);

    let mut buffer = BytesMut::new();
    buffer.extend_from_slice(&first.encode_frame());
    buffer.extend_from_slice(&second.encode_frame());

    assert_eq!(Message::decode_frame(&mut buffer).unwrap().unwrap(), first);
    let decoded = Message::decode_frame(&mut buffer).unwrap().unwrap();
    assert_eq!(decoded.id, Some(7));
    assert_eq!(decoded, second);
}

#[test]
fn oversized_frames_are_rejected() {
    let mut buffer = BytesMut::new();
    buffer.extend_from_slice(&u32::MAX.to_le_bytes());
    buffer.extend_from_slice(&[0; 16]);

    assert!(matches!(
        Message::decode_frame(&mut buffer),
        Err(CodecError::FrameTooLarge { .. })
    ));
}

#[test]
fn optional_fields_round_trip() {
    let respond = RespondSignatures {
        plot_identifier: "plot_1".to_string(),
        challenge_hash: blake3_hash(b"challenge"),
        sp_hash: blake3_hash(b"sp"),
        local_pk: PublicKey::default(),
        farmer_pk: PublicKey::default(),
        message_signatures: Vec::new(),
        include_source_signature_data: false,
        farmer_reward_address_override: Some(blake3_hash(b"override")),
    };

    let message = Message::make(ProtocolMessageType::RespondSignatures, &respond);
    assert_eq!(message.parse::<RespondSignatures>().unwrap(), respond);
}

#[test]
fn truncated_payloads_fail_to_parse() {
    let mut message = Message::make(ProtocolMessageType::PartialProofs, &sample_partials());
    message.data.truncate(3);
    assert!(message.parse::<PartialProofsData>().is_err());
}
