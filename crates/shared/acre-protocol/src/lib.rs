//! Wire protocol between the farmer and its peers.
//!
//! Three peer protocols share one envelope: length-delimited frames carrying a
//! [`Message`] of `(type, optional request id, payload)`, where the payload is the
//! canonical SCALE encoding of one of the structures in [`farmer`], [`harvester`] or
//! [`solver`].

#[cfg(test)]
mod tests;

pub mod farmer;
pub mod harvester;
pub mod solver;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use derive_more::{From, Into};
use parity_scale_codec::{Decode, Encode};
use std::fmt;

/// Frames larger than this are rejected outright
pub const MAX_FRAME_SIZE: usize = 4 * 1024 * 1024;

/// Codec errors
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// Frame length prefix exceeds [`MAX_FRAME_SIZE`]
    #[error("Frame of {size} bytes exceeds the {MAX_FRAME_SIZE} byte limit")]
    FrameTooLarge {
        /// Claimed frame size
        size: usize,
    },
    /// Payload or envelope failed to decode
    #[error("Malformed message: {0}")]
    Malformed(#[from] parity_scale_codec::Error),
}

/// Kind of a peer, as established during the connection handshake
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Encode, Decode)]
pub enum NodeType {
    /// Consumer of proofs and producer of signage points
    #[codec(index = 0)]
    FullNode,
    /// Owner of plots
    #[codec(index = 1)]
    Harvester,
    /// Off-host finisher of v2 partial proofs
    #[codec(index = 2)]
    Solver,
}

/// Opaque peer identity derived from the peer's transport certificate
#[derive(
    Default, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, From, Into, Encode, Decode,
)]
pub struct PeerId(pub [u8; 32]);

impl fmt::Debug for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

/// Message type discriminants.
///
/// The `u8` values are part of the wire format and must never be reordered.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Encode, Decode)]
pub enum ProtocolMessageType {
    /// [`harvester::HarvesterHandshake`]
    #[codec(index = 0)]
    HarvesterHandshake,
    /// [`harvester::NewSignagePointHarvester`]
    #[codec(index = 1)]
    NewSignagePointHarvester,
    /// [`harvester::NewProofOfSpace`]
    #[codec(index = 2)]
    NewProofOfSpace,
    /// [`harvester::RequestSignatures`]
    #[codec(index = 3)]
    RequestSignatures,
    /// [`harvester::RespondSignatures`]
    #[codec(index = 4)]
    RespondSignatures,
    /// [`harvester::PartialProofsData`]
    #[codec(index = 5)]
    PartialProofs,
    /// [`farmer::NewSignagePoint`]
    #[codec(index = 6)]
    NewSignagePoint,
    /// [`farmer::DeclareProofOfSpace`]
    #[codec(index = 7)]
    DeclareProofOfSpace,
    /// [`farmer::RequestSignedValues`]
    #[codec(index = 8)]
    RequestSignedValues,
    /// [`farmer::SignedValues`]
    #[codec(index = 9)]
    SignedValues,
    /// [`farmer::FarmingInfo`]
    #[codec(index = 10)]
    FarmingInfo,
    /// [`solver::SolverRequest`]
    #[codec(index = 11)]
    SolverRequest,
    /// [`solver::SolverResponse`]
    #[codec(index = 12)]
    SolverResponse,
}

/// Protocol envelope: message type, optional request id for request/response pairs,
/// and the SCALE-encoded payload
#[derive(Debug, Clone, Eq, PartialEq, Encode, Decode)]
pub struct Message {
    /// Payload type
    pub msg_type: ProtocolMessageType,
    /// Request id; responses echo the id of the request they answer
    pub id: Option<u16>,
    /// SCALE-encoded payload
    pub data: Vec<u8>,
}

impl Message {
    /// Wrap a payload into an envelope without a request id
    pub fn make<T>(msg_type: ProtocolMessageType, payload: &T) -> Self
    where
        T: Encode,
    {
        Self {
            msg_type,
            id: None,
            data: payload.encode(),
        }
    }

    /// Wrap a payload into an envelope answering the request with the given id
    pub fn make_reply<T>(msg_type: ProtocolMessageType, id: Option<u16>, payload: &T) -> Self
    where
        T: Encode,
    {
        Self {
            msg_type,
            id,
            data: payload.encode(),
        }
    }

    /// Decode the payload as `T`
    pub fn parse<T>(&self) -> Result<T, CodecError>
    where
        T: Decode,
    {
        Ok(T::decode(&mut self.data.as_slice())?)
    }

    /// Encode into a single length-delimited frame
    pub fn encode_frame(&self) -> Bytes {
        let encoded = self.encode();
        let mut frame = BytesMut::with_capacity(encoded.len() + 4);
        frame.put_u32_le(u32::try_from(encoded.len()).expect("Frame fits in memory; qed"));
        frame.put_slice(&encoded);
        frame.freeze()
    }

    /// Decode one length-delimited frame from the front of `buffer`.
    ///
    /// Returns `Ok(None)` when the buffer does not yet hold a complete frame; the
    /// buffer is only advanced once a complete frame is consumed.
    pub fn decode_frame(buffer: &mut BytesMut) -> Result<Option<Self>, CodecError> {
        if buffer.len() < 4 {
            return Ok(None);
        }
        let size = u32::from_le_bytes(buffer[..4].try_into().expect("4 bytes checked; qed"));
        let size = size as usize;
        if size > MAX_FRAME_SIZE {
            return Err(CodecError::FrameTooLarge { size });
        }
        if buffer.len() < 4 + size {
            return Ok(None);
        }
        buffer.advance(4);
        let frame = buffer.split_to(size);
        Ok(Some(Self::decode(&mut frame.as_ref())?))
    }
}
