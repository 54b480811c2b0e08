//! Protocol between farmer and solver.

use crate::harvester::{PartialProof, PartialProofsData};
use parity_scale_codec::{Decode, Encode};

/// Farmer forwards a harvester's partial proofs to a solver
#[derive(Debug, Clone, Eq, PartialEq, Encode, Decode)]
pub struct SolverRequest {
    /// The partial proofs and their plot context
    pub proof_data: PartialProofsData,
}

/// Solver's answer for one partial proof
#[derive(Debug, Clone, Eq, PartialEq, Encode, Decode)]
pub struct SolverResponse {
    /// The partial proof this answers
    pub partial_proof: PartialProof,
    /// The finished proof body; empty when the solver could not finish
    pub proof: Vec<u8>,
}
