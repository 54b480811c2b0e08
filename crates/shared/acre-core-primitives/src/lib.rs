//! Core primitives of the Acre Network farming stack.
//!
//! Everything in this crate is pure data and math: hashes, BLS key material and the
//! aggregate-signature helpers used by the plot key protocol, proof-of-space structures
//! with their quality derivation, and the consensus constants plus proof-of-time
//! iteration formulas. No I/O happens here.

pub mod constants;
pub mod hashes;
pub mod keys;
pub mod pool;
pub mod pos;
pub mod pot;
