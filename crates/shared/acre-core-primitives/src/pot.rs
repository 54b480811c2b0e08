//! Proof-of-time iteration math.
//!
//! A proof of space wins a signage point when the iterations derived from its quality
//! fall below the signage point interval. The formulas here mirror the chain's
//! consensus rules; the farmer only uses them to pre-filter candidates before the full
//! node re-validates.


use crate::constants::ConsensusConstants;
use crate::hashes::{Blake3Hash, blake3_hash_list};
use crate::pos::PlotSize;
use primitive_types::U512;

/// Number of blocks over which v1 plots are phased out past the v2 activation height
pub const PHASE_OUT_PERIOD: u32 = 10_000_000;

/// Whether a signage point index belongs to the overflow region of its sub-slot
pub fn is_overflow_block(constants: &ConsensusConstants, signage_point_index: u8) -> bool {
    debug_assert!(signage_point_index < constants.num_sps_sub_slot);
    signage_point_index >= constants.num_sps_sub_slot - constants.num_sp_intervals_extra
}

/// Iterations of one signage point interval
pub fn calculate_sp_interval_iters(constants: &ConsensusConstants, sub_slot_iters: u64) -> u64 {
    debug_assert_eq!(sub_slot_iters % u64::from(constants.num_sps_sub_slot), 0);
    sub_slot_iters / u64::from(constants.num_sps_sub_slot)
}

/// Iterations from the start of the sub-slot to a signage point
pub fn calculate_sp_iters(
    constants: &ConsensusConstants,
    sub_slot_iters: u64,
    signage_point_index: u8,
) -> u64 {
    debug_assert!(signage_point_index < constants.num_sps_sub_slot);
    calculate_sp_interval_iters(constants, sub_slot_iters) * u64::from(signage_point_index)
}

/// Extra iterations added to v1 plots as they are phased out past the v2 activation
/// height.
///
/// Zero before activation, one full signage point interval once `PHASE_OUT_PERIOD`
/// blocks have elapsed, proportional in between.
pub fn calculate_phase_out(
    constants: &ConsensusConstants,
    sub_slot_iters: u64,
    prev_transaction_block_height: u32,
) -> u64 {
    if prev_transaction_block_height <= constants.hard_fork2_height {
        return 0;
    }
    let elapsed = prev_transaction_block_height - constants.hard_fork2_height;
    let interval_iters = calculate_sp_interval_iters(constants, sub_slot_iters);
    if elapsed >= PHASE_OUT_PERIOD {
        return interval_iters;
    }
    u64::from(elapsed) * interval_iters / u64::from(PHASE_OUT_PERIOD)
}

/// Space a plot of size `k` is expected to occupy, in units of quality entries
pub fn expected_plot_size(k: u8) -> u64 {
    (2 * u64::from(k) + 1) << (k - 1)
}

/// Convert a quality string into required iterations.
///
/// The quality is mixed with the signage point hash and scaled by difficulty over the
/// expected plot size, so bigger plots win proportionally more often. Never returns
/// zero.
pub fn calculate_iterations_quality(
    constants: &ConsensusConstants,
    quality_string: &Blake3Hash,
    size: PlotSize,
    difficulty: u64,
    sp_hash: &Blake3Hash,
    sub_slot_iters: u64,
    prev_transaction_block_height: u32,
) -> u64 {
    let sp_quality = blake3_hash_list(&[quality_string.as_ref(), sp_hash.as_ref()]);

    let numerator = U512::from(difficulty)
        * U512::from(constants.difficulty_constant_factor)
        * U512::from_big_endian(sp_quality.as_ref());
    let denominator = (U512::one() << 256) * U512::from(expected_plot_size(size.k()));
    let quotient = numerator / denominator;

    let phase_out = match size {
        PlotSize::V1 { .. } => {
            calculate_phase_out(constants, sub_slot_iters, prev_transaction_block_height)
        }
        // Phase-out is the v1 ramp-down only
        PlotSize::V2 { .. } => 0,
    };

    let iters = quotient.saturating_add(U512::from(phase_out));
    if iters > U512::from(u64::MAX) {
        u64::MAX
    } else {
        iters.as_u64().max(1)
    }
}
