//! Consensus constants shared between the farmer and its peers.

/// Consensus constants relevant to farming.
///
/// Immutable after construction and shared by value.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct ConsensusConstants {
    /// Target duration of a sub-slot in seconds
    pub sub_slot_time_target: u64,
    /// Number of signage points per sub-slot
    pub num_sps_sub_slot: u8,
    /// Extra signage point intervals a block's infusion point lies past its signage
    /// point
    pub num_sp_intervals_extra: u8,
    /// Multiplier folded into the difficulty when converting a quality to iterations
    pub difficulty_constant_factor: u128,
    /// Leading zero bits a plot filter hash must have for a plot to participate in a
    /// signage point
    pub number_zero_bits_plot_filter: u8,
    /// Smallest accepted plot k-size
    pub min_plot_size: u8,
    /// Largest accepted plot k-size
    pub max_plot_size: u8,
    /// Height at which v2 plot formats activate
    pub hard_fork2_height: u32,
}

impl ConsensusConstants {
    /// Mainnet constants
    pub fn mainnet() -> Self {
        Self {
            sub_slot_time_target: 600,
            num_sps_sub_slot: 64,
            num_sp_intervals_extra: 3,
            difficulty_constant_factor: 2_u128.pow(67),
            number_zero_bits_plot_filter: 9,
            min_plot_size: 32,
            max_plot_size: 50,
            // TODO: lower once the v2 plot activation height is scheduled
            hard_fork2_height: u32::MAX,
        }
    }
}
