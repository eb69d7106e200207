//! Aggregate flow metrics for scoring

use super::flow::FlowState;
use super::network::NetworkDefinition;

/// Throughput and congestion summary, recomputed every tick
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FlowMetrics {
    /// Cumulative number of vehicles that left the network
    pub exits: u64,
    /// Vehicles currently on any edge
    pub occupied: usize,
    /// Occupied cells over total capacity, 0 for an empty network
    pub occupancy_ratio: f64,
}

impl FlowMetrics {
    pub fn compute(network: &NetworkDefinition, state: &FlowState) -> Self {
        let occupied = state.occupied();
        let capacity = network.total_capacity();
        let occupancy_ratio = if capacity > 0 {
            occupied as f64 / capacity as f64
        } else {
            0.0
        };
        Self {
            exits: state.exits(),
            occupied,
            occupancy_ratio,
        }
    }

    /// `[exits, occupied, occupancy_ratio]`
    pub fn to_state_vector(&self) -> [f64; 3] {
        [self.exits as f64, self.occupied as f64, self.occupancy_ratio]
    }
}
