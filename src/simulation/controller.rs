//! Scripted phase controllers
//!
//! A controller plays the role of the external actor: between ticks it looks
//! at the committed world state and writes a phase request for every junction.

use log::debug;

use super::flow::FlowState;
use super::network::NetworkDefinition;
use super::types::JunctionId;
use super::world::SimWorld;

/// Hysteresis factor a competing queue must exceed before switching
pub const QUEUE_SWITCH_RATIO: f64 = 1.2;

/// Minimum number of ticks a phase is held before the queue controller switches
pub const MIN_PHASE_DURATION: u64 = 6;

/// Produces a phase request per junction before each tick
pub trait PhaseController {
    /// One request per junction, in junction order
    fn decide(&mut self, world: &SimWorld) -> Vec<f64>;
}

/// Always requests the same phases
#[derive(Debug, Clone)]
pub struct FixedController {
    requests: Vec<f64>,
}

impl FixedController {
    pub fn new(requests: Vec<f64>) -> Self {
        Self { requests }
    }
}

impl PhaseController for FixedController {
    fn decide(&mut self, world: &SimWorld) -> Vec<f64> {
        world
            .junction_controls()
            .iter()
            .enumerate()
            .map(|(i, control)| self.requests.get(i).copied().unwrap_or(control.requested()))
            .collect()
    }
}

/// Advances every junction to its next phase every `period` ticks
#[derive(Debug, Clone)]
pub struct CyclingController {
    period: u64,
}

impl CyclingController {
    pub fn new(period: u64) -> Self {
        Self {
            period: period.max(1),
        }
    }
}

impl PhaseController for CyclingController {
    fn decide(&mut self, world: &SimWorld) -> Vec<f64> {
        let advanced = world.tick_count() / self.period;
        world
            .network()
            .junctions()
            .iter()
            .map(|junction| (junction.default_phase as u64 + advanced) as f64)
            .collect()
    }
}

/// Gives green to whichever phase serves the longest queue, with
/// hysteresis and a minimum hold time
#[derive(Debug, Clone)]
pub struct QueueController {
    min_duration: u64,
    switch_ratio: f64,
    /// Current choice and the tick it was made, per junction
    held: Vec<(usize, u64)>,
}

impl Default for QueueController {
    fn default() -> Self {
        Self::new(MIN_PHASE_DURATION, QUEUE_SWITCH_RATIO)
    }
}

impl QueueController {
    pub fn new(min_duration: u64, switch_ratio: f64) -> Self {
        Self {
            min_duration,
            switch_ratio,
            held: Vec::new(),
        }
    }

    /// Vehicles on the incoming edges each phase of `junction` allows
    pub fn phase_queues(
        network: &NetworkDefinition,
        state: &FlowState,
        junction: JunctionId,
    ) -> Vec<usize> {
        network
            .junction(junction)
            .phases
            .iter()
            .map(|phase| {
                phase
                    .allowed
                    .iter()
                    .map(|edge| state.edge(*edge).occupied())
                    .sum()
            })
            .collect()
    }
}

impl PhaseController for QueueController {
    fn decide(&mut self, world: &SimWorld) -> Vec<f64> {
        let tick = world.tick_count();
        if self.held.len() != world.junction_controls().len() {
            self.held = world
                .junction_controls()
                .iter()
                .map(|control| (control.phase(), 0))
                .collect();
        }

        for (index, junction) in world.network().junctions().iter().enumerate() {
            let queues = Self::phase_queues(world.network(), world.flow(), junction.id);
            let (current, since) = self.held[index];
            let current_queue = queues.get(current).copied().unwrap_or(0) as f64;

            let busiest = queues
                .iter()
                .enumerate()
                .max_by_key(|(phase, queue)| (**queue, std::cmp::Reverse(*phase)))
                .map(|(phase, queue)| (phase, *queue as f64));

            let Some((desired, desired_queue)) = busiest else {
                continue;
            };
            if desired == current || desired_queue <= current_queue * self.switch_ratio {
                continue;
            }
            if tick.saturating_sub(since) < self.min_duration {
                continue;
            }

            debug!(
                "tick {}: {} switching to phase {} (queue {} vs {})",
                tick, junction.id, desired, desired_queue, current_queue
            );
            self.held[index] = (desired, tick);
        }

        self.held.iter().map(|(phase, _)| *phase as f64).collect()
    }
}
