//! Invariant checks for headless runs
//!
//! After every tick the checker verifies that no edge is over capacity,
//! positions stay on their edge, followers keep their spacing once they
//! have left the entry point, occupied cells form a contiguous prefix, the
//! exit counter only grows by the exits reported, and the metrics agree
//! with the occupancy.

use anyhow::{ensure, Result};
use log::info;

use crate::simulation::{FixedController, FlowMetrics, NetworkDefinition, SimWorld, TickReport};

/// Slack for floating point comparisons
const EPSILON: f64 = 1e-9;

#[derive(Debug, Default)]
pub struct InvariantChecker {
    last_exits: u64,
}

impl InvariantChecker {
    pub fn new(world: &SimWorld) -> Self {
        Self {
            last_exits: world.flow().exits(),
        }
    }

    /// Check the world right after a tick that produced `report`
    pub fn check(&mut self, world: &SimWorld, report: &TickReport) -> Result<()> {
        let tick = world.tick_count();
        let spacing = world.params().min_spacing;
        let mut occupied = 0;

        for (edge, occupancy) in world.network().edges().iter().zip(world.flow().edges()) {
            let cells = occupancy.cells();
            ensure!(
                cells.len() == edge.capacity,
                "tick {tick}: {} has {} cells for capacity {}",
                edge.id,
                cells.len(),
                edge.capacity
            );

            let count = occupancy.occupied();
            ensure!(
                cells[..count].iter().all(Option::is_some),
                "tick {tick}: {} has a gap between occupied cells: {:?}",
                edge.id,
                cells
            );
            occupied += count;

            for (slot, position) in cells.iter().enumerate() {
                let Some(position) = *position else {
                    continue;
                };
                ensure!(
                    (0.0..=edge.length).contains(&position),
                    "tick {tick}: {} slot {slot} at {position} is off the edge (length {})",
                    edge.id,
                    edge.length
                );
                if slot > 0 {
                    if let Some(ahead) = cells[slot - 1] {
                        ensure!(
                            position <= ahead + EPSILON,
                            "tick {tick}: {} slot {slot} at {position} is ahead of {ahead}",
                            edge.id
                        );
                        // A vehicle still at the entry point may sit close behind
                        ensure!(
                            position <= 0.0 || position <= ahead - spacing + EPSILON,
                            "tick {tick}: {} slot {slot} at {position} is too close to {ahead}",
                            edge.id
                        );
                    }
                }
            }
        }

        let exits = world.flow().exits();
        ensure!(
            exits == self.last_exits + report.exits,
            "tick {tick}: exit counter went from {} to {} but {} exits were reported",
            self.last_exits,
            exits,
            report.exits
        );
        self.last_exits = exits;

        let metrics = world.metrics();
        ensure!(
            metrics.occupied == occupied && metrics.exits == exits,
            "tick {tick}: metrics {metrics:?} disagree with {occupied} vehicles and {exits} exits"
        );
        let capacity = world.network().total_capacity();
        let expected_ratio = if capacity > 0 {
            occupied as f64 / capacity as f64
        } else {
            0.0
        };
        ensure!(
            (metrics.occupancy_ratio - expected_ratio).abs() < EPSILON,
            "tick {tick}: occupancy ratio {} should be {expected_ratio}",
            metrics.occupancy_ratio
        );

        Ok(())
    }
}

/// Run the network for `ticks` ticks with constant phase requests,
/// checking invariants after every tick
pub fn dry_run(
    network: NetworkDefinition,
    seed: u64,
    requests: &[f64],
    ticks: u64,
) -> Result<FlowMetrics> {
    let mut world = SimWorld::new(network, seed);
    let mut controller = FixedController::new(requests.to_vec());
    let mut checker = InvariantChecker::new(&world);
    for _ in 0..ticks {
        let report = world.tick_with(&mut controller);
        checker.check(&world, &report)?;
    }
    info!(
        "dry run finished after {} ticks: {:?}",
        world.tick_count(),
        world.metrics()
    );
    Ok(world.metrics())
}
