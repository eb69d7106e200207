//! Network flow engine
//!
//! Advances every edge's occupancy by one tick in four ordered passes:
//! phase snapshot, spawn, movement, then transfer/exit. The passes run over
//! the full edge set in edge-index order so a tick is fully deterministic
//! for a given seed and sequence of phase requests.

use log::trace;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::ops::AddAssign;

use super::junction::JunctionControl;
use super::network::{Handoff, NetworkDefinition};
use super::types::{EdgeId, FlowParams, JunctionId, EMPTY_CELL};

/// Fixed-size slot array for one edge.
///
/// Cell 0 holds the front (most advanced) vehicle. Occupied cells always
/// form a contiguous prefix, so index order is spatial order. Every
/// follower keeps at least the minimum spacing behind the vehicle ahead,
/// except a vehicle still waiting at the entry point.
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeOccupancy {
    cells: Vec<Option<f64>>,
}

impl EdgeOccupancy {
    pub fn new(capacity: usize) -> Self {
        Self {
            cells: vec![None; capacity],
        }
    }

    pub fn capacity(&self) -> usize {
        self.cells.len()
    }

    pub fn cells(&self) -> &[Option<f64>] {
        &self.cells
    }

    /// Number of vehicles on the edge
    pub fn occupied(&self) -> usize {
        self.cells.iter().filter(|cell| cell.is_some()).count()
    }

    pub fn is_full(&self) -> bool {
        self.cells.iter().all(Option::is_some)
    }

    /// Position of the front vehicle
    pub fn front(&self) -> Option<f64> {
        self.cells.first().copied().flatten()
    }

    /// Position of the rearmost vehicle
    pub fn rear(&self) -> Option<f64> {
        self.cells.iter().rev().find_map(|cell| *cell)
    }

    /// Append a vehicle behind the current rear vehicle.
    ///
    /// Fails without touching the edge when every cell is taken or when the
    /// rear vehicle is closer than `min_spacing` ahead of `position`.
    pub fn push_rear(&mut self, position: f64, min_spacing: f64) -> bool {
        let Some(slot) = self.cells.iter().position(Option::is_none) else {
            return false;
        };
        if slot > 0 {
            if let Some(ahead) = self.cells[slot - 1] {
                if position > ahead - min_spacing {
                    return false;
                }
            }
        }
        self.cells[slot] = Some(position);
        true
    }

    /// Insert a new vehicle at the start of the edge.
    ///
    /// Only fails when every cell is taken. The new vehicle waits at 0
    /// until the vehicle ahead has moved `min_spacing` clear.
    pub fn insert(&mut self) -> bool {
        let Some(slot) = self.cells.iter().position(Option::is_none) else {
            return false;
        };
        self.cells[slot] = Some(0.0);
        true
    }

    /// Shift every cell one place forward and vacate the last one
    pub fn remove_front(&mut self) -> Option<f64> {
        if self.cells.is_empty() {
            return None;
        }
        let front = self.cells.remove(0);
        self.cells.push(None);
        front
    }

    /// Move every vehicle forward by `speed`, keeping spacing behind the
    /// vehicle ahead. Vehicles never move backwards.
    pub fn advance(&mut self, speed: f64, length: f64, min_spacing: f64) {
        for slot in 0..self.cells.len() {
            let Some(position) = self.cells[slot] else {
                continue;
            };
            let mut next = (position + speed).min(length);
            if slot > 0 {
                if let Some(ahead) = self.cells[slot - 1] {
                    next = next.min(ahead - min_spacing).max(position);
                }
            }
            self.cells[slot] = Some(next);
        }
    }

    fn pin_front(&mut self, length: f64) {
        if let Some(front) = self.cells.first_mut() {
            if front.is_some() {
                *front = Some(length);
            }
        }
    }
}

/// Occupancy of every edge plus the global exit counter
#[derive(Debug, Clone, PartialEq)]
pub struct FlowState {
    edges: Vec<EdgeOccupancy>,
    exits: u64,
}

impl FlowState {
    /// All cells empty, no exits
    pub fn new(network: &NetworkDefinition) -> Self {
        Self {
            edges: network
                .edges()
                .iter()
                .map(|edge| EdgeOccupancy::new(edge.capacity))
                .collect(),
            exits: 0,
        }
    }

    pub fn edge(&self, id: EdgeId) -> &EdgeOccupancy {
        &self.edges[id.0]
    }

    pub fn edges(&self) -> &[EdgeOccupancy] {
        &self.edges
    }

    pub(crate) fn edge_mut(&mut self, id: EdgeId) -> &mut EdgeOccupancy {
        &mut self.edges[id.0]
    }

    /// Cumulative number of vehicles that left the network
    pub fn exits(&self) -> u64 {
        self.exits
    }

    /// Number of vehicles currently in the network
    pub fn occupied(&self) -> usize {
        self.edges.iter().map(EdgeOccupancy::occupied).sum()
    }

    /// Flat encoding: every edge's cells in edge order, empty cells as
    /// `EMPTY_CELL`, followed by the exit counter
    pub fn to_state_vector(&self) -> Vec<f64> {
        let mut state: Vec<f64> = self
            .edges
            .iter()
            .flat_map(|edge| edge.cells().iter().map(|c| c.unwrap_or(EMPTY_CELL)))
            .collect();
        state.push(self.exits as f64);
        state
    }
}

/// One independent random stream per spawning edge
#[derive(Debug, Clone)]
pub struct SpawnStreams {
    streams: Vec<Option<StdRng>>,
}

impl SpawnStreams {
    pub fn new(network: &NetworkDefinition, seed: u64) -> Self {
        let streams = network
            .edges()
            .iter()
            .map(|edge| {
                edge.spawn_probability()
                    .map(|_| StdRng::seed_from_u64(stream_seed(seed, edge.id)))
            })
            .collect();
        Self { streams }
    }

    /// Draw the next uniform sample in [0, 1) for a spawning edge
    pub fn sample(&mut self, edge: EdgeId) -> Option<f64> {
        self.streams
            .get_mut(edge.0)
            .and_then(Option::as_mut)
            .map(|rng| rng.random::<f64>())
    }
}

fn stream_seed(seed: u64, edge: EdgeId) -> u64 {
    seed ^ (edge.0 as u64 + 1).wrapping_mul(0x9E37_79B9_7F4A_7C15)
}

/// Junction phases frozen at the start of a tick
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseSnapshot(Vec<usize>);

impl PhaseSnapshot {
    pub fn capture(controls: &[JunctionControl]) -> Self {
        Self(controls.iter().map(JunctionControl::phase).collect())
    }

    pub fn from_phases(phases: Vec<usize>) -> Self {
        Self(phases)
    }

    pub fn phase(&self, junction: JunctionId) -> usize {
        self.0.get(junction.0).copied().unwrap_or(0)
    }
}

/// What happened during one flow step
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    pub spawned: u64,
    pub spawns_dropped: u64,
    pub transfers: u64,
    pub exits: u64,
    /// Front vehicles held because their signal was red
    pub pinned_by_signal: u64,
    /// Front vehicles held because the downstream edge had no room
    pub pinned_by_capacity: u64,
}

impl AddAssign for TickReport {
    fn add_assign(&mut self, other: Self) {
        self.spawned += other.spawned;
        self.spawns_dropped += other.spawns_dropped;
        self.transfers += other.transfers;
        self.exits += other.exits;
        self.pinned_by_signal += other.pinned_by_signal;
        self.pinned_by_capacity += other.pinned_by_capacity;
    }
}

/// Advance the flow state by one tick
pub fn step(
    network: &NetworkDefinition,
    params: &FlowParams,
    state: &mut FlowState,
    phases: &PhaseSnapshot,
    streams: &mut SpawnStreams,
) -> TickReport {
    let mut report = TickReport::default();
    spawn_vehicles(network, state, streams, &mut report);
    move_vehicles(network, params, state);
    transfer_vehicles(network, params, state, phases, &mut report);
    report
}

fn spawn_vehicles(
    network: &NetworkDefinition,
    state: &mut FlowState,
    streams: &mut SpawnStreams,
    report: &mut TickReport,
) {
    for edge in network.edges() {
        let Some(rate) = edge.spawn_probability() else {
            continue;
        };
        let Some(sample) = streams.sample(edge.id) else {
            continue;
        };
        if sample >= rate {
            continue;
        }
        if state.edge_mut(edge.id).insert() {
            trace!("spawned vehicle on {}", edge.id);
            report.spawned += 1;
        } else {
            trace!("spawn on {} dropped, no room", edge.id);
            report.spawns_dropped += 1;
        }
    }
}

fn move_vehicles(network: &NetworkDefinition, params: &FlowParams, state: &mut FlowState) {
    for edge in network.edges() {
        state
            .edge_mut(edge.id)
            .advance(edge.speed, edge.length, params.min_spacing);
    }
}

fn transfer_vehicles(
    network: &NetworkDefinition,
    params: &FlowParams,
    state: &mut FlowState,
    phases: &PhaseSnapshot,
    report: &mut TickReport,
) {
    for edge in network.edges() {
        // Each vehicle can complete the edge at most once per tick.
        for _ in 0..edge.capacity {
            match state.edge(edge.id).front() {
                Some(front) if front >= edge.length - params.arrival_tolerance => {}
                _ => break,
            }

            let next = match edge.handoff {
                Handoff::Exit => {
                    state.edge_mut(edge.id).remove_front();
                    state.exits += 1;
                    report.exits += 1;
                    trace!("vehicle left the network from {}", edge.id);
                    continue;
                }
                Handoff::Next(next) => next,
            };

            let allowed = edge.gate.is_none_or(|junction| {
                network
                    .junction(junction)
                    .allows(phases.phase(junction), edge.id)
            });
            if !allowed {
                state.edge_mut(edge.id).pin_front(edge.length);
                report.pinned_by_signal += 1;
                trace!("{} held at red signal", edge.id);
                break;
            }

            if !state.edge_mut(next).insert() {
                state.edge_mut(edge.id).pin_front(edge.length);
                report.pinned_by_capacity += 1;
                trace!("{} held, {} has no room", edge.id, next);
                break;
            }

            state.edge_mut(edge.id).remove_front();
            report.transfers += 1;
            trace!("vehicle moved from {} to {}", edge.id, next);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::network::{EdgeConfig, JunctionConfig, PhaseConfig};
    use crate::simulation::types::Point;

    fn edge(
        id: usize,
        length: f64,
        capacity: usize,
        speed: f64,
        spawn_rate: Option<f64>,
        next: Option<usize>,
        junction: Option<usize>,
    ) -> EdgeConfig {
        EdgeConfig {
            id: EdgeId(id),
            name: format!("e{id}"),
            start: Point::new(0.0, id as f64 * 20.0),
            end: Point::new(length, id as f64 * 20.0),
            capacity,
            speed,
            spawn_rate,
            next_edge: next.map(EdgeId),
            junction: junction.map(JunctionId),
        }
    }

    fn params() -> FlowParams {
        FlowParams::default()
    }

    #[test]
    fn test_insert_fills_contiguous_prefix() {
        let mut occupancy = EdgeOccupancy::new(3);
        assert!(occupancy.insert());
        assert_eq!(occupancy.cells(), &[Some(0.0), None, None]);
        // A free cell accepts the vehicle even with the rear one at the entry
        assert!(occupancy.insert());
        assert_eq!(occupancy.cells(), &[Some(0.0), Some(0.0), None]);
    }

    #[test]
    fn test_vehicle_at_entry_waits_for_spacing() {
        let mut occupancy = EdgeOccupancy::new(3);
        assert!(occupancy.push_rear(2.0, 6.0));
        assert!(occupancy.insert());
        occupancy.advance(3.0, 100.0, 6.0);
        assert_eq!(occupancy.cells(), &[Some(5.0), Some(0.0), None]);
        occupancy.advance(3.0, 100.0, 6.0);
        assert_eq!(occupancy.cells(), &[Some(8.0), Some(2.0), None]);
    }

    #[test]
    fn test_push_rear_requires_clearance() {
        let mut occupancy = EdgeOccupancy::new(3);
        assert!(occupancy.push_rear(4.0, 6.0));
        assert!(!occupancy.push_rear(0.0, 6.0));
        assert_eq!(occupancy.occupied(), 1);
    }

    #[test]
    fn test_insert_fails_when_full() {
        let mut occupancy = EdgeOccupancy::new(1);
        assert!(occupancy.insert());
        assert!(occupancy.is_full());
        assert!(!occupancy.insert());
        assert_eq!(occupancy.occupied(), 1);
    }

    #[test]
    fn test_remove_front_shifts_and_vacates() {
        let mut occupancy = EdgeOccupancy::new(3);
        assert!(occupancy.push_rear(20.0, 6.0));
        assert!(occupancy.push_rear(10.0, 6.0));
        assert_eq!(occupancy.remove_front(), Some(20.0));
        assert_eq!(occupancy.cells(), &[Some(10.0), None, None]);
        assert_eq!(occupancy.front(), Some(10.0));
        assert_eq!(occupancy.rear(), Some(10.0));
    }

    #[test]
    fn test_advance_respects_spacing_and_length() {
        let mut occupancy = EdgeOccupancy::new(3);
        assert!(occupancy.push_rear(95.0, 6.0));
        assert!(occupancy.push_rear(88.0, 6.0));
        assert!(occupancy.push_rear(50.0, 6.0));
        occupancy.advance(10.0, 100.0, 6.0);
        assert_eq!(occupancy.cells(), &[Some(100.0), Some(94.0), Some(60.0)]);
    }

    #[test]
    fn test_follower_never_moves_backwards() {
        let mut occupancy = EdgeOccupancy::new(2);
        occupancy.cells = vec![Some(10.0), Some(8.0)];
        occupancy.advance(1.0, 100.0, 6.0);
        assert_eq!(occupancy.cells(), &[Some(11.0), Some(8.0)]);
    }

    #[test]
    fn test_terminal_edge_exit() {
        let network = NetworkDefinition::new(
            vec![edge(0, 10.0, 1, 5.0, Some(1.0), None, None)],
            vec![],
        )
        .unwrap();
        let mut state = FlowState::new(&network);
        let mut streams = SpawnStreams::new(&network, 7);
        let phases = PhaseSnapshot::from_phases(vec![]);

        let report = step(&network, &params(), &mut state, &phases, &mut streams);
        assert_eq!(report.spawned, 1);
        assert_eq!(state.edge(EdgeId(0)).front(), Some(5.0));

        let report = step(&network, &params(), &mut state, &phases, &mut streams);
        // The edge was full when the spawn was attempted
        assert_eq!(report.spawns_dropped, 1);
        assert_eq!(report.exits, 1);
        assert_eq!(state.exits(), 1);
        assert_eq!(state.edge(EdgeId(0)).front(), None);
    }

    #[test]
    fn test_red_signal_pins_front() {
        let network = NetworkDefinition::new(
            vec![
                edge(0, 10.0, 2, 4.0, None, Some(1), Some(0)),
                edge(1, 10.0, 2, 4.0, None, None, None),
            ],
            vec![JunctionConfig {
                id: JunctionId(0),
                name: "j".to_string(),
                position: Point::default(),
                default_phase: 0,
                phases: vec![
                    PhaseConfig {
                        label: "stop".to_string(),
                        allowed: vec![],
                    },
                    PhaseConfig {
                        label: "go".to_string(),
                        allowed: vec![EdgeId(0)],
                    },
                ],
            }],
        )
        .unwrap();
        let mut state = FlowState::new(&network);
        assert!(state.edge_mut(EdgeId(0)).push_rear(9.0, 6.0));
        let mut streams = SpawnStreams::new(&network, 1);

        let red = PhaseSnapshot::from_phases(vec![0]);
        let report = step(&network, &params(), &mut state, &red, &mut streams);
        assert_eq!(report.pinned_by_signal, 1);
        assert_eq!(state.edge(EdgeId(0)).front(), Some(10.0));

        let green = PhaseSnapshot::from_phases(vec![1]);
        let report = step(&network, &params(), &mut state, &green, &mut streams);
        assert_eq!(report.transfers, 1);
        assert_eq!(state.edge(EdgeId(0)).front(), None);
        assert_eq!(state.edge(EdgeId(1)).front(), Some(0.0));
    }

    #[test]
    fn test_cascade_discharges_several_vehicles() {
        let network =
            NetworkDefinition::new(vec![edge(0, 10.0, 3, 1.0, None, None, None)], vec![]).unwrap();
        let mut state = FlowState::new(&network);
        // A zero spacing lets several vehicles share the end position
        let params = FlowParams {
            min_spacing: 0.0,
            ..FlowParams::default()
        };
        for _ in 0..3 {
            assert!(state.edge_mut(EdgeId(0)).push_rear(10.0, 0.0));
        }
        let mut streams = SpawnStreams::new(&network, 1);
        let report = step(
            &network,
            &params,
            &mut state,
            &PhaseSnapshot::from_phases(vec![]),
            &mut streams,
        );
        assert_eq!(report.exits, 3);
        assert_eq!(state.occupied(), 0);
    }

    #[test]
    fn test_state_vector_layout() {
        let network = NetworkDefinition::new(
            vec![
                edge(0, 10.0, 2, 1.0, None, Some(1), None),
                edge(1, 10.0, 1, 1.0, None, None, None),
            ],
            vec![],
        )
        .unwrap();
        let mut state = FlowState::new(&network);
        assert!(state.edge_mut(EdgeId(1)).push_rear(3.0, 6.0));
        state.exits = 4;
        assert_eq!(state.to_state_vector(), vec![-1.0, -1.0, 3.0, 4.0]);
    }

    #[test]
    fn test_spawn_streams_are_deterministic() {
        let network = NetworkDefinition::default_network();
        let mut a = SpawnStreams::new(&network, 99);
        let mut b = SpawnStreams::new(&network, 99);
        for _ in 0..10 {
            assert_eq!(a.sample(EdgeId(0)), b.sample(EdgeId(0)));
        }
        assert!(a.sample(EdgeId(2)).is_none());
        // Independent streams per edge
        let mut c = SpawnStreams::new(&network, 99);
        assert_ne!(c.sample(EdgeId(0)), c.sample(EdgeId(1)));
    }
}
