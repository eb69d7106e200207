//! Main simulation world that ties everything together
//!
//! The world owns the static network and every component's state, and
//! steps them in a fixed order on each tick: junction control, network
//! flow, then the derived projection and metrics.

use log::debug;

use super::controller::PhaseController;
use super::flow::{self, FlowState, PhaseSnapshot, SpawnStreams, TickReport};
use super::junction::JunctionControl;
use super::metrics::FlowMetrics;
use super::network::NetworkDefinition;
use super::projection::{self, VehicleRect};
use super::types::{EdgeId, FlowParams, JunctionId, Point};

/// The main simulation world
pub struct SimWorld {
    network: NetworkDefinition,
    params: FlowParams,
    junctions: Vec<JunctionControl>,
    flow: FlowState,
    streams: SpawnStreams,
    rects: Vec<VehicleRect>,
    metrics: FlowMetrics,
    tick_count: u64,
    /// Sum of every tick report so far
    totals: TickReport,
}

impl SimWorld {
    /// Create a world with default flow parameters. `seed` drives every
    /// edge's spawn stream.
    pub fn new(network: NetworkDefinition, seed: u64) -> Self {
        Self::with_params(network, FlowParams::default(), seed)
    }

    pub fn with_params(network: NetworkDefinition, params: FlowParams, seed: u64) -> Self {
        let junctions = network.junctions().iter().map(JunctionControl::new).collect();
        let flow = FlowState::new(&network);
        let streams = SpawnStreams::new(&network, seed);
        let rects = projection::project(&network, &params, &flow);
        let metrics = FlowMetrics::compute(&network, &flow);
        Self {
            network,
            params,
            junctions,
            flow,
            streams,
            rects,
            metrics,
            tick_count: 0,
            totals: TickReport::default(),
        }
    }

    pub fn network(&self) -> &NetworkDefinition {
        &self.network
    }

    pub fn params(&self) -> &FlowParams {
        &self.params
    }

    pub fn flow(&self) -> &FlowState {
        &self.flow
    }

    pub fn junction_controls(&self) -> &[JunctionControl] {
        &self.junctions
    }

    /// Active phase of a junction as committed on the last tick
    pub fn phase(&self, junction: JunctionId) -> usize {
        self.junctions[junction.0].phase()
    }

    pub fn vehicle_rects(&self) -> &[VehicleRect] {
        &self.rects
    }

    pub fn metrics(&self) -> FlowMetrics {
        self.metrics
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    pub fn totals(&self) -> TickReport {
        self.totals
    }

    /// Record a phase request for a junction; applied on the next tick
    pub fn request_phase(&mut self, junction: JunctionId, request: f64) {
        self.junctions[junction.0].request_phase(request);
    }

    /// Record one request per junction, in junction order
    pub fn request_phases(&mut self, requests: &[f64]) {
        for (control, request) in self.junctions.iter_mut().zip(requests) {
            control.request_phase(*request);
        }
    }

    /// Place a vehicle behind the current rear vehicle of an edge.
    ///
    /// Used to set up scenarios. Fails if the edge is full, the position is
    /// off the edge, or the vehicle would sit closer than the minimum
    /// spacing to the one ahead.
    pub fn place_vehicle(&mut self, edge: EdgeId, position: f64) -> bool {
        let length = self.network.edge(edge).length;
        if !(0.0..=length).contains(&position) {
            return false;
        }
        let placed = self
            .flow
            .edge_mut(edge)
            .push_rear(position, self.params.min_spacing);
        if placed {
            self.refresh_derived();
        }
        placed
    }

    /// Advance every component by one tick
    pub fn tick(&mut self) -> TickReport {
        for control in &mut self.junctions {
            if control.tick() {
                debug!("{} now in phase {}", control.id, control.phase());
            }
        }

        let phases = PhaseSnapshot::capture(&self.junctions);
        let report = flow::step(
            &self.network,
            &self.params,
            &mut self.flow,
            &phases,
            &mut self.streams,
        );

        self.refresh_derived();
        self.tick_count += 1;
        self.totals += report;
        debug!("tick {}: {:?}", self.tick_count, report);
        report
    }

    /// Ask the controller for requests, then tick
    pub fn tick_with(&mut self, controller: &mut dyn PhaseController) -> TickReport {
        let requests = controller.decide(self);
        self.request_phases(&requests);
        self.tick()
    }

    fn refresh_derived(&mut self) {
        self.rects = projection::project(&self.network, &self.params, &self.flow);
        self.metrics = FlowMetrics::compute(&self.network, &self.flow);
    }

    /// Raw edge occupancy followed by the exit counter
    pub fn edge_state_vector(&self) -> Vec<f64> {
        self.flow.to_state_vector()
    }

    /// Four values per cell: x, y, width, height
    pub fn rect_state_vector(&self) -> Vec<f64> {
        projection::to_state_vector(&self.rects)
    }

    /// One active phase per junction
    pub fn junction_state_vector(&self) -> Vec<f64> {
        self.junctions.iter().map(|c| c.phase() as f64).collect()
    }

    /// Print a summary of the world state
    pub fn print_summary(&self) {
        println!("=== Traffic Network Summary ===");
        println!("Tick: {}", self.tick_count);
        println!(
            "Edges: {}, Junctions: {}, Capacity: {}",
            self.network.edges().len(),
            self.network.junctions().len(),
            self.network.total_capacity()
        );
        println!(
            "Vehicles: {} ({:.1}% occupancy), Exited: {}",
            self.metrics.occupied,
            self.metrics.occupancy_ratio * 100.0,
            self.metrics.exits
        );
        println!(
            "Spawned: {}, Spawns dropped: {}, Transfers: {}",
            self.totals.spawned, self.totals.spawns_dropped, self.totals.transfers
        );
        println!(
            "Held at red: {}, Held for room: {}",
            self.totals.pinned_by_signal, self.totals.pinned_by_capacity
        );
        println!();

        println!("--- Junctions ---");
        for (junction, control) in self.network.junctions().iter().zip(&self.junctions) {
            let label = junction
                .phases
                .get(control.phase())
                .map(|p| p.label.as_str())
                .unwrap_or("-");
            println!(
                "  {} ({}): phase {} \"{}\"",
                junction.id,
                junction.name,
                control.phase(),
                label
            );
        }

        println!("--- Edges ---");
        for (edge, occupancy) in self.network.edges().iter().zip(self.flow.edges()) {
            println!(
                "  {} ({}): {}/{} vehicles, front={}",
                edge.id,
                edge.name,
                occupancy.occupied(),
                edge.capacity,
                occupancy
                    .front()
                    .map(|p| format!("{:.1}/{:.1}", p, edge.length))
                    .unwrap_or_else(|| "-".to_string())
            );
        }
    }

    /// Draw a visual map of the network in the terminal
    pub fn draw_map(&self) {
        // World units per character cell
        const SCALE_X: f64 = 10.0;
        const SCALE_Y: f64 = 20.0;

        let points = self
            .network
            .edges()
            .iter()
            .flat_map(|e| [e.start, e.end])
            .chain(self.network.junctions().iter().map(|j| j.position));

        let mut min_x = f64::INFINITY;
        let mut max_x = f64::NEG_INFINITY;
        let mut min_y = f64::INFINITY;
        let mut max_y = f64::NEG_INFINITY;
        for p in points {
            min_x = min_x.min(p.x);
            max_x = max_x.max(p.x);
            min_y = min_y.min(p.y);
            max_y = max_y.max(p.y);
        }
        if !min_x.is_finite() {
            println!("(empty network)");
            return;
        }

        let width = ((max_x - min_x) / SCALE_X) as usize + 1;
        let height = ((max_y - min_y) / SCALE_Y) as usize + 1;
        let mut grid = vec![vec![' '; width]; height];

        let to_grid = |p: Point| -> (usize, usize) {
            let col = ((p.x - min_x) / SCALE_X).round() as usize;
            let row = ((p.y - min_y) / SCALE_Y).round() as usize;
            (row.min(height - 1), col.min(width - 1))
        };

        // Roads, sampled along their length
        for edge in self.network.edges() {
            let steps = ((edge.length / SCALE_X.min(SCALE_Y)).ceil() as usize).max(1);
            for i in 0..=steps {
                let (row, col) = to_grid(edge.start.lerp(&edge.end, i as f64 / steps as f64));
                grid[row][col] = '.';
            }
        }

        for junction in self.network.junctions() {
            let (row, col) = to_grid(junction.position);
            grid[row][col] = char::from_digit((junction.id.0 % 10) as u32, 10).unwrap_or('+');
        }

        for rect in self.rects.iter().filter(|r| r.is_drawn()) {
            let (row, col) = to_grid(Point::new(rect.x, rect.y));
            if grid[row][col] == '.' || grid[row][col] == ' ' {
                grid[row][col] = 'C';
            }
        }

        println!("\n=== Network Map ===");
        println!("Legend: 0-9=Junction, C=Vehicle, .=Road");
        println!();
        for row in &grid {
            let line: String = row.iter().collect();
            println!("{}", line.trim_end());
        }
        println!();
    }
}
