//! Static network definition: edges, junctions and their phases
//!
//! The definition is built once, validated, and never mutated afterwards.
//! Edges and junctions are addressed by dense indices so the per-tick state
//! can live in flat, contiguous arrays.

use log::warn;
use petgraph::algo::has_path_connecting;
use petgraph::graph::{DiGraph, NodeIndex};
use serde::Deserialize;
use std::path::Path;

use super::error::ConfigError;
use super::types::{EdgeId, JunctionId, Point};

/// Edge as written in a network file
#[derive(Debug, Clone, Deserialize)]
pub struct EdgeConfig {
    pub id: EdgeId,
    #[serde(default)]
    pub name: String,
    pub start: Point,
    pub end: Point,
    pub capacity: usize,
    pub speed: f64,
    #[serde(default)]
    pub spawn_rate: Option<f64>,
    #[serde(default)]
    pub next_edge: Option<EdgeId>,
    #[serde(default)]
    pub junction: Option<JunctionId>,
}

/// Phase as written in a network file
#[derive(Debug, Clone, Deserialize)]
pub struct PhaseConfig {
    pub label: String,
    #[serde(default)]
    pub allowed: Vec<EdgeId>,
}

/// Junction as written in a network file
#[derive(Debug, Clone, Deserialize)]
pub struct JunctionConfig {
    pub id: JunctionId,
    #[serde(default)]
    pub name: String,
    pub position: Point,
    #[serde(default)]
    pub default_phase: usize,
    #[serde(default)]
    pub phases: Vec<PhaseConfig>,
}

const DEFAULT_NETWORK: &str = include_str!("default_network.toml");

#[derive(Debug, Deserialize)]
struct NetworkFile {
    edges: Vec<EdgeConfig>,
    #[serde(default)]
    junctions: Vec<JunctionConfig>,
}

/// Where the front vehicle of an edge goes once it reaches the end
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handoff {
    /// Transfer onto the start of another edge
    Next(EdgeId),
    /// Leave the network
    Exit,
}

/// A directed, fixed-length road segment
#[derive(Debug, Clone)]
pub struct Edge {
    pub id: EdgeId,
    pub name: String,
    pub start: Point,
    pub end: Point,
    pub length: f64,
    pub capacity: usize,
    pub speed: f64,
    pub spawn_rate: Option<f64>,
    pub handoff: Handoff,
    /// Junction whose active phase must allow this edge to discharge
    pub gate: Option<JunctionId>,
}

impl Edge {
    pub fn is_terminal(&self) -> bool {
        self.handoff == Handoff::Exit
    }

    /// Spawn probability per tick, if this is a source edge
    pub fn spawn_probability(&self) -> Option<f64> {
        self.spawn_rate.filter(|rate| *rate > 0.0)
    }
}

/// A named junction configuration
#[derive(Debug, Clone)]
pub struct Phase {
    pub label: String,
    pub allowed: Vec<EdgeId>,
}

impl Phase {
    pub fn allows(&self, edge: EdgeId) -> bool {
        self.allowed.contains(&edge)
    }
}

/// A signal controller with an ordered list of phases
#[derive(Debug, Clone)]
pub struct Junction {
    pub id: JunctionId,
    pub name: String,
    pub position: Point,
    pub default_phase: usize,
    pub phases: Vec<Phase>,
}

impl Junction {
    pub fn phase_count(&self) -> usize {
        self.phases.len()
    }

    /// Whether `edge` may discharge while phase `phase` is active
    pub fn allows(&self, phase: usize, edge: EdgeId) -> bool {
        self.phases.get(phase).is_some_and(|p| p.allows(edge))
    }
}

/// The immutable road graph shared by every simulation component
#[derive(Debug, Clone)]
pub struct NetworkDefinition {
    edges: Vec<Edge>,
    junctions: Vec<Junction>,
    /// Offset of each edge's first cell in the global slot ordering
    offsets: Vec<usize>,
    total_capacity: usize,
}

impl NetworkDefinition {
    /// Validate the given configuration and build a definition from it
    pub fn new(
        edges: Vec<EdgeConfig>,
        junctions: Vec<JunctionConfig>,
    ) -> Result<Self, ConfigError> {
        let edge_count = edges.len();

        for (index, junction) in junctions.iter().enumerate() {
            if junction.id.0 != index {
                return Err(ConfigError::JunctionIdOutOfOrder {
                    index,
                    found: junction.id,
                });
            }
            let count = junction.phases.len();
            if (count > 0 && junction.default_phase >= count)
                || (count == 0 && junction.default_phase != 0)
            {
                return Err(ConfigError::DefaultPhaseOutOfRange {
                    junction: junction.id,
                    phase: junction.default_phase,
                    count,
                });
            }
            for (phase, config) in junction.phases.iter().enumerate() {
                if let Some(edge) = config.allowed.iter().find(|e| e.0 >= edge_count) {
                    return Err(ConfigError::UnknownAllowedEdge {
                        junction: junction.id,
                        phase,
                        edge: *edge,
                    });
                }
            }
        }

        let mut built = Vec::with_capacity(edge_count);
        for (index, config) in edges.into_iter().enumerate() {
            if config.id.0 != index {
                return Err(ConfigError::EdgeIdOutOfOrder {
                    index,
                    found: config.id,
                });
            }
            built.push(Self::build_edge(config, edge_count, &junctions)?);
        }

        let junctions: Vec<Junction> = junctions
            .into_iter()
            .map(|config| Junction {
                id: config.id,
                name: config.name,
                position: config.position,
                default_phase: config.default_phase,
                phases: config
                    .phases
                    .into_iter()
                    .map(|phase| Phase {
                        label: phase.label,
                        allowed: phase.allowed,
                    })
                    .collect(),
            })
            .collect();

        let mut offsets = Vec::with_capacity(built.len());
        let mut total_capacity = 0;
        for edge in &built {
            offsets.push(total_capacity);
            total_capacity += edge.capacity;
        }

        let network = Self {
            edges: built,
            junctions,
            offsets,
            total_capacity,
        };
        network.warn_about_topology();
        Ok(network)
    }

    fn build_edge(
        config: EdgeConfig,
        edge_count: usize,
        junctions: &[JunctionConfig],
    ) -> Result<Edge, ConfigError> {
        let id = config.id;
        let invalid = |field: &'static str, value: f64| ConfigError::InvalidEdgeValue {
            edge: id,
            field,
            value,
        };

        if !config.start.is_finite() {
            return Err(invalid("start", config.start.x + config.start.y));
        }
        if !config.end.is_finite() {
            return Err(invalid("end", config.end.x + config.end.y));
        }
        if !config.speed.is_finite() || config.speed < 0.0 {
            return Err(invalid("speed", config.speed));
        }
        if let Some(rate) = config.spawn_rate {
            if !rate.is_finite() || rate < 0.0 {
                return Err(invalid("spawn_rate", rate));
            }
        }

        let handoff = match config.next_edge {
            Some(next) if next.0 >= edge_count => {
                return Err(ConfigError::UnknownDownstream { edge: id, next });
            }
            Some(next) => Handoff::Next(next),
            None => Handoff::Exit,
        };

        if let Some(junction) = config.junction {
            let phases = junctions
                .get(junction.0)
                .map(|j| j.phases.len())
                .ok_or(ConfigError::UnknownJunction { edge: id, junction })?;
            if phases == 0 && handoff != Handoff::Exit {
                return Err(ConfigError::GateWithoutPhases { edge: id, junction });
            }
        }

        Ok(Edge {
            id,
            name: config.name,
            start: config.start,
            end: config.end,
            length: config.start.distance(&config.end),
            capacity: config.capacity,
            speed: config.speed,
            spawn_rate: config.spawn_rate,
            handoff,
            gate: config.junction,
        })
    }

    /// Parse a TOML network description
    pub fn from_toml_str(source: &str, file: &Path) -> Result<Self, ConfigError> {
        let parsed: NetworkFile = toml::from_str(source).map_err(|e| ConfigError::Parse {
            file: file.to_path_buf(),
            detail: e.to_string(),
        })?;
        Self::new(parsed.edges, parsed.junctions)
    }

    /// Read and parse a TOML network description from disk
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let source = std::fs::read_to_string(path)?;
        Self::from_toml_str(&source, path)
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn junctions(&self) -> &[Junction] {
        &self.junctions
    }

    pub fn edge(&self, id: EdgeId) -> &Edge {
        &self.edges[id.0]
    }

    pub fn junction(&self, id: JunctionId) -> &Junction {
        &self.junctions[id.0]
    }

    /// Offset of the edge's first cell in the global slot ordering
    pub fn slot_offset(&self, id: EdgeId) -> usize {
        self.offsets[id.0]
    }

    /// Sum of all edge capacities, which is also the number of cells
    pub fn total_capacity(&self) -> usize {
        self.total_capacity
    }

    /// Edges whose front vehicles can never reach a terminal edge
    pub fn stranded_edges(&self) -> Vec<EdgeId> {
        let mut graph: DiGraph<Option<EdgeId>, ()> = DiGraph::new();
        let nodes: Vec<NodeIndex> = self
            .edges
            .iter()
            .map(|edge| graph.add_node(Some(edge.id)))
            .collect();
        let exit = graph.add_node(None);

        for edge in &self.edges {
            let target = match edge.handoff {
                Handoff::Next(next) => nodes[next.0],
                Handoff::Exit => exit,
            };
            graph.add_edge(nodes[edge.id.0], target, ());
        }

        self.edges
            .iter()
            .filter(|edge| !has_path_connecting(&graph, nodes[edge.id.0], exit, None))
            .map(|edge| edge.id)
            .collect()
    }

    fn warn_about_topology(&self) {
        for edge in self.stranded_edges() {
            warn!("{} ({}) has no route to an exit", edge, self.edge(edge).name);
        }

        for edge in &self.edges {
            if edge.is_terminal() {
                if let Some(junction) = edge.gate {
                    warn!(
                        "terminal {} is gated by {}; exits are never gated",
                        edge.id, junction
                    );
                }
            }
        }

        for junction in &self.junctions {
            let gates_anything = self
                .edges
                .iter()
                .any(|edge| edge.gate == Some(junction.id) && !edge.is_terminal());
            if !gates_anything {
                warn!("{} ({}) gates no edge", junction.id, junction.name);
            }
        }
    }

    /// The two-junction network used by the headless runner
    pub fn default_network() -> Self {
        match Self::from_toml_str(DEFAULT_NETWORK, Path::new("default_network.toml")) {
            Ok(network) => network,
            Err(e) => panic!("built-in network is malformed: {e}"),
        }
    }
}
