//! Traffic network simulation core
//!
//! This module contains the network definition, junction control, the
//! per-tick flow engine and the derived projection and metrics. It has no
//! rendering dependencies and can be driven headless or by any front end.

mod controller;
mod error;
mod flow;
mod junction;
mod metrics;
mod network;
mod projection;
mod types;
mod world;

pub use controller::{
    CyclingController, FixedController, PhaseController, QueueController, MIN_PHASE_DURATION,
    QUEUE_SWITCH_RATIO,
};
pub use error::ConfigError;
pub use flow::{EdgeOccupancy, FlowState, PhaseSnapshot, SpawnStreams, TickReport};
pub use junction::{sanitize_phase, JunctionControl};
pub use metrics::FlowMetrics;
pub use network::{
    Edge, EdgeConfig, Handoff, Junction, JunctionConfig, NetworkDefinition, Phase, PhaseConfig,
};
pub use projection::VehicleRect;
pub use types::{
    EdgeId, FlowParams, JunctionId, Point, ARRIVAL_TOLERANCE, EMPTY_CELL, MIN_SPACING,
    VEHICLE_RECT_HEIGHT, VEHICLE_RECT_WIDTH,
};
pub use world::SimWorld;

/// Advance a flow state by one tick, outside of a [`SimWorld`]
pub use flow::step as step_flow;
/// Project a flow state into vehicle rectangles
pub use projection::project as project_vehicles;
