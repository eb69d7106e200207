//! Traffic Network Simulation Library
//!
//! A tick-driven traffic network simulation: capacity-bounded edges joined by
//! signal-controlled junctions, with derived state for rendering and scoring.

pub mod harness;
pub mod simulation;
