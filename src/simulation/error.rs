//! Errors raised while building a network definition

use std::path::PathBuf;

use super::types::{EdgeId, JunctionId};

/// A malformed static topology, detected before the first tick
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{index}-th edge has id {found}; edge ids must be dense and in order")]
    EdgeIdOutOfOrder { index: usize, found: EdgeId },

    #[error("{index}-th junction has id {found}; junction ids must be dense and in order")]
    JunctionIdOutOfOrder { index: usize, found: JunctionId },

    #[error("{edge} hands off to unknown {next}")]
    UnknownDownstream { edge: EdgeId, next: EdgeId },

    #[error("{edge} is gated by unknown {junction}")]
    UnknownJunction { edge: EdgeId, junction: JunctionId },

    #[error("{edge} is gated by {junction}, which has no phases")]
    GateWithoutPhases { edge: EdgeId, junction: JunctionId },

    #[error("phase {phase} of {junction} allows unknown {edge}")]
    UnknownAllowedEdge {
        junction: JunctionId,
        phase: usize,
        edge: EdgeId,
    },

    #[error("default phase {phase} of {junction} is outside its {count} phases")]
    DefaultPhaseOutOfRange {
        junction: JunctionId,
        phase: usize,
        count: usize,
    },

    #[error("{edge} has invalid {field}: {value}")]
    InvalidEdgeValue {
        edge: EdgeId,
        field: &'static str,
        value: f64,
    },

    #[error("parse error in {file}: {detail}")]
    Parse { file: PathBuf, detail: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
