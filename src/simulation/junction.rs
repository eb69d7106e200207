//! Junction signal control
//!
//! Each junction holds its active phase index. An external controller
//! writes a requested phase between ticks; on the tick the request is
//! sanitized onto a valid phase and committed.

use super::network::Junction;
use super::types::JunctionId;

/// Maps any requested phase value onto a valid phase index.
///
/// The request is rounded to the nearest integer and wrapped with a
/// non-negative modulo, so negative and out-of-range requests never fail.
/// A junction with no phases always reports phase 0.
pub fn sanitize_phase(request: f64, phase_count: usize) -> usize {
    if phase_count == 0 || !request.is_finite() {
        return 0;
    }
    let count = phase_count as i64;
    // Saturating float-to-int cast keeps absurd requests in range.
    let rounded = request.round() as i64;
    rounded.rem_euclid(count) as usize
}

/// Per-junction control state
#[derive(Debug, Clone)]
pub struct JunctionControl {
    pub id: JunctionId,
    phase_count: usize,
    /// Most recent external request; persists until overwritten
    request: f64,
    /// Phase committed on the last tick
    phase: usize,
}

impl JunctionControl {
    pub fn new(junction: &Junction) -> Self {
        let phase_count = junction.phase_count();
        let default_phase = junction.default_phase as f64;
        Self {
            id: junction.id,
            phase_count,
            request: default_phase,
            phase: sanitize_phase(default_phase, phase_count),
        }
    }

    /// Record a phase request; takes effect on the next tick
    pub fn request_phase(&mut self, request: f64) {
        self.request = request;
    }

    pub fn requested(&self) -> f64 {
        self.request
    }

    /// The phase currently in force
    pub fn phase(&self) -> usize {
        self.phase
    }

    pub fn phase_count(&self) -> usize {
        self.phase_count
    }

    /// Commit the latest request as the active phase. Returns true if the
    /// phase changed.
    pub fn tick(&mut self) -> bool {
        let next = sanitize_phase(self.request, self.phase_count);
        let changed = next != self.phase;
        self.phase = next;
        changed
    }
}
