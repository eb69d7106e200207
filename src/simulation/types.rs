//! Core types for the traffic network simulation

use serde::Deserialize;

/// Index of an edge in the network definition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
#[serde(transparent)]
pub struct EdgeId(pub usize);

/// Index of a junction in the network definition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
#[serde(transparent)]
pub struct JunctionId(pub usize);

impl std::fmt::Display for EdgeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "edge {}", self.0)
    }
}

impl std::fmt::Display for JunctionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "junction {}", self.0)
    }
}

/// A 2D position in screen space
#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize)]
#[serde(from = "[f64; 2]")]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Point) -> f64 {
        (other.x - self.x).hypot(other.y - self.y)
    }

    pub fn lerp(&self, other: &Point, t: f64) -> Point {
        Point {
            x: self.x + (other.x - self.x) * t,
            y: self.y + (other.y - self.y) * t,
        }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl From<[f64; 2]> for Point {
    fn from([x, y]: [f64; 2]) -> Self {
        Self { x, y }
    }
}

/// Tunables shared by every edge in the network
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlowParams {
    /// Minimum gap a following vehicle keeps behind the one ahead
    pub min_spacing: f64,
    /// How close to the edge end a front vehicle must be to count as arrived
    pub arrival_tolerance: f64,
    /// Rendered vehicle rectangle width
    pub rect_width: f64,
    /// Rendered vehicle rectangle height
    pub rect_height: f64,
}

impl Default for FlowParams {
    fn default() -> Self {
        Self {
            min_spacing: MIN_SPACING,
            arrival_tolerance: ARRIVAL_TOLERANCE,
            rect_width: VEHICLE_RECT_WIDTH,
            rect_height: VEHICLE_RECT_HEIGHT,
        }
    }
}

/// Minimum distance between consecutive vehicles on an edge
pub const MIN_SPACING: f64 = 6.0;

/// Front vehicles within this distance of the edge end are ready to transfer
pub const ARRIVAL_TOLERANCE: f64 = 1e-3;

/// Width of a rendered vehicle rectangle
pub const VEHICLE_RECT_WIDTH: f64 = 18.0;

/// Height of a rendered vehicle rectangle
pub const VEHICLE_RECT_HEIGHT: f64 = 10.0;

/// Encoding of an empty cell in flat state vectors
pub const EMPTY_CELL: f64 = -1.0;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distance_and_lerp() {
        let a = Point::new(0.0, 0.0);
        let b = Point::new(3.0, 4.0);
        assert_eq!(a.distance(&b), 5.0);
        assert_eq!(a.lerp(&b, 0.5), Point::new(1.5, 2.0));
        assert_eq!(a.lerp(&b, 1.0), b);
    }
}
