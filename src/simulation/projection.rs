//! Projection of vehicle positions into screen rectangles

use super::flow::FlowState;
use super::network::NetworkDefinition;
use super::types::FlowParams;

/// A rendered vehicle. An all-zero rectangle means "not drawn".
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct VehicleRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl VehicleRect {
    pub fn is_drawn(&self) -> bool {
        *self != VehicleRect::default()
    }
}

/// Map every cell, in global slot order, to a rectangle interpolated along
/// its edge. Empty cells yield zeroed rectangles.
pub fn project(
    network: &NetworkDefinition,
    params: &FlowParams,
    state: &FlowState,
) -> Vec<VehicleRect> {
    let mut rects = Vec::with_capacity(network.total_capacity());
    for (edge, occupancy) in network.edges().iter().zip(state.edges()) {
        for cell in occupancy.cells() {
            let Some(position) = cell else {
                rects.push(VehicleRect::default());
                continue;
            };
            let t = if edge.length > 0.0 {
                (position / edge.length).clamp(0.0, 1.0)
            } else {
                0.0
            };
            let point = edge.start.lerp(&edge.end, t);
            rects.push(VehicleRect {
                x: point.x,
                y: point.y,
                width: params.rect_width,
                height: params.rect_height,
            });
        }
    }
    rects
}

/// Flatten rectangles into `[x, y, width, height, ...]`
pub fn to_state_vector(rects: &[VehicleRect]) -> Vec<f64> {
    rects
        .iter()
        .flat_map(|r| [r.x, r.y, r.width, r.height])
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::types::EdgeId;

    #[test]
    fn test_projects_along_edge() {
        let network = NetworkDefinition::default_network();
        let mut state = FlowState::new(&network);
        // west_entry runs from (80, 280) to (300, 280)
        assert!(state.edge_mut(EdgeId(0)).push_rear(110.0, 6.0));
        // junction_a_to_north_exit runs from (300, 280) to (300, 80)
        assert!(state.edge_mut(EdgeId(3)).push_rear(50.0, 6.0));

        let rects = project(&network, &FlowParams::default(), &state);
        assert_eq!(rects.len(), network.total_capacity());
        assert_eq!(
            rects[0],
            VehicleRect {
                x: 190.0,
                y: 280.0,
                width: 18.0,
                height: 10.0
            }
        );
        assert!(!rects[1].is_drawn());
        let north = rects[network.slot_offset(EdgeId(3))];
        assert_eq!((north.x, north.y), (300.0, 230.0));
        assert_eq!(rects.iter().filter(|r| r.is_drawn()).count(), 2);
    }

    #[test]
    fn test_flat_vector_has_four_values_per_cell() {
        let network = NetworkDefinition::default_network();
        let state = FlowState::new(&network);
        let flat = to_state_vector(&project(&network, &FlowParams::default(), &state));
        assert_eq!(flat.len(), network.total_capacity() * 4);
        assert!(flat.iter().all(|v| *v == 0.0));
    }
}
