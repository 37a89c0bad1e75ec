use femflow::mesh::procedural::{create_valve_mesh, ValveGeometry};
use femflow::mesh::MultiLevelMesh;
use femflow::solution::MultiLevelSolution;
use femflow_fsi::assembler::FsiFields;
use std::sync::Arc;

mod assembler;
mod boundary;
mod convergence;
mod flux;
mod time_step;

/// A coarse valve with unit-sized dimensions.
fn small_geometry() -> ValveGeometry {
    ValveGeometry {
        half_length: 3.0,
        lumen_radius: 0.5,
        wall_thickness: 0.1,
        leaflet_length: 0.3,
        leaflet_thickness: 0.05,
        cells_half_length: 2,
        cells_wall: 1,
        cells_leaflet: 1,
        cells_gap: 2,
    }
}

fn valve_solution() -> (MultiLevelSolution, FsiFields) {
    let mesh = MultiLevelMesh::new(create_valve_mesh(&small_geometry()), 1);
    let mut solution = MultiLevelSolution::new(Arc::new(mesh));
    let fields = FsiFields::add_to(&mut solution).unwrap();
    solution.initialize_all();
    (solution, fields)
}
