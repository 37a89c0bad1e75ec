use super::valve_solution;
use femflow::assembly::{element_jacobian, element_residual, ElementData, LocalLayout, ShapeTables};
use femflow::mesh::procedural::valve_faces::INLET;
use femflow::mesh::procedural::valve_materials::{FLUID, LEAFLET, VEIN};
use femflow::nalgebra::{DVector, DVectorView, DVectorViewMut};
use femflow::optimize::calculus::approximate_jacobian_fd;
use femflow::solution::{FieldId, MultiLevelSolution};
use femflow::system::SystemLayout;
use femflow_fsi::assembler::{is_solid, solid_nodes, FsiAssembler, FsiFields, SYSTEM_FIELDS};
use femflow_fsi::boundary::valve_boundary_condition;
use femflow_fsi::materials::{Fluid, Solid};
use femflow_fsi::mesh_motion::set_lambda_new;
use matrixcompare::assert_matrix_eq;
use std::sync::Arc;

/// Soft materials so that all blocks of the Jacobian have comparable magnitudes.
fn assembler(solution: &MultiLevelSolution, fields: FsiFields) -> FsiAssembler {
    let fluid = Fluid { mu: 0.1, rho: 1.0 };
    let vein = Solid {
        young: 30.0,
        rho: 2.0,
        ..Solid::vein()
    };
    let leaflet = Solid {
        young: 3.0,
        ..vein
    };
    FsiAssembler::new(solution, fields, fluid, vein, leaflet)
}

fn fill(solution: &mut MultiLevelSolution, field: FieldId, scale: f64, phase: f64) {
    for (i, value) in solution.values_mut(field).iter_mut().enumerate() {
        *value = scale * (0.7 * i as f64 + phase).sin();
    }
}

fn system_ids(solution: &MultiLevelSolution) -> Vec<FieldId> {
    SYSTEM_FIELDS
        .iter()
        .map(|name| solution.index(name).unwrap())
        .collect()
}

#[test]
fn solid_nodes_cover_vein_and_leaflets() {
    let (solution, _) = valve_solution();
    let mesh = solution.mesh();
    let solid = solid_nodes(mesh);
    for cell in mesh.cells() {
        if is_solid(cell.material) {
            assert!(cell.nodes.iter().all(|&n| solid[n]));
        }
    }
    assert!(solid.iter().any(|&s| !s));
    assert!(mesh.cells().iter().any(|cell| cell.material == LEAFLET));
}

#[test]
fn element_jacobians_match_finite_differences() {
    let (mut solution, fields) = valve_solution();
    solution.attach_boundary_condition(Arc::new(valve_boundary_condition));
    // Nonzero pressure on the inlet
    solution.update_time_dependent_bdc(2.25);

    for (k, field) in [fields.dx, fields.dy, fields.u, fields.v].into_iter().enumerate() {
        fill(&mut solution, field, 0.01, k as f64);
    }
    solution.copy_solution_to_old();
    for (k, field) in system_ids(&solution).into_iter().enumerate() {
        fill(&mut solution, field, 0.02, 0.5 + k as f64);
    }
    set_lambda_new(&mut solution, &fields);

    let assembler = assembler(&solution, fields);
    let layout = SystemLayout::new(&solution, system_ids(&solution), 0);
    let tables = ShapeTables::new(5);
    let mesh = solution.mesh();

    let inlet_fluid_cell = mesh
        .cells()
        .iter()
        .position(|cell| cell.material == FLUID && cell.face_markers.contains(&Some(INLET)))
        .unwrap();
    let leaflet_cell = mesh.cells().iter().position(|cell| cell.material == LEAFLET).unwrap();
    let vein_cell = mesh.cells().iter().position(|cell| cell.material == VEIN).unwrap();

    for cell in [inlet_fluid_cell, leaflet_cell, vein_cell] {
        let element = ElementData::new(
            &solution,
            &tables,
            LocalLayout::new(&layout, mesh, &solution, cell),
            cell,
            2.25,
            0.125,
        );
        let x: Vec<f64> = element
            .layout()
            .system_dofs()
            .iter()
            .map(|&dof| 0.01 * (0.3 * dof as f64).cos())
            .collect();
        let n = x.len();
        let (f, jacobian) = element_jacobian(&assembler, &element, &x);
        assert_matrix_eq!(f, element_residual(&assembler, &element, &x), comp = abs, tol = 1e-12);

        let mut x_fd = DVector::from_vec(x.clone());
        let jacobian_fd = approximate_jacobian_fd(
            n,
            |x: DVectorView<f64>, mut f: DVectorViewMut<f64>| {
                f.copy_from(&element_residual(&assembler, &element, x.as_slice()));
            },
            &mut x_fd,
            1e-6,
        );
        let scale = jacobian.amax().max(1.0);
        assert_matrix_eq!(jacobian / scale, jacobian_fd / scale, comp = abs, tol = 1e-7);
    }
}

#[test]
fn reference_state_at_rest_has_zero_residual() {
    let (mut solution, fields) = valve_solution();
    solution.attach_boundary_condition(Arc::new(valve_boundary_condition));
    set_lambda_new(&mut solution, &fields);

    let assembler = assembler(&solution, fields);
    let layout = SystemLayout::new(&solution, system_ids(&solution), 0);
    let tables = ShapeTables::new(5);
    let mesh = solution.mesh();
    for cell in 0..mesh.num_cells() {
        let element = ElementData::new(
            &solution,
            &tables,
            LocalLayout::new(&layout, mesh, &solution, cell),
            cell,
            0.0,
            0.125,
        );
        let x = vec![0.0; element.layout().len()];
        let f = element_residual(&assembler, &element, &x);
        assert!(f.amax() < 1e-12, "cell {} has residual {}", cell, f.amax());
    }
}
