use super::sphere_solution;
use femflow::assembly::{element_jacobian, element_residual, ElementData, ElementResidual, LocalLayout, ShapeTables};
use femflow::mesh::procedural::create_ellipsoid;
use femflow::mesh::MultiLevelMesh;
use femflow::nalgebra::{DVector, DVectorView, DVectorViewMut};
use femflow::optimize::calculus::approximate_jacobian_fd;
use femflow::solution::MultiLevelSolution;
use femflow::system::{ImplicitSystem, SystemKind};
use femflow_willmore::config::default_solver_settings;
use femflow_willmore::conformal::ConformalAssembler;
use femflow_willmore::fields::{copy_displacement, WillmoreFields, CONFORMAL_FIELDS, CONFORMAL_SYSTEM};
use matrixcompare::assert_matrix_eq;
use std::sync::Arc;

fn conformal_system(solution: &MultiLevelSolution) -> ImplicitSystem {
    let mut system = ImplicitSystem::new(CONFORMAL_SYSTEM, SystemKind::Nonlinear, solution, &CONFORMAL_FIELDS, 0).unwrap();
    system.set_settings(default_solver_settings());
    system
}

#[test]
fn regular_icosahedron_is_unchanged() {
    let (mut solution, fields) = sphere_solution(0);
    let mut system = conformal_system(&solution);
    copy_displacement(&mut solution, &fields, true);
    let outcome = system
        .solve(&mut solution, &ConformalAssembler::new(fields))
        .unwrap();
    assert!(outcome.converged);

    for &ndx in &fields.ndx {
        assert!(solution.values(ndx).amax() < 1e-10);
    }
    // All cells are equivalent, and so are their multipliers
    let lambda = solution.values(fields.lambda1);
    assert!(lambda.amax() > 0.0);
    assert!(lambda.max() - lambda.min() < 1e-10 * lambda.amax());
}

#[test]
fn cells_keep_their_normal_position() {
    let mesh = MultiLevelMesh::new(create_ellipsoid([1.0, 0.6, 0.4], 2), 1);
    let mut solution = MultiLevelSolution::new(Arc::new(mesh));
    let fields = WillmoreFields::add_to(&mut solution).unwrap();
    solution.initialize_all();
    let mut system = conformal_system(&solution);
    let assembler = ConformalAssembler::new(fields);

    copy_displacement(&mut solution, &fields, true);
    system.solve(&mut solution, &assembler).unwrap();
    assert!(fields.ndx.iter().any(|&ndx| solution.values(ndx).amax() > 1e-3));

    let x = system.gather(&solution);
    let tables = ShapeTables::new(assembler.quadrature_order());
    let mesh = solution.mesh();
    for cell in 0..mesh.num_cells() {
        let local = LocalLayout::new(system.layout(), mesh, &solution, cell);
        let local_x: Vec<f64> = local.system_dofs().iter().map(|&dof| x[dof]).collect();
        let element = ElementData::new(&solution, &tables, local, cell, 0.0, 0.0);
        let row = element.range(fields.lambda1).start;
        let f = element_residual(&assembler, &element, &local_x);
        assert!(f[row].abs() < 1e-10, "cell {} moved normally by {}", cell, f[row]);
    }
}

#[test]
fn element_jacobians_match_finite_differences() {
    let (mut solution, fields) = sphere_solution(1);
    for (k, &dx) in fields.dx.iter().enumerate() {
        for (i, value) in solution.values_mut(dx).iter_mut().enumerate() {
            *value = 0.05 * (0.7 * i as f64 + k as f64).sin();
        }
    }
    let system = conformal_system(&solution);
    let assembler = ConformalAssembler::new(fields);
    let tables = ShapeTables::new(assembler.quadrature_order());
    let mesh = solution.mesh();

    for cell in [3, 42] {
        let element = ElementData::new(
            &solution,
            &tables,
            LocalLayout::new(system.layout(), mesh, &solution, cell),
            cell,
            0.0,
            0.0,
        );
        let x: Vec<f64> = element
            .layout()
            .system_dofs()
            .iter()
            .map(|&dof| 0.05 * (0.3 * dof as f64).cos())
            .collect();
        let n = x.len();
        assert_eq!(n, 3 * 3 + 1);
        let (_, jacobian) = element_jacobian(&assembler, &element, &x);
        let mut x_fd = DVector::from_vec(x.clone());
        let jacobian_fd = approximate_jacobian_fd(
            n,
            |x: DVectorView<f64>, mut f: DVectorViewMut<f64>| {
                f.copy_from(&element_residual(&assembler, &element, x.as_slice()));
            },
            &mut x_fd,
            1e-6,
        );
        assert_matrix_eq!(jacobian, jacobian_fd, comp = abs, tol = 1e-8);
    }
}
