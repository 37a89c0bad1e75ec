use super::sphere_solution;
use femflow::assembly::{element_jacobian, element_residual, ElementData, LocalLayout, ShapeTables};
use femflow::mesh::procedural::create_ellipsoid;
use femflow::mesh::MultiLevelMesh;
use femflow::nalgebra::{DVector, DVectorView, DVectorViewMut};
use femflow::optimize::calculus::approximate_jacobian_fd;
use femflow::solution::{FieldId, MultiLevelSolution};
use femflow::system::{ImplicitSystem, SystemKind, SystemLayout};
use femflow::transient::TransientSystem;
use femflow_willmore::config::{default_solver_settings, WillmoreConfig};
use femflow_willmore::conformal::ConformalAssembler;
use femflow_willmore::curvature::InitYAssembler;
use femflow_willmore::energy::surface_measures;
use femflow_willmore::fields::{
    copy_displacement, WillmoreFields, CONFORMAL_FIELDS, CONFORMAL_SYSTEM, INIT_Y_FIELDS, INIT_Y_SYSTEM, MCF_FIELDS,
    MCF_SYSTEM,
};
use femflow_willmore::flow::{geometric_time_interval, Constraints, PWillmoreAssembler};
use matrixcompare::{assert_matrix_eq, assert_scalar_eq};
use proptest::prelude::*;
use std::sync::Arc;

fn fill(solution: &mut MultiLevelSolution, field: FieldId, scale: f64, phase: f64) {
    for (i, value) in solution.values_mut(field).iter_mut().enumerate() {
        *value = scale * (0.7 * i as f64 + phase).sin();
    }
}

#[test]
fn element_jacobians_match_finite_differences() {
    let (mut solution, fields) = sphere_solution(1);
    for (k, &field) in fields.dx.iter().chain(&fields.y).enumerate() {
        fill(&mut solution, field, 0.05, k as f64);
    }
    solution.copy_solution_to_old();

    let constraints = Constraints {
        volume: true,
        area: true,
    };
    let assembler = PWillmoreAssembler::new(fields, constraints);
    let ids: Vec<FieldId> = MCF_FIELDS
        .iter()
        .map(|name| solution.index(name).unwrap())
        .collect();
    let layout = SystemLayout::new(&solution, ids, constraints.num_global_variables());
    let tables = ShapeTables::new(3);
    let mesh = solution.mesh();

    for cell in [0, 17, 61] {
        let element = ElementData::new(
            &solution,
            &tables,
            LocalLayout::new(&layout, mesh, &solution, cell),
            cell,
            0.01,
            0.01,
        );
        let x: Vec<f64> = element
            .layout()
            .system_dofs()
            .iter()
            .map(|&dof| 0.05 * (0.3 * dof as f64).cos())
            .collect();
        let n = x.len();
        assert_eq!(n, 6 * 3 + 2);
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
        assert_matrix_eq!(jacobian / scale, jacobian_fd / scale, comp = abs, tol = 1e-6);
    }
}

#[test]
fn constraints_vanish_without_motion() {
    let (mut solution, fields) = sphere_solution(1);
    for (k, &field) in fields.dx.iter().chain(&fields.y).enumerate() {
        fill(&mut solution, field, 0.05, k as f64);
    }
    solution.copy_solution_to_old();

    let constraints = Constraints {
        volume: true,
        area: true,
    };
    let assembler = PWillmoreAssembler::new(fields, constraints);
    let system = ImplicitSystem::new(MCF_SYSTEM, SystemKind::Nonlinear, &solution, &MCF_FIELDS, 2).unwrap();
    let x = system.gather(&solution);
    let tables = ShapeTables::new(3);
    let mesh = solution.mesh();
    for cell in 0..mesh.num_cells() {
        let local = LocalLayout::new(system.layout(), mesh, &solution, cell);
        let local_x: Vec<f64> = local.system_dofs().iter().map(|&dof| x[dof]).collect();
        let element = ElementData::new(&solution, &tables, local, cell, 0.1, 0.1);
        let f = element_residual(&assembler, &element, &local_x);
        for row in element.global_range() {
            assert_scalar_eq!(f[row], 0.0, comp = abs, tol = 1e-14);
        }
    }
}

#[test]
fn one_step_shrinks_the_sphere() {
    let (mut solution, fields) = sphere_solution(2);
    let mut init_y = ImplicitSystem::new(INIT_Y_SYSTEM, SystemKind::Linear, &solution, &INIT_Y_FIELDS, 0).unwrap();
    init_y.set_settings(default_solver_settings());
    init_y
        .solve(&mut solution, &InitYAssembler::new(fields))
        .unwrap();
    let before = surface_measures(&solution, &fields);

    let mut system = ImplicitSystem::new(MCF_SYSTEM, SystemKind::Nonlinear, &solution, &MCF_FIELDS, 0).unwrap();
    system.set_settings(default_solver_settings());
    let mut flow = TransientSystem::new(system, 1e-3);
    let assembler = PWillmoreAssembler::new(fields, Constraints::default());
    solution.copy_solution_to_old();
    flow.solve_step(&mut solution, &assembler).unwrap();

    let after = surface_measures(&solution, &fields);
    assert!(after.area < before.area, "{} >= {}", after.area, before.area);
    assert!(after.volume < before.volume, "{} >= {}", after.volume, before.volume);
    assert!(after.volume > 0.9 * before.volume);
}

#[test]
fn volume_constraint_keeps_volume() {
    let (mut solution, fields) = sphere_solution(2);
    let mut init_y = ImplicitSystem::new(INIT_Y_SYSTEM, SystemKind::Linear, &solution, &INIT_Y_FIELDS, 0).unwrap();
    init_y.set_settings(default_solver_settings());
    init_y
        .solve(&mut solution, &InitYAssembler::new(fields))
        .unwrap();
    let before = surface_measures(&solution, &fields);

    let constraints = Constraints {
        volume: true,
        area: false,
    };
    let mut system = ImplicitSystem::new(
        MCF_SYSTEM,
        SystemKind::Nonlinear,
        &solution,
        &MCF_FIELDS,
        constraints.num_global_variables(),
    )
    .unwrap();
    let mut settings = default_solver_settings();
    settings.max_nonlinear_iterations = 10;
    system.set_settings(settings);
    let mut flow = TransientSystem::new(system, 1e-3);
    let assembler = PWillmoreAssembler::new(fields, constraints);
    solution.copy_solution_to_old();
    let outcome = flow.solve_step(&mut solution, &assembler).unwrap();
    assert!(outcome.converged);

    let after = surface_measures(&solution, &fields);
    assert!((after.volume - before.volume).abs() < 1e-4 * before.volume);
}

#[test]
fn default_settings_step_follows_mean_curvature_flow() {
    // A sphere under mean curvature flow has area 4 pi (1 - 4 t)
    let (mut solution, fields) = sphere_solution(2);
    let mut init_y = ImplicitSystem::new(INIT_Y_SYSTEM, SystemKind::Linear, &solution, &INIT_Y_FIELDS, 0).unwrap();
    init_y.set_settings(default_solver_settings());
    init_y
        .solve(&mut solution, &InitYAssembler::new(fields))
        .unwrap();
    let before = surface_measures(&solution, &fields);

    let dt = 1e-3;
    let mut system = ImplicitSystem::new(MCF_SYSTEM, SystemKind::Nonlinear, &solution, &MCF_FIELDS, 0).unwrap();
    system.set_settings(default_solver_settings());
    let mut flow = TransientSystem::new(system, dt);
    solution.copy_solution_to_old();
    let outcome = flow
        .solve_step(&mut solution, &PWillmoreAssembler::new(fields, Constraints::default()))
        .unwrap();
    assert!(outcome.converged, "residual {:e}", outcome.residual_norm);
    assert!(outcome.residual_norm <= 1e-10);
    assert!(outcome.linear.iter().all(|stats| stats.converged));

    let after = surface_measures(&solution, &fields);
    let relative_change = (before.area - after.area) / before.area;
    assert!(relative_change > 1.0 * dt, "area shrinks too slowly: {:e}", relative_change);
    assert!(relative_change < 8.0 * dt, "area shrinks too fast: {:e}", relative_change);
}

#[test]
fn default_configuration_runs_a_full_step() {
    let config = WillmoreConfig::default();
    let mut mesh = MultiLevelMesh::new(create_ellipsoid(config.semi_axes, 1), 2);
    mesh.erase_coarse_levels(1);
    let mut solution = MultiLevelSolution::new(Arc::new(mesh));
    let fields = WillmoreFields::add_to(&mut solution).unwrap();
    solution.initialize_all();

    let mut init_y = ImplicitSystem::new(INIT_Y_SYSTEM, SystemKind::Linear, &solution, &INIT_Y_FIELDS, 0).unwrap();
    init_y.set_settings(config.solver.clone());
    let mut mcf = ImplicitSystem::new(
        MCF_SYSTEM,
        SystemKind::Nonlinear,
        &solution,
        &MCF_FIELDS,
        config.constraints.num_global_variables(),
    )
    .unwrap();
    mcf.set_settings(config.solver.clone());
    let mut flow = TransientSystem::new(mcf, config.dt0);
    flow.attach_time_interval(geometric_time_interval(config.dt0, config.dt_growth));
    let mut conformal = ImplicitSystem::new(CONFORMAL_SYSTEM, SystemKind::Nonlinear, &solution, &CONFORMAL_FIELDS, 0).unwrap();
    conformal.set_settings(config.conformal_solver.clone());

    let init_y_assembler = InitYAssembler::new(fields);
    init_y.solve(&mut solution, &init_y_assembler).unwrap();
    let before = surface_measures(&solution, &fields);

    solution.copy_solution_to_old();
    let outcome = flow
        .solve_step(&mut solution, &PWillmoreAssembler::new(fields, config.constraints))
        .unwrap();
    assert!(outcome.converged, "residual {:e}", outcome.residual_norm);
    let after = surface_measures(&solution, &fields);
    assert!(after.area < before.area - 0.5 * config.dt0 * before.area);

    copy_displacement(&mut solution, &fields, true);
    let outcome = conformal
        .solve(&mut solution, &ConformalAssembler::new(fields))
        .unwrap();
    assert!(outcome.converged, "residual {:e}", outcome.residual_norm);
    copy_displacement(&mut solution, &fields, false);

    solution.copy_solution_to_old();
    let outcome = init_y.solve(&mut solution, &init_y_assembler).unwrap();
    assert!(outcome.residual_norm < 1e-8);
}

proptest! {
    #[test]
    fn geometric_time_steps(dt0 in 1e-5..1e-2, growth in 1.0..1.1) {
        let interval = geometric_time_interval(dt0, growth);
        let mut time = 0.0;
        for k in 0..20 {
            let dt = interval(time);
            let expected = dt0 * growth.powi(k);
            prop_assert!((dt - expected).abs() <= 1e-12 * expected);
            time += dt;
        }
    }
}
