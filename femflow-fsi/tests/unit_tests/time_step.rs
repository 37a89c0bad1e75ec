use super::small_geometry;
use femflow::boundary::BdcKind;
use femflow::mesh::procedural::create_valve_mesh;
use femflow::mesh::procedural::valve_faces::{INLET, OUTLET};
use femflow::mesh::MultiLevelMesh;
use femflow::solution::MultiLevelSolution;
use femflow::system::{ImplicitSystem, SystemKind};
use femflow::transient::{TimeState, TransientSystem};
use femflow_fsi::assembler::{FsiAssembler, FsiFields, FSI_SYSTEM, SYSTEM_FIELDS};
use femflow_fsi::boundary::valve_boundary_condition;
use femflow_fsi::config::{default_solver_settings, multigrid_cycle};
use femflow_fsi::flux::solution_fluxes;
use femflow_fsi::materials::{Fluid, Solid};
use femflow_fsi::mesh_motion::set_lambda_new;
use std::sync::Arc;

#[test]
fn default_settings_converge_on_a_pressure_driven_step() {
    let mesh = MultiLevelMesh::new(create_valve_mesh(&small_geometry()), 2);
    let mut solution = MultiLevelSolution::new(Arc::new(mesh));
    let fields = FsiFields::add_to(&mut solution).unwrap();
    solution.initialize_all();
    solution.attach_boundary_condition(Arc::new(valve_boundary_condition));
    for name in SYSTEM_FIELDS {
        solution.generate_bdc(name, BdcKind::Steady).unwrap();
    }

    let mut system = ImplicitSystem::new(FSI_SYSTEM, SystemKind::Nonlinear, &solution, &SYSTEM_FIELDS, 0).unwrap();
    system.set_settings(default_solver_settings());
    system.set_mg_type(multigrid_cycle(1));
    let dt = 1.0 / 64.0;
    let mut transient = TransientSystem::new(system, dt);
    // The step ends at the pressure peak t = 1/4
    transient.set_time_state(TimeState {
        time: 0.25 - dt,
        dt,
        step: 0,
    });

    let assembler = FsiAssembler::new(&solution, fields, Fluid::default(), Solid::vein(), Solid::leaflet());
    solution.copy_solution_to_old();
    set_lambda_new(&mut solution, &fields);
    let outcome = transient.solve_step(&mut solution, &assembler).unwrap();

    assert!(outcome.converged, "{:?}", outcome);
    assert!(outcome.linear.iter().all(|stats| stats.converged));

    // The inlet pressure pushes fluid in, the outlet suction pulls it out
    let q = solution_fluxes(&solution, &fields, &[INLET, OUTLET]);
    assert!(q.iter().all(|q| q.is_finite()));
    assert!(q[0] < 0.0, "inlet flux {}", q[0]);
    assert!(q[1] > 0.0, "outlet flux {}", q[1]);
}
