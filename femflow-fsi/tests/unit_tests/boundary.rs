use femflow::boundary::{BoundaryCondition, BoundaryQuery};
use femflow::mesh::procedural::valve_faces::{INLET, OUTER_WALL, OUTLET, VEIN_ENDS};
use femflow::nalgebra::Point3;
use femflow_fsi::boundary::{ramp, time_interval, valve_boundary_condition, valve_pressure, PRESSURE_AMPLITUDE};
use matrixcompare::assert_scalar_eq;

fn condition(field: &str, facename: i32, time: f64) -> BoundaryCondition {
    let x = Point3::origin();
    valve_boundary_condition(&BoundaryQuery {
        x: &x,
        field,
        facename,
        time,
    })
}

#[test]
fn ramp_reaches_one_smoothly() {
    assert_eq!(ramp(0.0), 0.0);
    assert_scalar_eq!(ramp(1.0), 0.5f64.sqrt(), comp = abs, tol = 1e-15);
    assert_scalar_eq!(ramp(2.0 - 1e-12), 1.0, comp = abs, tol = 1e-10);
    assert_eq!(ramp(2.0), 1.0);
    assert_eq!(ramp(7.3), 1.0);
}

#[test]
fn inlet_and_outlet_pressures_are_in_counter_phase() {
    let t = 2.25;
    assert_scalar_eq!(valve_pressure(INLET, t), PRESSURE_AMPLITUDE, comp = abs, tol = 1e-12);
    assert_scalar_eq!(valve_pressure(OUTLET, t), -PRESSURE_AMPLITUDE, comp = abs, tol = 1e-12);
    assert_eq!(valve_pressure(OUTER_WALL, t), 0.0);
    assert_eq!(valve_pressure(VEIN_ENDS, t), 0.0);
}

#[test]
fn valve_boundary_condition_table() {
    use BoundaryCondition::*;
    let t = 0.7;
    assert_eq!(condition("PS", INLET, t), Neumann(valve_pressure(INLET, t)));
    assert_eq!(condition("PS", OUTLET, t), Neumann(valve_pressure(OUTLET, t)));
    assert_eq!(condition("PS", VEIN_ENDS, t), Neumann(0.0));
    for face in [INLET, OUTLET, OUTER_WALL, VEIN_ENDS] {
        assert_eq!(condition("PF", face, t), Neumann(0.0));
    }

    // Axial velocity is free on all marked faces
    for face in [INLET, OUTLET, OUTER_WALL, VEIN_ENDS] {
        assert_eq!(condition("U", face, t), Neumann(0.0));
    }

    // The vein ends slide axially
    assert_eq!(condition("DX", OUTER_WALL, t), Neumann(0.0));
    assert_eq!(condition("DX", VEIN_ENDS, t), Neumann(0.0));
    for face in [INLET, OUTLET] {
        assert_eq!(condition("DX", face, t), Dirichlet(0.0));
    }

    for field in ["V", "DY"] {
        assert_eq!(condition(field, OUTER_WALL, t), Neumann(0.0));
        for face in [INLET, OUTLET, VEIN_ENDS] {
            assert_eq!(condition(field, face, t), Dirichlet(0.0));
        }
    }
}

#[test]
fn constant_time_interval() {
    let interval = time_interval(1.0 / 64.0);
    assert_eq!(interval(0.0), 1.0 / 64.0);
    assert_eq!(interval(3.5), 1.0 / 64.0);
}
