//! Boundary conditions and time stepping of the valve problem.
use femflow::boundary::{BoundaryCondition, BoundaryQuery};
use femflow::mesh::procedural::valve_faces::{INLET, OUTER_WALL, OUTLET, VEIN_ENDS};
use femflow::transient::TimeIntervalFn;
use std::f64::consts::PI;

/// Amplitude of the oscillating inlet and outlet pressures.
pub const PRESSURE_AMPLITUDE: f64 = 15.0;

/// Smooth start-up factor rising from 0 to 1 over the first two time units.
pub fn ramp(time: f64) -> f64 {
    if time < 2.0 {
        (0.5 * PI * time / 2.0).sin()
    } else {
        1.0
    }
}

/// Normal pressure on the inlet and outlet. The two pressures are in counter phase, so the
/// pressure difference across the valve alternates.
pub fn valve_pressure(facename: i32, time: f64) -> f64 {
    let pressure = PRESSURE_AMPLITUDE * (2.0 * PI * time).sin() * ramp(time);
    match facename {
        INLET => pressure,
        OUTLET => -pressure,
        _ => 0.0,
    }
}

/// Boundary conditions of the valve.
///
/// The vein ends are fixed in the radial direction but slide along the axis, the outer vein
/// wall is traction free and the fluid is driven by the pressure loads on the inlet and
/// outlet. Both pressures are natural everywhere.
pub fn valve_boundary_condition(query: &BoundaryQuery) -> BoundaryCondition {
    use BoundaryCondition::*;
    let facename = query.facename;
    match query.field {
        "PS" => Neumann(valve_pressure(facename, query.time)),
        "PF" => Neumann(0.0),
        "U" if matches!(facename, INLET | OUTLET | OUTER_WALL | VEIN_ENDS) => Neumann(0.0),
        "DX" if matches!(facename, OUTER_WALL | VEIN_ENDS) => Neumann(0.0),
        "V" | "DY" if facename == OUTER_WALL => Neumann(0.0),
        _ => Dirichlet(0.0),
    }
}

/// Constant time step.
pub fn time_interval(dt: f64) -> TimeIntervalFn {
    Box::new(move |_time| dt)
}
