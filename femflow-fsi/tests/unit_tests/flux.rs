use super::{small_geometry, valve_solution};
use femflow::mesh::procedural::valve_faces::{INLET, OUTER_WALL, OUTLET};
use femflow_fsi::flux::{file_name, solution_fluxes, FluxHistory};
use matrixcompare::assert_scalar_eq;

#[test]
fn uniform_flow_through_the_valve() {
    let (mut solution, fields) = valve_solution();
    solution.values_mut(fields.u).fill(1.0);
    let opening = 2.0 * small_geometry().lumen_radius;

    let fluxes = solution_fluxes(&solution, &fields, &[INLET, OUTLET, OUTER_WALL]);
    assert_scalar_eq!(fluxes[0], -opening, comp = abs, tol = 1e-12);
    assert_scalar_eq!(fluxes[1], opening, comp = abs, tol = 1e-12);
    assert_scalar_eq!(fluxes[2], 0.0, comp = abs, tol = 1e-12);
}

#[test]
fn fluxes_are_computed_on_the_deformed_boundary() {
    let (mut solution, fields) = valve_solution();
    solution.values_mut(fields.u).fill(1.0);
    let y: Vec<f64> = solution.mesh().nodes().iter().map(|x| x.y).collect();
    for (d, y) in solution.values_mut(fields.dy).iter_mut().zip(y) {
        *d = 0.2 * y + 0.05;
    }
    let opening = 1.2 * 2.0 * small_geometry().lumen_radius;

    let fluxes = solution_fluxes(&solution, &fields, &[INLET, OUTLET]);
    assert_scalar_eq!(fluxes[0], -opening, comp = abs, tol = 1e-12);
    assert_scalar_eq!(fluxes[1], opening, comp = abs, tol = 1e-12);
}

#[test]
fn flux_history_accumulates_volumes_with_trapezoidal_rule() {
    let path = std::env::temp_dir().join(format!("femflow_fsi_flux_history_{}.txt", std::process::id()));
    let mut history = FluxHistory::create(&path).unwrap();
    history.record(1, 0.5, 0.5, [2.0, -1.0]).unwrap();
    history.record(2, 1.0, 0.5, [4.0, -1.0]).unwrap();
    assert_eq!(history.volumes(), [0.5 + 1.5, -0.25 - 0.5]);
    assert_eq!(history.total_volume(), 1.25);

    let text = std::fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines, vec!["1,0.5,2,-1,0.5,-0.25,0.25", "2,1,4,-1,2,-0.75,1.25"]);
    std::fs::remove_file(&path).unwrap();
}

#[test]
fn flux_file_name() {
    assert_eq!(
        file_name(7.5e6, 4, 1.0 / 64.0),
        "fluxes_E1=7500000_level=4_incomp_dt64.txt"
    );
}

#[test]
fn resumed_flux_history_continues_the_volumes_of_the_restart_step() {
    let path = std::env::temp_dir().join(format!("femflow_fsi_flux_resume_{}.txt", std::process::id()));
    let mut history = FluxHistory::create(&path).unwrap();
    history.record(1, 0.5, 0.5, [2.0, -1.0]).unwrap();
    history.record(2, 1.0, 0.5, [4.0, -1.0]).unwrap();
    history.record(3, 1.5, 0.5, [6.0, -1.0]).unwrap();
    drop(history);

    // Restart from the state after step 2, whose fluxes are [4, -1]
    let mut history = FluxHistory::resume(&path, 2, [4.0, -1.0]).unwrap();
    assert_eq!(history.volumes(), [2.0, -0.75]);
    history.record(3, 1.5, 0.5, [6.0, -1.0]).unwrap();
    assert_eq!(history.volumes(), [4.5, -1.25]);
    drop(history);

    let text = std::fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(
        lines,
        vec!["1,0.5,2,-1,0.5,-0.25,0.25", "2,1,4,-1,2,-0.75,1.25", "3,1.5,6,-1,4.5,-1.25,3.25"]
    );
    std::fs::remove_file(&path).unwrap();
}

#[test]
fn resuming_without_flux_file_starts_from_zero_volumes() {
    let path = std::env::temp_dir().join(format!("femflow_fsi_flux_missing_{}.txt", std::process::id()));
    let _ = std::fs::remove_file(&path);
    let mut history = FluxHistory::resume(&path, 4, [1.0, -1.0]).unwrap();
    assert_eq!(history.volumes(), [0.0, 0.0]);
    history.record(5, 2.5, 0.5, [3.0, -1.0]).unwrap();
    assert_eq!(history.volumes(), [1.0, -0.5]);
    std::fs::remove_file(&path).unwrap();
}
