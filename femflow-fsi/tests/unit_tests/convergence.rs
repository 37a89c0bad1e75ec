use femflow::system::{LinearSolveStats, NonlinearOutcome};
use femflow_fsi::convergence::{convergence_rate, ConvergenceLog};
use matrixcompare::assert_scalar_eq;

#[test]
fn convergence_rate_is_geometric_mean_of_reductions() {
    let rate = convergence_rate(1.0, 1e-6, 3).unwrap();
    assert_scalar_eq!(rate, 1e-2, comp = abs, tol = 1e-14);
    assert_eq!(convergence_rate(1.0, 0.5, 0), None);
    assert_eq!(convergence_rate(0.0, 0.0, 4), None);
}

fn two_solve_outcome() -> NonlinearOutcome {
    NonlinearOutcome {
        converged: true,
        iterations: 2,
        residual_norm: 1e-9,
        linear: vec![
            LinearSolveStats {
                iterations: 2,
                initial_residual: 4.0,
                final_residual: 0.04,
                converged: true,
            },
            LinearSolveStats {
                iterations: 1,
                initial_residual: 0.5,
                final_residual: 0.25,
                converged: true,
            },
        ],
    }
}

fn read_lines(path: &std::path::Path) -> Vec<String> {
    std::fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(str::to_owned)
        .collect()
}

#[test]
fn log_lists_every_linear_solve() {
    let outcome = two_solve_outcome();
    let mut log = ConvergenceLog::new(Vec::new(), 3).unwrap();
    log.record(0.125, &outcome).unwrap();
    assert_eq!(log.records().len(), 2);
    assert_eq!(log.records()[1].nonlinear_iteration, 2);

    let text = String::from_utf8(log.into_inner()).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines[0], "Number_of_refinements=3");
    assert_eq!(
        lines[1],
        "Simulation_Time,Nonlinear_Iteration,resid_norm0,resid_normN,N,convergence"
    );
    assert!(lines[2].starts_with("0.125,1,4,0.04,2,"));
    assert_eq!(lines[3], "0.125,2,0.5,0.25,1,0.5");

    let rate: f64 = lines[2].rsplit(',').next().unwrap().parse().unwrap();
    assert_scalar_eq!(rate, 0.1, comp = abs, tol = 1e-14);
}

#[test]
fn log_file_is_written_after_every_step() {
    let path = std::env::temp_dir().join(format!("femflow_fsi_convergence_{}.csv", std::process::id()));
    let mut log = ConvergenceLog::create(&path, 2).unwrap();
    assert_eq!(read_lines(&path).len(), 2);

    log.record(0.5, &two_solve_outcome()).unwrap();
    assert_eq!(read_lines(&path).len(), 4);
    log.record(1.0, &two_solve_outcome()).unwrap();
    let lines = read_lines(&path);
    assert_eq!(lines.len(), 6);
    assert!(lines[4].starts_with("1,1,"));

    // Still complete if the run is aborted
    drop(log);
    assert_eq!(read_lines(&path).len(), 6);
    std::fs::remove_file(&path).unwrap();
}

#[test]
fn appended_log_continues_without_second_header() {
    let path = std::env::temp_dir().join(format!("femflow_fsi_convergence_append_{}.csv", std::process::id()));
    let _ = std::fs::remove_file(&path);

    let mut log = ConvergenceLog::append(&path, 2).unwrap();
    log.record(0.5, &two_solve_outcome()).unwrap();
    drop(log);
    let mut log = ConvergenceLog::append(&path, 2).unwrap();
    log.record(1.0, &two_solve_outcome()).unwrap();
    assert_eq!(log.records().len(), 2);
    drop(log);

    let lines = read_lines(&path);
    assert_eq!(lines.len(), 6);
    assert_eq!(lines[0], "Number_of_refinements=2");
    assert_eq!(lines.iter().filter(|l| l.starts_with("Number_of_refinements")).count(), 1);
    assert!(lines[2].starts_with("0.5,1,"));
    assert!(lines[4].starts_with("1,1,"));
    std::fs::remove_file(&path).unwrap();
}
