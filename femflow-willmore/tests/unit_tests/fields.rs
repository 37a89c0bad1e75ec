use super::sphere_solution;
use femflow_willmore::fields::{copy_displacement, element_near_vertex_number, WillmoreFields};

#[test]
fn fields_can_be_looked_up_by_name() {
    let (solution, fields) = sphere_solution(0);
    assert_eq!(WillmoreFields::from_solution(&solution).unwrap(), fields);
    assert_eq!(solution.values(fields.lambda1).len(), 20);
    assert_eq!(solution.values(fields.dx[0]).len(), 12);
}

#[test]
fn element_near_vertex_number_counts_valences() {
    let (mut solution, fields) = sphere_solution(1);
    element_near_vertex_number(&mut solution, &fields);
    let envn = solution.values(fields.envn);
    assert_eq!(envn.len(), 42);
    assert_eq!(envn.iter().filter(|&&n| n == 5.0).count(), 12);
    assert_eq!(envn.iter().filter(|&&n| n == 6.0).count(), 30);
}

#[test]
fn copy_displacement_in_both_directions() {
    let (mut solution, fields) = sphere_solution(0);
    for (k, &dx) in fields.dx.iter().enumerate() {
        solution.values_mut(dx).fill(k as f64 + 1.0);
    }
    copy_displacement(&mut solution, &fields, true);
    for (k, &ndx) in fields.ndx.iter().enumerate() {
        assert!(solution.values(ndx).iter().all(|&v| v == k as f64 + 1.0));
    }

    for &ndx in &fields.ndx {
        solution.values_mut(ndx).fill(-0.5);
    }
    copy_displacement(&mut solution, &fields, false);
    for &dx in &fields.dx {
        assert!(solution.values(dx).iter().all(|&v| v == -0.5));
    }
}
