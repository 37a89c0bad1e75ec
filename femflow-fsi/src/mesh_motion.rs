//! Per-step updates of the mesh stiffness and the mesh velocity.
use crate::assembler::FsiFields;
use femflow::assembly::ShapeTables;
use femflow::element::{map_gradients, BasisKind};
use femflow::solution::MultiLevelSolution;
use log::debug;
use rayon::prelude::*;

/// Sets the mesh stiffness `lmbd = A0 / A` of every cell, where `A0` is the reference area and
/// `A` the area of the deformed cell.
///
/// Cells that are compressed by the mesh motion become stiffer, which keeps the fluid mesh from
/// folding near the leaflets.
pub fn set_lambda_new(solution: &mut MultiLevelSolution, fields: &FsiFields) {
    let mesh = solution.mesh();
    let tables = ShapeTables::new(4);
    let basis = if mesh.is_quadratic() {
        BasisKind::LagrangeQuadratic
    } else {
        BasisKind::LagrangeLinear
    };
    let (dx, dy) = (solution.values(fields.dx), solution.values(fields.dy));

    let lambda: Vec<f64> = (0..mesh.num_cells())
        .into_par_iter()
        .map(|c| {
            let cell = &mesh.cells()[c];
            let geometry = tables.get(cell.kind, basis);
            let reference: Vec<[f64; 2]> = cell
                .nodes
                .iter()
                .map(|&n| [mesh.nodes()[n].x, mesh.nodes()[n].y])
                .collect();
            let current: Vec<[f64; 2]> = cell
                .nodes
                .iter()
                .zip(&reference)
                .map(|(&n, x)| [x[0] + dx[n], x[1] + dy[n]])
                .collect();
            let area = |coords: &[[f64; 2]]| -> f64 {
                (0..geometry.num_points())
                    .map(|q| map_gradients(coords, geometry, geometry, q).weight)
                    .sum()
            };
            area(&reference) / area(&current)
        })
        .collect();

    let (min, max) = lambda
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(min, max), &l| (min.min(l), max.max(l)));
    debug!("Mesh stiffness in [{}, {}]", min, max);
    solution
        .values_mut(fields.lmbd)
        .as_mut_slice()
        .copy_from_slice(&lambda);
}

/// Stores the mesh velocity `(D - D_old) / dt` of the last step in `Um` and `Vm`.
pub fn store_mesh_velocity(solution: &mut MultiLevelSolution, fields: &FsiFields, dt: f64) {
    for (displacement, velocity) in [(fields.dx, fields.um), (fields.dy, fields.vm)] {
        let rate = (solution.values(displacement) - solution.old_values(displacement)) / dt;
        solution.values_mut(velocity).copy_from(&rate);
    }
}
