use crate::assembly::{element_jacobian, element_residual, AdScalar, AssemblyError, ElementData, LocalLayout, ShapeTables};
use crate::solution::MultiLevelSolution;
use crate::system::SystemLayout;
use log::trace;
use nalgebra::{DMatrix, DVector};
use nalgebra_sparse::{CooMatrix, CsrMatrix};
use rayon::prelude::*;

/// A residual defined cell by cell.
///
/// The local unknowns are the dofs of the system fields on the cell, field by field in system
/// order, followed by the global variables of the system. The residual has one entry per
/// local unknown.
pub trait ElementResidual: Sync {
    /// Polynomial degree integrated exactly by the cell quadrature.
    fn quadrature_order(&self) -> usize {
        5
    }

    fn residual<T: AdScalar>(&self, element: &ElementData, unknowns: &[T], residual: &mut [T]);
}

/// A scalar quantity defined as a sum of cell contributions.
pub trait ElementFunctional: Sync {
    fn quadrature_order(&self) -> usize {
        5
    }

    fn evaluate(&self, element: &ElementData) -> f64;
}

/// Global residual and (optionally) Jacobian of a system.
#[derive(Debug, Clone)]
pub struct AssembledSystem {
    pub residual: DVector<f64>,
    pub jacobian: Option<CsrMatrix<f64>>,
}

struct LocalBlock {
    dofs: Vec<usize>,
    residual: DVector<f64>,
    jacobian: Option<DMatrix<f64>>,
}

/// Assembles the residual of `assembler` at the system unknowns `x`.
///
/// Rows of Dirichlet dofs are replaced by identity rows with zero residual, and the
/// corresponding columns are removed from the other rows. The Jacobian always stores its
/// diagonal, so that it can be factored incompletely.
pub fn assemble_system<R: ElementResidual>(
    layout: &SystemLayout,
    solution: &MultiLevelSolution,
    assembler: &R,
    x: &DVector<f64>,
    time: f64,
    dt: f64,
    with_jacobian: bool,
) -> Result<AssembledSystem, AssemblyError> {
    let n = layout.num_dofs();
    if x.len() != n {
        return Err(AssemblyError::DimensionMismatch {
            expected: n,
            actual: x.len(),
        });
    }
    let mesh = solution.mesh();
    let tables = ShapeTables::new(assembler.quadrature_order());

    let blocks = (0..mesh.num_cells())
        .into_par_iter()
        .map(|cell| {
            let local_layout = LocalLayout::new(layout, mesh, solution, cell);
            let local_x: Vec<f64> = local_layout.system_dofs().iter().map(|&dof| x[dof]).collect();
            let dofs = local_layout.system_dofs().to_vec();
            let element = ElementData::new(solution, &tables, local_layout, cell, time, dt);
            let (residual, jacobian) = if with_jacobian {
                let (residual, jacobian) = element_jacobian(assembler, &element, &local_x);
                (residual, Some(jacobian))
            } else {
                (element_residual(assembler, &element, &local_x), None)
            };
            if residual.iter().any(|r| !r.is_finite()) {
                return Err(AssemblyError::NonFiniteResidual { cell });
            }
            Ok(LocalBlock {
                dofs,
                residual,
                jacobian,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let dirichlet = layout.dirichlet_mask(solution);
    let mut residual = DVector::zeros(n);
    let mut coo = CooMatrix::new(n, n);
    if with_jacobian {
        for i in 0..n {
            coo.push(i, i, if dirichlet[i] { 1.0 } else { 0.0 });
        }
    }

    for block in &blocks {
        for (a, &row) in block.dofs.iter().enumerate() {
            if dirichlet[row] {
                continue;
            }
            residual[row] += block.residual[a];
            if let Some(jacobian) = &block.jacobian {
                for (b, &col) in block.dofs.iter().enumerate() {
                    if !dirichlet[col] {
                        coo.push(row, col, jacobian[(a, b)]);
                    }
                }
            }
        }
    }
    trace!("Assembled {} cells, residual norm {}", blocks.len(), residual.norm());

    Ok(AssembledSystem {
        residual,
        jacobian: with_jacobian.then(|| CsrMatrix::from(&coo)),
    })
}

/// Sums a functional over all cells in parallel.
pub fn assemble_scalar<F: ElementFunctional>(solution: &MultiLevelSolution, functional: &F, time: f64) -> f64 {
    let tables = ShapeTables::new(functional.quadrature_order());
    (0..solution.mesh().num_cells())
        .into_par_iter()
        .map(|cell| {
            let element = ElementData::new(solution, &tables, LocalLayout::default(), cell, time, 0.0);
            functional.evaluate(&element)
        })
        .sum()
}
