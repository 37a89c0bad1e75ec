//! Geometric multigrid over a hierarchy of nested discretizations.
//!
//! Only the finest operator is assembled. Coarse operators are Galerkin products
//! $A_{l} = P_l^T A_{l+1} P_l$, where $P_l$ prolongates from level $l$ to level $l + 1$.
use crate::lu::SparseLu;
use crate::operator::{residual_into, LinearOperator};
use crate::preconditioner::{Ilu0, Jacobi, Richardson};
use crate::{KrylovOutput, SolveError, SolveErrorKind};
use log::debug;
use nalgebra::{DVector, DVectorView, DVectorViewMut};
use nalgebra_sparse::CsrMatrix;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::sync::Arc;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Cycle {
    V,
    F,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SmootherKind {
    Jacobi,
    Ilu0,
}

/// Solver on the coarsest level.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CoarseSolverKind {
    /// Sparse LU factorization of the coarse operator.
    Direct,
    /// A fixed number of smoothing sweeps, for coarse operators that are singular.
    Smoother { sweeps: usize },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MultigridSettings {
    pub cycle: Cycle,
    pub pre_smoothing: usize,
    pub post_smoothing: usize,
    pub smoother: SmootherKind,
    /// Damping factor of the Richardson smoother.
    pub smoother_scale: f64,
    pub coarse_solver: CoarseSolverKind,
}

impl Default for MultigridSettings {
    fn default() -> Self {
        Self {
            cycle: Cycle::V,
            pre_smoothing: 2,
            post_smoothing: 2,
            smoother: SmootherKind::Ilu0,
            smoother_scale: 1.0,
            coarse_solver: CoarseSolverKind::Direct,
        }
    }
}

#[derive(Debug, Clone)]
enum Smoother {
    Jacobi(Richardson<Jacobi<f64>>),
    Ilu0(Richardson<Ilu0<f64>>),
}

impl Smoother {
    fn build(matrix: &CsrMatrix<f64>, settings: &MultigridSettings) -> Result<Self, SolveErrorKind> {
        Ok(match settings.smoother {
            SmootherKind::Jacobi => Self::Jacobi(Richardson::new(Jacobi::from_csr(matrix)?, settings.smoother_scale)),
            SmootherKind::Ilu0 => Self::Ilu0(Richardson::new(Ilu0::from_csr(matrix)?, settings.smoother_scale)),
        })
    }

    fn smooth(
        &self,
        matrix: &CsrMatrix<f64>,
        b: &DVector<f64>,
        x: &mut DVector<f64>,
        sweeps: usize,
    ) -> Result<(), SolveErrorKind> {
        match self {
            Self::Jacobi(richardson) => richardson.smooth(matrix, DVectorView::from(b), x, sweeps),
            Self::Ilu0(richardson) => richardson.smooth(matrix, DVectorView::from(b), x, sweeps),
        }
    }
}

#[derive(Debug, Clone)]
struct Level {
    matrix: CsrMatrix<f64>,
    smoother: Smoother,
    /// Prolongation from the next coarser level. `None` on the coarsest level.
    prolongation: Option<(CsrMatrix<f64>, CsrMatrix<f64>)>,
}

#[derive(Debug, Clone)]
enum CoarseSolver {
    Direct(Arc<SparseLu>),
    Smoother { sweeps: usize },
}

#[derive(Debug, Clone)]
pub struct Multigrid {
    levels: Vec<Level>,
    coarse_solver: CoarseSolver,
    settings: MultigridSettings,
}

/// Computes the Galerkin coarse operator $P^T A P$.
pub fn galerkin_product(fine: &CsrMatrix<f64>, prolongation: &CsrMatrix<f64>) -> CsrMatrix<f64> {
    let restriction = prolongation.transpose();
    let ap = fine * prolongation;
    &restriction * &ap
}

impl Multigrid {
    /// Builds the hierarchy from the finest operator.
    ///
    /// `prolongations[l]` maps level `l` to level `l + 1`, ordered from coarsest to finest.
    /// With no prolongations and a direct coarse solver, the method degenerates to a direct solve.
    pub fn new(
        fine: CsrMatrix<f64>,
        prolongations: &[CsrMatrix<f64>],
        settings: MultigridSettings,
    ) -> Result<Self, SolveErrorKind> {
        let mut matrices = vec![fine];
        for p in prolongations.iter().rev() {
            let finer = matrices.last().ok_or(SolveErrorKind::DimensionMismatch)?;
            if p.nrows() != finer.nrows() {
                return Err(SolveErrorKind::DimensionMismatch);
            }
            let coarse = galerkin_product(finer, p);
            matrices.push(coarse);
        }
        matrices.reverse();

        let coarse_solver = match settings.coarse_solver {
            CoarseSolverKind::Direct => CoarseSolver::Direct(Arc::new(SparseLu::from_csr(&matrices[0])?)),
            CoarseSolverKind::Smoother { sweeps } => CoarseSolver::Smoother { sweeps },
        };
        let mut levels = Vec::with_capacity(matrices.len());
        for (l, matrix) in matrices.into_iter().enumerate() {
            let prolongation = match l {
                0 => None,
                _ => {
                    let p = prolongations[l - 1].clone();
                    Some((p.transpose(), p))
                }
            };
            let smoother = Smoother::build(&matrix, &settings)?;
            levels.push(Level {
                matrix,
                smoother,
                prolongation,
            });
        }
        debug!(
            "Multigrid hierarchy with {} levels, sizes {:?}",
            levels.len(),
            levels.iter().map(|level| level.matrix.nrows()).collect::<Vec<_>>()
        );

        Ok(Self {
            levels,
            coarse_solver,
            settings,
        })
    }

    pub fn num_levels(&self) -> usize {
        self.levels.len()
    }

    /// Operator on the given level, with level 0 the coarsest.
    pub fn operator(&self, level: usize) -> &CsrMatrix<f64> {
        &self.levels[level].matrix
    }

    pub fn settings(&self) -> &MultigridSettings {
        &self.settings
    }

    pub fn set_cycle(&mut self, cycle: Cycle) {
        self.settings.cycle = cycle;
    }

    fn cycle(&self, level: usize, cycle: Cycle, b: &DVector<f64>, x: &mut DVector<f64>) -> Result<(), SolveErrorKind> {
        if level == 0 {
            return match &self.coarse_solver {
                CoarseSolver::Direct(lu) => {
                    x.copy_from(b);
                    lu.solve_in_place(DVectorViewMut::from(x))
                }
                CoarseSolver::Smoother { sweeps } => {
                    let coarsest = &self.levels[0];
                    coarsest.smoother.smooth(&coarsest.matrix, b, x, *sweeps)
                }
            };
        }

        let current = &self.levels[level];
        let (restriction, prolongation) = current
            .prolongation
            .as_ref()
            .ok_or(SolveErrorKind::DimensionMismatch)?;

        current
            .smoother
            .smooth(&current.matrix, b, x, self.settings.pre_smoothing)?;

        let mut r = DVector::zeros(b.len());
        residual_into(&mut r, &current.matrix, DVectorView::from(&*x), DVectorView::from(b))
            .map_err(SolveErrorKind::OperatorError)?;
        let r_coarse = restriction * &r;
        let mut e_coarse = DVector::zeros(r_coarse.len());
        match cycle {
            Cycle::V => self.cycle(level - 1, Cycle::V, &r_coarse, &mut e_coarse)?,
            Cycle::F => {
                self.cycle(level - 1, Cycle::F, &r_coarse, &mut e_coarse)?;
                self.cycle(level - 1, Cycle::V, &r_coarse, &mut e_coarse)?;
            }
        }
        *x += prolongation * &e_coarse;

        current
            .smoother
            .smooth(&current.matrix, b, x, self.settings.post_smoothing)
    }

    /// Applies one cycle to the system on the finest level, improving `x` in place.
    pub fn apply_cycle(&self, b: &DVector<f64>, x: &mut DVector<f64>) -> Result<(), SolveErrorKind> {
        self.cycle(self.levels.len() - 1, self.settings.cycle, b, x)
    }

    /// Uses multigrid as a stand-alone iterative solver.
    pub fn solve(
        &self,
        b: &DVector<f64>,
        x: &mut DVector<f64>,
        tolerance: f64,
        max_cycles: usize,
    ) -> Result<KrylovOutput<f64>, SolveError<f64>> {
        let fine = &self.levels[self.levels.len() - 1].matrix;
        let b_norm = b.norm();
        let mut r = DVector::zeros(b.len());
        let mut output = KrylovOutput::new(0, 0.0, 0.0);

        loop {
            if let Err(err) = residual_into(&mut r, fine, DVectorView::from(&*x), DVectorView::from(b)) {
                return Err(SolveError::new(output, SolveErrorKind::OperatorError(err)));
            }
            let r_norm = r.norm();
            if output.num_iterations == 0 {
                output.initial_residual = r_norm;
            }
            output.final_residual = r_norm;
            if r_norm <= tolerance * b_norm {
                return Ok(output);
            } else if output.num_iterations >= max_cycles {
                let kind = SolveErrorKind::MaxIterationsReached { max_iter: max_cycles };
                return Err(SolveError::new(output, kind));
            }
            if let Err(kind) = self.apply_cycle(b, x) {
                return Err(SolveError::new(output, kind));
            }
            output.num_iterations += 1;
        }
    }
}

impl LinearOperator<f64> for Multigrid {
    fn apply(&self, mut y: DVectorViewMut<f64>, x: DVectorView<f64>) -> Result<(), Box<dyn Error>> {
        let b = x.clone_owned();
        let mut correction = DVector::zeros(b.len());
        self.apply_cycle(&b, &mut correction)?;
        y.copy_from(&correction);
        Ok(())
    }
}
