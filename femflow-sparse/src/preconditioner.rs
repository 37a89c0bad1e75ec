//! Preconditioners and stationary smoothers built from CSR matrices.
use crate::cg::{ResidualTolerance, StoppingCriterion};
use crate::operator::{residual_into, LinearOperator};
use crate::{KrylovOutput, SolveError, SolveErrorKind};
use femflow_traits::Real;
use nalgebra::{DVector, DVectorView, DVectorViewMut};
use nalgebra_sparse::CsrMatrix;
use std::error::Error;

fn diagonal_indices<T: Real>(matrix: &CsrMatrix<T>) -> Result<Vec<usize>, SolveErrorKind> {
    let offsets = matrix.row_offsets();
    let cols = matrix.col_indices();
    (0..matrix.nrows())
        .map(|i| {
            let row = &cols[offsets[i]..offsets[i + 1]];
            row.binary_search(&i)
                .map(|local| offsets[i] + local)
                .map_err(|_| SolveErrorKind::MissingDiagonal { row: i })
        })
        .collect()
}

/// Diagonal scaling $P = D^{-1}$.
#[derive(Debug, Clone)]
pub struct Jacobi<T> {
    inverse_diagonal: DVector<T>,
}

impl<T: Real> Jacobi<T> {
    pub fn from_csr(matrix: &CsrMatrix<T>) -> Result<Self, SolveErrorKind> {
        let values = matrix.values();
        let inverse = diagonal_indices(matrix)?
            .into_iter()
            .map(|idx| {
                let d = values[idx];
                if d == T::zero() {
                    Err(SolveErrorKind::SingularMatrix)
                } else {
                    Ok(T::one() / d)
                }
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            inverse_diagonal: DVector::from_vec(inverse),
        })
    }
}

impl<T: Real> LinearOperator<T> for Jacobi<T> {
    fn apply(&self, mut y: DVectorViewMut<T>, x: DVectorView<T>) -> Result<(), Box<dyn Error>> {
        y.copy_from(&x);
        y.component_mul_assign(&self.inverse_diagonal);
        Ok(())
    }
}

/// Incomplete LU factorization without fill-in.
///
/// The factors share the sparsity pattern of the input matrix. `L` has an implicit unit
/// diagonal, and the stored diagonal belongs to `U`. Pivots smaller in magnitude than
/// `pivot_tolerance` times the largest entry of their row are replaced by that bound.
#[derive(Debug, Clone)]
pub struct Ilu0<T> {
    factors: CsrMatrix<T>,
    diagonal: Vec<usize>,
}

impl<T: Real> Ilu0<T> {
    pub fn from_csr(matrix: &CsrMatrix<T>) -> Result<Self, SolveErrorKind> {
        Self::from_csr_with_pivot_tolerance(matrix, nalgebra::convert(1e-12))
    }

    pub fn from_csr_with_pivot_tolerance(matrix: &CsrMatrix<T>, pivot_tolerance: T) -> Result<Self, SolveErrorKind> {
        if matrix.nrows() != matrix.ncols() {
            return Err(SolveErrorKind::DimensionMismatch);
        }
        let diagonal = diagonal_indices(matrix)?;
        let mut factors = matrix.clone();
        let n = factors.nrows();
        let offsets = factors.row_offsets().to_vec();
        let cols = factors.col_indices().to_vec();
        let values = factors.values_mut();

        for i in 0..n {
            let row_start = offsets[i];
            let row_end = offsets[i + 1];
            let row_scale = values[row_start..row_end]
                .iter()
                .fold(T::zero(), |m, v| m.max(v.abs()));

            for ik in row_start..diagonal[i] {
                let k = cols[ik];
                let l_ik = values[ik] / values[diagonal[k]];
                values[ik] = l_ik;

                // Row i minus l_ik times row k of U, restricted to the pattern of row i
                let mut ij = ik + 1;
                for kj in diagonal[k] + 1..offsets[k + 1] {
                    let j = cols[kj];
                    while ij < row_end && cols[ij] < j {
                        ij += 1;
                    }
                    if ij == row_end {
                        break;
                    }
                    if cols[ij] == j {
                        let u_kj = values[kj];
                        values[ij] -= l_ik * u_kj;
                    }
                }
            }

            let bound = pivot_tolerance * row_scale;
            let pivot = values[diagonal[i]];
            if row_scale == T::zero() {
                return Err(SolveErrorKind::SingularMatrix);
            } else if pivot.abs() < bound {
                values[diagonal[i]] = if pivot < T::zero() { -bound } else { bound };
            }
        }

        Ok(Self { factors, diagonal })
    }

    /// Solves `L U y = x` in place.
    fn solve_in_place(&self, y: &mut DVectorViewMut<T>) {
        let offsets = self.factors.row_offsets();
        let cols = self.factors.col_indices();
        let values = self.factors.values();
        let n = self.factors.nrows();

        for i in 0..n {
            let mut sum = y[i];
            for idx in offsets[i]..self.diagonal[i] {
                sum -= values[idx] * y[cols[idx]];
            }
            y[i] = sum;
        }
        for i in (0..n).rev() {
            let mut sum = y[i];
            for idx in self.diagonal[i] + 1..offsets[i + 1] {
                sum -= values[idx] * y[cols[idx]];
            }
            y[i] = sum / values[self.diagonal[i]];
        }
    }
}

impl<T: Real> LinearOperator<T> for Ilu0<T> {
    fn apply(&self, mut y: DVectorViewMut<T>, x: DVectorView<T>) -> Result<(), Box<dyn Error>> {
        y.copy_from(&x);
        self.solve_in_place(&mut y);
        Ok(())
    }
}

/// Damped preconditioned Richardson iteration $x \leftarrow x + \omega P (b - A x)$.
#[derive(Debug, Clone)]
pub struct Richardson<P> {
    pub preconditioner: P,
    pub scale: f64,
}

impl<P> Richardson<P> {
    pub fn new(preconditioner: P, scale: f64) -> Self {
        Self { preconditioner, scale }
    }

    /// Performs `sweeps` iterations, updating `x` in place.
    pub fn smooth<T>(
        &self,
        operator: &dyn LinearOperator<T>,
        b: DVectorView<T>,
        x: &mut DVector<T>,
        sweeps: usize,
    ) -> Result<(), SolveErrorKind>
    where
        T: Real,
        P: LinearOperator<T>,
    {
        let omega: T = nalgebra::convert(self.scale);
        let mut r = DVector::zeros(x.len());
        let mut z = DVector::zeros(x.len());
        for _ in 0..sweeps {
            residual_into(&mut r, operator, DVectorView::from(&*x), b).map_err(SolveErrorKind::OperatorError)?;
            self.preconditioner
                .apply(DVectorViewMut::from(&mut z), DVectorView::from(&r))
                .map_err(SolveErrorKind::PreconditionerError)?;
            x.axpy(omega, &z, T::one());
        }
        Ok(())
    }
}

impl<P> Richardson<P> {
    /// Iterates until the residual satisfies `tolerance` or `max_iter` sweeps were taken.
    pub fn solve<T>(
        &self,
        operator: &dyn LinearOperator<T>,
        b: DVectorView<T>,
        x: &mut DVector<T>,
        tolerance: &ResidualTolerance<T>,
        max_iter: usize,
    ) -> Result<KrylovOutput<T>, SolveError<T>>
    where
        T: Real,
        P: LinearOperator<T>,
    {
        let b_norm = b.norm();
        let mut r = DVector::zeros(x.len());
        let mut output = KrylovOutput::new(0, T::zero(), T::zero());
        loop {
            if let Err(err) = residual_into(&mut r, operator, DVectorView::from(&*x), b) {
                return Err(SolveError::new(output, SolveErrorKind::OperatorError(err)));
            }
            let r_norm = r.norm();
            if output.num_iterations == 0 {
                output.initial_residual = r_norm;
            }
            output.final_residual = r_norm;
            match tolerance.has_converged(b_norm, output.num_iterations, r_norm) {
                Ok(true) => return Ok(output),
                Ok(false) => {}
                Err(kind) => return Err(SolveError::new(output, kind)),
            }
            if output.num_iterations >= max_iter {
                return Err(SolveError::new(output, SolveErrorKind::MaxIterationsReached { max_iter }));
            }
            if let Err(kind) = self.smooth(operator, b, x, 1) {
                return Err(SolveError::new(output, kind));
            }
            output.num_iterations += 1;
        }
    }
}
