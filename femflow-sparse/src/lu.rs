use crate::operator::LinearOperator;
use crate::SolveErrorKind;
use faer::solvers::SpSolver;
use faer::sparse::{SparseColMat, SymbolicSparseColMat};
use nalgebra::{DVectorView, DVectorViewMut};
use nalgebra_sparse::{CscMatrix, CsrMatrix};
use std::error::Error;

type FaerMatrix = SparseColMat<usize, f64>;

fn csr_to_faer(matrix: &CsrMatrix<f64>) -> FaerMatrix {
    let (nrows, ncols) = (matrix.nrows(), matrix.ncols());
    let (col_offsets, row_indices, values) = CscMatrix::from(matrix).disassemble();
    let symbolic = SymbolicSparseColMat::new_checked(nrows, ncols, col_offsets, None, row_indices);
    SparseColMat::new(symbolic, values)
}

/// Sparse direct solver based on faer's supernodal LU factorization with partial pivoting.
///
/// Handles indefinite saddle point systems, whose zero diagonal blocks break incomplete
/// factorizations and point smoothers.
pub struct SparseLu {
    lu: faer::sparse::linalg::solvers::Lu<usize, f64>,
    dim: usize,
}

impl std::fmt::Debug for SparseLu {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SparseLu").field("dim", &self.dim).finish()
    }
}

impl SparseLu {
    pub fn from_csr(matrix: &CsrMatrix<f64>) -> Result<Self, SolveErrorKind> {
        if matrix.nrows() != matrix.ncols() {
            return Err(SolveErrorKind::DimensionMismatch);
        }
        let dim = matrix.nrows();
        let lu = csr_to_faer(matrix)
            .sp_lu()
            .map_err(|err| SolveErrorKind::FactorizationError(format!("{:?}", err)))?;
        Ok(Self { lu, dim })
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn solve_in_place(&self, mut x: DVectorViewMut<f64>) -> Result<(), SolveErrorKind> {
        if x.len() != self.dim {
            return Err(SolveErrorKind::DimensionMismatch);
        }
        let rhs = faer::col::from_slice(x.as_slice());
        let solution = self.lu.solve(rhs);
        // Zero pivots show up as non-finite entries
        if solution.as_slice().iter().any(|v| !v.is_finite()) {
            return Err(SolveErrorKind::SingularMatrix);
        }
        x.as_mut_slice().copy_from_slice(solution.as_slice());
        Ok(())
    }
}

impl LinearOperator<f64> for SparseLu {
    fn apply(&self, mut y: DVectorViewMut<f64>, x: DVectorView<f64>) -> Result<(), Box<dyn Error>> {
        y.copy_from(&x);
        self.solve_in_place(y)?;
        Ok(())
    }
}
