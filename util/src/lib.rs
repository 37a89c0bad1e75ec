//! Assertions and matrix fixtures shared by the test suites of the workspace.
use nalgebra::DVector;
use nalgebra_sparse::{CooMatrix, CsrMatrix};

/// Poor man's approx assertion for matrices
#[macro_export]
macro_rules! assert_approx_matrix_eq {
    ($x:expr, $y:expr, abstol = $tol:expr) => {{
        let diff = $x - $y;

        let max_absdiff = diff.abs().max();
        let approx_eq = max_absdiff <= $tol;

        if !approx_eq {
            println!("abstol: {:e}", $tol);
            println!("left: {}", $x);
            println!("right: {}", $y);
            println!("diff: {:e}", diff);
        }
        assert!(approx_eq);
    }};
}

/// Scalar counterpart of [`assert_approx_matrix_eq`].
#[macro_export]
macro_rules! assert_scalar_eq {
    ($x:expr, $y:expr, abstol = $tol:expr) => {{
        let (x, y): (f64, f64) = ($x, $y);
        if !((x - y).abs() <= $tol) {
            panic!("assert_scalar_eq failed: left = {:e}, right = {:e}, abstol = {:e}", x, y, $tol);
        }
    }};
}

#[macro_export]
macro_rules! assert_panics {
    ($e:expr) => {{
        use std::panic::catch_unwind;
        use std::stringify;
        let expr_string = stringify!($e);
        let result = catch_unwind(|| $e);
        if result.is_ok() {
            panic!("assert_panics!({}) failed.", expr_string);
        }
    }};
}

/// Five-point finite difference Laplacian on the interior nodes of an `(n + 1) x (n + 1)`
/// grid of the unit square, scaled by `h^2`.
pub fn poisson_2d(n: usize) -> CsrMatrix<f64> {
    let m = n - 1;
    let index = |i: usize, j: usize| j * m + i;
    let mut coo = CooMatrix::new(m * m, m * m);
    for j in 0..m {
        for i in 0..m {
            let row = index(i, j);
            coo.push(row, row, 4.0);
            if i > 0 {
                coo.push(row, index(i - 1, j), -1.0);
            }
            if i + 1 < m {
                coo.push(row, index(i + 1, j), -1.0);
            }
            if j > 0 {
                coo.push(row, index(i, j - 1), -1.0);
            }
            if j + 1 < m {
                coo.push(row, index(i, j + 1), -1.0);
            }
        }
    }
    CsrMatrix::from(&coo)
}

/// Bilinear interpolation from the interior nodes of the `n/2` grid to those of the `n` grid
/// used by [`poisson_2d`].
pub fn bilinear_prolongation_2d(n: usize) -> CsrMatrix<f64> {
    assert!(n % 2 == 0 && n >= 4);
    let m_fine = n - 1;
    let m_coarse = n / 2 - 1;
    // 1D weights: fine node i (1-based on the full grid) gets contributions from coarse nodes
    let weights_1d = |i: usize| -> Vec<(usize, f64)> {
        let fine = i + 1;
        if fine % 2 == 0 {
            vec![(fine / 2 - 1, 1.0)]
        } else {
            [(fine - 1) / 2, (fine + 1) / 2]
                .into_iter()
                .filter(|&c| c >= 1 && c <= m_coarse)
                .map(|c| (c - 1, 0.5))
                .collect()
        }
    };
    let mut coo = CooMatrix::new(m_fine * m_fine, m_coarse * m_coarse);
    for j in 0..m_fine {
        for i in 0..m_fine {
            for &(ci, wi) in &weights_1d(i) {
                for &(cj, wj) in &weights_1d(j) {
                    coo.push(j * m_fine + i, cj * m_coarse + ci, wi * wj);
                }
            }
        }
    }
    CsrMatrix::from(&coo)
}

pub fn relative_residual(matrix: &CsrMatrix<f64>, x: &DVector<f64>, b: &DVector<f64>) -> f64 {
    let ax: DVector<f64> = matrix * x;
    (b - ax).norm() / b.norm()
}
