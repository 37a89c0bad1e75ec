use femflow_sparse::lu::SparseLu;
use femflow_sparse::{LinearOperator, SolveErrorKind};
use nalgebra::{DMatrix, DVector};
use nalgebra_sparse::{CooMatrix, CsrMatrix};
use util::{assert_approx_matrix_eq, poisson_2d, relative_residual};

/// `[A B^T; B 0]` with the Poisson matrix `A` and `m` averaging constraints `B`.
fn saddle_point(n: usize, m: usize) -> CsrMatrix<f64> {
    let a = poisson_2d(n);
    let k = a.nrows();
    let mut coo = CooMatrix::new(k + m, k + m);
    for (i, j, &v) in a.triplet_iter() {
        coo.push(i, j, v);
    }
    for c in 0..m {
        for j in (c..k).step_by(m) {
            let b = 1.0 + 0.1 * j as f64;
            coo.push(k + c, j, b);
            coo.push(j, k + c, b);
        }
    }
    CsrMatrix::from(&coo)
}

#[test]
fn sparse_lu_inverts_poisson_matrix() {
    let a = poisson_2d(5);
    let lu = SparseLu::from_csr(&a).unwrap();
    assert_eq!(lu.dim(), a.nrows());

    let x_expected = DVector::from_fn(a.nrows(), |i, _| i as f64 - 3.0);
    let b = &a * &x_expected;
    let mut x = DVector::zeros(a.nrows());
    lu.apply((&mut x).into(), (&b).into()).unwrap();
    assert_approx_matrix_eq!(&x, &x_expected, abstol = 1e-12);
}

#[test]
fn sparse_lu_solves_system_with_zero_diagonal_block() {
    let a = saddle_point(6, 3);
    let n = a.nrows();
    let diagonal_is_zero = |row: usize| a.get_entry(row, row).map_or(true, |entry| entry.into_value() == 0.0);
    assert!((n - 3..n).all(diagonal_is_zero));

    let x_expected = DVector::from_fn(n, |i, _| (0.3 * i as f64).sin());
    let b = &a * &x_expected;
    let mut x = b.clone();
    SparseLu::from_csr(&a)
        .unwrap()
        .solve_in_place((&mut x).into())
        .unwrap();
    assert!(relative_residual(&a, &x, &b) < 1e-12);
    assert_approx_matrix_eq!(&x, &x_expected, abstol = 1e-10);
}

#[test]
fn sparse_lu_rejects_singular_matrix() {
    let a = DMatrix::from_row_slice(2, 2, &[1.0, 2.0, 2.0, 4.0]);
    let mut x = DVector::from_column_slice(&[1.0, 1.0]);
    let result = SparseLu::from_csr(&CsrMatrix::from(&a)).and_then(|lu| lu.solve_in_place((&mut x).into()));
    assert!(result.is_err());
}

#[test]
fn sparse_lu_rejects_rectangular_matrix() {
    let a = CsrMatrix::from(&DMatrix::<f64>::zeros(2, 3));
    let err = SparseLu::from_csr(&a).unwrap_err();
    assert!(matches!(err, SolveErrorKind::DimensionMismatch));
}
