use femflow_sparse::cg::{ConjugateGradient, ResidualTolerance};
use femflow_sparse::preconditioner::Jacobi;
use femflow_sparse::SolveErrorKind;
use nalgebra::{DMatrix, DVector};
use util::{poisson_2d, relative_residual};

#[test]
fn cg_solves_poisson_matrix() {
    let a = poisson_2d(16);
    let b = DVector::from_fn(a.nrows(), |i, _| 1.0 + (i % 7) as f64);
    let mut x = DVector::zeros(a.nrows());

    let output = ConjugateGradient::new()
        .with_operator(&a)
        .with_stopping_criterion(ResidualTolerance::relative(1e-10))
        .solve_with_guess(&b, &mut x)
        .unwrap();

    assert!(output.num_iterations > 0);
    assert!(output.final_residual <= 1e-10 * b.norm());
    assert!(relative_residual(&a, &x, &b) < 1e-8);
}

#[test]
fn jacobi_preconditioned_cg_solves_poisson_matrix() {
    let a = poisson_2d(12);
    let b = DVector::repeat(a.nrows(), 1.0);
    let mut x = DVector::zeros(a.nrows());
    let jacobi = Jacobi::from_csr(&a).unwrap();

    ConjugateGradient::new()
        .with_operator(&a)
        .with_preconditioner(&jacobi)
        .with_stopping_criterion(ResidualTolerance::relative(1e-10))
        .solve_with_guess(&b, &mut x)
        .unwrap();

    assert!(relative_residual(&a, &x, &b) < 1e-8);
}

#[test]
fn cg_zero_rhs_gives_zero_solution() {
    let a = poisson_2d(6);
    let b = DVector::zeros(a.nrows());
    let mut x = DVector::repeat(a.nrows(), 3.0);
    ConjugateGradient::new()
        .with_operator(&a)
        .with_stopping_criterion(ResidualTolerance::default())
        .solve_with_guess(&b, &mut x)
        .unwrap();
    assert_eq!(x, DVector::zeros(a.nrows()));
}

#[test]
fn cg_detects_indefinite_operator() {
    let a = DMatrix::from_diagonal(&DVector::from_vec(vec![1.0, -2.0, 3.0]));
    let b = DVector::from_vec(vec![0.0, 1.0, 0.0]);
    let mut x = DVector::zeros(3);
    let err = ConjugateGradient::new()
        .with_operator(&a)
        .with_stopping_criterion(ResidualTolerance::default())
        .solve_with_guess(&b, &mut x)
        .unwrap_err();
    assert!(matches!(err.kind, SolveErrorKind::IndefiniteOperator));
}

#[test]
fn cg_reports_max_iterations() {
    let a = poisson_2d(16);
    let b = DVector::repeat(a.nrows(), 1.0);
    let mut x = DVector::zeros(a.nrows());
    let err = ConjugateGradient::new()
        .with_operator(&a)
        .with_stopping_criterion(ResidualTolerance::relative(1e-12))
        .with_max_iter(2)
        .solve_with_guess(&b, &mut x)
        .unwrap_err();
    assert!(matches!(err.kind, SolveErrorKind::MaxIterationsReached { max_iter: 2 }));
    assert_eq!(err.output.num_iterations, 2);
}
