//! Restarted flexible GMRES with right preconditioning.
//!
//! The preconditioned directions $z_j = P v_j$ are stored explicitly, so the preconditioner
//! may change between iterations (for example a multigrid cycle with a nonlinear smoother).
use crate::cg::ResidualTolerance;
use crate::operator::{residual_into, IdentityOperator, LinearOperator};
use crate::{KrylovOutput, SolveError, SolveErrorKind};
use femflow_traits::Real;
use log::trace;
use nalgebra::{DMatrix, DVector, DVectorView, DVectorViewMut};

#[derive(Debug, Clone)]
pub struct Gmres<T, A, P> {
    operator: A,
    preconditioner: P,
    restart: usize,
    tolerance: ResidualTolerance<T>,
    max_iter: Option<usize>,
}

impl<T: Real> Gmres<T, (), IdentityOperator> {
    pub fn new(restart: usize) -> Self {
        assert!(restart > 0, "GMRES restart length must be positive");
        Self {
            operator: (),
            preconditioner: IdentityOperator,
            restart,
            tolerance: ResidualTolerance::relative(nalgebra::convert(1e-8)),
            max_iter: None,
        }
    }
}

impl<T, P> Gmres<T, (), P> {
    pub fn with_operator<A>(self, operator: A) -> Gmres<T, A, P> {
        Gmres {
            operator,
            preconditioner: self.preconditioner,
            restart: self.restart,
            tolerance: self.tolerance,
            max_iter: self.max_iter,
        }
    }
}

impl<T, A, P> Gmres<T, A, P> {
    pub fn with_preconditioner<P2>(self, preconditioner: P2) -> Gmres<T, A, P2> {
        Gmres {
            operator: self.operator,
            preconditioner,
            restart: self.restart,
            tolerance: self.tolerance,
            max_iter: self.max_iter,
        }
    }

    pub fn with_tolerance(self, tolerance: ResidualTolerance<T>) -> Self {
        Self { tolerance, ..self }
    }

    pub fn with_max_iter(self, max_iter: usize) -> Self {
        Self {
            max_iter: Some(max_iter),
            ..self
        }
    }
}

/// Returns `(c, s, r)` with `[c s; -s c] [a; b] = [r; 0]`.
fn givens<T: Real>(a: T, b: T) -> (T, T, T) {
    if b == T::zero() {
        (T::one(), T::zero(), a)
    } else {
        let r = a.hypot(b);
        (a / r, b / r, r)
    }
}

impl<T, A, P> Gmres<T, A, P>
where
    T: Real,
    A: LinearOperator<T>,
    P: LinearOperator<T>,
{
    pub fn solve_with_guess<'b>(
        &self,
        b: impl Into<DVectorView<'b, T>>,
        x: impl Into<DVectorViewMut<'b, T>>,
    ) -> Result<KrylovOutput<T>, SolveError<T>> {
        self.solve_with_guess_(b.into(), x.into())
    }

    fn solve_with_guess_(&self, b: DVectorView<T>, mut x: DVectorViewMut<T>) -> Result<KrylovOutput<T>, SolveError<T>> {
        use SolveErrorKind::*;
        assert_eq!(b.len(), x.len());
        let n = x.len();
        let m = self.restart.min(n.max(1));

        let mut output = KrylovOutput::new(0, T::zero(), T::zero());
        let mut r = DVector::zeros(n);
        if let Err(err) = residual_into(&mut r, &self.operator, DVectorView::from(&x), b) {
            return Err(SolveError::new(output, OperatorError(err)));
        }
        let mut beta = r.norm();
        output.initial_residual = beta;
        output.final_residual = beta;

        let b_norm = b.norm();
        if b_norm == T::zero() {
            x.fill(T::zero());
            output.final_residual = T::zero();
            return Ok(output);
        }
        let threshold = self.tolerance.threshold(b_norm);

        let mut basis: Vec<DVector<T>> = Vec::with_capacity(m + 1);
        let mut directions: Vec<DVector<T>> = Vec::with_capacity(m);
        let mut h = DMatrix::zeros(m + 1, m);
        let mut g = DVector::zeros(m + 1);
        let mut rotations = Vec::with_capacity(m);
        let mut w = DVector::zeros(n);

        while beta > threshold {
            if let Some(max_iter) = self.max_iter {
                if output.num_iterations >= max_iter {
                    return Err(SolveError::new(output, MaxIterationsReached { max_iter }));
                }
            }

            basis.clear();
            directions.clear();
            rotations.clear();
            h.fill(T::zero());
            g.fill(T::zero());
            g[0] = beta;
            basis.push(r.unscale(beta));

            let mut k = 0;
            while k < m {
                let mut z = DVector::zeros(n);
                if let Err(err) = self
                    .preconditioner
                    .apply(DVectorViewMut::from(&mut z), DVectorView::from(&basis[k]))
                {
                    return Err(SolveError::new(output, PreconditionerError(err)));
                }
                if let Err(err) = self
                    .operator
                    .apply(DVectorViewMut::from(&mut w), DVectorView::from(&z))
                {
                    return Err(SolveError::new(output, OperatorError(err)));
                }
                directions.push(z);

                // Modified Gram-Schmidt
                for (i, v_i) in basis.iter().enumerate() {
                    let h_ik = w.dot(v_i);
                    h[(i, k)] = h_ik;
                    w.axpy(-h_ik, v_i, T::one());
                }
                let h_next = w.norm();
                h[(k + 1, k)] = h_next;

                for (i, &(c, s)) in rotations.iter().enumerate() {
                    let (a, b) = (h[(i, k)], h[(i + 1, k)]);
                    h[(i, k)] = c * a + s * b;
                    h[(i + 1, k)] = c * b - s * a;
                }
                let (c, s, diag) = givens(h[(k, k)], h[(k + 1, k)]);
                rotations.push((c, s));
                h[(k, k)] = diag;
                h[(k + 1, k)] = T::zero();
                g[k + 1] = -s * g[k];
                g[k] = c * g[k];

                k += 1;
                output.num_iterations += 1;
                let estimate = g[k].abs();
                trace!("GMRES iteration {}: residual estimate {}", output.num_iterations, estimate);

                let max_reached = self.max_iter == Some(output.num_iterations);
                if estimate <= threshold || h_next == T::zero() || max_reached {
                    break;
                }
                basis.push(w.unscale(h_next));
            }

            // Back substitution with the triangular part of the Hessenberg matrix
            let mut y = DVector::zeros(k);
            for i in (0..k).rev() {
                let mut sum = g[i];
                for j in i + 1..k {
                    sum -= h[(i, j)] * y[j];
                }
                if h[(i, i)] == T::zero() {
                    return Err(SolveError::new(output, SingularMatrix));
                }
                y[i] = sum / h[(i, i)];
            }
            for (y_i, z_i) in y.iter().zip(&directions) {
                x.axpy(*y_i, z_i, T::one());
            }

            if let Err(err) = residual_into(&mut r, &self.operator, DVectorView::from(&x), b) {
                return Err(SolveError::new(output, OperatorError(err)));
            }
            beta = r.norm();
            output.final_residual = beta;
        }

        Ok(output)
    }
}
