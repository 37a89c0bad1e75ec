//! Preconditioned conjugate gradient for symmetric positive definite operators.
use crate::operator::{residual_into, IdentityOperator, LinearOperator};
use crate::{KrylovOutput, SolveError, SolveErrorKind};
use femflow_traits::Real;
use nalgebra::{DVector, DVectorView, DVectorViewMut, Scalar};
use std::ops::{Deref, DerefMut};

pub trait StoppingCriterion<T: Scalar> {
    fn has_converged(&self, b_norm: T, iteration: usize, residual_norm: T) -> Result<bool, SolveErrorKind>;
}

/// Stops once `||r|| <= max(relative * ||b||, absolute)`.
///
/// Krylov methods only track an approximate (recursively updated) residual, so for
/// ill-conditioned problems the true residual may stagnate above the tolerance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResidualTolerance<T> {
    pub relative: T,
    pub absolute: T,
}

impl<T: Real> ResidualTolerance<T> {
    pub fn relative(tol: T) -> Self {
        Self {
            relative: tol,
            absolute: T::zero(),
        }
    }

    pub fn with_absolute(self, absolute: T) -> Self {
        Self { absolute, ..self }
    }

    pub fn threshold(&self, b_norm: T) -> T {
        (self.relative * b_norm).max(self.absolute)
    }
}

impl Default for ResidualTolerance<f64> {
    fn default() -> Self {
        Self::relative(1e-8)
    }
}

impl<T: Real> StoppingCriterion<T> for ResidualTolerance<T> {
    fn has_converged(&self, b_norm: T, _iteration: usize, residual_norm: T) -> Result<bool, SolveErrorKind> {
        Ok(residual_norm <= self.threshold(b_norm))
    }
}

#[derive(Debug, Clone)]
#[allow(non_snake_case)]
pub struct CgWorkspace<T: Scalar> {
    r: DVector<T>,
    z: DVector<T>,
    p: DVector<T>,
    Ap: DVector<T>,
}

#[allow(non_snake_case)]
struct Buffers<'a, T: Scalar> {
    r: &'a mut DVector<T>,
    z: &'a mut DVector<T>,
    p: &'a mut DVector<T>,
    Ap: &'a mut DVector<T>,
}

impl<T: Real> Default for CgWorkspace<T> {
    fn default() -> Self {
        Self {
            r: DVector::zeros(0),
            z: DVector::zeros(0),
            p: DVector::zeros(0),
            Ap: DVector::zeros(0),
        }
    }
}

impl<T: Real> CgWorkspace<T> {
    fn prepare_buffers(&mut self, dim: usize) -> Buffers<T> {
        for buffer in [&mut self.r, &mut self.z, &mut self.p, &mut self.Ap] {
            buffer.resize_vertically_mut(dim, T::zero());
        }
        Buffers {
            r: &mut self.r,
            z: &mut self.z,
            p: &mut self.p,
            Ap: &mut self.Ap,
        }
    }
}

#[derive(Debug)]
pub(crate) enum OwnedOrMutRef<'a, T> {
    Owned(T),
    MutRef(&'a mut T),
}

impl<'a, T> Deref for OwnedOrMutRef<'a, T> {
    type Target = T;

    fn deref(&self) -> &T {
        match self {
            Self::Owned(owned) => owned,
            Self::MutRef(mutref) => mutref,
        }
    }
}

impl<'a, T> DerefMut for OwnedOrMutRef<'a, T> {
    fn deref_mut(&mut self) -> &mut T {
        match self {
            Self::Owned(owned) => owned,
            Self::MutRef(mutref) => mutref,
        }
    }
}

#[derive(Debug)]
pub struct ConjugateGradient<'a, T, A, P, Criterion>
where
    T: Scalar,
{
    workspace: OwnedOrMutRef<'a, CgWorkspace<T>>,
    operator: A,
    preconditioner: P,
    stopping_criterion: Criterion,
    max_iter: Option<usize>,
}

impl<'a, T: Real> ConjugateGradient<'a, T, (), IdentityOperator, ()> {
    pub fn new() -> Self {
        Self {
            workspace: OwnedOrMutRef::Owned(CgWorkspace::default()),
            operator: (),
            preconditioner: IdentityOperator,
            stopping_criterion: (),
            max_iter: None,
        }
    }

    pub fn with_workspace(workspace: &'a mut CgWorkspace<T>) -> Self {
        Self {
            workspace: OwnedOrMutRef::MutRef(workspace),
            operator: (),
            preconditioner: IdentityOperator,
            stopping_criterion: (),
            max_iter: None,
        }
    }
}

impl<'a, T: Scalar, P, Criterion> ConjugateGradient<'a, T, (), P, Criterion> {
    pub fn with_operator<A>(self, operator: A) -> ConjugateGradient<'a, T, A, P, Criterion> {
        ConjugateGradient {
            workspace: self.workspace,
            operator,
            preconditioner: self.preconditioner,
            stopping_criterion: self.stopping_criterion,
            max_iter: self.max_iter,
        }
    }
}

impl<'a, T: Scalar, A, P, Criterion> ConjugateGradient<'a, T, A, P, Criterion> {
    pub fn with_preconditioner<P2>(self, preconditioner: P2) -> ConjugateGradient<'a, T, A, P2, Criterion> {
        ConjugateGradient {
            workspace: self.workspace,
            operator: self.operator,
            preconditioner,
            stopping_criterion: self.stopping_criterion,
            max_iter: self.max_iter,
        }
    }

    pub fn with_max_iter(self, max_iter: usize) -> Self {
        Self {
            max_iter: Some(max_iter),
            ..self
        }
    }
}

impl<'a, T: Scalar, A, P> ConjugateGradient<'a, T, A, P, ()> {
    pub fn with_stopping_criterion<Criterion>(
        self,
        stopping_criterion: Criterion,
    ) -> ConjugateGradient<'a, T, A, P, Criterion> {
        ConjugateGradient {
            workspace: self.workspace,
            operator: self.operator,
            preconditioner: self.preconditioner,
            stopping_criterion,
            max_iter: self.max_iter,
        }
    }
}

impl<'a, T, A, P, Criterion> ConjugateGradient<'a, T, A, P, Criterion>
where
    T: Real,
    A: LinearOperator<T>,
    P: LinearOperator<T>,
    Criterion: StoppingCriterion<T>,
{
    pub fn solve_with_guess<'b>(
        &mut self,
        b: impl Into<DVectorView<'b, T>>,
        x: impl Into<DVectorViewMut<'b, T>>,
    ) -> Result<KrylovOutput<T>, SolveError<T>> {
        self.solve_with_guess_(b.into(), x.into())
    }

    #[allow(non_snake_case)]
    fn solve_with_guess_(&mut self, b: DVectorView<T>, mut x: DVectorViewMut<T>) -> Result<KrylovOutput<T>, SolveError<T>> {
        use SolveErrorKind::*;
        assert_eq!(b.len(), x.len());

        let mut output = KrylovOutput::new(0, T::zero(), T::zero());
        let Buffers { r, z, p, Ap } = self.workspace.prepare_buffers(x.len());

        if let Err(err) = residual_into(&mut *r, &self.operator, DVectorView::from(&x), b) {
            return Err(SolveError::new(output, OperatorError(err)));
        }
        output.initial_residual = r.norm();
        output.final_residual = output.initial_residual;

        let b_norm = b.norm();
        if b_norm == T::zero() {
            x.fill(T::zero());
            output.final_residual = T::zero();
            return Ok(output);
        }

        if let Err(err) = self.preconditioner.apply(DVectorViewMut::from(&mut *z), DVectorView::from(&*r)) {
            return Err(SolveError::new(output, PreconditionerError(err)));
        }
        p.copy_from(&*z);
        let mut zTr = z.dot(&*r);

        loop {
            match self
                .stopping_criterion
                .has_converged(b_norm, output.num_iterations, output.final_residual)
            {
                Ok(true) => break,
                Ok(false) => {}
                Err(kind) => return Err(SolveError::new(output, kind)),
            }
            if let Some(max_iter) = self.max_iter {
                if output.num_iterations >= max_iter {
                    return Err(SolveError::new(output, MaxIterationsReached { max_iter }));
                }
            }

            if let Err(err) = self.operator.apply(DVectorViewMut::from(&mut *Ap), DVectorView::from(&*p)) {
                return Err(SolveError::new(output, OperatorError(err)));
            }
            let pAp = p.dot(&*Ap);
            if pAp <= T::zero() {
                return Err(SolveError::new(output, IndefiniteOperator));
            }
            if zTr <= T::zero() {
                return Err(SolveError::new(output, IndefinitePreconditioner));
            }

            let alpha = zTr / pAp;
            x.axpy(alpha, &*p, T::one());
            r.axpy(-alpha, &*Ap, T::one());
            output.num_iterations += 1;
            output.final_residual = r.norm();

            if let Err(err) = self.preconditioner.apply(DVectorViewMut::from(&mut *z), DVectorView::from(&*r)) {
                return Err(SolveError::new(output, PreconditionerError(err)));
            }
            let zTr_next = z.dot(&*r);
            let beta = zTr_next / zTr;
            // p <- z + beta p
            p.axpy(T::one(), &*z, beta);
            zTr = zTr_next;
        }

        Ok(output)
    }
}
