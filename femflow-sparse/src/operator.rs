use femflow_traits::Real;
use nalgebra::{DVectorView, DVectorViewMut, Dim, Dyn, Matrix, Scalar, U1};
use nalgebra::constraint::{AreMultipliable, DimEq, ShapeConstraint};
use nalgebra::storage::Storage;
use nalgebra_sparse::CsrMatrix;
use rayon::prelude::*;
use std::error::Error;

/// An operator $y = A x$ acting on dynamic vectors.
///
/// Preconditioners implement this trait as well, in which case `apply` computes $y = P x$
/// for an approximate inverse $P \approx A^{-1}$.
pub trait LinearOperator<T: Scalar> {
    fn apply(&self, y: DVectorViewMut<T>, x: DVectorView<T>) -> Result<(), Box<dyn Error>>;
}

impl<'a, T, A> LinearOperator<T> for &'a A
where
    T: Scalar,
    A: ?Sized + LinearOperator<T>,
{
    fn apply(&self, y: DVectorViewMut<T>, x: DVectorView<T>) -> Result<(), Box<dyn Error>> {
        <A as LinearOperator<T>>::apply(self, y, x)
    }
}

impl<T, R, C, S> LinearOperator<T> for Matrix<T, R, C, S>
where
    T: Real,
    R: Dim,
    C: Dim,
    S: Storage<T, R, C>,
    ShapeConstraint: DimEq<Dyn, R> + DimEq<C, Dyn> + AreMultipliable<R, C, Dyn, U1>,
{
    fn apply(&self, mut y: DVectorViewMut<T>, x: DVectorView<T>) -> Result<(), Box<dyn Error>> {
        y.gemv(T::one(), self, &x, T::zero());
        Ok(())
    }
}

impl<T: Real> LinearOperator<T> for CsrMatrix<T> {
    fn apply(&self, mut y: DVectorViewMut<T>, x: DVectorView<T>) -> Result<(), Box<dyn Error>> {
        if self.nrows() != y.len() || self.ncols() != x.len() {
            return Err(Box::new(crate::SolveErrorKind::DimensionMismatch));
        }
        let offsets = self.row_offsets();
        let (cols, values) = (self.col_indices(), self.values());
        y.as_mut_slice()
            .par_iter_mut()
            .enumerate()
            .for_each(|(i, y_i)| {
                let range = offsets[i]..offsets[i + 1];
                *y_i = cols[range.clone()]
                    .iter()
                    .zip(&values[range])
                    .fold(T::zero(), |sum, (&j, &a_ij)| sum + a_ij * x[j]);
            });
        Ok(())
    }
}

pub struct IdentityOperator;

impl<T: Scalar> LinearOperator<T> for IdentityOperator {
    fn apply(&self, mut y: DVectorViewMut<T>, x: DVectorView<T>) -> Result<(), Box<dyn Error>> {
        y.copy_from(&x);
        Ok(())
    }
}

/// Computes the residual `r = b - A x`.
pub fn residual_into<T: Real>(
    r: &mut nalgebra::DVector<T>,
    a: &dyn LinearOperator<T>,
    x: DVectorView<T>,
    b: DVectorView<T>,
) -> Result<(), Box<dyn Error>> {
    a.apply(DVectorViewMut::from(&mut *r), x)?;
    r.zip_apply(&b, |ax_i, b_i| *ax_i = b_i - *ax_i);
    Ok(())
}
