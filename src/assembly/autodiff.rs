use crate::assembly::{ElementData, ElementResidual};
use nalgebra::{DMatrix, DVector, Dyn, U1};
use num_dual::{Derivative, DualDVec64, DualNum, DualVec};
use std::ops::{Add, Div, Mul, Sub};

/// Scalar type that element residuals are generic over.
///
/// Implemented by `f64` for plain residual evaluation and by [`DualDVec64`] for Jacobians.
/// Mixed arithmetic is only available with the `f64` on the right-hand side.
pub trait AdScalar:
    DualNum<f64>
    + Send
    + Sync
    + Add<f64, Output = Self>
    + Sub<f64, Output = Self>
    + Mul<f64, Output = Self>
    + Div<f64, Output = Self>
{
    /// The value without derivative information.
    fn value(&self) -> f64 {
        self.re()
    }
}

impl<T> AdScalar for T where
    T: DualNum<f64>
        + Send
        + Sync
        + Add<f64, Output = T>
        + Sub<f64, Output = T>
        + Mul<f64, Output = T>
        + Div<f64, Output = T>
{
}

/// Seeds local unknowns with unit derivative directions.
pub fn seed_dual(x: &[f64]) -> Vec<DualDVec64> {
    let n = x.len();
    x.iter()
        .enumerate()
        .map(|(i, &x_i)| {
            let direction = DVector::from_fn(n, |j, _| if i == j { 1.0 } else { 0.0 });
            DualVec::new(x_i, Derivative::some(direction))
        })
        .collect()
}

/// Evaluates the local residual and its dense Jacobian with respect to the local unknowns.
pub fn element_jacobian<R>(residual: &R, element: &ElementData, x: &[f64]) -> (DVector<f64>, DMatrix<f64>)
where
    R: ElementResidual + ?Sized,
{
    let n = x.len();
    let unknowns = seed_dual(x);
    let mut local = vec![DualDVec64::from(0.0); n];
    residual.residual(element, &unknowns, &mut local);

    let mut f = DVector::zeros(n);
    let mut jacobian = DMatrix::zeros(n, n);
    for (i, r) in local.into_iter().enumerate() {
        f[i] = r.re;
        let gradient = r.eps.unwrap_generic(Dyn(n), U1);
        jacobian.row_mut(i).tr_copy_from(&gradient);
    }
    (f, jacobian)
}

/// Evaluates the local residual without derivatives.
pub fn element_residual<R>(residual: &R, element: &ElementData, x: &[f64]) -> DVector<f64>
where
    R: ElementResidual + ?Sized,
{
    let mut local = vec![0.0; x.len()];
    residual.residual(element, x, &mut local);
    DVector::from_vec(local)
}
