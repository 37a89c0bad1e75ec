//! Gauss rules on the reference cells.
//!
//! One-dimensional rules are computed with the Golub-Welsch algorithm, i.e. as eigenvalues
//! and eigenvectors of the symmetric tridiagonal Jacobi matrix of the orthogonal polynomials.
use crate::element::CellKind;
use nalgebra::{DMatrix, Point2, SymmetricEigen};
use std::ops::{AddAssign, Mul};

/// Weights and points of a rule.
pub type QuadraturePair<P> = (Vec<f64>, Vec<P>);

pub trait Quadrature {
    type Point;

    fn weights(&self) -> &[f64];
    fn points(&self) -> &[Self::Point];

    /// Approximates the integral of the given function using this quadrature rule.
    fn integrate<U, Function>(&self, f: Function) -> U
    where
        Function: Fn(&Self::Point) -> U,
        U: num::Zero + Mul<f64, Output = U> + AddAssign<U>,
    {
        let mut integral = U::zero();
        for (w, p) in self.weights().iter().zip(self.points()) {
            integral += f(p) * *w;
        }
        integral
    }
}

impl<P> Quadrature for QuadraturePair<P> {
    type Point = P;

    fn weights(&self) -> &[f64] {
        &self.0
    }

    fn points(&self) -> &[P] {
        &self.1
    }
}

/// A rule on a two-dimensional reference cell. Rules on segments store `η = 0`.
#[derive(Debug, Clone, PartialEq)]
pub struct QuadratureRule {
    pub weights: Vec<f64>,
    pub points: Vec<Point2<f64>>,
}

impl Quadrature for QuadratureRule {
    type Point = Point2<f64>;

    fn weights(&self) -> &[f64] {
        &self.weights
    }

    fn points(&self) -> &[Point2<f64>] {
        &self.points
    }
}

/// Nodes and weights of a Gauss rule from the off-diagonal of its Jacobi matrix.
///
/// `mu0` is the total mass of the weight function.
fn golub_welsch(off_diagonal: impl Fn(usize) -> f64, n: usize, mu0: f64) -> QuadraturePair<f64> {
    let mut jacobi = DMatrix::zeros(n, n);
    for k in 1..n {
        let beta = off_diagonal(k);
        jacobi[(k - 1, k)] = beta;
        jacobi[(k, k - 1)] = beta;
    }
    let eigen = SymmetricEigen::new(jacobi);
    let mut pairs: Vec<(f64, f64)> = (0..n)
        .map(|i| {
            let v0 = eigen.eigenvectors[(0, i)];
            (eigen.eigenvalues[i], mu0 * v0 * v0)
        })
        .collect();
    pairs.sort_by(|a, b| a.0.total_cmp(&b.0));
    let (points, weights) = pairs.into_iter().unzip();
    (weights, points)
}

/// Gauss-Legendre rule with `n` points on `[-1, 1]`, exact for polynomials of degree `2n - 1`.
pub fn gauss_legendre(n: usize) -> QuadraturePair<f64> {
    assert!(n > 0, "Gauss rules need at least one point");
    golub_welsch(|k| {
        let k = k as f64;
        k / (4.0 * k * k - 1.0).sqrt()
    }, n, 2.0)
}

/// Gauss-Hermite rule for the standard normal density.
///
/// The weights sum to one, so that the rule approximates expectations $E[f(\xi)]$ for
/// $\xi \sim N(0, 1)$.
pub fn gauss_hermite(n: usize) -> QuadraturePair<f64> {
    assert!(n > 0, "Gauss rules need at least one point");
    golub_welsch(|k| (k as f64).sqrt(), n, 1.0)
}

/// Number of Gauss points needed to integrate polynomials of the given degree.
fn points_for_degree(degree: usize) -> usize {
    degree / 2 + 1
}

/// Rule on the reference segment `[-1, 1]`.
pub fn segment(order: usize) -> QuadratureRule {
    let (weights, points) = gauss_legendre(points_for_degree(order));
    QuadratureRule {
        weights,
        points: points.into_iter().map(|x| Point2::new(x, 0.0)).collect(),
    }
}

/// Tensor product rule on the reference quadrilateral `[-1, 1]^2`.
pub fn quadrilateral(order: usize) -> QuadratureRule {
    let (w1d, x1d) = gauss_legendre(points_for_degree(order));
    let mut rule = QuadratureRule {
        weights: Vec::with_capacity(w1d.len() * w1d.len()),
        points: Vec::with_capacity(w1d.len() * w1d.len()),
    };
    for (wj, yj) in w1d.iter().zip(&x1d) {
        for (wi, xi) in w1d.iter().zip(&x1d) {
            rule.weights.push(wi * wj);
            rule.points.push(Point2::new(*xi, *yj));
        }
    }
    rule
}

/// Collapsed (Duffy) tensor rule on the unit triangle.
///
/// The square `[0, 1]^2` is mapped by $(u, v) \mapsto (u, v (1 - u))$, whose Jacobian
/// determinant $1 - u$ raises the polynomial degree in `u` by one.
pub fn triangle(order: usize) -> QuadratureRule {
    let (w1d, x1d) = gauss_legendre(points_for_degree(order + 1));
    let unit: Vec<(f64, f64)> = w1d.iter().zip(&x1d).map(|(w, x)| (0.5 * w, 0.5 * (x + 1.0))).collect();
    let mut rule = QuadratureRule {
        weights: Vec::with_capacity(unit.len() * unit.len()),
        points: Vec::with_capacity(unit.len() * unit.len()),
    };
    for &(wu, u) in &unit {
        for &(wv, v) in &unit {
            rule.weights.push(wu * wv * (1.0 - u));
            rule.points.push(Point2::new(u, v * (1.0 - u)));
        }
    }
    rule
}

/// Rule for the given reference cell.
pub fn rule_for_cell(kind: CellKind, order: usize) -> QuadratureRule {
    match kind {
        CellKind::Segment => segment(order),
        CellKind::Triangle => triangle(order),
        CellKind::Quadrilateral => quadrilateral(order),
    }
}

/// Polynomial degree of a named rule, such as `"fifth"` or `"seventh"`.
pub fn order_from_name(name: &str) -> Option<usize> {
    let order = match name {
        "zero" => 0,
        "first" => 1,
        "second" => 2,
        "third" => 3,
        "fourth" => 4,
        "fifth" => 5,
        "sixth" => 6,
        "seventh" => 7,
        "eighth" => 8,
        "ninth" => 9,
        _ => return None,
    };
    Some(order)
}
