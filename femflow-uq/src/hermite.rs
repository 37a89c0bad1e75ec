//! Hermite polynomials orthonormal with respect to the standard normal density.
use femflow::quadrature::gauss_hermite;
use std::f64::consts::PI;

/// Values of the normalized probabilists' Hermite polynomials $He_n(t) / \sqrt{n!}$ for
/// `n = 0..=max_order`.
pub fn hermite_polynomials(max_order: usize, t: f64) -> Vec<f64> {
    let mut values = Vec::with_capacity(max_order + 1);
    values.push(1.0);
    if max_order > 0 {
        values.push(t);
    }
    for n in 1..max_order {
        let n_f = n as f64;
        let next = (t * values[n] - n_f.sqrt() * values[n - 1]) / (n_f + 1.0).sqrt();
        values.push(next);
    }
    values
}

/// The probabilists' Hermite polynomial $He_n(t)$ without normalization.
pub fn probabilists_hermite(n: usize, t: f64) -> f64 {
    let (mut previous, mut current) = (0.0, 1.0);
    for k in 0..n {
        let next = t * current - k as f64 * previous;
        previous = current;
        current = next;
    }
    current
}

/// Normalized Hermite polynomials evaluated at the nodes of a Gauss-Hermite rule.
#[derive(Debug, Clone, PartialEq)]
pub struct HermiteTable {
    pub weights: Vec<f64>,
    pub points: Vec<f64>,
    /// `values[n][k]` is the polynomial of order `n` at node `k`.
    pub values: Vec<Vec<f64>>,
}

/// Tabulates the normalized Hermite polynomials up to `max_order` at the nodes of the
/// `num_points`-point Gauss-Hermite rule.
pub fn evaluate_hermite_poly(num_points: usize, max_order: usize) -> HermiteTable {
    let (weights, points) = gauss_hermite(num_points);
    let values = evaluate_hermite_poly_histogram(max_order, &points);
    HermiteTable {
        weights,
        points,
        values,
    }
}

/// Normalized Hermite polynomials up to `max_order` at arbitrary samples, indexed as
/// `values[n][k]` for sample `k`.
pub fn evaluate_hermite_poly_histogram(max_order: usize, samples: &[f64]) -> Vec<Vec<f64>> {
    let mut values = vec![Vec::with_capacity(samples.len()); max_order + 1];
    for &t in samples {
        for (n, h) in hermite_polynomials(max_order, t).into_iter().enumerate() {
            values[n].push(h);
        }
    }
    values
}

/// The standard normal density.
pub fn gaussian(t: f64) -> f64 {
    (-0.5 * t * t).exp() / (2.0 * PI).sqrt()
}

/// The `n`-th derivative of the standard normal density, $(-1)^n He_n(t) \phi(t)$.
pub fn hermite_function_derivative(n: usize, t: f64) -> f64 {
    let sign = if n % 2 == 0 { 1.0 } else { -1.0 };
    sign * probabilists_hermite(n, t) * gaussian(t)
}
