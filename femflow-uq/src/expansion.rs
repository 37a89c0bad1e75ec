//! Series approximations of a density around the standard normal distribution.
use crate::hermite::{gaussian, hermite_function_derivative, probabilists_hermite};

pub const MAX_GRAM_CHARLIER_TERMS: usize = 7;
pub const MAX_EDGEWORTH_TERMS: usize = 4;

/// Complete Bell polynomials $B_0, \dots, B_n$ of `x = (x_1, ..., x_n)`.
///
/// Uses $B_{k+1} = \sum_{i=0}^{k} \binom{k}{i} B_{k-i} x_{i+1}$.
pub fn complete_bell_polynomials(x: &[f64]) -> Vec<f64> {
    let mut bell = Vec::with_capacity(x.len() + 1);
    bell.push(1.0);
    for k in 0..x.len() {
        let mut binomial = 1.0;
        let mut next = 0.0;
        for i in 0..=k {
            next += binomial * bell[k - i] * x[i];
            binomial *= (k - i) as f64 / (i + 1) as f64;
        }
        bell.push(next);
    }
    bell
}

/// Generalized Gram-Charlier series of a standardized density with `terms` correction terms,
/// at most [`MAX_GRAM_CHARLIER_TERMS`].
///
/// The coefficient of $He_n(t) \phi(t)$ is $B_n(\kappa_1, \kappa_2 - 1, \kappa_3, \dots) / n!$.
/// Missing cumulants are treated as zero.
pub fn gram_charlier(t: f64, standardized_cumulants: &[f64], terms: usize) -> f64 {
    let terms = terms.min(MAX_GRAM_CHARLIER_TERMS);
    let shifted: Vec<f64> = (0..terms)
        .map(|k| {
            let kappa = standardized_cumulants.get(k).copied().unwrap_or(0.0);
            if k == 1 {
                kappa - 1.0
            } else {
                kappa
            }
        })
        .collect();
    let bell = complete_bell_polynomials(&shifted);
    let phi = gaussian(t);
    let mut factorial = 1.0;
    let mut value = 0.0;
    for (n, b) in bell.iter().enumerate() {
        if n > 0 {
            factorial *= n as f64;
        }
        value += b / factorial * probabilists_hermite(n, t) * phi;
    }
    value
}

/// Edgeworth series with `terms` correction terms, at most [`MAX_EDGEWORTH_TERMS`].
///
/// Uses the normalized cumulants $\lambda_k = \kappa_k / \sigma^k$ of the quantity of interest.
pub fn edgeworth(t: f64, cumulants: &[f64], std_deviation: f64, terms: usize) -> f64 {
    let terms = terms.min(MAX_EDGEWORTH_TERMS);
    let lambda = |k: usize| cumulants.get(k - 1).copied().unwrap_or(0.0) / std_deviation.powi(k as i32);
    let d = |n: usize| hermite_function_derivative(n, t);
    let (l3, l4, l5, l6) = (lambda(3), lambda(4), lambda(5), lambda(6));

    let mut value = gaussian(t);
    if terms >= 1 {
        value -= l3 / 6.0 * d(3);
    }
    if terms >= 2 {
        value += l4 / 24.0 * d(4) + l3 * l3 / 72.0 * d(6);
    }
    if terms >= 3 {
        value += -l5 / 120.0 * d(5) + l3 * l4 / 144.0 * d(7) + l3.powi(3) / 1296.0 * d(9);
    }
    if terms >= 4 {
        value += l6 / 720.0 * d(6)
            + (l4 * l4 / 1152.0 + l3 * l5 / 720.0) * d(8)
            + l3 * l3 * l4 / 1728.0 * d(10)
            + l3.powi(4) / 31104.0 * d(12);
    }
    value
}
