use femflow_uq::expansion::{complete_bell_polynomials, edgeworth, gram_charlier};
use femflow_uq::hermite::{gaussian, probabilists_hermite};
use matrixcompare::assert_scalar_eq;
use proptest::prelude::*;

#[test]
fn bell_polynomials_of_low_order() {
    let (x1, x2, x3) = (0.5, -1.5, 2.0);
    let bell = complete_bell_polynomials(&[x1, x2, x3]);
    assert_eq!(bell.len(), 4);
    assert_eq!(bell[0], 1.0);
    assert_scalar_eq!(bell[1], x1, comp = abs, tol = 1e-15);
    assert_scalar_eq!(bell[2], x1 * x1 + x2, comp = abs, tol = 1e-15);
    assert_scalar_eq!(bell[3], x1.powi(3) + 3.0 * x1 * x2 + x3, comp = abs, tol = 1e-14);
}

#[test]
fn gram_charlier_of_standard_normal_is_gaussian() {
    let cumulants = [0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0];
    for &t in &[-3.0, -0.5, 0.0, 1.2, 2.7] {
        for terms in 0..=7 {
            assert_scalar_eq!(gram_charlier(t, &cumulants, terms), gaussian(t), comp = abs, tol = 1e-15);
        }
    }
}

#[test]
fn gram_charlier_second_order_correction() {
    let (k1, k2) = (0.2, 1.3);
    let t = 0.8;
    let expected = gaussian(t)
        * (1.0 + k1 * probabilists_hermite(1, t) + 0.5 * (k2 - 1.0 + k1 * k1) * probabilists_hermite(2, t));
    assert_scalar_eq!(gram_charlier(t, &[k1, k2], 2), expected, comp = abs, tol = 1e-14);
}

#[test]
fn edgeworth_of_normal_is_gaussian() {
    let (mu, sigma) = (3.0, 0.4);
    let cumulants = [mu, sigma * sigma, 0.0, 0.0, 0.0, 0.0];
    for &t in &[-2.0, 0.1, 1.5] {
        for terms in 0..=4 {
            assert_scalar_eq!(edgeworth(t, &cumulants, sigma, terms), gaussian(t), comp = abs, tol = 1e-15);
        }
    }
}

#[test]
fn edgeworth_first_term_corrects_skewness() {
    let sigma: f64 = 2.0;
    let cumulants = [0.0, sigma * sigma, 0.8];
    let lambda3 = 0.8 / sigma.powi(3);
    let t = -0.6;
    let expected = gaussian(t) * (1.0 + lambda3 / 6.0 * probabilists_hermite(3, t));
    assert_scalar_eq!(edgeworth(t, &cumulants, sigma, 1), expected, comp = abs, tol = 1e-15);
}

proptest! {
    #[test]
    fn bell_polynomials_of_single_variable_are_powers(x in -2.0..2.0f64) {
        let bell = complete_bell_polynomials(&[x, 0.0, 0.0, 0.0, 0.0]);
        for (n, b) in bell.iter().enumerate() {
            prop_assert!((b - x.powi(n as i32)).abs() <= 1e-12);
        }
    }
}
