use femflow::quadrature::{gauss_hermite, gauss_legendre, order_from_name, quadrilateral, segment, triangle, Quadrature};
use proptest::prelude::*;
use util::assert_scalar_eq;

fn factorial(n: u32) -> f64 {
    (1..=n).map(f64::from).product()
}

#[test]
fn gauss_legendre_integrates_monomials_exactly() {
    for n in 1..=8 {
        let rule = gauss_legendre(n);
        for degree in 0..(2 * n) as i32 {
            let integral = rule.integrate(|&x: &f64| x.powi(degree));
            let expected = if degree % 2 == 0 { 2.0 / (degree + 1) as f64 } else { 0.0 };
            assert_scalar_eq!(integral, expected, abstol = 1e-13);
        }
    }
}

#[test]
fn gauss_legendre_is_not_exact_beyond_its_degree() {
    let rule = gauss_legendre(2);
    let integral = rule.integrate(|&x: &f64| x.powi(4));
    assert!((integral - 0.4).abs() > 1e-3);
}

#[test]
fn gauss_hermite_reproduces_normal_moments() {
    let (weights, points) = gauss_hermite(6);
    assert_scalar_eq!(weights.iter().sum::<f64>(), 1.0, abstol = 1e-14);

    let moment = |k: i32| -> f64 { weights.iter().zip(&points).map(|(w, x)| w * x.powi(k)).sum() };
    assert_scalar_eq!(moment(1), 0.0, abstol = 1e-14);
    assert_scalar_eq!(moment(2), 1.0, abstol = 1e-13);
    assert_scalar_eq!(moment(3), 0.0, abstol = 1e-13);
    assert_scalar_eq!(moment(4), 3.0, abstol = 1e-12);
    assert_scalar_eq!(moment(6), 15.0, abstol = 1e-11);
}

#[test]
fn gauss_hermite_nodes_are_symmetric() {
    let (weights, mut points) = gauss_hermite(5);
    assert_eq!(weights.len(), 5);
    points.sort_by(|a, b| a.partial_cmp(b).unwrap());
    for i in 0..5 {
        assert_scalar_eq!(points[i], -points[4 - i], abstol = 1e-13);
    }
    assert_scalar_eq!(points[2], 0.0, abstol = 1e-13);
}

#[test]
fn segment_rule_lies_on_reference_segment() {
    let rule = segment(5);
    assert_eq!(rule.weights.len(), 3);
    assert!(rule.points.iter().all(|p| p.y == 0.0 && p.x.abs() < 1.0));
    assert_scalar_eq!(rule.weights.iter().sum::<f64>(), 2.0, abstol = 1e-14);
}

#[test]
fn quadrilateral_rule_integrates_tensor_monomials() {
    let rule = quadrilateral(5);
    for a in 0..=5 {
        for b in 0..=5 {
            let integral = rule.integrate(|p| p.x.powi(a) * p.y.powi(b));
            let one_d = |k: i32| if k % 2 == 0 { 2.0 / (k + 1) as f64 } else { 0.0 };
            assert_scalar_eq!(integral, one_d(a) * one_d(b), abstol = 1e-13);
        }
    }
}

#[test]
fn named_orders() {
    assert_eq!(order_from_name("fifth"), Some(5));
    assert_eq!(order_from_name("seventh"), Some(7));
    assert_eq!(order_from_name("eleventh"), None);
}

proptest! {
    #[test]
    fn triangle_rule_integrates_polynomials_exactly(order in 0usize..=8, a in 0u32..=8, b in 0u32..=8) {
        prop_assume!(a + b <= order as u32);
        let rule = triangle(order);
        let integral = rule.integrate(|p| p.x.powi(a as i32) * p.y.powi(b as i32));
        let expected = factorial(a) * factorial(b) / factorial(a + b + 2);
        prop_assert!((integral - expected).abs() <= 1e-13);
    }
}
