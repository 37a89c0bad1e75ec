use super::sphere_solution;
use femflow_willmore::energy::{p_willmore_energy, surface_measures, EnergyPolynomial};
use matrixcompare::assert_scalar_eq;
use std::f64::consts::PI;

#[test]
fn icosahedron_area_and_volume() {
    let (solution, fields) = sphere_solution(0);
    // Edge length of the icosahedron inscribed in the unit sphere
    let a = 4.0 / (10.0 + 2.0 * 5.0_f64.sqrt()).sqrt();
    let measures = surface_measures(&solution, &fields);
    assert_scalar_eq!(measures.area, 5.0 * 3.0_f64.sqrt() * a * a, comp = abs, tol = 1e-12);
    assert_scalar_eq!(
        measures.volume,
        5.0 / 12.0 * (3.0 + 5.0_f64.sqrt()) * a * a * a,
        comp = abs,
        tol = 1e-12
    );
}

#[test]
fn refined_icosphere_approaches_sphere() {
    let ratios: Vec<(f64, f64)> = (1..=3)
        .map(|subdivisions| {
            let (solution, fields) = sphere_solution(subdivisions);
            let measures = surface_measures(&solution, &fields);
            (measures.area / (4.0 * PI), measures.volume / (4.0 / 3.0 * PI))
        })
        .collect();
    for pair in ratios.windows(2) {
        assert!(pair[1].0 > pair[0].0);
        assert!(pair[1].1 > pair[0].1);
    }
    let (area, volume) = ratios[2];
    assert!(area < 1.0 && area > 0.994, "area ratio {}", area);
    assert!(volume < 1.0 && volume > 0.99, "volume ratio {}", volume);
}

#[test]
fn measures_follow_displacement() {
    let (mut solution, fields) = sphere_solution(2);
    let before = surface_measures(&solution, &fields);
    // Scale the sphere by two
    let nodes = solution.mesh().nodes().to_vec();
    for (k, &dx) in fields.dx.iter().enumerate() {
        for (value, x) in solution.values_mut(dx).iter_mut().zip(&nodes) {
            *value = x[k];
        }
    }
    let after = surface_measures(&solution, &fields);
    assert_scalar_eq!(after.area, 4.0 * before.area, comp = abs, tol = 1e-12);
    assert_scalar_eq!(after.volume, 8.0 * before.volume, comp = abs, tol = 1e-12);
}

#[test]
fn polynomial_density_signs() {
    let polynomial = EnergyPolynomial {
        powers: vec![0, 3],
        coefficients: vec![2.0, 1.0],
    };
    assert_scalar_eq!(polynomial.density(4.0, 1.0), 10.0, comp = abs, tol = 1e-14);
    assert_scalar_eq!(polynomial.density(4.0, -1.0), -6.0, comp = abs, tol = 1e-14);
    assert_scalar_eq!(EnergyPolynomial::willmore().density(4.0, -1.0), 4.0, comp = abs, tol = 1e-14);
}

#[test]
fn default_energy_is_area() {
    let (solution, fields) = sphere_solution(1);
    let energy = p_willmore_energy(&solution, &fields, &EnergyPolynomial::default());
    assert_scalar_eq!(energy, surface_measures(&solution, &fields).area, comp = abs, tol = 1e-12);
}

#[test]
fn willmore_energy_of_exact_curvature() {
    let (mut solution, fields) = sphere_solution(3);
    let nodes = solution.mesh().nodes().to_vec();
    for (k, &y) in fields.y.iter().enumerate() {
        for (value, x) in solution.values_mut(y).iter_mut().zip(&nodes) {
            *value = -2.0 * x[k];
        }
    }
    // |Y|^2 = 4 at the nodes, slightly less inside the flat triangles
    let energy = p_willmore_energy(&solution, &fields, &EnergyPolynomial::willmore());
    assert!(energy < 16.0 * PI && energy > 0.98 * 16.0 * PI, "energy {}", energy);
}
