//! Stochastic Galerkin discretization of the diffusion problem
//! $-\nabla \cdot (a(x, \xi) \nabla u) = 1$ with the log-normal coefficient
//! $a(x, \xi) = \exp(\sum_k \sqrt{\lambda_k} \nu_k(x) \xi_k)$.
//!
//! The solution is expanded as $u = \sum_i u_i(x) H_i(\xi)$ in the multivariate Hermite basis of
//! the index set `Jp`. Testing with $H_i$ gives a coupled deterministic system with the
//! stochastic stiffness $A_{ij}(x) = E[a(x, \xi) H_i(\xi) H_j(\xi)]$, which is evaluated with a
//! tensor Gauss-Hermite rule.
use crate::index_set::{compute_index_set_jp, compute_tensor_product_set, MultivariateHermite};
use femflow::assembly::{AdScalar, ElementData, ElementResidual};
use femflow::element::map_gradients;
use femflow::solution::{FieldId, MultiLevelSolution, SolutionError};
use femflow::space::{FeFamily, FeOrder, FeType};

pub const SG_SYSTEM: &str = "SG";

/// Name of the field holding the coefficient of the `i`-th chaos polynomial.
pub fn sg_field_name(i: usize) -> String {
    format!("uSG{}", i)
}

/// Name of the field holding the `i`-th Karhunen-Loeve eigenfunction.
pub fn eigenfunction_field_name(i: usize) -> String {
    format!("egnf{}", i)
}

/// Adds one second order Lagrange field per chaos polynomial.
pub fn add_sg_fields(solution: &mut MultiLevelSolution, num_polynomials: usize) -> Result<Vec<FieldId>, SolutionError> {
    (0..num_polynomials)
        .map(|i| solution.add_solution(&sg_field_name(i), FeFamily::Lagrange, FeOrder::Second, 0))
        .collect()
}

/// Adds the fields of `count` eigenfunctions.
pub fn add_eigenfunction_fields(solution: &mut MultiLevelSolution, count: usize) -> Result<Vec<FieldId>, SolutionError> {
    (0..count)
        .map(|i| solution.add_solution(&eigenfunction_field_name(i), FeFamily::Lagrange, FeOrder::Second, 0))
        .collect()
}

#[derive(Debug, Clone)]
pub struct StochasticGalerkinAssembler {
    sg_fields: Vec<FieldId>,
    eigenfunctions: Vec<FieldId>,
    /// `sqrt(lambda_k)`
    scales: Vec<f64>,
    hermite: MultivariateHermite,
    source: f64,
}

impl StochasticGalerkinAssembler {
    /// Creates the assembler for polynomial degree `p`.
    ///
    /// The number of Karhunen-Loeve terms `m` is the number of eigenfunctions. The stochastic
    /// stiffness is integrated with `num_points` Gauss-Hermite points per dimension.
    pub fn new(
        sg_fields: Vec<FieldId>,
        eigenfunctions: Vec<FieldId>,
        eigenvalues: &[f64],
        p: usize,
        num_points: usize,
    ) -> Self {
        let m = eigenfunctions.len();
        assert_eq!(m, eigenvalues.len(), "one eigenvalue per eigenfunction");
        let jp = compute_index_set_jp(p, m);
        assert_eq!(jp.len(), sg_fields.len(), "one field per chaos polynomial");
        let tp = compute_tensor_product_set(num_points, m);
        Self {
            sg_fields,
            eigenfunctions,
            scales: eigenvalues.iter().map(|lambda| lambda.max(0.0).sqrt()).collect(),
            hermite: MultivariateHermite::evaluate(num_points, p, &jp, &tp),
            source: 1.0,
        }
    }

    pub fn with_source(self, source: f64) -> Self {
        Self { source, ..self }
    }

    pub fn sg_fields(&self) -> &[FieldId] {
        &self.sg_fields
    }

    /// $A_{ij} = \sum_t w_t \, a(x, \xi_t) H_i(\xi_t) H_j(\xi_t)$ for the eigenfunction values
    /// `nu` at a point.
    pub fn stochastic_stiffness(&self, nu: &[f64]) -> Vec<Vec<f64>> {
        let n = self.sg_fields.len();
        let coefficients: Vec<f64> = (0..self.hermite.num_nodes())
            .map(|t| {
                let exponent = log_coefficient(&self.scales, nu, &self.hermite.points[t]);
                self.hermite.weights[t] * exponent.exp()
            })
            .collect();
        let mut a = vec![vec![0.0; n]; n];
        for i in 0..n {
            for j in i..n {
                let value: f64 = coefficients
                    .iter()
                    .zip(&self.hermite.values[i])
                    .zip(&self.hermite.values[j])
                    .map(|((c, h_i), h_j)| c * h_i * h_j)
                    .sum();
                a[i][j] = value;
                a[j][i] = value;
            }
        }
        a
    }
}

fn log_coefficient(scales: &[f64], nu: &[f64], xi: &[f64]) -> f64 {
    scales
        .iter()
        .zip(nu)
        .zip(xi)
        .map(|((s, nu), xi)| s * nu * xi)
        .sum()
}

impl ElementResidual for StochasticGalerkinAssembler {
    fn residual<T: AdScalar>(&self, element: &ElementData, unknowns: &[T], residual: &mut [T]) {
        let coords = element.planar_coordinates();
        let geometry = element.geometry_table();
        let basis = element.table_for(FeType::LagrangeSecond);
        let eigenfunctions: Vec<Vec<f64>> = self
            .eigenfunctions
            .iter()
            .map(|&field| element.values(field))
            .collect();
        let ranges: Vec<_> = self.sg_fields.iter().map(|&field| element.range(field)).collect();

        for q in 0..basis.num_points() {
            let mapped = map_gradients(&coords, geometry, basis, q);
            let w = mapped.weight;
            let nu: Vec<f64> = eigenfunctions
                .iter()
                .map(|values| basis.interpolate(q, values))
                .collect();
            let a = self.stochastic_stiffness(&nu);

            let gradients: Vec<[T; 2]> = ranges
                .iter()
                .map(|range| {
                    let mut g = [T::zero(), T::zero()];
                    for (u, grad_phi) in unknowns[range.clone()].iter().zip(&mapped.gradients) {
                        g[0] += u.clone() * grad_phi[0];
                        g[1] += u.clone() * grad_phi[1];
                    }
                    g
                })
                .collect();

            for (i, range) in ranges.iter().enumerate() {
                for (k, row) in range.clone().enumerate() {
                    let grad_phi = &mapped.gradients[k];
                    let mut value = T::zero();
                    for (a_ij, g) in a[i].iter().zip(&gradients) {
                        value += (g[0].clone() * grad_phi[0] + g[1].clone() * grad_phi[1]) * *a_ij;
                    }
                    if i == 0 {
                        value = value - self.source * basis.values[q][k];
                    }
                    residual[row] += value * w;
                }
            }
        }
    }
}
