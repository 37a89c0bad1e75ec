//! Karhunen-Loeve expansion of a Gaussian random field with exponential covariance.
//!
//! The eigenfunctions of the covariance operator are approximated in a Lagrange space by
//! solving the generalized eigenproblem $C v = \lambda M v$, where $M$ is the mass matrix and
//! $C_{ij} = \int \int \phi_i(x) \, c(x, y) \, \phi_j(y) \, dx \, dy$.
use femflow::assembly::{assemble_scalar, ElementData, ElementFunctional, ShapeTables};
use femflow::element::{map_gradients, map_point};
use femflow::mesh::Mesh;
use femflow::solution::{FieldId, MultiLevelSolution};
use femflow::space::{basis_kind, element_dofs, num_dofs, FeType};
use log::{debug, info};
use nalgebra::{Cholesky, DMatrix, DVector, SymmetricEigen};
use nalgebra_sparse::{CooMatrix, CsrMatrix};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt;

/// The exponential covariance $c(x, y) = \sigma^2 \exp(-\|x - y\|_1 / L)$.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct Covariance {
    pub variance: f64,
    pub correlation_length: f64,
}

impl Covariance {
    pub fn evaluate(&self, x: &[f64; 2], y: &[f64; 2]) -> f64 {
        let distance = (x[0] - y[0]).abs() + (x[1] - y[1]).abs();
        self.variance * (-distance / self.correlation_length).exp()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EigenError {
    /// The mass matrix has no Cholesky factorization.
    MassNotPositiveDefinite,
    NotEnoughEigenpairs { requested: usize, available: usize },
}

impl fmt::Display for EigenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MassNotPositiveDefinite => write!(f, "Mass matrix is not symmetric positive definite."),
            Self::NotEnoughEigenpairs { requested, available } => write!(
                f,
                "Requested {} eigenpairs, but the space only has {} dofs.",
                requested, available
            ),
        }
    }
}

impl Error for EigenError {}

/// Quadrature points of all cells together with the weighted basis functions.
struct GlobalQuadrature {
    points: Vec<[f64; 2]>,
    /// `weighted_basis[(i, q)]` is `w_q phi_i(x_q)`, where `w_q` includes the Jacobian determinant.
    weighted_basis: CsrMatrix<f64>,
}

fn global_quadrature(mesh: &Mesh, fe: FeType, tables: &ShapeTables) -> GlobalQuadrature {
    let per_cell: Vec<(Vec<usize>, Vec<[f64; 2]>, Vec<f64>, Vec<Vec<f64>>)> = (0..mesh.num_cells())
        .into_par_iter()
        .map(|c| {
            let kind = mesh.cells()[c].kind;
            let geometry = tables.get(kind, basis_kind(kind, geometry_fe(mesh)));
            let basis = tables.get(kind, basis_kind(kind, fe));
            let coords: Vec<[f64; 2]> = mesh
                .cell_coordinates(c)
                .iter()
                .map(|x| [x.x, x.y])
                .collect();
            let points = (0..geometry.num_points())
                .map(|q| map_point(&coords, geometry, q))
                .collect();
            let weights = (0..geometry.num_points())
                .map(|q| map_gradients(&coords, geometry, basis, q).weight)
                .collect();
            (element_dofs(mesh, c, fe), points, weights, basis.values.clone())
        })
        .collect();

    let num_points = per_cell.iter().map(|(_, points, _, _)| points.len()).sum();
    let mut coo = CooMatrix::new(num_dofs(mesh, fe), num_points);
    let mut points = Vec::with_capacity(num_points);
    for (dofs, cell_points, weights, values) in per_cell {
        for (q, (x, w)) in cell_points.into_iter().zip(weights).enumerate() {
            let column = points.len();
            points.push(x);
            for (&dof, &phi) in dofs.iter().zip(&values[q]) {
                coo.push(dof, column, w * phi);
            }
        }
    }
    GlobalQuadrature {
        points,
        weighted_basis: CsrMatrix::from(&coo),
    }
}

fn geometry_fe(mesh: &Mesh) -> FeType {
    if mesh.is_quadratic() {
        FeType::LagrangeSecond
    } else {
        FeType::LagrangeFirst
    }
}

/// Dense mass matrix of a Lagrange space.
pub fn assemble_mass_matrix(mesh: &Mesh, fe: FeType, quadrature_order: usize) -> DMatrix<f64> {
    let tables = ShapeTables::new(quadrature_order);
    let n = num_dofs(mesh, fe);
    let mut mass = DMatrix::zeros(n, n);
    for c in 0..mesh.num_cells() {
        let kind = mesh.cells()[c].kind;
        let geometry = tables.get(kind, basis_kind(kind, geometry_fe(mesh)));
        let basis = tables.get(kind, basis_kind(kind, fe));
        let coords: Vec<[f64; 2]> = mesh
            .cell_coordinates(c)
            .iter()
            .map(|x| [x.x, x.y])
            .collect();
        let dofs = element_dofs(mesh, c, fe);
        for q in 0..basis.num_points() {
            let w = map_gradients(&coords, geometry, basis, q).weight;
            for (&i, &phi_i) in dofs.iter().zip(&basis.values[q]) {
                for (&j, &phi_j) in dofs.iter().zip(&basis.values[q]) {
                    mass[(i, j)] += w * phi_i * phi_j;
                }
            }
        }
    }
    mass
}

/// Dense covariance matrix $C = B K B^T$, where $K$ holds the covariance between all pairs of
/// quadrature points and $B$ the weighted basis functions.
pub fn assemble_covariance_matrix(
    mesh: &Mesh,
    fe: FeType,
    covariance: &Covariance,
    quadrature_order: usize,
) -> DMatrix<f64> {
    let tables = ShapeTables::new(quadrature_order);
    let GlobalQuadrature { points, weighted_basis } = global_quadrature(mesh, fe, &tables);
    let n = points.len();
    debug!("Covariance kernel between {} quadrature points", n);

    // K is symmetric, so the column-major layout does not matter
    let kernel: Vec<f64> = (0..n * n)
        .into_par_iter()
        .map(|k| covariance.evaluate(&points[k / n], &points[k % n]))
        .collect();
    let kernel = DMatrix::from_vec(n, n, kernel);

    let bk = &weighted_basis * &kernel;
    let covariance_matrix = &weighted_basis * &bk.transpose();
    // Remove round-off asymmetry
    (&covariance_matrix + covariance_matrix.transpose()) * 0.5
}

/// Eigenpairs sorted by decreasing eigenvalue. Eigenvectors are orthonormal in the inner
/// product of the mass matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct EigenPairs {
    pub values: Vec<f64>,
    pub vectors: Vec<DVector<f64>>,
}

/// Solves $C v = \lambda M v$ for the `count` largest eigenvalues.
///
/// The problem is reduced to a standard symmetric eigenproblem with the Cholesky factor of
/// $M = L L^T$.
pub fn solve_generalized_eigenproblem(
    c: &DMatrix<f64>,
    m: &DMatrix<f64>,
    count: usize,
) -> Result<EigenPairs, EigenError> {
    let n = m.nrows();
    if count > n {
        return Err(EigenError::NotEnoughEigenpairs {
            requested: count,
            available: n,
        });
    }
    let cholesky = Cholesky::new(m.clone()).ok_or(EigenError::MassNotPositiveDefinite)?;
    let l = cholesky.l();
    let l_inv_c = l
        .solve_lower_triangular(c)
        .ok_or(EigenError::MassNotPositiveDefinite)?;
    let reduced = l
        .solve_lower_triangular(&l_inv_c.transpose())
        .ok_or(EigenError::MassNotPositiveDefinite)?;
    let reduced = (&reduced + reduced.transpose()) * 0.5;
    let eigen = SymmetricEigen::new(reduced);

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| eigen.eigenvalues[b].total_cmp(&eigen.eigenvalues[a]));
    let l_t = l.transpose();
    let mut values = Vec::with_capacity(count);
    let mut vectors = Vec::with_capacity(count);
    for &k in order.iter().take(count) {
        let y = eigen.eigenvectors.column(k).into_owned();
        let v = l_t
            .solve_upper_triangular(&y)
            .ok_or(EigenError::MassNotPositiveDefinite)?;
        values.push(eigen.eigenvalues[k]);
        vectors.push(v);
    }
    Ok(EigenPairs { values, vectors })
}

/// $\int_D f g \, dx$ of two Lagrange fields of the same type.
struct L2Product {
    a: FieldId,
    b: FieldId,
    fe: FeType,
}

impl ElementFunctional for L2Product {
    fn evaluate(&self, element: &ElementData) -> f64 {
        let coords = element.planar_coordinates();
        let geometry = element.geometry_table();
        let basis = element.table_for(self.fe);
        let (a, b) = (element.values(self.a), element.values(self.b));
        (0..basis.num_points())
            .map(|q| {
                let w = map_gradients(&coords, geometry, basis, q).weight;
                basis.interpolate(q, &a) * basis.interpolate(q, &b) * w
            })
            .sum()
    }
}

/// $\int_D f \, dx$ of a Lagrange field.
pub(crate) struct FieldIntegral {
    pub field: FieldId,
    pub fe: FeType,
}

impl ElementFunctional for FieldIntegral {
    fn evaluate(&self, element: &ElementData) -> f64 {
        let coords = element.planar_coordinates();
        let geometry = element.geometry_table();
        let basis = element.table_for(self.fe);
        let values = element.values(self.field);
        (0..basis.num_points())
            .map(|q| basis.interpolate(q, &values) * map_gradients(&coords, geometry, basis, q).weight)
            .sum()
    }
}

pub fn l2_inner_product(solution: &MultiLevelSolution, a: FieldId, b: FieldId) -> f64 {
    let fe = solution.fe_type(a);
    assert_eq!(fe, solution.fe_type(b), "inner products need fields of the same type");
    assemble_scalar(solution, &L2Product { a, b, fe }, solution.time())
}

/// Orthonormalizes the fields in $L^2(D)$ with the classical Gram-Schmidt process.
pub fn gram_schmidt(solution: &mut MultiLevelSolution, fields: &[FieldId]) {
    for (i, &field) in fields.iter().enumerate() {
        let coefficients: Vec<f64> = fields[..i]
            .iter()
            .map(|&previous| l2_inner_product(solution, field, previous))
            .collect();
        for (&previous, c) in fields[..i].iter().zip(coefficients) {
            let projection = solution.values(previous) * c;
            *solution.values_mut(field) -= projection;
        }
        let norm = l2_inner_product(solution, field, field).sqrt();
        debug!("Gram-Schmidt: norm of {} is {}", solution.name(field), norm);
        *solution.values_mut(field) /= norm;
    }
}

/// The Gram matrix $\int_D \nu_i \nu_j \, dx$ of the fields.
pub fn orthonormality_check(solution: &MultiLevelSolution, fields: &[FieldId]) -> DMatrix<f64> {
    DMatrix::from_fn(fields.len(), fields.len(), |i, j| {
        l2_inner_product(solution, fields[i], fields[j])
    })
}

/// Computes the leading eigenpairs of the covariance operator and stores the eigenfunctions
/// in `fields`. Returns the eigenvalues in decreasing order.
///
/// Eigenfunctions are orthonormalized in $L^2(D)$ and their sign is chosen such that their
/// mean over the domain is nonnegative.
pub fn compute_eigenpairs(
    solution: &mut MultiLevelSolution,
    fields: &[FieldId],
    covariance: &Covariance,
    quadrature_order: usize,
) -> Result<Vec<f64>, EigenError> {
    let Some(&first) = fields.first() else {
        return Ok(Vec::new());
    };
    let fe = solution.fe_type(first);
    let mesh = solution.mesh();
    let mass = assemble_mass_matrix(mesh, fe, quadrature_order);
    let covariance_matrix = assemble_covariance_matrix(mesh, fe, covariance, quadrature_order);
    let pairs = solve_generalized_eigenproblem(&covariance_matrix, &mass, fields.len())?;

    for (&field, vector) in fields.iter().zip(pairs.vectors) {
        solution.values_mut(field).copy_from(&vector);
    }
    gram_schmidt(solution, fields);
    for &field in fields {
        let mean = assemble_scalar(solution, &FieldIntegral { field, fe }, solution.time());
        if mean < 0.0 {
            *solution.values_mut(field) *= -1.0;
        }
    }
    for (i, value) in pairs.values.iter().enumerate() {
        info!("Eigenvalue {}: {}", i, value);
    }
    Ok(pairs.values)
}
