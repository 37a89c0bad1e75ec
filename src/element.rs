//! Reference cells, basis functions and the (differentiable) geometry of mapped cells.
use crate::assembly::AdScalar;
use crate::quadrature::{rule_for_cell, QuadratureRule};
use nalgebra::{Point2, Vector2};
use serde::{Deserialize, Serialize};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CellKind {
    Segment,
    Triangle,
    Quadrilateral,
}

impl CellKind {
    pub fn num_vertices(&self) -> usize {
        match self {
            Self::Segment => 2,
            Self::Triangle => 3,
            Self::Quadrilateral => 4,
        }
    }

    /// Number of edges of a two-dimensional cell. Segments have a single "edge", themselves.
    pub fn num_edges(&self) -> usize {
        match self {
            Self::Segment => 1,
            Self::Triangle => 3,
            Self::Quadrilateral => 4,
        }
    }

    /// Number of nodes of the cell in a linear or quadratic mesh.
    pub fn num_nodes(&self, quadratic: bool) -> usize {
        match (self, quadratic) {
            (_, false) => self.num_vertices(),
            (Self::Segment, true) => 3,
            (Self::Triangle, true) => 6,
            (Self::Quadrilateral, true) => 9,
        }
    }

    /// Local vertex indices of edge `i`, which joins vertex `i` and vertex `i + 1`.
    pub fn edge_vertices(&self, edge: usize) -> [usize; 2] {
        assert!(edge < self.num_edges());
        match self {
            Self::Segment => [0, 1],
            _ => [edge, (edge + 1) % self.num_vertices()],
        }
    }

    /// Reference coordinates of the local nodes, vertices first.
    pub fn reference_nodes(&self, quadratic: bool) -> Vec<Point2<f64>> {
        let nodes: &[[f64; 2]] = match self {
            Self::Segment => &[[-1.0, 0.0], [1.0, 0.0], [0.0, 0.0]],
            Self::Triangle => &[[0.0, 0.0], [1.0, 0.0], [0.0, 1.0], [0.5, 0.0], [0.5, 0.5], [0.0, 0.5]],
            Self::Quadrilateral => &[
                [-1.0, -1.0],
                [1.0, -1.0],
                [1.0, 1.0],
                [-1.0, 1.0],
                [0.0, -1.0],
                [1.0, 0.0],
                [0.0, 1.0],
                [-1.0, 0.0],
                [0.0, 0.0],
            ],
        };
        nodes[..self.num_nodes(quadratic)]
            .iter()
            .map(|&[x, y]| Point2::new(x, y))
            .collect()
    }

    pub fn reference_centre(&self) -> Point2<f64> {
        match self {
            Self::Triangle => Point2::new(1.0 / 3.0, 1.0 / 3.0),
            Self::Segment | Self::Quadrilateral => Point2::origin(),
        }
    }

    /// Maps the edge parameter `s in [-1, 1]` onto edge `edge` of the reference cell.
    pub fn edge_point(&self, edge: usize, s: f64) -> Point2<f64> {
        let nodes = self.reference_nodes(false);
        let [a, b] = self.edge_vertices(edge);
        let t = 0.5 * (s + 1.0);
        nodes[a] + (nodes[b] - nodes[a]) * t
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BasisKind {
    LagrangeLinear,
    LagrangeQuadratic,
    /// A single constant function.
    DiscontinuousConstant,
    /// The monomials `1, ξ, η` in reference coordinates.
    DiscontinuousLinear,
}

impl BasisKind {
    pub fn num_functions(&self, cell: CellKind) -> usize {
        match self {
            Self::LagrangeLinear => cell.num_nodes(false),
            Self::LagrangeQuadratic => cell.num_nodes(true),
            Self::DiscontinuousConstant => 1,
            Self::DiscontinuousLinear => 3,
        }
    }
}

fn quadratic_1d(node: usize, t: f64) -> (f64, f64) {
    // Nodes at -1, 1 and 0
    match node {
        0 => (0.5 * t * (t - 1.0), t - 0.5),
        1 => (0.5 * t * (t + 1.0), t + 0.5),
        _ => (1.0 - t * t, -2.0 * t),
    }
}

/// Values and reference gradients of all basis functions at `xi`.
pub fn evaluate_basis(cell: CellKind, basis: BasisKind, xi: &Point2<f64>) -> (Vec<f64>, Vec<Vector2<f64>>) {
    let (x, y) = (xi.x, xi.y);
    match (basis, cell) {
        (BasisKind::DiscontinuousConstant, _) => (vec![1.0], vec![Vector2::zeros()]),
        (BasisKind::DiscontinuousLinear, _) => (
            vec![1.0, x, y],
            vec![Vector2::zeros(), Vector2::new(1.0, 0.0), Vector2::new(0.0, 1.0)],
        ),
        (BasisKind::LagrangeLinear, CellKind::Segment) => (
            vec![0.5 * (1.0 - x), 0.5 * (1.0 + x)],
            vec![Vector2::new(-0.5, 0.0), Vector2::new(0.5, 0.0)],
        ),
        (BasisKind::LagrangeQuadratic, CellKind::Segment) => {
            let (values, derivatives): (Vec<_>, Vec<_>) = (0..3).map(|i| quadratic_1d(i, x)).unzip();
            (values, derivatives.into_iter().map(|d| Vector2::new(d, 0.0)).collect())
        }
        (BasisKind::LagrangeLinear, CellKind::Triangle) => (
            vec![1.0 - x - y, x, y],
            vec![Vector2::new(-1.0, -1.0), Vector2::new(1.0, 0.0), Vector2::new(0.0, 1.0)],
        ),
        (BasisKind::LagrangeQuadratic, CellKind::Triangle) => {
            let lambda = [1.0 - x - y, x, y];
            let grad = [Vector2::new(-1.0, -1.0), Vector2::new(1.0, 0.0), Vector2::new(0.0, 1.0)];
            let mut values = Vec::with_capacity(6);
            let mut gradients = Vec::with_capacity(6);
            for i in 0..3 {
                values.push(lambda[i] * (2.0 * lambda[i] - 1.0));
                gradients.push(grad[i] * (4.0 * lambda[i] - 1.0));
            }
            for i in 0..3 {
                let j = (i + 1) % 3;
                values.push(4.0 * lambda[i] * lambda[j]);
                gradients.push((grad[i] * lambda[j] + grad[j] * lambda[i]) * 4.0);
            }
            (values, gradients)
        }
        (BasisKind::LagrangeLinear, CellKind::Quadrilateral) => {
            let corners = [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)];
            corners
                .iter()
                .map(|&(a, b)| {
                    let value = 0.25 * (1.0 + a * x) * (1.0 + b * y);
                    let gradient = Vector2::new(0.25 * a * (1.0 + b * y), 0.25 * b * (1.0 + a * x));
                    (value, gradient)
                })
                .unzip()
        }
        (BasisKind::LagrangeQuadratic, CellKind::Quadrilateral) => {
            // 1D node index (-1 -> 0, 1 -> 1, 0 -> 2) of the nine tensor product nodes
            const NODES: [(usize, usize); 9] = [(0, 0), (1, 0), (1, 1), (0, 1), (2, 0), (1, 2), (2, 1), (0, 2), (2, 2)];
            NODES
                .iter()
                .map(|&(a, b)| {
                    let (lx, dlx) = quadratic_1d(a, x);
                    let (ly, dly) = quadratic_1d(b, y);
                    (lx * ly, Vector2::new(dlx * ly, lx * dly))
                })
                .unzip()
        }
    }
}

/// Basis values and reference gradients tabulated at the points of a quadrature rule.
#[derive(Debug, Clone)]
pub struct ShapeTable {
    pub cell: CellKind,
    pub basis: BasisKind,
    pub weights: Vec<f64>,
    pub points: Vec<Point2<f64>>,
    /// `values[q][i]` is basis function `i` at point `q`.
    pub values: Vec<Vec<f64>>,
    pub gradients: Vec<Vec<Vector2<f64>>>,
}

impl ShapeTable {
    pub fn new(cell: CellKind, basis: BasisKind, rule: &QuadratureRule) -> Self {
        let (values, gradients) = rule
            .points
            .iter()
            .map(|xi| evaluate_basis(cell, basis, xi))
            .unzip();
        Self {
            cell,
            basis,
            weights: rule.weights.clone(),
            points: rule.points.clone(),
            values,
            gradients,
        }
    }

    pub fn for_order(cell: CellKind, basis: BasisKind, order: usize) -> Self {
        Self::new(cell, basis, &rule_for_cell(cell, order))
    }

    pub fn num_points(&self) -> usize {
        self.weights.len()
    }

    pub fn num_functions(&self) -> usize {
        self.values.first().map(Vec::len).unwrap_or(0)
    }

    /// Interpolates nodal (or modal) coefficients at quadrature point `q`.
    pub fn interpolate<T: AdScalar>(&self, q: usize, coefficients: &[T]) -> T {
        self.values[q]
            .iter()
            .zip(coefficients)
            .fold(T::zero(), |sum, (&phi, c)| sum + c.clone() * phi)
    }
}

/// Jacobian determinant weight and physical gradients at a quadrature point.
#[derive(Debug, Clone)]
pub struct MappedPoint<T> {
    /// Quadrature weight times `|det J|`.
    pub weight: T,
    /// Physical gradients of the basis functions of the tabulated basis.
    pub gradients: Vec<[T; 2]>,
}

/// Maps the reference gradients of `basis` at point `q` to the planar cell with node
/// coordinates `coords`, using `geometry` as the basis of the geometry map.
///
/// Both tables must be built for the same cell and quadrature rule.
pub fn map_gradients<T: AdScalar>(
    coords: &[[T; 2]],
    geometry: &ShapeTable,
    basis: &ShapeTable,
    q: usize,
) -> MappedPoint<T> {
    debug_assert_eq!(geometry.num_points(), basis.num_points());
    let jacobian = reference_jacobian(coords, geometry, q);
    let [[j00, j01], [j10, j11]] = jacobian;
    let det = j00.clone() * j11.clone() - j01.clone() * j10.clone();
    let inv_det = det.recip();

    // J^{-T} applied to reference gradients
    let gradients = basis.gradients[q]
        .iter()
        .map(|g| {
            let (gx, gy) = (g.x, g.y);
            [
                (j11.clone() * gx - j10.clone() * gy) * inv_det.clone(),
                (j00.clone() * gy - j01.clone() * gx) * inv_det.clone(),
            ]
        })
        .collect();

    MappedPoint {
        weight: det.abs() * geometry.weights[q],
        gradients,
    }
}

/// `J[a][b] = d x_a / d ξ_b` of the geometry map at point `q`.
pub fn reference_jacobian<T: AdScalar>(coords: &[[T; 2]], geometry: &ShapeTable, q: usize) -> [[T; 2]; 2] {
    let mut jacobian = [[T::zero(), T::zero()], [T::zero(), T::zero()]];
    for (x, g) in coords.iter().zip(&geometry.gradients[q]) {
        for a in 0..2 {
            jacobian[a][0] += x[a].clone() * g.x;
            jacobian[a][1] += x[a].clone() * g.y;
        }
    }
    jacobian
}

/// Physical position of quadrature point `q`.
pub fn map_point<T: AdScalar>(coords: &[[T; 2]], geometry: &ShapeTable, q: usize) -> [T; 2] {
    let mut x = [T::zero(), T::zero()];
    for (c, &phi) in coords.iter().zip(&geometry.values[q]) {
        x[0] += c[0].clone() * phi;
        x[1] += c[1].clone() * phi;
    }
    x
}

/// Length element and outward unit normal of a cell edge at point `q` of a segment table.
///
/// `coords` are the edge nodes in segment order (end points, then the midpoint for quadratic
/// edges), traversed counterclockwise with respect to the cell.
pub fn face_geometry<T: AdScalar>(coords: &[[T; 2]], segment: &ShapeTable, q: usize) -> (T, [T; 2]) {
    let mut tangent = [T::zero(), T::zero()];
    for (x, g) in coords.iter().zip(&segment.gradients[q]) {
        tangent[0] += x[0].clone() * g.x;
        tangent[1] += x[1].clone() * g.x;
    }
    let length = (tangent[0].clone() * tangent[0].clone() + tangent[1].clone() * tangent[1].clone()).sqrt();
    let normal = [tangent[1].clone() / length.clone(), -tangent[0].clone() / length.clone()];
    (length * segment.weights[q], normal)
}
