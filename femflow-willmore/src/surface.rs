//! Differential geometry of a parametrized surface at a quadrature point.
//!
//! A surface cell is parametrized over its reference cell by the Lagrange interpolant
//! $x(u, v)$ of the node positions. With the metric $g_{ij} = x_{,i} \cdot x_{,j}$, the
//! tangential gradient of a function $f$ is $\nabla_s f = f_{,i} \, g^{ij} x_{,j}$, which is
//! what [`SurfaceGaussPoint::tangential_gradient`] computes from the parametric derivatives.
use femflow::assembly::AdScalar;
use femflow::element::ShapeTable;
use femflow::nalgebra::Point3;

/// Orientation of the normal relative to $x_{,u} \times x_{,v}$. Cells with outward
/// counter-clockwise ordering therefore have inward normals.
pub const NORMAL_SIGN: f64 = -1.0;

/// Nodal positions `reference + displacement` with one displacement array per component.
pub fn displaced_positions<T: AdScalar>(reference: &[Point3<f64>], displacement: [&[T]; 3]) -> Vec<[T; 3]> {
    reference
        .iter()
        .enumerate()
        .map(|(i, x)| {
            [
                displacement[0][i].clone() + x.x,
                displacement[1][i].clone() + x.y,
                displacement[2][i].clone() + x.z,
            ]
        })
        .collect()
}

/// Converts plain positions to any scalar type.
pub fn lift_positions<T: AdScalar>(positions: &[[f64; 3]]) -> Vec<[T; 3]> {
    positions
        .iter()
        .map(|x| [T::zero() + x[0], T::zero() + x[1], T::zero() + x[2]])
        .collect()
}

/// Derivatives `[K][k]` of a vector valued interpolant with respect to the reference
/// coordinate `k`.
pub fn parametric_gradient<T: AdScalar>(values: &[[T; 3]], table: &ShapeTable, q: usize) -> [[T; 2]; 3] {
    let mut uv = [[T::zero(), T::zero()], [T::zero(), T::zero()], [T::zero(), T::zero()]];
    for (value, gradient) in values.iter().zip(&table.gradients[q]) {
        for (component, value_k) in uv.iter_mut().zip(value) {
            component[0] += value_k.clone() * gradient[0];
            component[1] += value_k.clone() * gradient[1];
        }
    }
    uv
}

/// Value of a vector valued interpolant at a quadrature point.
pub fn interpolate_vector<T: AdScalar>(values: &[[T; 3]], table: &ShapeTable, q: usize) -> [T; 3] {
    let mut x = [T::zero(), T::zero(), T::zero()];
    for (value, &phi) in values.iter().zip(&table.values[q]) {
        for (x_k, value_k) in x.iter_mut().zip(value) {
            *x_k += value_k.clone() * phi;
        }
    }
    x
}

pub fn dot<T: AdScalar>(a: &[T; 3], b: &[T; 3]) -> T {
    a[0].clone() * b[0].clone() + a[1].clone() * b[1].clone() + a[2].clone() * b[2].clone()
}

/// Frobenius product of two 3x3 tangential gradients.
pub fn double_dot<T: AdScalar>(a: &[[T; 3]; 3], b: &[[T; 3]; 3]) -> T {
    a.iter()
        .zip(b)
        .fold(T::zero(), |sum, (a_row, b_row)| sum + dot(a_row, b_row))
}

#[derive(Debug, Clone)]
pub struct SurfaceGaussPoint<T> {
    pub x_uv: [[T; 2]; 3],
    /// Metric tensor.
    pub g: [[T; 2]; 2],
    pub det_g: T,
    /// Quadrature weight times the area element $\sqrt{\det g}$.
    pub area: T,
    /// Unit normal `NORMAL_SIGN (x_u x x_v) / sqrt(det g)`.
    pub normal: [T; 3],
    /// The reduced Jacobian $g^{ik} x_{,k}$.
    pub jir: [[T; 3]; 2],
}

impl<T: AdScalar> SurfaceGaussPoint<T> {
    /// Geometry of the surface through `positions` at point `q` of `table`.
    pub fn new(positions: &[[T; 3]], table: &ShapeTable, q: usize) -> Self {
        let x_uv = parametric_gradient(positions, table, q);
        let metric = |i: usize, j: usize| {
            x_uv.iter()
                .fold(T::zero(), |sum, x_k| sum + x_k[i].clone() * x_k[j].clone())
        };
        let g = [[metric(0, 0), metric(0, 1)], [metric(1, 0), metric(1, 1)]];
        let det_g = g[0][0].clone() * g[1][1].clone() - g[0][1].clone() * g[1][0].clone();
        let sqrt_det_g = det_g.clone().sqrt();
        let area = sqrt_det_g.clone() * table.weights[q];

        let cross = |a: usize, b: usize| {
            x_uv[a][0].clone() * x_uv[b][1].clone() - x_uv[b][0].clone() * x_uv[a][1].clone()
        };
        let scale = sqrt_det_g.recip() * NORMAL_SIGN;
        let normal = [
            cross(1, 2) * scale.clone(),
            cross(2, 0) * scale.clone(),
            cross(0, 1) * scale,
        ];

        let inv_det = det_g.clone().recip();
        let g_inv = [
            [g[1][1].clone() * inv_det.clone(), -g[0][1].clone() * inv_det.clone()],
            [-g[1][0].clone() * inv_det.clone(), g[0][0].clone() * inv_det],
        ];
        let mut jir = [[T::zero(), T::zero(), T::zero()], [T::zero(), T::zero(), T::zero()]];
        for (i, row) in jir.iter_mut().enumerate() {
            for (j, entry) in row.iter_mut().enumerate() {
                for k in 0..2 {
                    *entry += g_inv[i][k].clone() * x_uv[j][k].clone();
                }
            }
        }

        Self {
            x_uv,
            g,
            det_g,
            area,
            normal,
            jir,
        }
    }

    /// Tangential gradient `[I][J]` of a vector field from its parametric derivatives.
    pub fn tangential_gradient(&self, uv: &[[T; 2]; 3]) -> [[T; 3]; 3] {
        let mut gradient = [
            [T::zero(), T::zero(), T::zero()],
            [T::zero(), T::zero(), T::zero()],
            [T::zero(), T::zero(), T::zero()],
        ];
        for (row, uv_i) in gradient.iter_mut().zip(uv) {
            for (j, entry) in row.iter_mut().enumerate() {
                for k in 0..2 {
                    *entry += uv_i[k].clone() * self.jir[k][j].clone();
                }
            }
        }
        gradient
    }

    /// Tangential gradients of the basis functions of `table`.
    pub fn basis_gradients(&self, table: &ShapeTable, q: usize) -> Vec<[T; 3]> {
        table.gradients[q]
            .iter()
            .map(|gradient| {
                let component = |j: usize| self.jir[0][j].clone() * gradient[0] + self.jir[1][j].clone() * gradient[1];
                [component(0), component(1), component(2)]
            })
            .collect()
    }
}
