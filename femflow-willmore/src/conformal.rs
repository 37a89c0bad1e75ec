//! Conformal reparametrization of the surface.
//!
//! Mesh quality degrades under curvature flow because the tangential motion of the vertices is
//! arbitrary. The reparametrization moves the vertices to minimize the Dirichlet energy of the
//! embedding over equilateral reference triangles, while each cell keeps its mean normal
//! position, so that the shape of the surface is unchanged to first order.
use crate::curvature::current_positions;
use crate::fields::WillmoreFields;
use crate::surface::{displaced_positions, dot, interpolate_vector, lift_positions, SurfaceGaussPoint};
use femflow::assembly::{AdScalar, ElementData, ElementResidual};
use femflow::space::FeType;

/// Cotangent weight of the edges of an equilateral triangle.
const EQUILATERAL_COTANGENT: f64 = 0.577_350_269_189_625_8;

/// Residual of the constrained minimization
/// $$
/// \min_{\tilde{\vec x}} \sum_T \frac{1}{4} \sum_{i < j} \cot \frac{\pi}{3} |\tilde{\vec x}_i - \tilde{\vec x}_j|^2
/// \quad \text{subject to} \quad \int_T (\tilde{\vec x} - \vec x) \cdot \vec N \, dA = 0 \text{ for all } T,
/// $$
/// where $\vec x$ is the current surface with its normal $\vec N$, and $\tilde{\vec x}$ the
/// reparametrized surface. The constraint of each cell has its own multiplier `Lambda1`.
#[derive(Debug, Clone)]
pub struct ConformalAssembler {
    pub fields: WillmoreFields,
}

impl ConformalAssembler {
    pub fn new(fields: WillmoreFields) -> Self {
        Self { fields }
    }
}

impl ElementResidual for ConformalAssembler {
    fn quadrature_order(&self) -> usize {
        2
    }

    fn residual<T: AdScalar>(&self, element: &ElementData, unknowns: &[T], residual: &mut [T]) {
        let ranges = self.fields.ndx.map(|ndx| element.range(ndx));
        let lambda_row = element.range(self.fields.lambda1).start;
        let lambda = unknowns[lambda_row].clone();

        let table = element.table_for(FeType::LagrangeFirst);
        let current = current_positions(element, &self.fields);
        let x: Vec<[T; 3]> = lift_positions(&current);
        let x_new = displaced_positions(&element.coordinates, ranges.clone().map(|range| &unknowns[range]));
        let n = x_new.len();

        for (k, range) in ranges.iter().enumerate() {
            for i in 0..n {
                let mut gradient = T::zero();
                for j in (0..n).filter(|&j| j != i) {
                    gradient += x_new[i][k].clone() - x_new[j][k].clone();
                }
                residual[range.start + i] += gradient * (0.5 * EQUILATERAL_COTANGENT);
            }
        }

        for q in 0..table.num_points() {
            let point = SurfaceGaussPoint::<f64>::new(&current, table, q);
            for (k, range) in ranges.iter().enumerate() {
                for (i, &phi) in table.values[q].iter().enumerate() {
                    residual[range.start + i] += lambda.clone() * (phi * point.normal[k] * point.area);
                }
            }
            let x_new_g = interpolate_vector(&x_new, table, q);
            let x_g = interpolate_vector(&x, table, q);
            let displacement = [0, 1, 2].map(|k| x_new_g[k].clone() - x_g[k].clone());
            let normal = [0, 1, 2].map(|k| T::zero() + point.normal[k]);
            residual[lambda_row] += dot(&displacement, &normal) * point.area;
        }
    }
}
