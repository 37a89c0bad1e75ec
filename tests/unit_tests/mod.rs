mod assembly;
mod quadrature;
mod space;

use femflow::assembly::{AdScalar, ElementData, ElementResidual};
use femflow::element::map_gradients;
use femflow::solution::FieldId;
use femflow::space::FeType;

/// `-div((1 + k u^2) grad u) + c u^3 = f` for a single scalar Lagrange field.
///
/// With `k = c = 0` this is the Poisson problem.
pub struct ScalarDiffusion {
    pub u: FieldId,
    pub fe: FeType,
    pub k: f64,
    pub c: f64,
    pub source: f64,
}

impl ElementResidual for ScalarDiffusion {
    fn residual<T: AdScalar>(&self, element: &ElementData, unknowns: &[T], residual: &mut [T]) {
        let range = element.range(self.u);
        let u = &unknowns[range.clone()];
        let coords: Vec<[T; 2]> = element
            .planar_coordinates()
            .iter()
            .map(|&[x, y]| [T::from(x), T::from(y)])
            .collect();
        let geometry = element.geometry_table();
        let basis = element.table_for(self.fe);

        for q in 0..basis.num_points() {
            let mapped = map_gradients(&coords, geometry, basis, q);
            let u_q = basis.interpolate(q, u);
            let mut grad_u = [T::zero(), T::zero()];
            for (u_i, g) in u.iter().zip(&mapped.gradients) {
                grad_u[0] += u_i.clone() * g[0].clone();
                grad_u[1] += u_i.clone() * g[1].clone();
            }
            let diffusion = u_q.clone() * u_q.clone() * self.k + 1.0;
            let reaction = u_q.clone() * u_q.clone() * u_q.clone() * self.c - self.source;
            for (i, g) in mapped.gradients.iter().enumerate() {
                let phi = basis.values[q][i];
                let flux = grad_u[0].clone() * g[0].clone() + grad_u[1].clone() * g[1].clone();
                residual[range.start + i] +=
                    (diffusion.clone() * flux + reaction.clone() * phi) * mapped.weight.clone();
            }
        }
    }
}
