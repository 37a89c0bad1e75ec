//! Time discretization of the curvature flow.
use crate::curvature::old_positions;
use crate::fields::WillmoreFields;
use crate::surface::{
    displaced_positions, dot, double_dot, interpolate_vector, lift_positions, parametric_gradient, SurfaceGaussPoint,
};
use femflow::assembly::{AdScalar, ElementData, ElementResidual};
use femflow::space::FeType;
use femflow::transient::TimeIntervalFn;
use serde::{Deserialize, Serialize};

/// Global constraints of the flow. Each enabled constraint adds one global variable to the
/// flow system, the volume multiplier first.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Constraints {
    pub volume: bool,
    pub area: bool,
}

impl Constraints {
    pub fn num_global_variables(&self) -> usize {
        usize::from(self.volume) + usize::from(self.area)
    }
}

/// Time steps growing geometrically by `growth` per step, starting from `dt0`.
///
/// After `k` steps the time is `dt0 (growth^k - 1) / (growth - 1)`, so the step taken from
/// time `t` is `dt0 + (growth - 1) t = dt0 growth^k`.
pub fn geometric_time_interval(dt0: f64, growth: f64) -> TimeIntervalFn {
    Box::new(move |time| dt0 + (growth - 1.0) * time)
}

/// Midpoint discretization of the flow of the surface $\vec x$ coupled to its mean curvature
/// vector $\vec Y$.
///
/// The metric, normal and tangential operators are evaluated on the midpoint surface
/// $\frac{1}{2}(\vec x^{n+1} + \vec x^n)$, and $\vec Y$ enters at its midpoint value. The
/// displacement rows hold
/// $$
/// \int \vec Y \cdot \vec \phi + \nabla_s \vec x^{n+1} : \nabla_s \vec \phi \, dA,
/// $$
/// and the curvature rows hold
/// $$
/// \int \Big( \frac{\vec x^{n+1} - \vec x^n}{\Delta t} + \nabla_s \vec x^{n+1} : \nabla_s \vec \phi
///     + \lambda_1 \vec N \Big) \cdot \vec \phi + \lambda_2 \nabla_s \vec x^{n+1} : \nabla_s \vec \phi \, dA.
/// $$
/// The multiplier $\lambda_1$ keeps the enclosed volume through
/// $\int (\vec x^{n+1} - \vec x^n) \cdot \vec N \, dA = 0$, and $\lambda_2$ keeps the area through
/// $\int \nabla_s \vec x : (\nabla_s \vec x^{n+1} - \nabla_s \vec x^n) \, dA = 0$.
#[derive(Debug, Clone)]
pub struct PWillmoreAssembler {
    pub fields: WillmoreFields,
    pub constraints: Constraints,
}

impl PWillmoreAssembler {
    pub fn new(fields: WillmoreFields, constraints: Constraints) -> Self {
        Self { fields, constraints }
    }
}

impl ElementResidual for PWillmoreAssembler {
    fn quadrature_order(&self) -> usize {
        3
    }

    #[allow(non_snake_case)]
    fn residual<T: AdScalar>(&self, element: &ElementData, unknowns: &[T], residual: &mut [T]) {
        let dx_ranges = self.fields.dx.map(|dx| element.range(dx));
        let y_ranges = self.fields.y.map(|y| element.range(y));
        let globals = element.global_range();
        let volume_row = self.constraints.volume.then_some(globals.start);
        let area_row = self
            .constraints
            .area
            .then_some(globals.start + usize::from(self.constraints.volume));
        let lambda1 = volume_row.map_or_else(T::zero, |row| unknowns[row].clone());
        let lambda2 = area_row.map_or_else(T::zero, |row| unknowns[row].clone());

        let table = element.table_for(FeType::LagrangeFirst);
        let x_new = displaced_positions(
            &element.coordinates,
            dx_ranges.clone().map(|range| &unknowns[range]),
        );
        let x_old: Vec<[T; 3]> = lift_positions(&old_positions(element, &self.fields));
        let x_mid: Vec<[T; 3]> = x_new
            .iter()
            .zip(&x_old)
            .map(|(new, old)| [0, 1, 2].map(|k| (new[k].clone() + old[k].clone()) * 0.5))
            .collect();
        let y_old = self.fields.y.map(|y| element.old_values(y));
        let y_mid: Vec<[T; 3]> = (0..table.num_functions())
            .map(|i| [0, 1, 2].map(|k| (unknowns[y_ranges[k].start + i].clone() + y_old[k][i]) * 0.5))
            .collect();
        let dt = element.dt;

        for q in 0..table.num_points() {
            let point = SurfaceGaussPoint::new(&x_mid, table, q);
            let N = &point.normal;
            let area = point.area.clone();
            let x_new_tan = point.tangential_gradient(&parametric_gradient(&x_new, table, q));
            let x_old_tan = point.tangential_gradient(&parametric_gradient(&x_old, table, q));
            let phi_tan = point.basis_gradients(table, q);
            let x_new_g = interpolate_vector(&x_new, table, q);
            let x_old_g = interpolate_vector(&x_old, table, q);
            let y_g = interpolate_vector(&y_mid, table, q);

            for k in 0..3 {
                let velocity = (x_new_g[k].clone() - x_old_g[k].clone()) / dt;
                for (i, (&phi, phi_tan_i)) in table.values[q].iter().zip(&phi_tan).enumerate() {
                    let term1 = dot(&x_new_tan[k], phi_tan_i);
                    residual[dx_ranges[k].start + i] += (y_g[k].clone() * phi + term1.clone()) * area.clone();
                    residual[y_ranges[k].start + i] += ((velocity.clone() + term1.clone() + lambda1.clone() * N[k].clone())
                        * phi
                        + lambda2.clone() * term1)
                        * area.clone();
                }
            }

            if let Some(row) = volume_row {
                let displacement = [0, 1, 2].map(|k| x_new_g[k].clone() - x_old_g[k].clone());
                residual[row] += dot(&displacement, N) * area.clone();
            }
            if let Some(row) = area_row {
                let x_mid_tan = point.tangential_gradient(&parametric_gradient(&x_mid, table, q));
                let increment = [0, 1, 2].map(|a| [0, 1, 2].map(|b| x_new_tan[a][b].clone() - x_old_tan[a][b].clone()));
                residual[row] += double_dot(&x_mid_tan, &increment) * area;
            }
        }
    }
}
