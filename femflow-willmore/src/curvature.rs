//! Initial mean curvature vector of the surface.
use crate::fields::WillmoreFields;
use crate::surface::{dot, parametric_gradient, SurfaceGaussPoint};
use femflow::assembly::{AdScalar, ElementData, ElementResidual};
use femflow::space::FeType;

/// Nodal positions `X + Dx` of the current surface on a cell.
pub fn current_positions(element: &ElementData, fields: &WillmoreFields) -> Vec<[f64; 3]> {
    let displacement = fields.dx.map(|dx| element.values(dx));
    element
        .coordinates
        .iter()
        .enumerate()
        .map(|(i, x)| [x.x + displacement[0][i], x.y + displacement[1][i], x.z + displacement[2][i]])
        .collect()
}

/// Nodal positions of the surface at the previous time step.
pub fn old_positions(element: &ElementData, fields: &WillmoreFields) -> Vec<[f64; 3]> {
    let displacement = fields.dx.map(|dx| element.old_values(dx));
    element
        .coordinates
        .iter()
        .enumerate()
        .map(|(i, x)| [x.x + displacement[0][i], x.y + displacement[1][i], x.z + displacement[2][i]])
        .collect()
}

/// Computes the mean curvature vector $\vec Y = \Delta_s \vec X$ of the current surface from
/// $$
/// \int_\Gamma \vec Y \cdot \vec \phi + \nabla_s \vec X : \nabla_s \vec \phi \, dA = 0.
/// $$
/// On a sphere of radius $R$ this gives $\vec Y = -2 \vec X / R^2$.
#[derive(Debug, Clone)]
pub struct InitYAssembler {
    pub fields: WillmoreFields,
}

impl InitYAssembler {
    pub fn new(fields: WillmoreFields) -> Self {
        Self { fields }
    }
}

impl ElementResidual for InitYAssembler {
    fn quadrature_order(&self) -> usize {
        2
    }

    fn residual<T: AdScalar>(&self, element: &ElementData, unknowns: &[T], residual: &mut [T]) {
        let ranges = self.fields.y.map(|y| element.range(y));
        let table = element.table_for(FeType::LagrangeFirst);
        let positions = current_positions(element, &self.fields);

        for q in 0..table.num_points() {
            let point = SurfaceGaussPoint::<f64>::new(&positions, table, q);
            let x_tan = point.tangential_gradient(&parametric_gradient(&positions, table, q));
            let phi_tan = point.basis_gradients(table, q);

            for (k, range) in ranges.iter().enumerate() {
                let y = table.interpolate(q, &unknowns[range.clone()]);
                for (i, (&phi, phi_tan_i)) in table.values[q].iter().zip(&phi_tan).enumerate() {
                    let stiffness = dot(&x_tan[k], phi_tan_i);
                    residual[range.start + i] += (y.clone() * phi + stiffness) * point.area;
                }
            }
        }
    }
}
