//! Monolithic residual of the ALE fluid-structure interaction problem.
use crate::materials::{determinant, Fluid, IncompressibleMaterial, MooneyRivlinMaterial, MooneyRivlinParameters, Solid};
use femflow::assembly::{AdScalar, ElementData, ElementResidual};
use femflow::boundary::BoundaryCondition;
use femflow::element::{face_geometry, map_gradients, ShapeTable};
use femflow::mesh::procedural::valve_materials;
use femflow::mesh::Mesh;
use femflow::nalgebra::{Matrix2, Point3};
use femflow::solution::{FieldId, MultiLevelSolution, SolutionError};
use femflow::space::{FeFamily, FeOrder, FeType};
use itertools::izip;
use std::ops::Range;

pub const FSI_SYSTEM: &str = "Fluid-Structure-Interaction";

/// Unknowns of the FSI system, in system order.
pub const SYSTEM_FIELDS: [&str; 6] = ["DX", "DY", "U", "V", "PS", "PF"];

/// Field handles of the FSI solution.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct FsiFields {
    pub dx: FieldId,
    pub dy: FieldId,
    pub u: FieldId,
    pub v: FieldId,
    /// Solid pressure.
    pub ps: FieldId,
    /// Fluid pressure.
    pub pf: FieldId,
    /// Mesh stiffness of the fluid cells.
    pub lmbd: FieldId,
    pub um: FieldId,
    pub vm: FieldId,
}

impl FsiFields {
    /// Adds all FSI fields to a solution on a quadratic mesh.
    pub fn add_to(solution: &mut MultiLevelSolution) -> Result<Self, SolutionError> {
        use FeFamily::*;
        use FeOrder::*;
        let dx = solution.add_solution("DX", Lagrange, Second, 2)?;
        let dy = solution.add_solution("DY", Lagrange, Second, 2)?;
        let u = solution.add_solution("U", Lagrange, Second, 2)?;
        let v = solution.add_solution("V", Lagrange, Second, 2)?;
        solution.pair_solution("U", "DX")?;
        solution.pair_solution("V", "DY")?;
        let ps = solution.add_solution("PS", Discontinuous, First, 2)?;
        solution.associate_pressure("PS")?;
        let pf = solution.add_solution("PF", Discontinuous, First, 2)?;
        solution.associate_pressure("PF")?;
        let lmbd = solution.add_solution("lmbd", Discontinuous, Zero, 0)?;
        let um = solution.add_solution("Um", Lagrange, Second, 0)?;
        let vm = solution.add_solution("Vm", Lagrange, Second, 0)?;
        Ok(Self {
            dx,
            dy,
            u,
            v,
            ps,
            pf,
            lmbd,
            um,
            vm,
        })
    }

    /// Looks up the FSI fields of an existing solution.
    pub fn from_solution(solution: &MultiLevelSolution) -> Result<Self, SolutionError> {
        Ok(Self {
            dx: solution.index("DX")?,
            dy: solution.index("DY")?,
            u: solution.index("U")?,
            v: solution.index("V")?,
            ps: solution.index("PS")?,
            pf: solution.index("PF")?,
            lmbd: solution.index("lmbd")?,
            um: solution.index("Um")?,
            vm: solution.index("Vm")?,
        })
    }
}

/// Whether cells of the given material are solid.
pub fn is_solid(material: u32) -> bool {
    material != valve_materials::FLUID
}

/// Nodes that belong to at least one solid cell.
pub fn solid_nodes(mesh: &Mesh) -> Vec<bool> {
    let mut solid = vec![false; mesh.num_nodes()];
    for cell in mesh.cells().iter().filter(|cell| is_solid(cell.material)) {
        for &node in &cell.nodes {
            solid[node] = true;
        }
    }
    solid
}

/// Backward Euler residual of the monolithic ALE formulation.
///
/// Fluid cells are integrated on the current configuration and solid cells on the reference
/// configuration. The displacement of fluid nodes follows a harmonic extension weighted by
/// `lmbd`, while solid nodes move with the solid velocity.
#[derive(Debug, Clone)]
pub struct FsiAssembler {
    fields: FsiFields,
    fluid: Fluid,
    vein: MooneyRivlinParameters,
    vein_density: f64,
    leaflet: MooneyRivlinParameters,
    leaflet_density: f64,
    solid_nodes: Vec<bool>,
}

/// Local ranges of the unknowns of one cell.
struct LocalRanges {
    dx: Range<usize>,
    dy: Range<usize>,
    u: Range<usize>,
    v: Range<usize>,
    ps: Range<usize>,
    pf: Range<usize>,
}

impl FsiAssembler {
    pub fn new(solution: &MultiLevelSolution, fields: FsiFields, fluid: Fluid, vein: Solid, leaflet: Solid) -> Self {
        Self {
            fields,
            fluid,
            vein: vein.mooney_rivlin_parameters(),
            vein_density: vein.rho,
            leaflet: leaflet.mooney_rivlin_parameters(),
            leaflet_density: leaflet.rho,
            solid_nodes: solid_nodes(solution.mesh()),
        }
    }

    pub fn fields(&self) -> &FsiFields {
        &self.fields
    }

    fn ranges(&self, element: &ElementData) -> LocalRanges {
        LocalRanges {
            dx: element.range(self.fields.dx),
            dy: element.range(self.fields.dy),
            u: element.range(self.fields.u),
            v: element.range(self.fields.v),
            ps: element.range(self.fields.ps),
            pf: element.range(self.fields.pf),
        }
    }

    fn solid_parameters(&self, material: u32) -> (&MooneyRivlinParameters, f64) {
        if material == valve_materials::LEAFLET {
            (&self.leaflet, self.leaflet_density)
        } else {
            (&self.vein, self.vein_density)
        }
    }

    fn fluid_residual<T: AdScalar>(
        &self,
        element: &ElementData,
        r: &LocalRanges,
        unknowns: &[T],
        residual: &mut [T],
    ) {
        let inv_dt = inverse_time_step(element.dt);
        let Fluid { mu, rho } = self.fluid;
        let geometry = element.geometry_table();
        let basis = element.table_for(FeType::LagrangeSecond);
        let pressure_basis = element.table_for(FeType::DiscontinuousFirst);

        let reference = element.planar_coordinates();
        let current = current_coordinates(&reference, &unknowns[r.dx.clone()], &unknowns[r.dy.clone()]);
        let (dx, dy) = (&unknowns[r.dx.clone()], &unknowns[r.dy.clone()]);
        let (u, v) = (&unknowns[r.u.clone()], &unknowns[r.v.clone()]);
        let pf = &unknowns[r.pf.clone()];
        let (dx_old, dy_old) = (element.old_values(self.fields.dx), element.old_values(self.fields.dy));
        let (u_old, v_old) = (element.old_values(self.fields.u), element.old_values(self.fields.v));
        let lmbd = element.values(self.fields.lmbd)[0];

        // Mesh velocity at the nodes
        let um: Vec<T> = dx
            .iter()
            .zip(&dx_old)
            .map(|(d, &d_old)| (d.clone() - d_old) * inv_dt)
            .collect();
        let vm: Vec<T> = dy
            .iter()
            .zip(&dy_old)
            .map(|(d, &d_old)| (d.clone() - d_old) * inv_dt)
            .collect();

        for q in 0..basis.num_points() {
            let mapped = map_gradients(&current, geometry, basis, q);
            let w = mapped.weight.clone();
            let grad_u = gradient(u, &mapped.gradients);
            let grad_v = gradient(v, &mapped.gradients);
            let u_q = basis.interpolate(q, u);
            let v_q = basis.interpolate(q, v);
            let u_old_q = basis.interpolate(q, &u_old);
            let v_old_q = basis.interpolate(q, &v_old);
            let a_u = u_q.clone() - basis.interpolate(q, &um);
            let a_v = v_q.clone() - basis.interpolate(q, &vm);
            let pf_q = pressure_basis.interpolate(q, pf);

            // Material derivative of the velocity in the moving frame
            let acc_u = ((u_q - u_old_q) * inv_dt + a_u.clone() * grad_u[0].clone() + a_v.clone() * grad_u[1].clone()) * rho;
            let acc_v = ((v_q - v_old_q) * inv_dt + a_u * grad_v[0].clone() + a_v * grad_v[1].clone()) * rho;
            let shear = (grad_u[1].clone() + grad_v[0].clone()) * mu;
            let div = grad_u[0].clone() + grad_v[1].clone();

            for (i, (&phi, g)) in basis.values[q].iter().zip(&mapped.gradients).enumerate() {
                residual[r.u.start + i] += (acc_u.clone() * phi
                    + grad_u[0].clone() * g[0].clone() * (2.0 * mu)
                    + shear.clone() * g[1].clone()
                    - pf_q.clone() * g[0].clone())
                    * w.clone();
                residual[r.v.start + i] += (acc_v.clone() * phi
                    + shear.clone() * g[0].clone()
                    + grad_v[1].clone() * g[1].clone() * (2.0 * mu)
                    - pf_q.clone() * g[1].clone())
                    * w.clone();
            }
            for (k, &psi) in pressure_basis.values[q].iter().enumerate() {
                residual[r.pf.start + k] -= div.clone() * w.clone() * psi;
            }
        }

        // Harmonic extension of the interface motion into the fluid
        for q in 0..basis.num_points() {
            let mapped = map_gradients(&reference, geometry, basis, q);
            let grad_dx = gradient(dx, &mapped.gradients);
            let grad_dy = gradient(dy, &mapped.gradients);
            let w = mapped.weight * lmbd;
            for (i, g) in mapped.gradients.iter().enumerate() {
                if self.solid_nodes[element.cell.nodes[i]] {
                    continue;
                }
                residual[r.dx.start + i] += (grad_dx[0].clone() * g[0] + grad_dx[1].clone() * g[1]) * w;
                residual[r.dy.start + i] += (grad_dy[0].clone() * g[0] + grad_dy[1].clone() * g[1]) * w;
            }
        }

        for k in r.ps.clone() {
            residual[k] += unknowns[k].clone();
        }
    }

    fn solid_residual<T: AdScalar>(
        &self,
        element: &ElementData,
        r: &LocalRanges,
        unknowns: &[T],
        residual: &mut [T],
    ) {
        let inv_dt = inverse_time_step(element.dt);
        let (parameters, density) = self.solid_parameters(element.material());
        let geometry = element.geometry_table();
        let basis = element.table_for(FeType::LagrangeSecond);
        let pressure_basis = element.table_for(FeType::DiscontinuousFirst);

        let reference = element.planar_coordinates();
        let (dx, dy) = (&unknowns[r.dx.clone()], &unknowns[r.dy.clone()]);
        let (u, v) = (&unknowns[r.u.clone()], &unknowns[r.v.clone()]);
        let ps = &unknowns[r.ps.clone()];
        let (dx_old, dy_old) = (element.old_values(self.fields.dx), element.old_values(self.fields.dy));
        let (u_old, v_old) = (element.old_values(self.fields.u), element.old_values(self.fields.v));

        for q in 0..basis.num_points() {
            let mapped = map_gradients(&reference, geometry, basis, q);
            let w = mapped.weight;
            let grad_dx = gradient(dx, &mapped.gradients);
            let grad_dy = gradient(dy, &mapped.gradients);
            let deformation_gradient = Matrix2::new(
                grad_dx[0].clone() + 1.0,
                grad_dx[1].clone(),
                grad_dy[0].clone(),
                grad_dy[1].clone() + 1.0,
            );
            let ps_q = pressure_basis.interpolate(q, ps);
            let stress = MooneyRivlinMaterial.compute_stress_tensor(&deformation_gradient, ps_q, parameters);
            let jacobian_det = determinant(&deformation_gradient);

            let u_q = basis.interpolate(q, u);
            let v_q = basis.interpolate(q, v);
            let acc_u = (u_q.clone() - basis.interpolate(q, &u_old)) * (density * inv_dt);
            let acc_v = (v_q.clone() - basis.interpolate(q, &v_old)) * (density * inv_dt);
            let vel_dx = (basis.interpolate(q, dx) - basis.interpolate(q, &dx_old)) * inv_dt - u_q;
            let vel_dy = (basis.interpolate(q, dy) - basis.interpolate(q, &dy_old)) * inv_dt - v_q;

            for (i, (&phi, g)) in basis.values[q].iter().zip(&mapped.gradients).enumerate() {
                residual[r.u.start + i] +=
                    (acc_u.clone() * phi + stress[(0, 0)].clone() * g[0] + stress[(0, 1)].clone() * g[1]) * w;
                residual[r.v.start + i] +=
                    (acc_v.clone() * phi + stress[(1, 0)].clone() * g[0] + stress[(1, 1)].clone() * g[1]) * w;
                residual[r.dx.start + i] += vel_dx.clone() * (phi * w);
                residual[r.dy.start + i] += vel_dy.clone() * (phi * w);
            }
            for (k, &psi) in pressure_basis.values[q].iter().enumerate() {
                residual[r.ps.start + k] += (jacobian_det.clone() - 1.0) * (psi * w);
            }
        }

        for k in r.pf.clone() {
            residual[k] += unknowns[k].clone();
        }
    }

    /// Pressure loads `-p n` on the deformed boundary edges with a nonzero `PS` Neumann value.
    fn pressure_loads<T: AdScalar>(
        &self,
        element: &ElementData,
        r: &LocalRanges,
        unknowns: &[T],
        residual: &mut [T],
    ) {
        let face_basis = element.face_table_for(FeType::LagrangeSecond);
        let face_geometry_table = element.face_geometry_table();
        for (face, marker) in element.marked_faces() {
            let local = element.face_local_nodes(face);
            let midpoint = element.coordinates[local[local.len() - 1]];
            let pressure = match element.boundary_condition(self.fields.ps, &midpoint, marker) {
                Some(BoundaryCondition::Neumann(p)) if p != 0.0 => p,
                _ => continue,
            };
            let coords: Vec<[T; 2]> = local
                .iter()
                .map(|&i| {
                    let x = &element.coordinates[i];
                    [
                        unknowns[r.dx.start + i].clone() + x.x,
                        unknowns[r.dy.start + i].clone() + x.y,
                    ]
                })
                .collect();
            apply_pressure(&coords, &local, face_basis, face_geometry_table, pressure, r, residual);
        }
    }
}

fn apply_pressure<T: AdScalar>(
    coords: &[[T; 2]],
    local: &[usize],
    face_basis: &ShapeTable,
    face_geometry_table: &ShapeTable,
    pressure: f64,
    r: &LocalRanges,
    residual: &mut [T],
) {
    for q in 0..face_basis.num_points() {
        let (ds, normal) = face_geometry(coords, face_geometry_table, q);
        for (&i, &phi) in izip!(local, &face_basis.values[q]) {
            let load = ds.clone() * (pressure * phi);
            residual[r.u.start + i] += normal[0].clone() * load.clone();
            residual[r.v.start + i] += normal[1].clone() * load;
        }
    }
}

impl ElementResidual for FsiAssembler {
    fn residual<T: AdScalar>(&self, element: &ElementData, unknowns: &[T], residual: &mut [T]) {
        let ranges = self.ranges(element);
        if is_solid(element.material()) {
            self.solid_residual(element, &ranges, unknowns, residual);
        } else {
            self.fluid_residual(element, &ranges, unknowns, residual);
        }
        self.pressure_loads(element, &ranges, unknowns, residual);
    }
}

fn inverse_time_step(dt: f64) -> f64 {
    if dt > 0.0 {
        1.0 / dt
    } else {
        0.0
    }
}

/// Node coordinates displaced by `(dx, dy)`.
fn current_coordinates<T: AdScalar>(reference: &[[f64; 2]], dx: &[T], dy: &[T]) -> Vec<[T; 2]> {
    izip!(reference, dx, dy)
        .map(|(x, dx, dy)| [dx.clone() + x[0], dy.clone() + x[1]])
        .collect()
}

/// Gradient of the interpolant of nodal values given the physical basis gradients.
pub fn gradient<T, S>(values: &[T], gradients: &[[S; 2]]) -> [T; 2]
where
    T: AdScalar + std::ops::Mul<S, Output = T>,
    S: Clone,
{
    let mut grad = [T::zero(), T::zero()];
    for (value, g) in values.iter().zip(gradients) {
        grad[0] += value.clone() * g[0].clone();
        grad[1] += value.clone() * g[1].clone();
    }
    grad
}

/// Current position of a node of the finest mesh.
pub fn current_position(solution: &MultiLevelSolution, fields: &FsiFields, node: usize) -> Point3<f64> {
    let x = solution.mesh().nodes()[node];
    Point3::new(
        x.x + solution.values(fields.dx)[node],
        x.y + solution.values(fields.dy)[node],
        x.z,
    )
}
