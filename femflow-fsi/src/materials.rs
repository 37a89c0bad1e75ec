use femflow::assembly::AdScalar;
use femflow::nalgebra::Matrix2;
use numeric_literals::replace_float_literals;
use serde::{Deserialize, Serialize};

/// Reference scales used to nondimensionalize the physical parameters.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub lref: f64,
    pub uref: f64,
}

impl Default for Parameter {
    fn default() -> Self {
        Self { lref: 1.0, uref: 1.0 }
    }
}

/// A Newtonian fluid.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Fluid {
    /// Dynamic viscosity.
    pub mu: f64,
    pub rho: f64,
}

impl Default for Fluid {
    fn default() -> Self {
        // Blood
        Self { mu: 2.2e-3, rho: 1060.0 }
    }
}

impl Fluid {
    pub fn reynolds_number(&self, parameter: &Parameter) -> f64 {
        self.rho * parameter.uref * parameter.lref / self.mu
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SolidModel {
    NeoHookean,
    MooneyRivlin,
}

/// An incompressible hyperelastic solid.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Solid {
    pub young: f64,
    pub poisson: f64,
    pub rho: f64,
    pub model: SolidModel,
}

impl Solid {
    /// Vein wall.
    pub fn vein() -> Self {
        Self {
            young: 260e6,
            poisson: 0.5,
            rho: 960.0,
            model: SolidModel::MooneyRivlin,
        }
    }

    /// Valve leaflet.
    pub fn leaflet() -> Self {
        Self {
            young: 7.5e6,
            ..Self::vein()
        }
    }

    pub fn shear_modulus(&self) -> f64 {
        0.5 * self.young / (1.0 + self.poisson)
    }

    /// Material constants with the shear modulus `2 (c1 + c2)` of the linearized model.
    pub fn mooney_rivlin_parameters(&self) -> MooneyRivlinParameters {
        let mu = self.shear_modulus();
        match self.model {
            SolidModel::NeoHookean => MooneyRivlinParameters { c1: 0.5 * mu, c2: 0.0 },
            SolidModel::MooneyRivlin => MooneyRivlinParameters {
                c1: mu / 3.0,
                c2: mu / 6.0,
            },
        }
    }
}

/// An incompressible material in plane strain, where the pressure is an independent unknown.
pub trait IncompressibleMaterial {
    type Parameters: Clone + Default + 'static;

    /// Compute the isochoric energy density $\psi = \psi(\vec F)$.
    fn compute_energy_density<T: AdScalar>(&self, deformation_gradient: &Matrix2<T>, parameters: &Self::Parameters) -> T;

    /// Compute the First Piola-Kirchhoff stress $\vec P = \partial \psi / \partial \vec F - p J \vec F^{-T}$.
    fn compute_stress_tensor<T: AdScalar>(
        &self,
        deformation_gradient: &Matrix2<T>,
        pressure: T,
        parameters: &Self::Parameters,
    ) -> Matrix2<T>;
}

#[derive(Copy, Clone, Debug, PartialEq, Default, Serialize, Deserialize)]
pub struct MooneyRivlinParameters {
    pub c1: f64,
    pub c2: f64,
}

/// The incompressible Mooney-Rivlin material model. Neo-Hookean is the special case `c2 = 0`.
///
/// The energy density is
/// $$
/// \psi(\vec F) = c_1 (I_1 - 2 - 2 \log J) + c_2 (I_2 - 1 - 2 \log J),
/// $$
/// where $I_1 = \tr{\vec C}$ and $I_2 = \frac{1}{2}(I_1^2 - \tr{\vec C^2}) = J^2$ are the invariants of
/// $\vec C = \vec F^T \vec F$ in two dimensions. The logarithmic terms make the reference
/// configuration stress free. The stress tensor is
/// $$
/// \vec P = 2 c_1 (\vec F - \vec F^{-T}) + 2 c_2 (I_1 \vec F - \vec F \vec C - \vec F^{-T}) - p J \vec F^{-T}.
/// $$
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MooneyRivlinMaterial;

pub fn determinant<T: AdScalar>(m: &Matrix2<T>) -> T {
    m[(0, 0)].clone() * m[(1, 1)].clone() - m[(0, 1)].clone() * m[(1, 0)].clone()
}

/// $\vec F^{-T}$ of an invertible 2x2 matrix.
pub fn inverse_transpose<T: AdScalar>(m: &Matrix2<T>) -> Matrix2<T> {
    let inv_det = determinant(m).recip();
    Matrix2::new(
        m[(1, 1)].clone() * inv_det.clone(),
        -m[(1, 0)].clone() * inv_det.clone(),
        -m[(0, 1)].clone() * inv_det.clone(),
        m[(0, 0)].clone() * inv_det,
    )
}

#[allow(non_snake_case)]
#[replace_float_literals(T::from(literal))]
impl IncompressibleMaterial for MooneyRivlinMaterial {
    type Parameters = MooneyRivlinParameters;

    fn compute_energy_density<T: AdScalar>(&self, deformation_gradient: &Matrix2<T>, parameters: &Self::Parameters) -> T {
        let F = deformation_gradient;
        let J = determinant(F);
        let I1 = F.dot(F);
        let log_J = J.clone().ln();
        (I1 - 2.0 - log_J.clone() * 2.0) * parameters.c1 + (J.clone() * J - 1.0 - log_J * 2.0) * parameters.c2
    }

    fn compute_stress_tensor<T: AdScalar>(
        &self,
        deformation_gradient: &Matrix2<T>,
        pressure: T,
        parameters: &Self::Parameters,
    ) -> Matrix2<T> {
        let F = deformation_gradient;
        let C = F.transpose() * F;
        let I1 = C.trace();
        let F_inv_T = inverse_transpose(F);
        let J = determinant(F);
        let (c1, c2) = (parameters.c1, parameters.c2);

        (F - &F_inv_T) * (2.0 * c1) + (F * I1 - F * C - &F_inv_T) * (2.0 * c2) - F_inv_T * (pressure * J)
    }
}
