use crate::energy::EnergyPolynomial;
use crate::flow::Constraints;
use femflow::sparse::multigrid::MultigridSettings;
use femflow::system::{LinearMethod, LinearSolverSettings, PreconditionerKind, SolverSettings};
use serde::{Deserialize, Serialize};

/// Configuration of a surface flow simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WillmoreConfig {
    /// Semi-axes of the initial ellipsoid.
    pub semi_axes: [f64; 3],
    /// Icosahedron subdivisions of the coarse mesh.
    pub subdivisions: usize,
    /// Number of uniformly refined levels, including the coarse mesh.
    pub levels: usize,
    /// Number of coarse levels dropped after refinement.
    pub erased_levels: usize,
    pub steps: usize,
    pub dt0: f64,
    /// Factor between consecutive time steps.
    pub dt_growth: f64,
    /// Write VTK output every `print_interval` steps.
    pub print_interval: usize,
    /// Reparametrize the surface after every step.
    pub conformal: bool,
    pub constraints: Constraints,
    pub energy: EnergyPolynomial,
    pub solver: SolverSettings,
    pub conformal_solver: SolverSettings,
}

impl Default for WillmoreConfig {
    fn default() -> Self {
        Self {
            semi_axes: [1.0, 0.5, 0.5],
            subdivisions: 2,
            levels: 3,
            erased_levels: 2,
            steps: 1000,
            dt0: 6e-4,
            dt_growth: 1.02,
            print_interval: 1,
            conformal: true,
            constraints: Constraints::default(),
            energy: EnergyPolynomial::default(),
            solver: default_solver_settings(),
            conformal_solver: default_solver_settings(),
        }
    }
}

/// Newton with sparse LU solves of the Jacobian.
///
/// The curvature rows of the flow, the constraint rows and the `Lambda1` rows of the
/// reparametrization have zero diagonal blocks, so incomplete factorizations stall on them.
pub fn default_solver_settings() -> SolverSettings {
    SolverSettings {
        max_nonlinear_iterations: 4,
        nonlinear_tolerance: 1e-10,
        line_search: false,
        linear: LinearSolverSettings {
            method: LinearMethod::Direct,
            preconditioner: PreconditionerKind::None,
            tolerance: 1e-10,
            absolute_tolerance: 1e-15,
            max_iterations: 200,
        },
        multigrid: MultigridSettings::default(),
    }
}
