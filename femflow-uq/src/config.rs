use crate::karhunen_loeve::Covariance;
use crate::statistics::HistogramSettings;
use femflow::sparse::multigrid::{CoarseSolverKind, Cycle, MultigridSettings, SmootherKind};
use femflow::system::{LinearMethod, LinearSolverSettings, PreconditionerKind, SolverSettings};
use serde::{Deserialize, Serialize};

/// Configuration of a stochastic Galerkin run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UqConfig {
    /// Number of mesh levels, including the coarse mesh.
    pub levels: usize,
    /// Cells per side of the coarse mesh of the unit square.
    pub coarse_cells: usize,
    /// Number of Karhunen-Loeve terms.
    pub eigenpairs: usize,
    /// Total degree of the polynomial chaos.
    pub polynomial_degree: usize,
    pub covariance: Covariance,
    /// Number of moments of the quantity of interest.
    pub moments: usize,
    /// Gauss-Hermite points per dimension of the stochastic stiffness.
    pub galerkin_quadrature_points: usize,
    /// Quadrature order of the Karhunen-Loeve matrices.
    pub eigen_quadrature_order: usize,
    pub histogram: HistogramSettings,
    pub solver: SolverSettings,
}

impl Default for UqConfig {
    fn default() -> Self {
        Self {
            levels: 4,
            coarse_cells: 2,
            eigenpairs: 2,
            polynomial_degree: 4,
            covariance: Covariance {
                variance: 0.8,
                correlation_length: 0.1,
            },
            moments: 6,
            galerkin_quadrature_points: 8,
            eigen_quadrature_order: 4,
            histogram: HistogramSettings::default(),
            solver: default_solver_settings(),
        }
    }
}

/// GMRES preconditioned by a multigrid V-cycle, with a single linear solve.
pub fn default_solver_settings() -> SolverSettings {
    SolverSettings {
        max_nonlinear_iterations: 1,
        nonlinear_tolerance: 1e-10,
        line_search: false,
        linear: LinearSolverSettings {
            method: LinearMethod::Gmres { restart: 30 },
            preconditioner: PreconditionerKind::Multigrid,
            tolerance: 1e-10,
            absolute_tolerance: 1e-15,
            max_iterations: 100,
        },
        multigrid: MultigridSettings {
            cycle: Cycle::V,
            pre_smoothing: 1,
            post_smoothing: 1,
            smoother: SmootherKind::Ilu0,
            smoother_scale: 0.4,
            coarse_solver: CoarseSolverKind::Direct,
        },
    }
}
