use crate::materials::{Fluid, Parameter, Solid};
use femflow::mesh::procedural::ValveGeometry;
use femflow::sparse::multigrid::{CoarseSolverKind, Cycle, MultigridSettings, SmootherKind};
use femflow::system::{LinearMethod, LinearSolverSettings, PreconditionerKind, SolverSettings};
use serde::{Deserialize, Serialize};

/// Configuration of a valve simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValveConfig {
    /// Number of mesh levels, including the coarse mesh.
    pub levels: usize,
    pub steps: usize,
    pub dt: f64,
    /// Write VTK output every `print_interval` steps.
    pub print_interval: usize,
    /// Save a restart file every `save_interval` steps.
    pub save_interval: Option<usize>,
    pub parameter: Parameter,
    pub fluid: Fluid,
    pub vein: Solid,
    pub leaflet: Solid,
    pub geometry: ValveGeometry,
    pub solver: SolverSettings,
}

impl Default for ValveConfig {
    fn default() -> Self {
        Self {
            levels: 4,
            steps: 512,
            dt: 1.0 / 64.0,
            print_interval: 1,
            save_interval: None,
            parameter: Parameter::default(),
            fluid: Fluid::default(),
            vein: Solid::vein(),
            leaflet: Solid::leaflet(),
            geometry: ValveGeometry::default(),
            solver: default_solver_settings(),
        }
    }
}

/// Newton with sparse LU solves of the Jacobian.
///
/// The continuity rows of the monolithic system have a zero diagonal, which incomplete
/// factorizations and point smoothers cannot handle. The multigrid settings only apply when
/// a configuration selects the multigrid preconditioner.
pub fn default_solver_settings() -> SolverSettings {
    SolverSettings {
        max_nonlinear_iterations: 20,
        nonlinear_tolerance: 1e-7,
        line_search: false,
        linear: LinearSolverSettings {
            method: LinearMethod::Direct,
            preconditioner: PreconditionerKind::None,
            tolerance: 1e-10,
            absolute_tolerance: 1e-12,
            max_iterations: 40,
        },
        multigrid: MultigridSettings {
            cycle: Cycle::F,
            pre_smoothing: 1,
            post_smoothing: 1,
            smoother: SmootherKind::Ilu0,
            smoother_scale: 0.4,
            coarse_solver: CoarseSolverKind::Direct,
        },
    }
}

/// Multigrid cycle of a time step. The first step starts from rest and gets an F-cycle,
/// every later step a V-cycle, also after a restart.
pub fn multigrid_cycle(step: usize) -> Cycle {
    if step <= 1 {
        Cycle::F
    } else {
        Cycle::V
    }
}
