//! Implicit systems: a set of solution fields and global variables solved together by Newton's
//! method with a configurable Krylov or multigrid linear solver.
use crate::assembly::{assemble_system, AssemblyError, ElementResidual};
use crate::solution::{FieldId, MultiLevelSolution, SolutionError};
use crate::space::{num_dofs, prolongation};
use femflow_optimize::calculus::{DifferentiableVectorFunction, VectorFunction};
use femflow_optimize::newton::{newton_line_search, BacktrackingLineSearch, NewtonError, NewtonSettings, NoLineSearch};
use femflow_sparse::cg::{ConjugateGradient, ResidualTolerance};
use femflow_sparse::gmres::Gmres;
use femflow_sparse::lu::SparseLu;
use femflow_sparse::multigrid::{Cycle, Multigrid, MultigridSettings};
use femflow_sparse::preconditioner::{Ilu0, Jacobi, Richardson};
use femflow_sparse::{IdentityOperator, KrylovOutput, LinearOperator, SolveError};
use log::{debug, info, warn};
use nalgebra::{DVector, DVectorView, DVectorViewMut};
use nalgebra_sparse::{CooMatrix, CsrMatrix};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SystemKind {
    /// Solved with exactly one Newton step.
    Linear,
    Nonlinear,
}

#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub enum LinearMethod {
    Gmres { restart: usize },
    Cg,
    Richardson { scale: f64 },
    /// Sparse LU factorization. Required for saddle point systems with zero diagonal blocks.
    Direct,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PreconditionerKind {
    None,
    Jacobi,
    Ilu0,
    Multigrid,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinearSolverSettings {
    pub method: LinearMethod,
    pub preconditioner: PreconditionerKind,
    pub tolerance: f64,
    pub absolute_tolerance: f64,
    pub max_iterations: usize,
}

impl Default for LinearSolverSettings {
    fn default() -> Self {
        Self {
            method: LinearMethod::Gmres { restart: 30 },
            preconditioner: PreconditionerKind::Multigrid,
            tolerance: 1e-10,
            absolute_tolerance: 1e-15,
            max_iterations: 100,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverSettings {
    pub max_nonlinear_iterations: usize,
    pub nonlinear_tolerance: f64,
    pub line_search: bool,
    pub linear: LinearSolverSettings,
    pub multigrid: MultigridSettings,
}

impl Default for SolverSettings {
    fn default() -> Self {
        Self {
            max_nonlinear_iterations: 20,
            nonlinear_tolerance: 1e-7,
            line_search: false,
            linear: LinearSolverSettings::default(),
            multigrid: MultigridSettings::default(),
        }
    }
}

/// Statistics of the linear solve of one Newton iteration.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearSolveStats {
    pub iterations: usize,
    pub initial_residual: f64,
    pub final_residual: f64,
    pub converged: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NonlinearOutcome {
    pub converged: bool,
    pub iterations: usize,
    /// Norm of the residual at the returned solution.
    pub residual_norm: f64,
    pub linear: Vec<LinearSolveStats>,
}

#[derive(Debug)]
pub enum SystemError {
    Solution(SolutionError),
    Assembly(AssemblyError),
    Newton(NewtonError),
}

impl fmt::Display for SystemError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Solution(err) => write!(f, "{}", err),
            Self::Assembly(err) => write!(f, "Assembly failed: {}", err),
            Self::Newton(err) => write!(f, "Newton iteration failed: {}", err),
        }
    }
}

impl Error for SystemError {}

impl From<SolutionError> for SystemError {
    fn from(err: SolutionError) -> Self {
        Self::Solution(err)
    }
}

impl From<AssemblyError> for SystemError {
    fn from(err: AssemblyError) -> Self {
        Self::Assembly(err)
    }
}

/// Numbering of the unknowns of a system: all dofs of the first field, then the second
/// field, and so on, with the global variables last.
#[derive(Debug, Clone, PartialEq)]
pub struct SystemLayout {
    fields: Vec<FieldId>,
    offsets: Vec<usize>,
    num_global_variables: usize,
    num_dofs: usize,
}

impl SystemLayout {
    pub fn new(solution: &MultiLevelSolution, fields: Vec<FieldId>, num_global_variables: usize) -> Self {
        let mut offsets = Vec::with_capacity(fields.len());
        let mut offset = 0;
        for &field in &fields {
            offsets.push(offset);
            offset += solution.values(field).len();
        }
        Self {
            fields,
            offsets,
            num_global_variables,
            num_dofs: offset + num_global_variables,
        }
    }

    pub fn fields(&self) -> &[FieldId] {
        &self.fields
    }

    pub fn num_dofs(&self) -> usize {
        self.num_dofs
    }

    pub fn num_global_variables(&self) -> usize {
        self.num_global_variables
    }

    /// System index of `dof` of the field at position `index` of the system.
    pub fn system_dof(&self, index: usize, dof: usize) -> usize {
        self.offsets[index] + dof
    }

    pub fn global_dof(&self, k: usize) -> usize {
        self.num_dofs - self.num_global_variables + k
    }

    /// Dirichlet flags of all system unknowns. Global variables are never constrained.
    pub fn dirichlet_mask(&self, solution: &MultiLevelSolution) -> Vec<bool> {
        let mut mask = Vec::with_capacity(self.num_dofs);
        for &field in &self.fields {
            mask.extend_from_slice(solution.dirichlet_flags(field));
        }
        mask.resize(self.num_dofs, false);
        mask
    }
}

#[derive(Debug, Clone)]
pub struct ImplicitSystem {
    name: String,
    kind: SystemKind,
    layout: SystemLayout,
    global_values: DVector<f64>,
    settings: SolverSettings,
    /// Block diagonal prolongations of the system unknowns, from coarsest to finest.
    prolongations: Vec<CsrMatrix<f64>>,
}

impl ImplicitSystem {
    pub fn new(
        name: &str,
        kind: SystemKind,
        solution: &MultiLevelSolution,
        fields: &[&str],
        num_global_variables: usize,
    ) -> Result<Self, SolutionError> {
        let ids = fields
            .iter()
            .map(|field| solution.index(field))
            .collect::<Result<Vec<_>, _>>()?;
        let layout = SystemLayout::new(solution, ids, num_global_variables);
        let prolongations = system_prolongations(solution, &layout);
        info!(
            "System {} has {} unknowns on {} levels",
            name,
            layout.num_dofs(),
            prolongations.len() + 1
        );
        Ok(Self {
            name: name.to_string(),
            kind,
            layout,
            global_values: DVector::zeros(num_global_variables),
            settings: SolverSettings::default(),
            prolongations,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> SystemKind {
        self.kind
    }

    pub fn layout(&self) -> &SystemLayout {
        &self.layout
    }

    pub fn settings(&self) -> &SolverSettings {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut SolverSettings {
        &mut self.settings
    }

    pub fn set_settings(&mut self, settings: SolverSettings) {
        self.settings = settings;
    }

    pub fn set_mg_type(&mut self, cycle: Cycle) {
        self.settings.multigrid.cycle = cycle;
    }

    pub fn prolongations(&self) -> &[CsrMatrix<f64>] {
        &self.prolongations
    }

    pub fn global_values(&self) -> &DVector<f64> {
        &self.global_values
    }

    pub fn global_values_mut(&mut self) -> &mut DVector<f64> {
        &mut self.global_values
    }

    /// Collects the current values of the system unknowns.
    pub fn gather(&self, solution: &MultiLevelSolution) -> DVector<f64> {
        let mut x = DVector::zeros(self.layout.num_dofs());
        for (index, &field) in self.layout.fields().iter().enumerate() {
            let values = solution.values(field);
            let start = self.layout.system_dof(index, 0);
            x.rows_mut(start, values.len()).copy_from(values);
        }
        let start = self.layout.global_dof(0);
        x.rows_mut(start, self.global_values.len())
            .copy_from(&self.global_values);
        x
    }

    /// Writes system unknowns back to the solution fields and global variables.
    pub fn scatter(&mut self, solution: &mut MultiLevelSolution, x: &DVector<f64>) {
        for (index, &field) in self.layout.fields().iter().enumerate() {
            let values = solution.values_mut(field);
            let start = self.layout.system_dof(index, 0);
            values.copy_from(&x.rows(start, values.len()));
        }
        let start = self.layout.global_dof(0);
        let n = self.global_values.len();
        self.global_values.copy_from(&x.rows(start, n));
    }

    /// Solves a steady problem at the current time of the solution.
    pub fn solve<R: ElementResidual>(
        &mut self,
        solution: &mut MultiLevelSolution,
        assembler: &R,
    ) -> Result<NonlinearOutcome, SystemError> {
        let time = solution.time();
        self.solve_at(solution, assembler, time, 0.0)
    }

    /// Solves the system with the given time and time step passed on to the assembler.
    pub fn solve_at<R: ElementResidual>(
        &mut self,
        solution: &mut MultiLevelSolution,
        assembler: &R,
        time: f64,
        dt: f64,
    ) -> Result<NonlinearOutcome, SystemError> {
        let mut x = self.gather(solution);
        let n = x.len();
        let mut f = DVector::zeros(n);
        let mut dx = DVector::zeros(n);

        let mut newton_settings = NewtonSettings::new(
            Some(self.settings.max_nonlinear_iterations),
            self.settings.nonlinear_tolerance,
        );
        if self.kind == SystemKind::Linear {
            newton_settings.min_iterations = 1;
            newton_settings.max_iterations = Some(1);
        }

        let (result, stats) = {
            let mut function = AssembledFunction {
                layout: &self.layout,
                solution: &*solution,
                assembler,
                time,
                dt,
                settings: &self.settings,
                prolongations: &self.prolongations,
                jacobian: None,
                stats: Vec::new(),
                error: None,
            };
            let result = if self.settings.line_search {
                newton_line_search(
                    &mut function,
                    &mut x,
                    &mut f,
                    &mut dx,
                    newton_settings,
                    &mut BacktrackingLineSearch::default(),
                )
            } else {
                newton_line_search(&mut function, &mut x, &mut f, &mut dx, newton_settings, &mut NoLineSearch)
            };
            if let Some(err) = function.error.take() {
                return Err(SystemError::Assembly(err));
            }
            (result, function.stats)
        };

        let residual_norm = f.norm();
        let (converged, iterations) = match result {
            Ok(iterations) => (true, iterations),
            Err(NewtonError::MaximumIterationsReached(iterations)) if self.kind == SystemKind::Linear => {
                (true, iterations)
            }
            Err(NewtonError::MaximumIterationsReached(iterations)) => {
                warn!(
                    "System {}: Newton did not converge in {} iterations (residual norm {:e})",
                    self.name, iterations, residual_norm
                );
                (false, iterations)
            }
            Err(err) => return Err(SystemError::Newton(err)),
        };
        self.scatter(solution, &x);
        info!(
            "System {}: {} Newton iterations, residual norm {:e}",
            self.name, iterations, residual_norm
        );

        Ok(NonlinearOutcome {
            converged,
            iterations,
            residual_norm,
            linear: stats,
        })
    }
}

/// Prolongations of the whole system for every pair of consecutive levels.
fn system_prolongations(solution: &MultiLevelSolution, layout: &SystemLayout) -> Vec<CsrMatrix<f64>> {
    let mesh = solution.multilevel_mesh();
    (1..mesh.num_levels())
        .map(|level| {
            let (coarse, fine) = (mesh.level(level - 1), mesh.level(level));
            let blocks: Vec<CsrMatrix<f64>> = layout
                .fields()
                .iter()
                .map(|&field| prolongation(coarse, fine, mesh.parents(level), solution.fe_type(field)))
                .collect();
            let nrows = blocks.iter().map(CsrMatrix::nrows).sum::<usize>() + layout.num_global_variables();
            let ncols = blocks.iter().map(CsrMatrix::ncols).sum::<usize>() + layout.num_global_variables();
            let mut coo = CooMatrix::new(nrows, ncols);
            let (mut row_offset, mut col_offset) = (0, 0);
            for block in &blocks {
                for (i, j, &v) in block.triplet_iter() {
                    coo.push(row_offset + i, col_offset + j, v);
                }
                row_offset += block.nrows();
                col_offset += block.ncols();
            }
            for k in 0..layout.num_global_variables() {
                coo.push(row_offset + k, col_offset + k, 1.0);
            }
            debug_assert_eq!(
                row_offset,
                layout
                    .fields()
                    .iter()
                    .map(|&field| num_dofs(fine, solution.fe_type(field)))
                    .sum::<usize>()
            );
            CsrMatrix::from(&coo)
        })
        .collect()
}

/// The assembled residual as a vector function whose Jacobian systems are solved with the
/// configured linear solver. The Jacobian of the most recent evaluation is cached.
struct AssembledFunction<'a, R> {
    layout: &'a SystemLayout,
    solution: &'a MultiLevelSolution,
    assembler: &'a R,
    time: f64,
    dt: f64,
    settings: &'a SolverSettings,
    prolongations: &'a [CsrMatrix<f64>],
    jacobian: Option<CsrMatrix<f64>>,
    stats: Vec<LinearSolveStats>,
    error: Option<AssemblyError>,
}

impl<'a, R: ElementResidual> VectorFunction<f64> for AssembledFunction<'a, R> {
    fn dimension(&self) -> usize {
        self.layout.num_dofs()
    }

    fn eval_into(&mut self, f: &mut DVectorViewMut<f64>, x: &DVectorView<f64>) {
        let x = x.clone_owned();
        match assemble_system(self.layout, self.solution, self.assembler, &x, self.time, self.dt, true) {
            Ok(assembled) => {
                f.copy_from(&assembled.residual);
                self.jacobian = assembled.jacobian;
                self.error = None;
            }
            Err(err) => {
                f.fill(f64::NAN);
                self.jacobian = None;
                self.error = Some(err);
            }
        }
    }
}

impl<'a, R: ElementResidual> DifferentiableVectorFunction<f64> for AssembledFunction<'a, R> {
    fn solve_jacobian_system(
        &mut self,
        sol: &mut DVectorViewMut<f64>,
        _x: &DVectorView<f64>,
        rhs: &DVectorView<f64>,
    ) -> Result<(), Box<dyn Error>> {
        if let Some(err) = &self.error {
            return Err(Box::new(err.clone()));
        }
        let jacobian = self
            .jacobian
            .as_ref()
            .ok_or_else(|| Box::<dyn Error>::from("Jacobian has not been assembled."))?;
        let stats = solve_linear(jacobian, self.prolongations, self.settings, sol, rhs)?;
        debug!(
            "Linear solve: {} iterations, residual {:e} -> {:e}",
            stats.iterations, stats.initial_residual, stats.final_residual
        );
        self.stats.push(stats);
        Ok(())
    }
}

fn build_preconditioner(
    matrix: &CsrMatrix<f64>,
    prolongations: &[CsrMatrix<f64>],
    settings: &SolverSettings,
) -> Result<Box<dyn LinearOperator<f64>>, Box<dyn Error>> {
    Ok(match settings.linear.preconditioner {
        PreconditionerKind::None => Box::new(IdentityOperator),
        PreconditionerKind::Jacobi => Box::new(Jacobi::from_csr(matrix)?),
        PreconditionerKind::Ilu0 => Box::new(Ilu0::from_csr(matrix)?),
        PreconditionerKind::Multigrid => Box::new(Multigrid::new(
            matrix.clone(),
            prolongations,
            settings.multigrid.clone(),
        )?),
    })
}

fn stats_from_result(result: Result<KrylovOutput<f64>, SolveError<f64>>) -> LinearSolveStats {
    let (output, converged) = match result {
        Ok(output) => (output, true),
        Err(err) => {
            warn!("Linear solver did not converge: {}", err);
            (err.output, false)
        }
    };
    LinearSolveStats {
        iterations: output.num_iterations,
        initial_residual: output.initial_residual,
        final_residual: output.final_residual,
        converged,
    }
}

/// Solves `J sol = rhs`. Iterative solvers that fail to converge leave their best iterate in
/// `sol`, which is reported through the statistics rather than as an error.
fn solve_linear(
    matrix: &CsrMatrix<f64>,
    prolongations: &[CsrMatrix<f64>],
    settings: &SolverSettings,
    sol: &mut DVectorViewMut<f64>,
    rhs: &DVectorView<f64>,
) -> Result<LinearSolveStats, Box<dyn Error>> {
    let linear = &settings.linear;
    let tolerance = ResidualTolerance::relative(linear.tolerance).with_absolute(linear.absolute_tolerance);
    sol.fill(0.0);

    let stats = match linear.method {
        LinearMethod::Direct => {
            let lu = SparseLu::from_csr(matrix)?;
            sol.copy_from(rhs);
            lu.solve_in_place(DVectorViewMut::from(&mut *sol))?;
            let residual = rhs.clone_owned() - matrix * &sol.clone_owned();
            LinearSolveStats {
                iterations: 1,
                initial_residual: rhs.norm(),
                final_residual: residual.norm(),
                converged: true,
            }
        }
        LinearMethod::Gmres { restart } => {
            let preconditioner = build_preconditioner(matrix, prolongations, settings)?;
            let result = Gmres::new(restart)
                .with_operator(matrix)
                .with_preconditioner(&*preconditioner)
                .with_tolerance(tolerance)
                .with_max_iter(linear.max_iterations)
                .solve_with_guess(*rhs, DVectorViewMut::from(&mut *sol));
            stats_from_result(result)
        }
        LinearMethod::Cg => {
            let preconditioner = build_preconditioner(matrix, prolongations, settings)?;
            let result = ConjugateGradient::new()
                .with_operator(matrix)
                .with_preconditioner(&*preconditioner)
                .with_stopping_criterion(tolerance)
                .with_max_iter(linear.max_iterations)
                .solve_with_guess(*rhs, DVectorViewMut::from(&mut *sol));
            stats_from_result(result)
        }
        LinearMethod::Richardson { scale } => {
            let preconditioner = build_preconditioner(matrix, prolongations, settings)?;
            let mut x = DVector::zeros(sol.len());
            let result = Richardson::new(&*preconditioner, scale).solve(
                matrix,
                *rhs,
                &mut x,
                &tolerance,
                linear.max_iterations,
            );
            sol.copy_from(&x);
            stats_from_result(result)
        }
    };

    if sol.iter().any(|v| !v.is_finite()) {
        return Err(Box::from("Linear solver produced a non-finite correction."));
    }
    Ok(stats)
}
