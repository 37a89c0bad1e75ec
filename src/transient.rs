//! Time stepping of implicit systems.
use crate::assembly::ElementResidual;
use crate::solution::MultiLevelSolution;
use crate::system::{ImplicitSystem, NonlinearOutcome, SystemError};
use log::info;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Returns the time step to take from the given time.
pub type TimeIntervalFn = Box<dyn Fn(f64) -> f64 + Send + Sync>;

#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeState {
    pub time: f64,
    pub dt: f64,
    /// Number of completed steps.
    pub step: usize,
}

pub struct TransientSystem {
    system: ImplicitSystem,
    state: TimeState,
    interval: Option<TimeIntervalFn>,
}

impl fmt::Debug for TransientSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransientSystem")
            .field("system", &self.system)
            .field("state", &self.state)
            .field("interval", &self.interval.is_some())
            .finish()
    }
}

impl TransientSystem {
    /// Wraps a system starting at time zero with a constant time step.
    pub fn new(system: ImplicitSystem, dt: f64) -> Self {
        Self {
            system,
            state: TimeState { time: 0.0, dt, step: 0 },
            interval: None,
        }
    }

    pub fn attach_time_interval(&mut self, interval: TimeIntervalFn) {
        self.interval = Some(interval);
    }

    pub fn system(&self) -> &ImplicitSystem {
        &self.system
    }

    pub fn system_mut(&mut self) -> &mut ImplicitSystem {
        &mut self.system
    }

    pub fn time_state(&self) -> TimeState {
        self.state
    }

    /// Sets the time and step counter, for instance when resuming from a restart file.
    pub fn set_time_state(&mut self, state: TimeState) {
        self.state = state;
    }

    pub fn time(&self) -> f64 {
        self.state.time
    }

    pub fn dt(&self) -> f64 {
        self.state.dt
    }

    /// Advances the time by one step and solves for the new state.
    ///
    /// Time dependent boundary conditions are evaluated at the new time. Old values are not
    /// touched, so callers store them with [`MultiLevelSolution::copy_solution_to_old`] first.
    pub fn solve_step<R: ElementResidual>(
        &mut self,
        solution: &mut MultiLevelSolution,
        assembler: &R,
    ) -> Result<NonlinearOutcome, SystemError> {
        let dt = match &self.interval {
            Some(interval) => interval(self.state.time),
            None => self.state.dt,
        };
        self.state.dt = dt;
        self.state.time += dt;
        self.state.step += 1;
        info!(
            "{}: step {} to time {} (dt = {})",
            self.system.name(),
            self.state.step,
            self.state.time,
            dt
        );

        solution.update_time_dependent_bdc(self.state.time);
        let time = self.state.time;
        self.system.solve_at(solution, assembler, time, dt)
    }
}
