//! Boundary condition callbacks.
use nalgebra::Point3;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Copy, Clone, PartialEq)]
pub enum BoundaryCondition {
    /// Prescribed value of the field.
    Dirichlet(f64),
    /// Natural condition with the given flux or traction value.
    Neumann(f64),
}

impl BoundaryCondition {
    pub fn is_dirichlet(&self) -> bool {
        matches!(self, Self::Dirichlet(_))
    }

    pub fn neumann_value(&self) -> Option<f64> {
        match self {
            Self::Neumann(value) => Some(*value),
            Self::Dirichlet(_) => None,
        }
    }
}

/// Arguments of a boundary condition callback.
#[derive(Debug, Clone, Copy)]
pub struct BoundaryQuery<'a> {
    pub x: &'a Point3<f64>,
    pub field: &'a str,
    /// Marker of the boundary edge.
    pub facename: i32,
    pub time: f64,
}

pub type BoundaryConditionFn = Arc<dyn Fn(&BoundaryQuery) -> BoundaryCondition + Send + Sync>;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BdcKind {
    /// Dirichlet values are computed once.
    Steady,
    /// Dirichlet values are recomputed whenever the time changes.
    TimeDependent,
}
