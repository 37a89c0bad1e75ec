//! Cell-wise residual assembly with Jacobians from forward-mode automatic differentiation.
use std::error::Error;
use std::fmt;

mod autodiff;
mod global;
mod local;

pub use autodiff::*;
pub use global::*;
pub use local::*;

#[derive(Debug, Clone, PartialEq)]
pub enum AssemblyError {
    DimensionMismatch { expected: usize, actual: usize },
    /// The residual of a cell is NaN or infinite, typically because the cell is inverted.
    NonFiniteResidual { cell: usize },
}

impl fmt::Display for AssemblyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DimensionMismatch { expected, actual } => {
                write!(f, "Unknown vector has length {}, expected {}.", actual, expected)
            }
            Self::NonFiniteResidual { cell } => write!(f, "Residual of cell {} is not finite.", cell),
        }
    }
}

impl Error for AssemblyError {}
