use std::error::Error;
use std::fmt;

/// Summary of an iterative solve.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq)]
pub struct KrylovOutput<T> {
    /// Number of updates made to the (initial) solution vector.
    pub num_iterations: usize,
    /// Norm of the residual of the initial guess.
    pub initial_residual: T,
    /// Norm of the (possibly approximate) residual on return.
    pub final_residual: T,
}

impl<T> KrylovOutput<T> {
    pub fn new(num_iterations: usize, initial_residual: T, final_residual: T) -> Self {
        Self {
            num_iterations,
            initial_residual,
            final_residual,
        }
    }
}

#[derive(Debug)]
#[non_exhaustive]
pub enum SolveErrorKind {
    OperatorError(Box<dyn Error>),
    PreconditionerError(Box<dyn Error>),
    StoppingCriterionError(Box<dyn Error>),
    IndefiniteOperator,
    IndefinitePreconditioner,
    SingularMatrix,
    /// A direct factorization failed.
    FactorizationError(String),
    MissingDiagonal { row: usize },
    DimensionMismatch,
    MaxIterationsReached { max_iter: usize },
}

impl fmt::Display for SolveErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OperatorError(err) => {
                write!(f, "Error applying operator: ")?;
                err.fmt(f)
            }
            Self::PreconditionerError(err) => {
                write!(f, "Error applying preconditioner: ")?;
                err.fmt(f)
            }
            Self::StoppingCriterionError(err) => {
                write!(f, "Error evaluating stopping criterion: ")?;
                err.fmt(f)
            }
            Self::IndefiniteOperator => write!(f, "Operator appears to be indefinite."),
            Self::IndefinitePreconditioner => write!(f, "Indefinite preconditioner."),
            Self::SingularMatrix => write!(f, "Matrix is singular."),
            Self::FactorizationError(msg) => write!(f, "Factorization failed: {}", msg),
            Self::MissingDiagonal { row } => write!(f, "Row {} has no diagonal entry in its sparsity pattern.", row),
            Self::DimensionMismatch => write!(f, "Operator dimensions are incompatible."),
            Self::MaxIterationsReached { max_iter } => {
                write!(f, "Max iterations ({}) reached.", max_iter)
            }
        }
    }
}

impl Error for SolveErrorKind {}

#[non_exhaustive]
#[derive(Debug)]
pub struct SolveError<T> {
    pub output: KrylovOutput<T>,
    pub kind: SolveErrorKind,
}

impl<T> SolveError<T> {
    pub fn new(output: KrylovOutput<T>, kind: SolveErrorKind) -> Self {
        Self { output, kind }
    }
}

impl<T> fmt::Display for SolveError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Iterative solve failed after {} iterations. Error: {}",
            self.output.num_iterations, self.kind
        )
    }
}

impl<T: fmt::Debug> Error for SolveError<T> {}
