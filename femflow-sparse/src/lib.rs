//! Sparse linear algebra for femflow: Krylov solvers, preconditioners and geometric multigrid.
pub mod cg;
pub mod gmres;
pub mod lu;
pub mod multigrid;
pub mod operator;
pub mod preconditioner;

mod error;

pub use error::*;
pub use operator::{IdentityOperator, LinearOperator};
