//! Finite element building blocks for nonlinear multiphysics solvers: meshes with uniform
//! refinement hierarchies, Lagrange and discontinuous spaces, automatically differentiated
//! element residuals and Newton solvers preconditioned with geometric multigrid.
pub mod assembly;
pub mod boundary;
pub mod config;
pub mod element;
pub mod io;
pub mod mesh;
pub mod quadrature;
pub mod solution;
pub mod space;
pub mod system;
pub mod transient;

pub mod optimize {
    pub use femflow_optimize::*;
}

pub mod sparse {
    pub use femflow_sparse::*;
}

pub extern crate nalgebra;
pub extern crate nalgebra_sparse;
pub extern crate num_dual;
pub extern crate vtkio;
