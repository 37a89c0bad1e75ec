//! Output of solutions.
pub mod vtk;

pub use vtk::VtkWriter;
