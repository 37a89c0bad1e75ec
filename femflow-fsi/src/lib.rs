//! Monolithic arbitrary Lagrangian-Eulerian simulation of a venous valve: an incompressible
//! Navier-Stokes fluid coupled to incompressible hyperelastic vein walls and leaflets.
pub mod assembler;
pub mod boundary;
pub mod config;
pub mod convergence;
pub mod flux;
pub mod materials;
pub mod mesh_motion;
