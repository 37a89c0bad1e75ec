//! Curvature flows of closed triangulated surfaces.
//!
//! The surface is described by the displacement `Dx` of a fixed triangle mesh and carries its
//! mean curvature vector `Y` as an independent unknown. A time step solves the coupled
//! midpoint system for both, optionally under volume and area constraints, and then
//! reparametrizes the surface conformally to keep the triangles well shaped.
pub mod config;
pub mod conformal;
pub mod curvature;
pub mod energy;
pub mod fields;
pub mod flow;
pub mod surface;
