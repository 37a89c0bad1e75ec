//! Uncertainty quantification for diffusion with a log-normal random coefficient.
//!
//! The random field is represented by a truncated Karhunen-Loeve expansion, the solution by a
//! polynomial chaos expansion in multivariate Hermite polynomials. The coefficients are
//! computed with a stochastic Galerkin method, and the statistics of a scalar quantity of
//! interest follow from the chaos coefficients.
pub mod config;
pub mod expansion;
pub mod galerkin;
pub mod hermite;
pub mod index_set;
pub mod karhunen_loeve;
pub mod statistics;
