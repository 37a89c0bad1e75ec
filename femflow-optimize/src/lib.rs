//! Nonlinear solvers used by femflow.

/// Vector function traits and finite difference approximations of derivatives
pub mod calculus;
/// The Newton method with optional line search
pub mod newton;
