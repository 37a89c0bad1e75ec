use nalgebra::RealField;

pub use nalgebra;

/// Real scalar types usable by the solvers in the femflow crates.
pub trait Real: RealField + Copy {}

impl<T: RealField + Copy> Real for T {}

