//! Direct solvers for small dense systems
//!
//! - [`DenseLu`]: LU with partial pivoting, the exact coarse-grid solver

mod lu;

pub use lu::DenseLu;
