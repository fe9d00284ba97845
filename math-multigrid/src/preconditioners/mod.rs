//! Preconditioners for the outer Krylov solve
//!
//! Preconditioners approximate A⁻¹ to accelerate convergence of iterative methods.
//!
//! # Available Preconditioners
//!
//! - **TwoLevelPreconditioner**: smoother plus aggregation coarse-grid correction
//! - **ChebyshevSmoother**: polynomial approximation of (M†M)⁻¹M†
//! - **MirsSmoother**: loose CG on the shifted normal equations
//! - **SolverWrapper** / **NormalEquations**: any Krylov solve as a linear function
//! - **DenseLu** (from [`crate::direct`]): exact coarse solve

mod hdcr;
mod smoothers;
mod wrappers;

pub use hdcr::TwoLevelPreconditioner;
pub use smoothers::{ChebyshevSmoother, MirsSmoother};
pub use wrappers::{NormalEquations, SolverWrapper};

// Re-export IdentityPreconditioner from traits
pub use crate::traits::IdentityPreconditioner;
