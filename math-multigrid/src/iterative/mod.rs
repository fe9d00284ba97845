//! Krylov solvers
//!
//! Every solver implements [`OperatorFunction`]: `solve(op, src, psi)` with
//! `psi` carrying the initial guess in and the solution out.
//! - [`ConjugateGradient`]: Hermitian positive definite operators
//! - [`ConjugateResidual`]: Hermitian, possibly indefinite operators
//! - [`BiCgstab`]: general operators, also used as a fixed-sweep smoother
//! - [`PrecGeneralisedConjugateResidual`]: flexible outer solver around a
//!   (multigrid) preconditioner

mod bicgstab;
mod cg;
mod common;
mod conjugate_residual;
mod gcr;

pub use bicgstab::BiCgstab;
pub use cg::ConjugateGradient;
pub use common::{KrylovConfig, OperatorFunction, SolveStats};
pub use conjugate_residual::ConjugateResidual;
pub use gcr::{GcrConfig, GcrVariant, PrecGeneralisedConjugateResidual};
