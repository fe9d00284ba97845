//! Krylov solvers and two-level aggregation multigrid
//!
//! This crate provides Krylov solvers working on abstract fields and
//! operators, the aggregation coarsening that builds a Galerkin coarse
//! operator from near-null vectors, a two-level preconditioner around it, and
//! a thick-restart Lanczos eigensolver whose eigenpairs deflate coarse solves.
//!
//! # Features
//!
//! - **Iterative Solvers**: CG, Conjugate Residual, BiCGSTAB, preconditioned GCR
//! - **Coarsening**: block aggregation, Chebyshev-filtered subspaces, chirality split
//! - **Preconditioners**: two-level cycle, Chebyshev and MIRS smoothers, dense LU
//! - **Eigensolver**: implicitly restarted Lanczos, deflated initial guesses
//! - **Generic Scalar Types**: Works with Complex64, Complex32, f64, f32
//!
//! # Example
//!
//! ```ignore
//! use math_audio_multigrid::{
//!     AggregateMap, Aggregation, CoarsenedMatrix, DenseLu, GcrConfig, NonHermitianLinearOperator,
//!     OperatorFunction, PrecGeneralisedConjugateResidual, TwoLevelPreconditioner,
//! };
//!
//! let op = NonHermitianLinearOperator::new(&matrix);
//! let mut agg = Aggregation::new(AggregateMap::cartesian(&[16, 16], &[4, 4], 2)?, 8)?;
//! agg.create_subspace_random(&mut rng)?;
//! let coarse = CoarsenedMatrix::coarsen(&op, &agg)?;
//! let lu = DenseLu::from_coarse(&coarse)?;
//!
//! let mg = TwoLevelPreconditioner::new(&op, &agg, &smoother, &lu);
//! let outer = PrecGeneralisedConjugateResidual::non_hermitian(GcrConfig::default(), &mg)?;
//! let stats = outer.solve(&op, &rhs, &mut solution)?;
//! ```

pub mod aggregation;
pub mod blas_helpers;
pub mod chebyshev;
pub mod config;
pub mod direct;
pub mod eigen;
pub mod error;
pub mod guess;
pub mod iterative;
pub mod monitor;
pub mod operators;
pub mod parallel;
pub mod preconditioners;
pub mod sparse;
pub mod traits;

// Re-export main types
pub use error::{Result, SolverError};
pub use sparse::CsrMatrix;
pub use traits::{
    ComplexField, Field, GridTransfer, Guesser, Involution, LinearOperator, Preconditioner,
    SparseMatrix,
};

// Re-export iterative solvers
pub use iterative::{
    BiCgstab, ConjugateGradient, ConjugateResidual, GcrConfig, GcrVariant, KrylovConfig,
    OperatorFunction, PrecGeneralisedConjugateResidual, SolveStats,
};

// Re-export operator views
pub use operators::{
    DiagonalGrading, GradedHermitianOperator, HermitianLinearOperator, MdagMLinearOperator,
    NonHermitianLinearOperator, PVdagMLinearOperator, ShiftedMdagMLinearOperator,
};

// Re-export multigrid building blocks
pub use aggregation::{AggregateMap, Aggregation, CoarsenedMatrix, SubspaceParams};
pub use chebyshev::{Chebyshev, ChebyshevParams, FunctionHermOp, PlainHermOp};
pub use config::{MultigridSetup, SmootherConfig};
pub use direct::DenseLu;
pub use eigen::{EigenpairSet, ImplicitlyRestartedLanczos, LanczosConfig, SpectrumEnd};
pub use guess::{DeflatedGuesser, ZeroGuesser};
pub use monitor::{LogMonitor, SilentMonitor, SolverMonitor};
pub use preconditioners::{
    ChebyshevSmoother, IdentityPreconditioner, MirsSmoother, NormalEquations, SolverWrapper,
    TwoLevelPreconditioner,
};
