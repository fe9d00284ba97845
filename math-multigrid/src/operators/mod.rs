//! Operator views and gradings
//!
//! A [`crate::traits::SparseMatrix`] only knows `M` and `M†`. The views here
//! turn it into the [`crate::traits::LinearOperator`] a solver needs: M†M for
//! normal equations, the matrix itself when it is Hermitian or not, PV†M, or a
//! graded ΓM.

mod grading;
mod views;

pub use grading::DiagonalGrading;
pub use views::{
    GradedHermitianOperator, HermitianLinearOperator, MdagMLinearOperator,
    NonHermitianLinearOperator, PVdagMLinearOperator, ShiftedMdagMLinearOperator, adjoint_defect,
};
