//! Fine-grid smoothers of the two-level cycle
//!
//! Both act through the normal equations, `out ≈ (M†M)⁻¹ M† in`, so they
//! apply to non-Hermitian matrices. A fixed number of BiCGSTAB sweeps is the
//! third option, obtained by wrapping [`crate::iterative::BiCgstab`] with
//! [`KrylovConfig::smoother`] in a [`super::SolverWrapper`].

use crate::chebyshev::{Chebyshev, ChebyshevParams};
use crate::error::{Result, SolverError};
use crate::iterative::{ConjugateGradient, KrylovConfig, OperatorFunction};
use crate::operators::{MdagMLinearOperator, ShiftedMdagMLinearOperator};
use crate::traits::{Field, Preconditioner, SparseMatrix};

/// Chebyshev approximation of 1/x on `[lo, hi]` applied to M†M
pub struct ChebyshevSmoother<'a, M: ?Sized> {
    matrix: &'a M,
    poly: Chebyshev,
}

impl<'a, M: ?Sized> ChebyshevSmoother<'a, M> {
    /// `params.lo` must be positive; `params.hi` should bound the spectrum of M†M
    pub fn new(matrix: &'a M, params: &ChebyshevParams) -> Result<Self> {
        let poly = Chebyshev::inverse_approximation(params.lo, params.hi, params.order)?;
        Ok(Self { matrix, poly })
    }

    pub fn polynomial(&self) -> &Chebyshev {
        &self.poly
    }
}

impl<F, M> Preconditioner<F> for ChebyshevSmoother<'_, M>
where
    F: Field,
    M: SparseMatrix<F> + ?Sized,
{
    fn apply(&self, input: &F, out: &mut F) {
        let mut tmp = input.zeros_like();
        self.matrix.mdag(input, &mut tmp);
        let mdagm = MdagMLinearOperator::new(self.matrix);
        if let Err(err) = self.poly.apply(&mdagm, &tmp, out) {
            log::warn!("Chebyshev smoother failed: {}", err);
            out.set_zero();
        }
    }
}

/// Shifted normal equations `(M†M + σ) out = M† in` solved loosely with CG
pub struct MirsSmoother<'a, M: ?Sized> {
    matrix: &'a M,
    shift: f64,
    solver: ConjugateGradient,
}

impl<'a, M: ?Sized> MirsSmoother<'a, M> {
    pub fn new(matrix: &'a M, shift: f64, tolerance: f64, max_iterations: usize) -> Result<Self> {
        if !(shift >= 0.0) || !shift.is_finite() {
            return Err(SolverError::invalid(format!(
                "MIRS shift must be finite and non-negative, got {shift}"
            )));
        }
        Ok(Self {
            matrix,
            shift,
            solver: ConjugateGradient::with_config(KrylovConfig::approximate(
                tolerance,
                max_iterations,
            )),
        })
    }

    pub fn shift(&self) -> f64 {
        self.shift
    }
}

impl<F, M> Preconditioner<F> for MirsSmoother<'_, M>
where
    F: Field,
    M: SparseMatrix<F> + ?Sized,
{
    fn apply(&self, input: &F, out: &mut F) {
        let mut tmp = input.zeros_like();
        self.matrix.mdag(input, &mut tmp);
        out.set_zero();
        let shifted = ShiftedMdagMLinearOperator::new(self.matrix, self.shift);
        if let Err(err) = self.solver.solve(&shifted, &tmp, out) {
            log::warn!("MIRS smoother failed: {}", err);
        }
    }
}
