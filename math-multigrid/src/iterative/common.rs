//! Configuration, statistics and bookkeeping shared by the Krylov solvers

use crate::blas_helpers::to_f64;
use crate::error::{Result, SolverError};
use crate::monitor::{IterationRecord, SolverMonitor};
use crate::traits::{ComplexField, Field, LinearOperator, RealOf};
use num_traits::{Float, FromPrimitive, One, Zero};
use serde::{Deserialize, Serialize};

/// Krylov solver configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KrylovConfig {
    /// Relative tolerance on ‖r‖/‖b‖
    pub tolerance: f64,
    /// Maximum number of iterations
    pub max_iterations: usize,
    /// Return `DidNotConverge` when the cap is hit; otherwise return the
    /// partial result with `converged = false`
    pub error_on_no_convergence: bool,
    /// Keep the per-iteration residuals in `SolveStats::history`
    pub record_history: bool,
}

impl Default for KrylovConfig {
    fn default() -> Self {
        Self {
            tolerance: 1e-8,
            max_iterations: 10_000,
            error_on_no_convergence: true,
            record_history: true,
        }
    }
}

impl KrylovConfig {
    pub fn new(tolerance: f64, max_iterations: usize) -> Self {
        Self {
            tolerance,
            max_iterations,
            ..Self::default()
        }
    }

    /// Fixed number of sweeps: zero tolerance, exhaustion is not an error
    pub fn smoother(sweeps: usize) -> Self {
        Self {
            tolerance: 0.0,
            max_iterations: sweeps,
            error_on_no_convergence: false,
            record_history: false,
        }
    }

    /// Inexact solve whose partial result is acceptable
    pub fn approximate(tolerance: f64, max_iterations: usize) -> Self {
        Self {
            tolerance,
            max_iterations,
            error_on_no_convergence: false,
            ..Self::default()
        }
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if !self.tolerance.is_finite() || self.tolerance < 0.0 {
            return Err(SolverError::invalid(format!(
                "tolerance must be finite and non-negative, got {}",
                self.tolerance
            )));
        }
        Ok(())
    }
}

/// Outcome of a solve
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SolveStats {
    /// Number of iterations performed
    pub iterations: usize,
    /// Final relative residual of the recurrence
    pub residual: f64,
    /// Relative residual ‖b - A x‖/‖b‖ recomputed on exit
    pub true_residual: Option<f64>,
    /// Whether the tolerance was reached
    pub converged: bool,
    /// Per-iteration residuals, when recorded
    pub history: Vec<IterationRecord>,
}

/// A solver of `A psi = src`, with `psi` holding the initial guess on entry
pub trait OperatorFunction<F: Field>: Send + Sync {
    fn solve<A: LinearOperator<F> + ?Sized>(&self, op: &A, src: &F, psi: &mut F)
    -> Result<SolveStats>;
}

/// Convergence bookkeeping for one solve
pub(crate) struct IterationLog<'a> {
    solver: &'static str,
    monitor: &'a dyn SolverMonitor,
    config: &'a KrylovConfig,
    src_norm: f64,
    history: Vec<IterationRecord>,
}

impl<'a> IterationLog<'a> {
    pub(crate) fn new<R: Float>(
        solver: &'static str,
        monitor: &'a dyn SolverMonitor,
        config: &'a KrylovConfig,
        src_norm2: R,
    ) -> Self {
        Self {
            solver,
            monitor,
            config,
            src_norm: to_f64(src_norm2).sqrt(),
            history: Vec::new(),
        }
    }

    /// Relative residual of a squared residual norm
    pub(crate) fn relative<R: Float>(&self, norm2: R) -> f64 {
        if self.src_norm > 0.0 {
            to_f64(norm2).sqrt() / self.src_norm
        } else {
            to_f64(norm2).sqrt()
        }
    }

    pub(crate) fn record<R: Float>(&mut self, iteration: usize, norm2: R) {
        let record = IterationRecord {
            iteration,
            residual: self.relative(norm2),
            target: self.config.tolerance,
        };
        self.monitor.iteration(self.solver, &record);
        if self.config.record_history {
            self.history.push(record);
        }
    }

    pub(crate) fn converged<R: Float>(
        self,
        iterations: usize,
        norm2: R,
        true_norm2: Option<R>,
    ) -> SolveStats {
        let stats = SolveStats {
            iterations,
            residual: self.relative(norm2),
            true_residual: true_norm2.map(|t| self.relative(t)),
            converged: true,
            history: self.history,
        };
        log::debug!(
            "{} converged after {} iterations, residual {:.3e}",
            self.solver,
            iterations,
            stats.residual
        );
        stats
    }

    /// Iteration cap exhausted
    pub(crate) fn exhausted<R: Float>(self, iterations: usize, norm2: R) -> Result<SolveStats> {
        let residual = self.relative(norm2);
        if self.config.error_on_no_convergence {
            return Err(SolverError::DidNotConverge {
                solver: self.solver.to_string(),
                iterations,
                residual,
                target: self.config.tolerance,
            });
        }
        log::debug!(
            "{} stopped after {} iterations, residual {:.3e}",
            self.solver,
            iterations,
            residual
        );
        Ok(SolveStats {
            iterations,
            residual,
            true_residual: None,
            converged: false,
            history: self.history,
        })
    }

    pub(crate) fn breakdown(&self, iteration: usize, quantity: &'static str) -> SolverError {
        SolverError::Breakdown {
            solver: self.solver.to_string(),
            iteration,
            quantity,
        }
    }
}

pub(crate) fn check_lengths<F: Field>(src: &F, psi: &F) -> Result<()> {
    if src.len() != psi.len() {
        return Err(SolverError::DimensionMismatch {
            expected: src.len(),
            got: psi.len(),
        });
    }
    Ok(())
}

/// Squared target `tol² ‖src‖²`
pub(crate) fn target_norm2<R: Float + FromPrimitive>(tolerance: f64, src_norm2: R) -> R {
    crate::blas_helpers::real::<R>(tolerance * tolerance) * src_norm2
}

/// A real denominator that must be non-zero and finite
pub(crate) fn usable<R: Float>(value: R) -> bool {
    value.is_finite() && value.abs() > R::zero()
}

/// A scalar denominator that must be non-zero and finite
pub(crate) fn usable_scalar<T: ComplexField>(value: T) -> bool {
    let n = value.norm_sqr();
    n.is_finite() && n > T::Real::zero()
}

/// ‖src - A psi‖², using `tmp` as scratch
pub(crate) fn true_residual<F, A>(op: &A, src: &F, psi: &F, tmp: &mut F) -> RealOf<F>
where
    F: Field,
    A: LinearOperator<F> + ?Sized,
{
    op.op(psi, tmp);
    tmp.scale_add(-F::Scalar::one(), src);
    tmp.norm2()
}
