//! CG (Conjugate Gradient) solver
//!
//! The Conjugate Gradient method for Hermitian positive (semi-)definite
//! operators. `<p, A p>` comes out of the fused `herm_op_and_norm`, so each
//! iteration costs one operator application.

use super::common::{
    IterationLog, KrylovConfig, OperatorFunction, SolveStats, check_lengths, target_norm2,
    true_residual, usable,
};
use crate::error::Result;
use crate::monitor::{self, SolverMonitor};
use crate::traits::{ComplexField, Field, LinearOperator};
use num_traits::{One, Zero};
use std::sync::Arc;

/// Conjugate Gradient solver
#[derive(Clone)]
pub struct ConjugateGradient {
    config: KrylovConfig,
    monitor: Arc<dyn SolverMonitor>,
}

impl ConjugateGradient {
    pub fn new(tolerance: f64, max_iterations: usize) -> Self {
        Self::with_config(KrylovConfig::new(tolerance, max_iterations))
    }

    pub fn with_config(config: KrylovConfig) -> Self {
        Self {
            config,
            monitor: monitor::silent(),
        }
    }

    pub fn with_monitor(mut self, monitor: Arc<dyn SolverMonitor>) -> Self {
        self.monitor = monitor;
        self
    }

    pub fn config(&self) -> &KrylovConfig {
        &self.config
    }
}

impl<F: Field> OperatorFunction<F> for ConjugateGradient {
    fn solve<A: LinearOperator<F> + ?Sized>(
        &self,
        op: &A,
        src: &F,
        psi: &mut F,
    ) -> Result<SolveStats> {
        check_lengths(src, psi)?;
        self.config.validate()?;

        let ssq = src.norm2();
        if ssq.is_zero() {
            psi.set_zero();
            return Ok(SolveStats {
                converged: true,
                ..SolveStats::default()
            });
        }
        let rsq = target_norm2(self.config.tolerance, ssq);
        let mut log = IterationLog::new("CG", self.monitor.as_ref(), &self.config, ssq);

        let mut p = src.zeros_like();
        let mut mmp = src.zeros_like();
        let mut r = src.zeros_like();

        // r = src - A psi
        op.herm_op_and_norm(psi, &mut mmp)?;
        r.copy_from(src);
        let mut cp = r.axpy_norm(-F::Scalar::one(), &mmp);
        p.copy_from(&r);

        if cp <= rsq {
            return Ok(log.converged(0, cp, Some(cp)));
        }

        for k in 1..=self.config.max_iterations {
            let c = cp;
            let (d, _) = op.herm_op_and_norm(&p, &mut mmp)?;
            if !usable(d) {
                return Err(log.breakdown(k, "<p, A p>"));
            }
            let a = c / d;

            cp = r.axpy_norm(F::Scalar::from_real(-a), &mmp);
            let b = cp / c;

            psi.axpy(F::Scalar::from_real(a), &p);
            p.scale_add(F::Scalar::from_real(b), &r);

            log.record(k, cp);

            if cp <= rsq {
                let true_norm2 = true_residual(op, src, psi, &mut mmp);
                return Ok(log.converged(k, cp, Some(true_norm2)));
            }
        }

        log.exhausted(self.config.max_iterations, cp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SolverError;
    use crate::operators::{HermitianLinearOperator, NonHermitianLinearOperator};
    use crate::sparse::{CsrMatrix, laplacian_1d, wilson_2d};
    use approx::assert_relative_eq;
    use ndarray::{Array1, array};
    use num_complex::Complex64;

    #[test]
    fn test_cg_laplacian_1d() {
        let lap: CsrMatrix<f64> = laplacian_1d(64, 0.0).unwrap();
        let op = HermitianLinearOperator::new(&lap);
        let b = Array1::from_elem(64, 1.0);
        let mut x = b.zeros_like();

        let stats = ConjugateGradient::new(1e-8, 200).solve(&op, &b, &mut x).unwrap();

        assert!(stats.converged);
        let residual = &b - &lap.matvec(&x);
        assert!(residual.norm2().sqrt() < 1e-8 * b.norm2().sqrt());
        assert!(stats.true_residual.unwrap() < 1e-8);
        assert_eq!(stats.history.len(), stats.iterations);

        // Deterministic for a fixed operator and source
        let mut y = b.zeros_like();
        let again = ConjugateGradient::new(1e-8, 200).solve(&op, &b, &mut y).unwrap();
        assert_eq!(again.iterations, stats.iterations);
        assert_eq!(x, y);
    }

    #[test]
    fn test_cg_exact_in_n_steps_for_small_system() {
        let dense = array![[4.0_f64, 1.0], [1.0, 3.0]];
        let m = CsrMatrix::from_dense(&dense, 0.0);
        let op = HermitianLinearOperator::new(&m);
        let b = array![1.0, 2.0];
        let mut x = b.zeros_like();

        let stats = ConjugateGradient::new(1e-12, 10).solve(&op, &b, &mut x).unwrap();

        assert!(stats.iterations <= 2);
        assert_relative_eq!(x[0], 1.0 / 11.0, epsilon = 1e-10);
        assert_relative_eq!(x[1], 7.0 / 11.0, epsilon = 1e-10);
    }

    #[test]
    fn test_cg_uses_initial_guess() {
        let lap: CsrMatrix<Complex64> = laplacian_1d(16, 0.5).unwrap();
        let op = HermitianLinearOperator::new(&lap);
        let exact = Array1::from_shape_fn(16, |k| Complex64::new(k as f64, -(k as f64) * 0.5));
        let b = lap.matvec(&exact);
        let mut x = exact.clone();

        let stats = ConjugateGradient::new(1e-10, 100).solve(&op, &b, &mut x).unwrap();

        assert_eq!(stats.iterations, 0);
        assert_eq!(x, exact);
    }

    #[test]
    fn test_cg_zero_source() {
        let lap: CsrMatrix<f64> = laplacian_1d(8, 0.0).unwrap();
        let op = HermitianLinearOperator::new(&lap);
        let b = Array1::zeros(8);
        let mut x = Array1::from_elem(8, 3.0);
        let stats = ConjugateGradient::new(1e-8, 10).solve(&op, &b, &mut x).unwrap();
        assert!(stats.converged);
        assert_relative_eq!(x.norm2(), 0.0);
    }

    #[test]
    fn test_cg_reports_non_convergence() {
        let lap: CsrMatrix<f64> = laplacian_1d(64, 0.0).unwrap();
        let op = HermitianLinearOperator::new(&lap);
        let b = Array1::from_elem(64, 1.0);
        let mut x = b.zeros_like();

        let err = ConjugateGradient::new(1e-12, 3).solve(&op, &b, &mut x).unwrap_err();
        assert!(matches!(err, SolverError::DidNotConverge { iterations: 3, .. }));

        let mut x = b.zeros_like();
        let partial = ConjugateGradient::with_config(KrylovConfig::approximate(1e-12, 3))
            .solve(&op, &b, &mut x)
            .unwrap();
        assert!(!partial.converged);
        assert_eq!(partial.iterations, 3);
    }

    #[test]
    fn test_cg_rejects_non_hermitian_operator() {
        let dirac = wilson_2d(2, 2, 0.1, None).unwrap();
        let op = NonHermitianLinearOperator::new(&dirac);
        let b = Array1::from_elem(8, Complex64::new(1.0, 0.0));
        let mut x = b.zeros_like();
        let err = ConjugateGradient::new(1e-8, 10).solve(&op, &b, &mut x).unwrap_err();
        assert!(matches!(err, SolverError::Unsupported(_)));
    }

    #[test]
    fn test_cg_dimension_mismatch() {
        let lap: CsrMatrix<f64> = laplacian_1d(4, 0.0).unwrap();
        let op = HermitianLinearOperator::new(&lap);
        let b = Array1::from_elem(4, 1.0);
        let mut x = Array1::zeros(3);
        let err = ConjugateGradient::new(1e-8, 10).solve(&op, &b, &mut x).unwrap_err();
        assert!(matches!(err, SolverError::DimensionMismatch { expected: 4, got: 3 }));
    }
}
