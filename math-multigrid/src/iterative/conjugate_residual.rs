//! Conjugate Residual solver
//!
//! Minimises ‖r‖ over the Krylov space of a Hermitian, possibly indefinite,
//! operator. Keeps `A r` and `A p` alongside `r` and `p` so that one
//! operator application per iteration suffices.

use super::common::{
    IterationLog, KrylovConfig, OperatorFunction, SolveStats, check_lengths, target_norm2,
    true_residual, usable,
};
use crate::error::Result;
use crate::monitor::{self, SolverMonitor};
use crate::traits::{ComplexField, Field, LinearOperator};
use num_traits::{One, Zero};
use std::sync::Arc;

/// Conjugate Residual solver
#[derive(Clone)]
pub struct ConjugateResidual {
    config: KrylovConfig,
    monitor: Arc<dyn SolverMonitor>,
}

impl ConjugateResidual {
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

impl<F: Field> OperatorFunction<F> for ConjugateResidual {
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
        let mut log = IterationLog::new(
            "ConjugateResidual",
            self.monitor.as_ref(),
            &self.config,
            ssq,
        );

        let mut p = src.zeros_like();
        let mut ap = src.zeros_like();
        let mut r = src.zeros_like();
        let mut ar = src.zeros_like();

        op.herm_op(psi, &mut ar)?;
        r.copy_from(src);
        let mut cp = r.axpy_norm(-F::Scalar::one(), &ar);
        if cp <= rsq {
            return Ok(log.converged(0, cp, Some(cp)));
        }

        p.copy_from(&r);
        let (mut r_ar, mut p_aap) = op.herm_op_and_norm(&p, &mut ap)?;
        ar.copy_from(&ap);

        for k in 1..=self.config.max_iterations {
            if !usable(p_aap) {
                return Err(log.breakdown(k, "<A p, A p>"));
            }
            let a = r_ar / p_aap;

            cp = r.axpy_norm(F::Scalar::from_real(-a), &ap);
            psi.axpy(F::Scalar::from_real(a), &p);
            log.record(k, cp);

            if cp <= rsq {
                let true_norm2 = true_residual(op, src, psi, &mut ar);
                return Ok(log.converged(k, cp, Some(true_norm2)));
            }

            let (r_ar_new, _) = op.herm_op_and_norm(&r, &mut ar)?;
            if !usable(r_ar) {
                return Err(log.breakdown(k, "<r, A r>"));
            }
            let b = r_ar_new / r_ar;
            r_ar = r_ar_new;

            p.scale_add(F::Scalar::from_real(b), &r);
            ap.scale_add(F::Scalar::from_real(b), &ar);
            p_aap = ap.norm2();
        }

        log.exhausted(self.config.max_iterations, cp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operators::{DiagonalGrading, GradedHermitianOperator, HermitianLinearOperator};
    use crate::sparse::{CsrMatrix, laplacian_1d, wilson_2d};
    use ndarray::Array1;
    use num_complex::Complex64;

    #[test]
    fn test_cr_recurrence_and_true_residual_agree() {
        let lap: CsrMatrix<f64> = laplacian_1d(48, 0.1).unwrap();
        let op = HermitianLinearOperator::new(&lap);
        let b = Array1::from_shape_fn(48, |k| (k as f64 * 0.37).sin() + 0.5);
        let mut x = b.zeros_like();

        let stats = ConjugateResidual::new(1e-9, 500).solve(&op, &b, &mut x).unwrap();

        assert!(stats.converged);
        let true_residual = stats.true_residual.unwrap();
        assert!(true_residual < 1e-8);
        assert!((true_residual - stats.residual).abs() < 1e-8);
    }

    #[test]
    fn test_cr_on_indefinite_graded_operator() {
        // σ₃ D is Hermitian but indefinite
        let dirac = wilson_2d(4, 4, 0.3, None).unwrap();
        let gamma = DiagonalGrading::new(vec![1, -1]).unwrap();
        let op = GradedHermitianOperator::new(&dirac, &gamma);
        let b = Array1::from_shape_fn(32, |k| Complex64::new(1.0, k as f64 * 0.1));
        let mut x = b.zeros_like();

        let stats = ConjugateResidual::new(1e-8, 1000).solve(&op, &b, &mut x).unwrap();

        assert!(stats.converged);
        assert!(stats.true_residual.unwrap() < 1e-7);
    }

    #[test]
    fn test_cr_uses_initial_guess() {
        let lap: CsrMatrix<f64> = laplacian_1d(200, 0.05).unwrap();
        let op = HermitianLinearOperator::new(&lap);
        let b = Array1::from_elem(200, 1.0);

        let mut cold = b.zeros_like();
        let cold_stats = ConjugateResidual::new(1e-10, 1000).solve(&op, &b, &mut cold).unwrap();

        // Restart from a slightly perturbed converged solution
        let mut warm = cold.mapv(|v| v * (1.0 + 1e-6));
        let warm_stats = ConjugateResidual::new(1e-10, 1000).solve(&op, &b, &mut warm).unwrap();

        assert!(warm_stats.converged);
        assert!(warm_stats.iterations < cold_stats.iterations);
    }
}
