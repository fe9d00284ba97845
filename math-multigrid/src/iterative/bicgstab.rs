//! BiCGSTAB (Bi-Conjugate Gradient Stabilized) solver
//!
//! BiCGSTAB is a Krylov subspace method for non-Hermitian systems. Only `op`
//! is used. With a handful of iterations and zero tolerance it doubles as a
//! fixed-sweep smoother (see [`KrylovConfig::smoother`]).

use super::common::{
    IterationLog, KrylovConfig, OperatorFunction, SolveStats, check_lengths, target_norm2,
    true_residual, usable, usable_scalar,
};
use crate::error::Result;
use crate::monitor::{self, SolverMonitor};
use crate::traits::{ComplexField, Field, LinearOperator};
use num_traits::{Float, One, Zero};
use std::sync::Arc;

/// BiCGSTAB solver
#[derive(Clone)]
pub struct BiCgstab {
    config: KrylovConfig,
    monitor: Arc<dyn SolverMonitor>,
}

impl BiCgstab {
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

impl<F: Field> OperatorFunction<F> for BiCgstab {
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
        let mut log = IterationLog::new("BiCGSTAB", self.monitor.as_ref(), &self.config, ssq);

        let one = F::Scalar::one();
        let mut r = src.zeros_like();
        let mut v = src.zeros_like();
        let mut p = src.zeros_like();
        let mut s = src.zeros_like();
        let mut t = src.zeros_like();

        // r = src - A psi, shadow residual r̂ = r
        op.op(psi, &mut v);
        r.copy_from(src);
        let mut cp = r.axpy_norm(-one, &v);
        v.set_zero();
        if cp <= rsq {
            return Ok(log.converged(0, cp, Some(cp)));
        }
        let r_hat = r.clone();

        let mut rho = one;
        let mut alpha = one;
        let mut omega = one;

        for k in 1..=self.config.max_iterations {
            let rho_prev = rho;
            rho = r_hat.inner(&r);
            if !usable_scalar(rho) {
                return Err(log.breakdown(k, "<r_hat, r>"));
            }
            let beta = (rho / rho_prev) * (alpha / omega);

            // p = r + beta (p - omega v)
            p.axpy(-omega, &v);
            p.scale_add(beta, &r);

            op.op(&p, &mut v);
            let rhat_v = r_hat.inner(&v);
            if !usable_scalar(rhat_v) {
                return Err(log.breakdown(k, "<r_hat, A p>"));
            }
            alpha = rho / rhat_v;

            // s = r - alpha v
            s.copy_from(&r);
            let s_norm = s.axpy_norm(-alpha, &v);
            if s_norm <= rsq {
                psi.axpy(alpha, &p);
                log.record(k, s_norm);
                let true_norm2 = true_residual(op, src, psi, &mut t);
                return Ok(log.converged(k, s_norm, Some(true_norm2)));
            }

            op.op(&s, &mut t);
            let tt = t.norm2();
            if !usable(tt) {
                return Err(log.breakdown(k, "<A s, A s>"));
            }
            omega = t.inner(&s) * F::Scalar::from_real(tt.recip());

            psi.axpy(alpha, &p);
            psi.axpy(omega, &s);

            // r = s - omega t
            r.copy_from(&s);
            cp = r.axpy_norm(-omega, &t);
            log.record(k, cp);

            if cp <= rsq {
                let true_norm2 = true_residual(op, src, psi, &mut t);
                return Ok(log.converged(k, cp, Some(true_norm2)));
            }
            if !usable_scalar(omega) {
                return Err(log.breakdown(k, "omega"));
            }
        }

        log.exhausted(self.config.max_iterations, cp)
    }
}
