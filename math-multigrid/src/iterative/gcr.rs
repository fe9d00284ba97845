//! Preconditioned Generalised Conjugate Residual solver
//!
//! Flexible: the preconditioner may change between applications (an inner
//! Krylov solve or a multigrid cycle). The outer loop runs restart cycles of
//! `nstep` inner steps. Each step orthogonalises `A z` against at most
//! `mmax - 1` of the previous directions, kept in a circular buffer.

use super::common::{
    IterationLog, KrylovConfig, OperatorFunction, SolveStats, check_lengths, target_norm2,
    true_residual, usable,
};
use crate::error::{Result, SolverError};
use crate::monitor::{self, SolverMonitor};
use crate::traits::{ComplexField, Field, LinearOperator, Preconditioner, RealOf};
use num_traits::{Float, One, Zero};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Which operator product the solver uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GcrVariant {
    /// `herm_op`, real orthogonalisation coefficients
    Hermitian,
    /// `op`, complex orthogonalisation coefficients
    NonHermitian,
}

/// PGCR configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GcrConfig {
    /// Tolerance and restart-cycle cap
    #[serde(flatten)]
    pub krylov: KrylovConfig,
    /// Length of the direction history
    pub mmax: usize,
    /// Inner steps per restart cycle
    pub nstep: usize,
}

impl Default for GcrConfig {
    fn default() -> Self {
        Self {
            krylov: KrylovConfig::new(1e-8, 100),
            mmax: 16,
            nstep: 16,
        }
    }
}

impl GcrConfig {
    pub fn new(tolerance: f64, max_cycles: usize, mmax: usize, nstep: usize) -> Self {
        Self {
            krylov: KrylovConfig::new(tolerance, max_cycles),
            mmax,
            nstep,
        }
    }
}

/// Preconditioned GCR with a truncated direction history
pub struct PrecGeneralisedConjugateResidual<P> {
    config: GcrConfig,
    variant: GcrVariant,
    preconditioner: P,
    monitor: Arc<dyn SolverMonitor>,
}

struct Directions<F: Field> {
    p: Vec<F>,
    q: Vec<F>,
    qq: Vec<RealOf<F>>,
}

impl<P> PrecGeneralisedConjugateResidual<P> {
    pub fn new(config: GcrConfig, variant: GcrVariant, preconditioner: P) -> Result<Self> {
        if config.mmax == 0 || config.nstep == 0 {
            return Err(SolverError::invalid("PGCR needs mmax >= 1 and nstep >= 1"));
        }
        config.krylov.validate()?;
        Ok(Self {
            config,
            variant,
            preconditioner,
            monitor: monitor::silent(),
        })
    }

    /// Hermitian variant
    pub fn hermitian(config: GcrConfig, preconditioner: P) -> Result<Self> {
        Self::new(config, GcrVariant::Hermitian, preconditioner)
    }

    /// Non-Hermitian variant
    pub fn non_hermitian(config: GcrConfig, preconditioner: P) -> Result<Self> {
        Self::new(config, GcrVariant::NonHermitian, preconditioner)
    }

    pub fn with_monitor(mut self, monitor: Arc<dyn SolverMonitor>) -> Self {
        self.monitor = monitor;
        self
    }

    pub fn config(&self) -> &GcrConfig {
        &self.config
    }

    pub fn variant(&self) -> GcrVariant {
        self.variant
    }

    pub fn preconditioner(&self) -> &P {
        &self.preconditioner
    }

    fn apply<F, A>(&self, op: &A, input: &F, out: &mut F) -> Result<()>
    where
        F: Field,
        A: LinearOperator<F> + ?Sized,
    {
        match self.variant {
            GcrVariant::Hermitian => op.herm_op(input, out),
            GcrVariant::NonHermitian => {
                op.op(input, out);
                Ok(())
            }
        }
    }
}

impl<F, P> OperatorFunction<F> for PrecGeneralisedConjugateResidual<P>
where
    F: Field,
    P: Preconditioner<F>,
{
    fn solve<A: LinearOperator<F> + ?Sized>(
        &self,
        op: &A,
        src: &F,
        psi: &mut F,
    ) -> Result<SolveStats> {
        check_lengths(src, psi)?;

        let ssq = src.norm2();
        if ssq.is_zero() {
            psi.set_zero();
            return Ok(SolveStats {
                converged: true,
                ..SolveStats::default()
            });
        }
        let krylov = &self.config.krylov;
        let rsq = target_norm2(krylov.tolerance, ssq);
        let mut log = IterationLog::new("PGCR", self.monitor.as_ref(), krylov, ssq);

        let mmax = self.config.mmax;
        let mut dirs = Directions {
            p: vec![src.zeros_like(); mmax],
            q: vec![src.zeros_like(); mmax],
            qq: vec![RealOf::<F>::zero(); mmax],
        };
        let mut r = src.zeros_like();
        let mut z = src.zeros_like();
        let mut az = src.zeros_like();

        let mut steps = 0;
        let mut cp = RealOf::<F>::zero();

        for cycle in 0..krylov.max_iterations {
            // True residual at the start of each restart cycle
            self.apply(op, psi, &mut az)?;
            r.copy_from(src);
            cp = r.axpy_norm(-F::Scalar::one(), &az);
            if cp <= rsq {
                return Ok(log.converged(steps, cp, Some(cp)));
            }
            log::debug!("PGCR cycle {}: residual {:.3e}", cycle, log.relative(cp));

            for k in 0..self.config.nstep {
                steps += 1;
                self.preconditioner.apply(&r, &mut z);
                self.apply(op, &z, &mut az)?;

                let slot = k % mmax;
                dirs.p[slot].copy_from(&z);
                dirs.q[slot].copy_from(&az);

                let northog = k.min(mmax - 1);
                for back in 1..=northog {
                    let prev = (k - back) % mmax;
                    let (lo, hi) = (slot.min(prev), slot.max(prev));
                    let (head, tail) = dirs.q.split_at_mut(hi);
                    let (q_new, q_prev) = if slot == lo {
                        (&mut head[lo], &tail[0])
                    } else {
                        (&mut tail[0], &head[lo])
                    };
                    let mut b = q_prev.inner(q_new) * F::Scalar::from_real(dirs.qq[prev].recip());
                    if self.variant == GcrVariant::Hermitian {
                        b = F::Scalar::from_real(b.re());
                    }
                    q_new.axpy(-b, q_prev);

                    let (head, tail) = dirs.p.split_at_mut(hi);
                    let (p_new, p_prev) = if slot == lo {
                        (&mut head[lo], &tail[0])
                    } else {
                        (&mut tail[0], &head[lo])
                    };
                    p_new.axpy(-b, p_prev);
                }

                let qq = dirs.q[slot].norm2();
                if !usable(qq) {
                    return Err(log.breakdown(steps, "<A z, A z>"));
                }
                dirs.qq[slot] = qq;

                let a = dirs.q[slot].inner(&r) * F::Scalar::from_real(qq.recip());
                psi.axpy(a, &dirs.p[slot]);
                cp = r.axpy_norm(-a, &dirs.q[slot]);
                log.record(steps, cp);

                if cp <= rsq {
                    let true_norm2 = true_residual(op, src, psi, &mut az);
                    return Ok(log.converged(steps, cp, Some(true_norm2)));
                }
            }
        }

        log.exhausted(steps, cp)
    }
}
