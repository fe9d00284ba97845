//! Two-level aggregation preconditioner
//!
//! One application is a pre-smoothing, a coarse-grid correction of the fine
//! residual and a post-smoothing:
//!
//! ```text
//! out  = S in
//! r    = in - A out
//! out += P Ac⁻¹ P† r
//! r    = in - A out
//! out += S r
//! ```
//!
//! The coarse solve is any [`Preconditioner`] on the coarse field, so another
//! two-level preconditioner over the coarse operator can be nested there.

use crate::monitor::{self, SolverMonitor};
use crate::traits::{Field, GridTransfer, LinearOperator, Preconditioner};
use num_traits::One;
use std::sync::Arc;
use std::time::Instant;

pub struct TwoLevelPreconditioner<'a, A: ?Sized, G: ?Sized, S, CS> {
    fine: &'a A,
    transfer: &'a G,
    smoother: S,
    coarse_solver: CS,
    level: usize,
    monitor: Arc<dyn SolverMonitor>,
}

impl<'a, A: ?Sized, G: ?Sized, S, CS> TwoLevelPreconditioner<'a, A, G, S, CS> {
    pub fn new(fine: &'a A, transfer: &'a G, smoother: S, coarse_solver: CS) -> Self {
        Self {
            fine,
            transfer,
            smoother,
            coarse_solver,
            level: 0,
            monitor: monitor::silent(),
        }
    }

    /// Level index used in phase reports
    pub fn with_level(mut self, level: usize) -> Self {
        self.level = level;
        self
    }

    pub fn with_monitor(mut self, monitor: Arc<dyn SolverMonitor>) -> Self {
        self.monitor = monitor;
        self
    }

    pub fn level(&self) -> usize {
        self.level
    }

    pub fn smoother(&self) -> &S {
        &self.smoother
    }

    pub fn coarse_solver(&self) -> &CS {
        &self.coarse_solver
    }
}

impl<F, A, G, S, CS> Preconditioner<F> for TwoLevelPreconditioner<'_, A, G, S, CS>
where
    F: Field,
    A: LinearOperator<F> + ?Sized,
    G: GridTransfer<F> + ?Sized,
    S: Preconditioner<F>,
    CS: Preconditioner<G::Coarse>,
{
    fn apply(&self, input: &F, out: &mut F) {
        let one = F::Scalar::one();
        let mut clock = Instant::now();
        let lap = |label: &str, clock: &mut Instant| {
            self.monitor.phase(self.level, label, clock.elapsed());
            *clock = Instant::now();
        };
        let total = Instant::now();

        self.smoother.apply(input, out);
        lap("pre-smoother", &mut clock);

        let mut r = input.zeros_like();
        self.fine.op(out, &mut r);
        r.scale_add(-one, input);
        lap("residual", &mut clock);

        let mut coarse_src = self.transfer.coarse_zeros();
        self.transfer.project(&r, &mut coarse_src);
        lap("project", &mut clock);

        let mut coarse_sol = coarse_src.zeros_like();
        self.coarse_solver.apply(&coarse_src, &mut coarse_sol);
        lap("coarse solve", &mut clock);

        let mut correction = input.zeros_like();
        self.transfer.promote(&coarse_sol, &mut correction);
        out.axpy(one, &correction);
        lap("promote", &mut clock);

        self.fine.op(out, &mut r);
        r.scale_add(-one, input);
        lap("residual", &mut clock);

        self.smoother.apply(&r, &mut correction);
        out.axpy(one, &correction);
        lap("post-smoother", &mut clock);

        log::debug!(
            "Level {} two-level cycle took {:.3} ms",
            self.level,
            total.elapsed().as_secs_f64() * 1e3
        );
    }
}
