//! Progress reporting for solvers and the multigrid cycle
//!
//! Solvers report per-iteration residuals and the two-level preconditioner
//! reports the duration of each of its phases. [`LogMonitor`] forwards both to
//! the `log` facade; [`SilentMonitor`] drops them.

use std::sync::Arc;
use std::time::Duration;

/// One entry of a convergence history
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IterationRecord {
    pub iteration: usize,
    /// Relative residual ‖r‖/‖b‖
    pub residual: f64,
    /// Relative residual the solver is aiming for
    pub target: f64,
}

/// Sink for solver progress
pub trait SolverMonitor: Send + Sync {
    fn iteration(&self, _solver: &str, _record: &IterationRecord) {}

    fn phase(&self, _level: usize, _label: &str, _elapsed: Duration) {}
}

/// Drops every report
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentMonitor;

impl SolverMonitor for SilentMonitor {}

/// Reports through the `log` facade
#[derive(Debug, Clone, Copy)]
pub struct LogMonitor {
    /// Log every N iterations (0 = only phases)
    pub print_interval: usize,
}

impl Default for LogMonitor {
    fn default() -> Self {
        Self { print_interval: 1 }
    }
}

impl SolverMonitor for LogMonitor {
    fn iteration(&self, solver: &str, record: &IterationRecord) {
        if self.print_interval > 0 && record.iteration % self.print_interval == 0 {
            log::info!(
                "{} iteration {}: residual {:.6e} target {:.6e}",
                solver,
                record.iteration,
                record.residual,
                record.target
            );
        }
    }

    fn phase(&self, level: usize, label: &str, elapsed: Duration) {
        log::info!(
            "Level {} {} took {:.3} ms",
            level,
            label,
            elapsed.as_secs_f64() * 1e3
        );
    }
}

/// Shared silent monitor, the default of every solver
pub fn silent() -> Arc<dyn SolverMonitor> {
    Arc::new(SilentMonitor)
}
