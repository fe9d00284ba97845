//! Implicitly restarted (thick-restart) Lanczos
//!
//! The Krylov basis grows to `nm` vectors with full re-orthogonalisation. The
//! projected matrix is diagonalised, the best `nk` Ritz vectors are kept and
//! the basis is extended again from them. After a restart the projected
//! matrix is diagonal in the kept block with an arrow row coupling it to the
//! residual direction, tridiagonal beyond.
//!
//! The driving operator (possibly a polynomial filter) selects which end of
//! the spectrum converges; the checking operator measures true Ritz
//! residuals and supplies the reported eigenvalues.

use super::dense::symmetric_eigen;
use crate::blas_helpers::{real, scalar, to_f64};
use crate::error::{Result, SolverError};
use crate::monitor::{self, IterationRecord, SolverMonitor};
use crate::traits::{ComplexField, Field, LinearOperator, RealOf};
use ndarray::{Array1, Array2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// End of the driving operator's spectrum Lanczos converges to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpectrumEnd {
    Smallest,
    Largest,
}

/// Lanczos configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LanczosConfig {
    /// Number of converged pairs required to stop
    pub nstop: usize,
    /// Ritz vectors kept across a restart
    pub nk: usize,
    /// Maximum basis size
    pub nm: usize,
    /// Relative Ritz residual `‖A v - λ v‖ / max(|λ|, 1)` accepted as converged
    pub residual_tolerance: f64,
    pub max_restarts: usize,
    pub target: SpectrumEnd,
    /// Seed of the random vectors used after an invariant subspace is found
    pub seed: u64,
}

impl Default for LanczosConfig {
    fn default() -> Self {
        Self {
            nstop: 24,
            nk: 24,
            nm: 36,
            residual_tolerance: 1e-3,
            max_restarts: 20,
            target: SpectrumEnd::Largest,
            seed: 17,
        }
    }
}

impl LanczosConfig {
    pub fn new(nstop: usize, nk: usize, nm: usize, target: SpectrumEnd) -> Self {
        Self {
            nstop,
            nk,
            nm,
            target,
            ..Self::default()
        }
    }

    fn validate(&self, dim: usize) -> Result<()> {
        if self.nstop == 0 || self.nstop > self.nk || self.nk >= self.nm {
            return Err(SolverError::invalid(format!(
                "Lanczos needs 1 <= nstop <= nk < nm, got nstop={} nk={} nm={}",
                self.nstop, self.nk, self.nm
            )));
        }
        if self.nm > dim {
            return Err(SolverError::invalid(format!(
                "Lanczos basis size nm={} exceeds the dimension {}",
                self.nm, dim
            )));
        }
        if !(self.residual_tolerance > 0.0) || !self.residual_tolerance.is_finite() {
            return Err(SolverError::invalid("Lanczos residual tolerance must be positive"));
        }
        Ok(())
    }
}

/// One Ritz pair
#[derive(Debug, Clone)]
pub struct Eigenpair<F: Field> {
    /// Rayleigh quotient with the checking operator
    pub value: RealOf<F>,
    pub vector: F,
    /// ‖A v - λ v‖
    pub residual: f64,
    pub converged: bool,
}

/// Ritz pairs in the order the driving operator ranks them
#[derive(Debug, Clone)]
pub struct EigenpairSet<F: Field> {
    pairs: Vec<Eigenpair<F>>,
    restarts: usize,
}

impl<F: Field> EigenpairSet<F> {
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Eigenpair<F>> {
        self.pairs.iter()
    }

    pub fn get(&self, index: usize) -> Option<&Eigenpair<F>> {
        self.pairs.get(index)
    }

    pub fn values(&self) -> Vec<RealOf<F>> {
        self.pairs.iter().map(|p| p.value).collect()
    }

    pub fn converged_count(&self) -> usize {
        self.pairs.iter().filter(|p| p.converged).count()
    }

    /// Restarts performed before convergence
    pub fn restarts(&self) -> usize {
        self.restarts
    }
}

impl<'s, F: Field> IntoIterator for &'s EigenpairSet<F> {
    type Item = &'s Eigenpair<F>;
    type IntoIter = std::slice::Iter<'s, Eigenpair<F>>;

    fn into_iter(self) -> Self::IntoIter {
        self.pairs.iter()
    }
}

pub struct ImplicitlyRestartedLanczos<'a, A: ?Sized, B: ?Sized> {
    drive: &'a A,
    check: &'a B,
    config: LanczosConfig,
    monitor: Arc<dyn SolverMonitor>,
}

struct RitzCheck<T: ComplexField> {
    vector: Array1<T>,
    value: f64,
    residual: f64,
    converged: bool,
}

impl<'a, A: ?Sized, B: ?Sized> ImplicitlyRestartedLanczos<'a, A, B> {
    /// `drive` builds the Krylov space, `check` verifies the Ritz pairs
    pub fn new(drive: &'a A, check: &'a B, config: LanczosConfig) -> Self {
        Self {
            drive,
            check,
            config,
            monitor: monitor::silent(),
        }
    }

    pub fn with_monitor(mut self, monitor: Arc<dyn SolverMonitor>) -> Self {
        self.monitor = monitor;
        self
    }

    pub fn config(&self) -> &LanczosConfig {
        &self.config
    }

    pub fn compute<T>(&self, start: &Array1<T>) -> Result<EigenpairSet<Array1<T>>>
    where
        T: ComplexField,
        A: LinearOperator<Array1<T>>,
        B: LinearOperator<Array1<T>>,
    {
        let cfg = &self.config;
        cfg.validate(start.len())?;
        if !self.drive.is_hermitian() || !self.check.is_hermitian() {
            return Err(SolverError::Unsupported("Lanczos on a non-Hermitian operator"));
        }
        let (nk, nm) = (cfg.nk, cfg.nm);
        let mut rng = StdRng::seed_from_u64(cfg.seed);

        let start_norm = to_f64(start.norm2()).sqrt();
        if !(start_norm > 0.0) || !start_norm.is_finite() {
            return Err(SolverError::invalid("Lanczos start vector must be non-zero"));
        }
        let mut v0 = start.clone();
        v0.scale(scalar(start_norm.recip()));

        let mut basis: Vec<Array1<T>> = Vec::with_capacity(nm + 1);
        basis.push(v0);
        let mut tmat = Array2::<f64>::zeros((nm, nm));
        let mut kept = 0;
        let mut w = start.zeros_like();
        let mut restart = 0;

        loop {
            let beta_last = self.extend(&mut basis, &mut tmat, kept, &mut w, &mut rng)?;

            let (theta, s) = symmetric_eigen(&tmat)?;
            let wanted: Vec<usize> = match cfg.target {
                SpectrumEnd::Smallest => (0..nm).collect(),
                SpectrumEnd::Largest => (0..nm).rev().collect(),
            };

            let checks: Vec<RitzCheck<T>> = wanted[..nk]
                .iter()
                .map(|&idx| self.ritz_pair(&basis[..nm], &s, idx, &mut w))
                .collect();
            let nconv = checks.iter().filter(|c| c.converged).count();
            let worst = checks[..cfg.nstop]
                .iter()
                .map(|c| c.residual / c.value.abs().max(1.0))
                .fold(0.0_f64, f64::max);

            self.monitor.iteration(
                "IRL",
                &IterationRecord {
                    iteration: restart,
                    residual: worst,
                    target: cfg.residual_tolerance,
                },
            );
            log::debug!(
                "IRL restart {}: {} of {} wanted pairs converged",
                restart,
                nconv,
                nk
            );

            if nconv >= cfg.nstop {
                log::info!(
                    "IRL converged after {} restarts with {} pairs",
                    restart,
                    nconv
                );
                let pairs = checks
                    .into_iter()
                    .map(|c| Eigenpair {
                        value: real::<RealOf<Array1<T>>>(c.value),
                        vector: c.vector,
                        residual: c.residual,
                        converged: c.converged,
                    })
                    .collect();
                return Ok(EigenpairSet {
                    pairs,
                    restarts: restart,
                });
            }
            if restart == cfg.max_restarts {
                return Err(SolverError::DidNotConverge {
                    solver: "IRL".to_string(),
                    iterations: restart,
                    residual: worst,
                    target: cfg.residual_tolerance,
                });
            }
            restart += 1;

            // Thick restart: kept Ritz vectors, then the residual direction
            let residual_direction = basis.swap_remove(nm);
            basis.clear();
            tmat.fill(0.0);
            for (i, (check, &idx)) in checks.into_iter().zip(&wanted).enumerate() {
                basis.push(check.vector);
                tmat[[i, i]] = theta[idx];
                let arrow = beta_last * s[[nm - 1, idx]];
                tmat[[i, nk]] = arrow;
                tmat[[nk, i]] = arrow;
            }
            if to_f64(residual_direction.norm2()) > 0.0 {
                basis.push(residual_direction);
            } else {
                basis.push(random_orthogonal(&basis, &mut rng, nm)?);
            }
            kept = nk;
        }
    }

    /// Grow the basis from `kept + 1` to `nm + 1` vectors, filling the
    /// projected matrix; returns the coupling to the last direction
    fn extend<T>(
        &self,
        basis: &mut Vec<Array1<T>>,
        tmat: &mut Array2<f64>,
        kept: usize,
        w: &mut Array1<T>,
        rng: &mut StdRng,
    ) -> Result<f64>
    where
        T: ComplexField,
        A: LinearOperator<Array1<T>>,
    {
        let nm = tmat.nrows();
        let mut beta = 0.0;
        for j in kept..nm {
            self.drive.op(&basis[j], w);
            let alpha = to_f64(basis[j].inner(w).re());
            tmat[[j, j]] = alpha;
            reorthogonalise(basis, w);

            let scale = alpha.abs() + beta;
            beta = to_f64(w.norm2()).sqrt();
            let next = if beta > 1e-12 * scale {
                let mut v = w.clone();
                v.scale(scalar(beta.recip()));
                v
            } else if basis.len() < w.len() {
                log::debug!("Lanczos found an invariant subspace at step {}", j);
                beta = 0.0;
                random_orthogonal(basis, rng, j)?
            } else {
                // The basis spans the whole space
                beta = 0.0;
                w.zeros_like()
            };
            if j + 1 < nm {
                tmat[[j, j + 1]] = beta;
                tmat[[j + 1, j]] = beta;
            }
            basis.push(next);
        }
        Ok(beta)
    }

    fn ritz_pair<T>(
        &self,
        basis: &[Array1<T>],
        s: &Array2<f64>,
        idx: usize,
        w: &mut Array1<T>,
    ) -> RitzCheck<T>
    where
        T: ComplexField,
        B: LinearOperator<Array1<T>>,
    {
        let mut y = basis[0].zeros_like();
        for (j, v) in basis.iter().enumerate() {
            y.axpy(scalar(s[[j, idx]]), v);
        }
        let norm = to_f64(y.norm2()).sqrt();
        if norm > 0.0 {
            y.scale(scalar(norm.recip()));
        }

        self.check.op(&y, w);
        let value = to_f64(y.inner(w).re());
        w.axpy(scalar(-value), &y);
        let residual = to_f64(w.norm2()).sqrt();
        RitzCheck {
            converged: residual <= self.config.residual_tolerance * value.abs().max(1.0),
            vector: y,
            value,
            residual,
        }
    }
}

/// Two passes of classical Gram-Schmidt against the whole basis
fn reorthogonalise<T: ComplexField>(basis: &[Array1<T>], w: &mut Array1<T>) {
    for _pass in 0..2 {
        for v in basis {
            let c = v.inner(w);
            w.axpy(-c, v);
        }
    }
}

fn random_orthogonal<T: ComplexField>(
    basis: &[Array1<T>],
    rng: &mut StdRng,
    iteration: usize,
) -> Result<Array1<T>> {
    let mut v = Array1::from_shape_fn(basis[0].len(), |_| {
        let re = rng.random::<f64>() - 0.5;
        let im = rng.random::<f64>() - 0.5;
        T::from_re_im(real(re), real(im))
    });
    reorthogonalise(basis, &mut v);
    let norm = to_f64(v.norm2()).sqrt();
    if !(norm > 1e-10) {
        return Err(SolverError::Breakdown {
            solver: "IRL".to_string(),
            iteration,
            quantity: "restart vector",
        });
    }
    v.scale(scalar(norm.recip()));
    Ok(v)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chebyshev::{Chebyshev, FunctionHermOp, PlainHermOp};
    use crate::operators::{HermitianLinearOperator, NonHermitianLinearOperator};
    use crate::sparse::{CsrMatrix, laplacian_1d, wilson_2d};
    use approx::assert_relative_eq;
    use num_complex::Complex64;

    fn diagonal(n: usize) -> CsrMatrix<f64> {
        CsrMatrix::from_diagonal(&Array1::from_shape_fn(n, |i| (i + 1) as f64))
    }

    #[test]
    fn test_smallest_of_diagonal() {
        let d = diagonal(100);
        let op = HermitianLinearOperator::new(&d);
        let config = LanczosConfig {
            residual_tolerance: 1e-8,
            max_restarts: 200,
            ..LanczosConfig::new(5, 5, 20, SpectrumEnd::Smallest)
        };
        let irl = ImplicitlyRestartedLanczos::new(&op, &op, config);
        let start = Array1::from_elem(100, 1.0);
        let pairs = irl.compute(&start).unwrap();

        assert_eq!(pairs.len(), 5);
        for (k, pair) in pairs.iter().enumerate() {
            assert!(pair.converged);
            assert_relative_eq!(pair.value, (k + 1) as f64, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_largest_of_laplacian() {
        let lap: CsrMatrix<Complex64> = laplacian_1d(40, 0.0).unwrap();
        let op = HermitianLinearOperator::new(&lap);
        let config = LanczosConfig {
            residual_tolerance: 1e-8,
            max_restarts: 100,
            ..LanczosConfig::new(3, 4, 16, SpectrumEnd::Largest)
        };
        let start = Array1::from_shape_fn(40, |i| Complex64::new(1.0, (i as f64).sin()));
        let pairs = ImplicitlyRestartedLanczos::new(&op, &op, config)
            .compute(&start)
            .unwrap();

        let h = std::f64::consts::PI / 41.0;
        for (k, pair) in pairs.iter().take(3).enumerate() {
            let exact = 4.0 * (0.5 * (40 - k) as f64 * h).sin().powi(2);
            assert_relative_eq!(pair.value, exact, epsilon = 1e-6);
            assert!(pair.residual < 1e-7);
        }
    }

    #[test]
    fn test_filtered_drive_finds_low_modes() {
        let d = diagonal(100);
        let op = HermitianLinearOperator::new(&d);
        // Even degree: large and positive below the interval
        let filter = Chebyshev::new(6.0, 101.0, 21).unwrap();
        let drive = FunctionHermOp::new(&filter, &op);
        let check = PlainHermOp::new(&op);
        let config = LanczosConfig {
            residual_tolerance: 1e-8,
            max_restarts: 50,
            ..LanczosConfig::new(5, 5, 20, SpectrumEnd::Largest)
        };
        let start = Array1::from_elem(100, 1.0);
        let pairs = ImplicitlyRestartedLanczos::new(&drive, &check, config)
            .compute(&start)
            .unwrap();

        let mut values = pairs.values();
        values.sort_by(f64::total_cmp);
        for (k, value) in values.iter().enumerate() {
            assert_relative_eq!(*value, (k + 1) as f64, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_basis_spanning_the_whole_space() {
        let d = diagonal(20);
        let op = HermitianLinearOperator::new(&d);
        let config = LanczosConfig {
            residual_tolerance: 1e-8,
            ..LanczosConfig::new(5, 5, 20, SpectrumEnd::Smallest)
        };
        let start = Array1::from_elem(20, 1.0);
        let pairs = ImplicitlyRestartedLanczos::new(&op, &op, config)
            .compute(&start)
            .unwrap();

        assert_eq!(pairs.restarts(), 0);
        for (k, pair) in pairs.iter().enumerate() {
            assert!(pair.converged);
            assert_relative_eq!(pair.value, (k + 1) as f64, epsilon = 1e-8);
        }
    }

    #[test]
    fn test_invariant_subspace_restarts_randomly() {
        // The start vector lies in a 2-dimensional invariant subspace
        let d = diagonal(30);
        let op = HermitianLinearOperator::new(&d);
        let mut start = Array1::zeros(30);
        start[0] = 1.0;
        start[1] = 1.0;
        let config = LanczosConfig {
            residual_tolerance: 1e-8,
            max_restarts: 200,
            ..LanczosConfig::new(2, 3, 10, SpectrumEnd::Smallest)
        };
        let pairs = ImplicitlyRestartedLanczos::new(&op, &op, config)
            .compute(&start)
            .unwrap();
        assert_relative_eq!(pairs.values()[0], 1.0, epsilon = 1e-6);
        assert_relative_eq!(pairs.values()[1], 2.0, epsilon = 1e-6);
    }

    #[test]
    fn test_restart_cap_and_bad_configs() {
        let d = diagonal(100);
        let op = HermitianLinearOperator::new(&d);
        let start = Array1::from_elem(100, 1.0);

        let config = LanczosConfig {
            residual_tolerance: 1e-12,
            max_restarts: 0,
            ..LanczosConfig::new(5, 5, 8, SpectrumEnd::Smallest)
        };
        let err = ImplicitlyRestartedLanczos::new(&op, &op, config)
            .compute(&start)
            .unwrap_err();
        assert!(err.is_convergence_failure());

        let too_big = LanczosConfig::new(5, 5, 101, SpectrumEnd::Smallest);
        assert!(ImplicitlyRestartedLanczos::new(&op, &op, too_big).compute(&start).is_err());
        let inverted = LanczosConfig::new(6, 5, 20, SpectrumEnd::Smallest);
        assert!(ImplicitlyRestartedLanczos::new(&op, &op, inverted).compute(&start).is_err());

        let dirac = wilson_2d(4, 4, 0.1, None).unwrap();
        let general = NonHermitianLinearOperator::new(&dirac);
        let config = LanczosConfig::new(2, 2, 6, SpectrumEnd::Smallest);
        let start = Array1::from_elem(32, Complex64::new(1.0, 0.0));
        let err = ImplicitlyRestartedLanczos::new(&general, &general, config)
            .compute(&start)
            .unwrap_err();
        assert!(matches!(err, SolverError::Unsupported(_)));
    }
}
