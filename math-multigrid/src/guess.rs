//! Initial guesses for Krylov solves

use crate::eigen::EigenpairSet;
use crate::traits::{ComplexField, Field, Guesser, RealOf};
use num_traits::{Float, Zero};

/// psi = 0
#[derive(Debug, Clone, Copy, Default)]
pub struct ZeroGuesser;

impl<F: Field> Guesser<F> for ZeroGuesser {
    fn guess(&self, _src: &F, psi: &mut F) {
        psi.set_zero();
    }
}

/// Exact inverse on the span of known eigenvectors:
/// `psi = Σ v_i ⟨v_i, src⟩ / λ_i`
#[derive(Debug, Clone)]
pub struct DeflatedGuesser<F: Field> {
    values: Vec<RealOf<F>>,
    vectors: Vec<F>,
}

impl<F: Field> DeflatedGuesser<F> {
    /// Keep only the converged pairs of a Lanczos run
    pub fn new(pairs: &EigenpairSet<F>) -> Self {
        let (values, vectors) = pairs
            .iter()
            .filter(|pair| pair.converged)
            .map(|pair| (pair.value, pair.vector.clone()))
            .unzip();
        Self { values, vectors }
    }

    /// Use the given pairs as they are
    pub fn from_parts(values: Vec<RealOf<F>>, vectors: Vec<F>) -> Self {
        Self { values, vectors }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<F: Field> Guesser<F> for DeflatedGuesser<F> {
    fn guess(&self, src: &F, psi: &mut F) {
        psi.set_zero();
        for (&lambda, v) in self.values.iter().zip(&self.vectors) {
            if lambda.is_zero() {
                continue;
            }
            let c = v.inner(src) * F::Scalar::from_real(lambda.recip());
            psi.axpy(c, v);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::iterative::{ConjugateGradient, OperatorFunction};
    use crate::operators::HermitianLinearOperator;
    use crate::sparse::{CsrMatrix, laplacian_1d};
    use approx::assert_relative_eq;
    use ndarray::Array1;
    use std::f64::consts::PI;

    /// Dirichlet eigenpairs of the 1-D Laplacian
    fn laplacian_modes(n: usize, count: usize) -> (Vec<f64>, Vec<Array1<f64>>) {
        let h = PI / (n + 1) as f64;
        let norm = (2.0 / (n + 1) as f64).sqrt();
        (1..=count)
            .map(|k| {
                let lambda = 4.0 * (0.5 * k as f64 * h).sin().powi(2);
                let v = Array1::from_shape_fn(n, |i| norm * ((i + 1) as f64 * k as f64 * h).sin());
                (lambda, v)
            })
            .unzip()
    }

    #[test]
    fn test_zero_guesser() {
        let src = Array1::from_elem(4, 1.0_f64);
        let mut psi = Array1::from_elem(4, 3.0);
        ZeroGuesser.guess(&src, &mut psi);
        assert!(psi.iter().all(|x| *x == 0.0));
    }

    #[test]
    fn test_deflation_inverts_on_the_span() {
        let lap: CsrMatrix<f64> = laplacian_1d(32, 0.0).unwrap();
        let (values, vectors) = laplacian_modes(32, 4);
        let src = &vectors[1] * 2.0 - &vectors[3];
        let guesser = DeflatedGuesser::from_parts(values, vectors);

        let mut psi = src.zeros_like();
        guesser.guess(&src, &mut psi);
        let residual = &src - &lap.matvec(&psi);
        assert_relative_eq!(residual.norm2(), 0.0, epsilon = 1e-20);
    }

    #[test]
    fn test_deflation_cuts_iterations() {
        let lap: CsrMatrix<f64> = laplacian_1d(64, 0.0).unwrap();
        let op = HermitianLinearOperator::new(&lap);
        let src = Array1::from_elem(64, 1.0);
        let cg = ConjugateGradient::new(1e-8, 500);

        let mut plain = src.zeros_like();
        let plain_stats = cg.solve(&op, &src, &mut plain).unwrap();

        let (values, vectors) = laplacian_modes(64, 8);
        let guesser = DeflatedGuesser::from_parts(values, vectors);
        let mut deflated = src.zeros_like();
        guesser.guess(&src, &mut deflated);
        let deflated_stats = cg.solve(&op, &src, &mut deflated).unwrap();

        assert!(deflated_stats.iterations <= plain_stats.iterations);
        assert!(deflated_stats.converged);
    }

    #[test]
    fn test_zero_eigenvalue_is_skipped() {
        let v = Array1::from_elem(2, 1.0 / 2.0_f64.sqrt());
        let guesser = DeflatedGuesser::from_parts(vec![0.0], vec![v]);
        let src = Array1::from_elem(2, 1.0);
        let mut psi = src.zeros_like();
        guesser.guess(&src, &mut psi);
        assert!(psi.iter().all(|x| x.is_finite() && *x == 0.0));
    }
}
