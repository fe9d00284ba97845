//! Chebyshev polynomials of Hermitian operators
//!
//! A [`Chebyshev`] holds the coefficients of `p(x) = ½c₀T₀(y) + Σ cₙTₙ(y)`
//! with `y` the affine map of `[lo, hi]` onto `[-1, 1]`. The polynomial is
//! applied to a field with the three-term recurrence, one operator
//! application per order.

use crate::blas_helpers::scalar;
use crate::error::{Result, SolverError};
use crate::traits::{Field, LinearOperator, RealOf};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Interval and order of a Chebyshev polynomial
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChebyshevParams {
    pub lo: f64,
    pub hi: f64,
    pub order: usize,
}

impl Default for ChebyshevParams {
    fn default() -> Self {
        Self {
            lo: 0.5,
            hi: 60.0,
            order: 12,
        }
    }
}

impl ChebyshevParams {
    pub fn new(lo: f64, hi: f64, order: usize) -> Self {
        Self { lo, hi, order }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Chebyshev {
    lo: f64,
    hi: f64,
    coeffs: Vec<f64>,
}

impl Chebyshev {
    /// The single polynomial T_{order-1}: bounded by one on `[lo, hi]` and
    /// growing fast below `lo`, i.e. a low-pass filter
    pub fn new(lo: f64, hi: f64, order: usize) -> Result<Self> {
        Self::validate(lo, hi, order)?;
        let mut coeffs = vec![0.0; order];
        coeffs[order - 1] = 1.0;
        Ok(Self { lo, hi, coeffs })
    }

    pub fn from_params(params: &ChebyshevParams) -> Result<Self> {
        Self::new(params.lo, params.hi, params.order)
    }

    /// Interpolating approximation of `func` on `[lo, hi]` at the Chebyshev nodes
    pub fn approximate(lo: f64, hi: f64, order: usize, func: impl Fn(f64) -> f64) -> Result<Self> {
        Self::validate(lo, hi, order)?;
        let n = order as f64;
        let samples: Vec<f64> = (0..order)
            .map(|k| {
                let y = (PI * (k as f64 + 0.5) / n).cos();
                func(0.5 * (y * (hi - lo) + (hi + lo)))
            })
            .collect();
        let coeffs = (0..order)
            .map(|j| {
                let s: f64 = samples
                    .iter()
                    .enumerate()
                    .map(|(k, f)| f * (j as f64 * PI * (k as f64 + 0.5) / n).cos())
                    .sum();
                s * 2.0 / n
            })
            .collect();
        Ok(Self { lo, hi, coeffs })
    }

    /// Approximation of 1/x on `[lo, hi]`, `lo > 0`
    pub fn inverse_approximation(lo: f64, hi: f64, order: usize) -> Result<Self> {
        if lo <= 0.0 {
            return Err(SolverError::invalid(format!(
                "1/x approximation needs lo > 0, got {lo}"
            )));
        }
        Self::approximate(lo, hi, order, |x| 1.0 / x)
    }

    fn validate(lo: f64, hi: f64, order: usize) -> Result<()> {
        if order < 2 {
            return Err(SolverError::invalid(format!(
                "Chebyshev order must be at least 2, got {order}"
            )));
        }
        if !(hi > lo) || !lo.is_finite() || !hi.is_finite() {
            return Err(SolverError::invalid(format!(
                "Chebyshev interval must satisfy lo < hi, got [{lo}, {hi}]"
            )));
        }
        Ok(())
    }

    pub fn lo(&self) -> f64 {
        self.lo
    }

    pub fn hi(&self) -> f64 {
        self.hi
    }

    pub fn order(&self) -> usize {
        self.coeffs.len()
    }

    pub fn coefficients(&self) -> &[f64] {
        &self.coeffs
    }

    fn scales(&self) -> (f64, f64) {
        let xscale = 2.0 / (self.hi - self.lo);
        let mscale = -(self.hi + self.lo) / (self.hi - self.lo);
        (xscale, mscale)
    }

    /// Scalar value p(x)
    pub fn evaluate(&self, x: f64) -> f64 {
        let (xscale, mscale) = self.scales();
        let y = x * xscale + mscale;

        let mut t0 = 1.0;
        let mut t1 = y;
        let mut sum = 0.5 * self.coeffs[0] * t0 + self.coeffs[1] * t1;
        for c in &self.coeffs[2..] {
            let t2 = 2.0 * y * t1 - t0;
            sum += c * t2;
            t0 = t1;
            t1 = t2;
        }
        sum
    }

    /// out = p(A) in, for a Hermitian operator A
    pub fn apply<F, A>(&self, op: &A, input: &F, out: &mut F) -> Result<()>
    where
        F: Field,
        A: LinearOperator<F> + ?Sized,
    {
        if !op.is_hermitian() {
            return Err(SolverError::Unsupported(
                "Chebyshev polynomial of a non-Hermitian operator",
            ));
        }
        self.apply_with(input, out, |x, y| op.op(x, y));
        Ok(())
    }

    /// Same recurrence with an arbitrary Hermitian matrix-vector product
    pub(crate) fn apply_with<F: Field>(
        &self,
        input: &F,
        out: &mut F,
        mut matvec: impl FnMut(&F, &mut F),
    ) {
        let (xscale, mscale) = self.scales();
        let xs: F::Scalar = scalar(xscale);
        let ms: F::Scalar = scalar(mscale);

        let mut t0 = input.clone();
        let mut t1 = input.zeros_like();
        let mut t2 = input.zeros_like();
        let mut y = input.zeros_like();

        // T1 = y(A) in
        matvec(&t0, &mut y);
        t1.copy_from(&y);
        t1.scale(xs);
        t1.axpy(ms, &t0);

        out.copy_from(&t0);
        out.scale(scalar(0.5 * self.coeffs[0]));
        out.axpy(scalar(self.coeffs[1]), &t1);

        for &c in &self.coeffs[2..] {
            // T_{n+1} = 2 y(A) T_n - T_{n-1}
            matvec(&t1, &mut y);
            y.scale(xs);
            y.axpy(ms, &t1);

            t2.copy_from(&y);
            t2.scale(scalar(2.0));
            t2.axpy(scalar(-1.0), &t0);

            out.axpy(scalar(c), &t2);

            std::mem::swap(&mut t0, &mut t1);
            std::mem::swap(&mut t1, &mut t2);
        }
    }
}

/// The Hermitian operator p(A), driving Lanczos towards one end of the spectrum
pub struct FunctionHermOp<'a, A: ?Sized> {
    poly: &'a Chebyshev,
    op: &'a A,
}

impl<'a, A: ?Sized> FunctionHermOp<'a, A> {
    pub fn new(poly: &'a Chebyshev, op: &'a A) -> Self {
        Self { poly, op }
    }

    pub fn polynomial(&self) -> &Chebyshev {
        self.poly
    }
}

impl<F: Field, A: LinearOperator<F> + ?Sized> LinearOperator<F> for FunctionHermOp<'_, A> {
    fn op(&self, input: &F, out: &mut F) {
        self.poly.apply_with(input, out, |x, y| self.op.op(x, y));
    }

    fn adj_op(&self, input: &F, out: &mut F) {
        self.op(input, out);
    }

    /// Only a polynomial of a Hermitian operator is Hermitian
    fn is_hermitian(&self) -> bool {
        self.op.is_hermitian()
    }
}

/// The unfiltered operator behind a Lanczos run
pub struct PlainHermOp<'a, A: ?Sized> {
    op: &'a A,
}

impl<'a, A: ?Sized> PlainHermOp<'a, A> {
    pub fn new(op: &'a A) -> Self {
        Self { op }
    }
}

impl<F: Field, A: LinearOperator<F> + ?Sized> LinearOperator<F> for PlainHermOp<'_, A> {
    fn op(&self, input: &F, out: &mut F) {
        self.op.op(input, out);
    }

    fn adj_op(&self, input: &F, out: &mut F) {
        self.op.adj_op(input, out);
    }

    fn is_hermitian(&self) -> bool {
        self.op.is_hermitian()
    }

    fn herm_op_and_norm(&self, input: &F, out: &mut F) -> Result<(RealOf<F>, RealOf<F>)> {
        self.op.herm_op_and_norm(input, out)
    }
}
