//! LU factorisation with partial pivoting
//!
//! Used as the exact solver of small coarse operators: factorise once, then
//! every preconditioner application is a pair of triangular solves.

use crate::aggregation::CoarsenedMatrix;
use crate::blas_helpers::{real, to_f64};
use crate::error::{Result, SolverError};
use crate::traits::{ComplexField, Field, Preconditioner};
use ndarray::{Array1, Array2};
use num_traits::{Float, Zero};

/// Packed LU factors: unit lower L below the diagonal, U on and above
#[derive(Debug, Clone)]
pub struct DenseLu<T: ComplexField> {
    lu: Array2<T>,
    pivots: Vec<usize>,
}

impl<T: ComplexField> DenseLu<T> {
    pub fn factorize(a: &Array2<T>) -> Result<Self> {
        let n = a.nrows();
        if n != a.ncols() {
            return Err(SolverError::DimensionMismatch {
                expected: n,
                got: a.ncols(),
            });
        }

        let scale = a.iter().fold(T::Real::zero(), |m, x| m.max(x.norm()));
        let tiny = scale * T::Real::epsilon() * real::<T::Real>(n.max(1) as f64);
        if !(scale > T::Real::zero()) {
            return Err(SolverError::SingularMatrix);
        }

        let mut lu = a.clone();
        let mut pivots = Vec::with_capacity(n);
        for k in 0..n {
            let (row, max) = (k..n)
                .map(|i| (i, lu[[i, k]].norm()))
                .fold((k, T::Real::zero()), |best, cand| if cand.1 > best.1 { cand } else { best });
            if !(max > tiny) {
                return Err(SolverError::SingularMatrix);
            }
            if row != k {
                for j in 0..n {
                    lu.swap([k, j], [row, j]);
                }
            }
            pivots.push(row);

            let inv = lu[[k, k]].inv();
            for i in (k + 1)..n {
                let l = lu[[i, k]] * inv;
                lu[[i, k]] = l;
                for j in (k + 1)..n {
                    let u = lu[[k, j]];
                    lu[[i, j]] -= l * u;
                }
            }
        }
        log::debug!("LU factorised {}x{} matrix", n, n);
        Ok(Self { lu, pivots })
    }

    /// Factorise the dense form of a coarse operator
    pub fn from_coarse(coarse: &CoarsenedMatrix<T>) -> Result<Self> {
        Self::factorize(&coarse.to_dense())
    }

    pub fn len(&self) -> usize {
        self.pivots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pivots.is_empty()
    }

    /// x = A⁻¹ b
    pub fn solve_into(&self, b: &Array1<T>, x: &mut Array1<T>) -> Result<()> {
        let n = self.len();
        if b.len() != n || x.len() != n {
            return Err(SolverError::DimensionMismatch {
                expected: n,
                got: if b.len() != n { b.len() } else { x.len() },
            });
        }
        x.assign(b);
        for (k, &p) in self.pivots.iter().enumerate() {
            x.swap(k, p);
        }
        for i in 0..n {
            let mut sum = x[i];
            for j in 0..i {
                sum -= self.lu[[i, j]] * x[j];
            }
            x[i] = sum;
        }
        for i in (0..n).rev() {
            let mut sum = x[i];
            for j in (i + 1)..n {
                sum -= self.lu[[i, j]] * x[j];
            }
            x[i] = sum * self.lu[[i, i]].inv();
        }
        Ok(())
    }

    pub fn solve(&self, b: &Array1<T>) -> Result<Array1<T>> {
        let mut x = b.zeros_like();
        self.solve_into(b, &mut x)?;
        Ok(x)
    }

    /// |det A| from the diagonal of U
    pub fn abs_determinant(&self) -> f64 {
        (0..self.len())
            .map(|i| to_f64(self.lu[[i, i]].norm()))
            .product()
    }
}

impl<T: ComplexField> Preconditioner<Array1<T>> for DenseLu<T> {
    fn apply(&self, input: &Array1<T>, out: &mut Array1<T>) {
        if let Err(err) = self.solve_into(input, out) {
            log::warn!("dense coarse solve failed: {}", err);
            out.set_zero();
        }
    }
}
