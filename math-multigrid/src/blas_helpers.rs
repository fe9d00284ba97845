//! Level-1 vector kernels and the [`Field`] implementation for `Array1`
//!
//! The Krylov solvers only ever touch their vectors through [`Field`]; for
//! `ndarray::Array1<T>` those operations are the fused loops below.

use crate::traits::{ComplexField, Field};
use ndarray::Array1;
use num_traits::{FromPrimitive, ToPrimitive, Zero};

/// Compute inner product (x, y) = Σ conj(x_i) * y_i
#[inline]
pub fn inner_product<T: ComplexField>(x: &Array1<T>, y: &Array1<T>) -> T {
    debug_assert_eq!(x.len(), y.len(), "vector lengths must match");
    let mut sum = T::zero();
    for (xi, yi) in x.iter().zip(y.iter()) {
        sum += xi.conj() * *yi;
    }
    sum
}

/// Compute squared vector norm: ||x||² = Σ |x_i|²
#[inline]
pub fn vector_norm_sqr<T: ComplexField>(x: &Array1<T>) -> T::Real {
    x.iter()
        .fold(T::Real::zero(), |acc, xi| acc + xi.norm_sqr())
}

/// y += alpha * x, returning ||y||²
#[inline]
pub fn axpy_norm<T: ComplexField>(alpha: T, x: &Array1<T>, y: &mut Array1<T>) -> T::Real {
    debug_assert_eq!(x.len(), y.len(), "vector lengths must match");
    let mut nrm = T::Real::zero();
    for (yi, xi) in y.iter_mut().zip(x.iter()) {
        *yi += alpha * *xi;
        nrm += yi.norm_sqr();
    }
    nrm
}

/// y = alpha * y + x
#[inline]
pub fn scale_add<T: ComplexField>(alpha: T, x: &Array1<T>, y: &mut Array1<T>) {
    debug_assert_eq!(x.len(), y.len(), "vector lengths must match");
    for (yi, xi) in y.iter_mut().zip(x.iter()) {
        *yi = alpha * *yi + *xi;
    }
}

/// Lossy conversion used for reporting residuals
#[inline]
pub(crate) fn to_f64<R: ToPrimitive>(value: R) -> f64 {
    value.to_f64().unwrap_or(f64::NAN)
}

/// Conversion of an `f64` parameter into the working precision
#[inline]
pub(crate) fn real<R: FromPrimitive + Zero>(value: f64) -> R {
    R::from_f64(value).unwrap_or_else(R::zero)
}

/// Conversion of an `f64` parameter into a scalar of the working field
#[inline]
pub(crate) fn scalar<T: ComplexField>(value: f64) -> T {
    T::from_real(real(value))
}

impl<T: ComplexField> Field for Array1<T> {
    type Scalar = T;

    #[inline]
    fn len(&self) -> usize {
        self.dim()
    }

    fn zeros_like(&self) -> Self {
        Array1::from_elem(self.dim(), T::zero())
    }

    fn set_zero(&mut self) {
        self.fill(T::zero());
    }

    fn copy_from(&mut self, other: &Self) {
        debug_assert_eq!(self.dim(), other.dim(), "vector lengths must match");
        for (yi, xi) in self.iter_mut().zip(other.iter()) {
            *yi = *xi;
        }
    }

    fn axpy(&mut self, a: T, x: &Self) {
        debug_assert_eq!(self.dim(), x.dim(), "vector lengths must match");
        for (yi, xi) in self.iter_mut().zip(x.iter()) {
            *yi += a * *xi;
        }
    }

    fn scale_add(&mut self, a: T, x: &Self) {
        scale_add(a, x, self);
    }

    fn scale(&mut self, a: T) {
        for yi in self.iter_mut() {
            *yi *= a;
        }
    }

    fn inner(&self, other: &Self) -> T {
        inner_product(self, other)
    }

    fn norm2(&self) -> T::Real {
        vector_norm_sqr(self)
    }

    fn axpy_norm(&mut self, a: T, x: &Self) -> T::Real {
        axpy_norm(a, x, self)
    }
}
