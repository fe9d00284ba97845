//! Core traits for the solver library
//!
//! - [`ComplexField`]: scalar types (complex and real numbers)
//! - [`Field`]: vectors the Krylov solvers iterate on
//! - [`LinearOperator`]: what a Krylov solver applies
//! - [`SparseMatrix`]: a matrix exposing `M` and `M†`, wrapped by the operator views
//! - [`Preconditioner`], [`Guesser`], [`Involution`], [`GridTransfer`]: the remaining
//!   collaborators of the multigrid cycle

use crate::error::{Result, SolverError};
use num_complex::{Complex32, Complex64};
use num_traits::{Float, FromPrimitive, NumAssign, One, ToPrimitive, Zero};
use std::fmt::Debug;
use std::ops::Neg;

/// Trait for scalar types that can be used in linear algebra operations.
///
/// This trait abstracts over real and complex number types, providing
/// a unified interface for operations like conjugation, norm computation,
/// and conversion from real values.
///
/// Provided for `Complex64`, `Complex32`, `f64` and `f32`.
pub trait ComplexField:
    NumAssign + Clone + Copy + Send + Sync + Debug + Zero + One + Neg<Output = Self> + 'static
{
    /// The real number type underlying this field
    type Real: Float + NumAssign + FromPrimitive + ToPrimitive + Send + Sync + Debug + 'static;

    /// Complex conjugate
    fn conj(&self) -> Self;

    /// Squared magnitude |z|²
    fn norm_sqr(&self) -> Self::Real;

    /// Magnitude |z|
    fn norm(&self) -> Self::Real {
        self.norm_sqr().sqrt()
    }

    /// Create from a real value
    fn from_real(r: Self::Real) -> Self;

    /// Create from real and imaginary parts
    fn from_re_im(re: Self::Real, im: Self::Real) -> Self;

    /// Real part
    fn re(&self) -> Self::Real;

    /// Imaginary part
    fn im(&self) -> Self::Real;

    /// Multiplicative inverse (1/z)
    fn inv(&self) -> Self;

    /// Square root
    fn sqrt(&self) -> Self;
}

macro_rules! impl_complex_field {
    ($complex:ty, $real:ty) => {
        impl ComplexField for $complex {
            type Real = $real;

            #[inline]
            fn conj(&self) -> Self {
                <$complex>::conj(self)
            }

            #[inline]
            fn norm_sqr(&self) -> $real {
                self.re * self.re + self.im * self.im
            }

            #[inline]
            fn from_real(r: $real) -> Self {
                <$complex>::new(r, 0.0)
            }

            #[inline]
            fn from_re_im(re: $real, im: $real) -> Self {
                <$complex>::new(re, im)
            }

            #[inline]
            fn re(&self) -> $real {
                self.re
            }

            #[inline]
            fn im(&self) -> $real {
                self.im
            }

            #[inline]
            fn inv(&self) -> Self {
                let denom = self.norm_sqr();
                <$complex>::new(self.re / denom, -self.im / denom)
            }

            #[inline]
            fn sqrt(&self) -> Self {
                <$complex>::sqrt(*self)
            }
        }
    };
}

macro_rules! impl_real_field {
    ($real:ty) => {
        impl ComplexField for $real {
            type Real = $real;

            #[inline]
            fn conj(&self) -> Self {
                *self
            }

            #[inline]
            fn norm_sqr(&self) -> $real {
                *self * *self
            }

            #[inline]
            fn from_real(r: $real) -> Self {
                r
            }

            #[inline]
            fn from_re_im(re: $real, _im: $real) -> Self {
                re
            }

            #[inline]
            fn re(&self) -> $real {
                *self
            }

            #[inline]
            fn im(&self) -> $real {
                0.0
            }

            #[inline]
            fn inv(&self) -> Self {
                1.0 / *self
            }

            #[inline]
            fn sqrt(&self) -> Self {
                <$real>::sqrt(*self)
            }
        }
    };
}

impl_complex_field!(Complex64, f64);
impl_complex_field!(Complex32, f32);
impl_real_field!(f64);
impl_real_field!(f32);

/// Real type underlying the scalars of a field
pub type RealOf<F> = <<F as Field>::Scalar as ComplexField>::Real;

/// A vector the solvers can iterate on.
///
/// Every operation is in place; solvers allocate their work fields once with
/// [`Field::zeros_like`] and reuse them. Inner products are conjugate-linear in
/// the first argument.
pub trait Field: Clone + Debug + Send + Sync {
    type Scalar: ComplexField;

    /// Number of degrees of freedom
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// A zero field with the same layout
    fn zeros_like(&self) -> Self;

    fn set_zero(&mut self);

    /// self = other
    fn copy_from(&mut self, other: &Self);

    /// self += a * x
    fn axpy(&mut self, a: Self::Scalar, x: &Self);

    /// self = a * self + x
    fn scale_add(&mut self, a: Self::Scalar, x: &Self);

    /// self *= a
    fn scale(&mut self, a: Self::Scalar);

    /// ⟨self, other⟩ = Σ conj(selfᵢ) otherᵢ
    fn inner(&self, other: &Self) -> Self::Scalar;

    /// Squared 2-norm
    fn norm2(&self) -> RealOf<Self>;

    /// self += a * x, returning the squared norm of the result
    fn axpy_norm(&mut self, a: Self::Scalar, x: &Self) -> RealOf<Self> {
        self.axpy(a, x);
        self.norm2()
    }
}

/// Abstract linear operator acting on a field.
///
/// Hermitian views declare themselves through [`LinearOperator::is_hermitian`];
/// for those `op` and `herm_op` coincide and the default `herm_op` forwards to
/// `op`. Asking a non-Hermitian operator for `herm_op` is an error.
pub trait LinearOperator<F: Field>: Send + Sync {
    /// out = A in
    fn op(&self, input: &F, out: &mut F);

    /// out = A† in
    fn adj_op(&self, input: &F, out: &mut F);

    /// Whether `herm_op` is available
    fn is_hermitian(&self) -> bool {
        false
    }

    /// out = A in, for Hermitian A
    fn herm_op(&self, input: &F, out: &mut F) -> Result<()> {
        if !self.is_hermitian() {
            return Err(SolverError::Unsupported("herm_op on a non-Hermitian operator"));
        }
        self.op(input, out);
        Ok(())
    }

    /// out = A in, returning (Re⟨in, A in⟩, |A in|²)
    fn herm_op_and_norm(&self, input: &F, out: &mut F) -> Result<(RealOf<F>, RealOf<F>)> {
        self.herm_op(input, out)?;
        let n1 = input.inner(out).re();
        let n2 = out.norm2();
        Ok((n1, n2))
    }
}

/// A matrix exposing its action and the action of its adjoint
pub trait SparseMatrix<F: Field>: Send + Sync {
    /// out = M in
    fn m(&self, input: &F, out: &mut F);

    /// out = M† in
    fn mdag(&self, input: &F, out: &mut F);
}

/// Trait for preconditioners used in iterative solvers.
///
/// A preconditioner approximates A⁻¹. `out` is overwritten; its previous
/// content is never read.
pub trait Preconditioner<F: Field>: Send + Sync {
    fn apply(&self, input: &F, out: &mut F);
}

impl<F: Field, P: Preconditioner<F> + ?Sized> Preconditioner<F> for &P {
    fn apply(&self, input: &F, out: &mut F) {
        (**self).apply(input, out)
    }
}

impl<F: Field, P: Preconditioner<F> + ?Sized> Preconditioner<F> for Box<P> {
    fn apply(&self, input: &F, out: &mut F) {
        (**self).apply(input, out)
    }
}

/// Identity preconditioner (no preconditioning)
#[derive(Clone, Debug, Default)]
pub struct IdentityPreconditioner;

impl<F: Field> Preconditioner<F> for IdentityPreconditioner {
    fn apply(&self, input: &F, out: &mut F) {
        out.copy_from(input);
    }
}

/// Produces an initial guess for a solve
pub trait Guesser<F: Field>: Send + Sync {
    fn guess(&self, src: &F, psi: &mut F);
}

impl<F: Field, G: Guesser<F> + ?Sized> Guesser<F> for &G {
    fn guess(&self, src: &F, psi: &mut F) {
        (**self).guess(src, psi)
    }
}

/// A linear map Γ with Γ² = 1, used to split trial vectors by chirality
pub trait Involution<F: Field>: Send + Sync {
    fn apply(&self, input: &F, out: &mut F);
}

/// Restriction and prolongation between a fine and a coarse field
pub trait GridTransfer<F: Field>: Send + Sync {
    type Coarse: Field;

    /// A zero coarse field
    fn coarse_zeros(&self) -> Self::Coarse;

    /// coarse = P† fine
    fn project(&self, fine: &F, coarse: &mut Self::Coarse);

    /// fine = P coarse
    fn promote(&self, coarse: &Self::Coarse, fine: &mut F);
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_complex64_field() {
        let z = Complex64::new(3.0, 4.0);
        assert_relative_eq!(ComplexField::norm_sqr(&z), 25.0);
        assert_relative_eq!(ComplexField::norm(&z), 5.0);

        let z_conj = ComplexField::conj(&z);
        assert_relative_eq!(z_conj.re, 3.0);
        assert_relative_eq!(z_conj.im, -4.0);

        let product = z * ComplexField::inv(&z);
        assert_relative_eq!(product.re, 1.0, epsilon = 1e-12);
        assert_relative_eq!(product.im, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_real_fields() {
        let x: f64 = -3.0;
        assert_relative_eq!(x.norm_sqr(), 9.0);
        assert_relative_eq!(ComplexField::conj(&x), -3.0);
        assert_relative_eq!(ComplexField::im(&x), 0.0);

        let y: f32 = 4.0;
        assert_relative_eq!(ComplexField::sqrt(&y), 2.0);
        assert_relative_eq!(ComplexField::inv(&y), 0.25);
    }

    #[test]
    fn test_from_re_im_drops_imaginary_part_for_reals() {
        let x = <f64 as ComplexField>::from_re_im(1.5, 2.0);
        assert_relative_eq!(x, 1.5);
        let z = <Complex32 as ComplexField>::from_re_im(1.5, 2.0);
        assert_relative_eq!(z.im, 2.0);
    }
}
