//! Linear-operator views over a [`SparseMatrix`]
//!
//! Each view borrows the matrix and fixes which products `op`, `adj_op` and
//! `herm_op` perform. The views own no field storage beyond the temporaries
//! of a single application.

use crate::traits::{ComplexField, Field, Involution, LinearOperator, RealOf, SparseMatrix};
use crate::error::Result;

/// M†M as a Hermitian positive semi-definite operator
pub struct MdagMLinearOperator<'a, M: ?Sized> {
    matrix: &'a M,
}

impl<'a, M: ?Sized> MdagMLinearOperator<'a, M> {
    pub fn new(matrix: &'a M) -> Self {
        Self { matrix }
    }
}

impl<F: Field, M: SparseMatrix<F> + ?Sized> LinearOperator<F> for MdagMLinearOperator<'_, M> {
    fn op(&self, input: &F, out: &mut F) {
        let mut tmp = input.zeros_like();
        self.matrix.m(input, &mut tmp);
        self.matrix.mdag(&tmp, out);
    }

    fn adj_op(&self, input: &F, out: &mut F) {
        self.op(input, out);
    }

    fn is_hermitian(&self) -> bool {
        true
    }

    /// n1 = |M in|² = ⟨in, M†M in⟩ comes for free from the intermediate
    fn herm_op_and_norm(&self, input: &F, out: &mut F) -> Result<(RealOf<F>, RealOf<F>)> {
        let mut tmp = input.zeros_like();
        self.matrix.m(input, &mut tmp);
        self.matrix.mdag(&tmp, out);
        Ok((tmp.norm2(), out.norm2()))
    }
}

/// M†M + shift
pub struct ShiftedMdagMLinearOperator<'a, M: ?Sized> {
    matrix: &'a M,
    shift: f64,
}

impl<'a, M: ?Sized> ShiftedMdagMLinearOperator<'a, M> {
    pub fn new(matrix: &'a M, shift: f64) -> Self {
        Self { matrix, shift }
    }

    pub fn shift(&self) -> f64 {
        self.shift
    }
}

impl<F: Field, M: SparseMatrix<F> + ?Sized> LinearOperator<F>
    for ShiftedMdagMLinearOperator<'_, M>
{
    fn op(&self, input: &F, out: &mut F) {
        let mut tmp = input.zeros_like();
        self.matrix.m(input, &mut tmp);
        self.matrix.mdag(&tmp, out);
        out.axpy(crate::blas_helpers::scalar(self.shift), input);
    }

    fn adj_op(&self, input: &F, out: &mut F) {
        self.op(input, out);
    }

    fn is_hermitian(&self) -> bool {
        true
    }

    fn herm_op_and_norm(&self, input: &F, out: &mut F) -> Result<(RealOf<F>, RealOf<F>)> {
        let mut tmp = input.zeros_like();
        self.matrix.m(input, &mut tmp);
        self.matrix.mdag(&tmp, out);
        out.axpy(crate::blas_helpers::scalar(self.shift), input);
        let shift: RealOf<F> = crate::blas_helpers::real(self.shift);
        Ok((tmp.norm2() + shift * input.norm2(), out.norm2()))
    }
}

/// A matrix that is itself Hermitian
pub struct HermitianLinearOperator<'a, M: ?Sized> {
    matrix: &'a M,
}

impl<'a, M: ?Sized> HermitianLinearOperator<'a, M> {
    pub fn new(matrix: &'a M) -> Self {
        Self { matrix }
    }
}

impl<F: Field, M: SparseMatrix<F> + ?Sized> LinearOperator<F> for HermitianLinearOperator<'_, M> {
    fn op(&self, input: &F, out: &mut F) {
        self.matrix.m(input, out);
    }

    fn adj_op(&self, input: &F, out: &mut F) {
        self.matrix.m(input, out);
    }

    fn is_hermitian(&self) -> bool {
        true
    }
}

/// A general matrix: `op` is M, `adj_op` is M†, no Hermitian product
pub struct NonHermitianLinearOperator<'a, M: ?Sized> {
    matrix: &'a M,
}

impl<'a, M: ?Sized> NonHermitianLinearOperator<'a, M> {
    pub fn new(matrix: &'a M) -> Self {
        Self { matrix }
    }
}

impl<F: Field, M: SparseMatrix<F> + ?Sized> LinearOperator<F>
    for NonHermitianLinearOperator<'_, M>
{
    fn op(&self, input: &F, out: &mut F) {
        self.matrix.m(input, out);
    }

    fn adj_op(&self, input: &F, out: &mut F) {
        self.matrix.mdag(input, out);
    }
}

/// PV⁻¹-style preconditioned product `PV† M`
///
/// `adj_op` is the true adjoint `M† PV`.
pub struct PVdagMLinearOperator<'a, M: ?Sized, P: ?Sized> {
    matrix: &'a M,
    pv: &'a P,
}

impl<'a, M: ?Sized, P: ?Sized> PVdagMLinearOperator<'a, M, P> {
    pub fn new(matrix: &'a M, pv: &'a P) -> Self {
        Self { matrix, pv }
    }
}

impl<F, M, P> LinearOperator<F> for PVdagMLinearOperator<'_, M, P>
where
    F: Field,
    M: SparseMatrix<F> + ?Sized,
    P: SparseMatrix<F> + ?Sized,
{
    fn op(&self, input: &F, out: &mut F) {
        let mut tmp = input.zeros_like();
        self.matrix.m(input, &mut tmp);
        self.pv.mdag(&tmp, out);
    }

    fn adj_op(&self, input: &F, out: &mut F) {
        let mut tmp = input.zeros_like();
        self.pv.m(input, &mut tmp);
        self.matrix.mdag(&tmp, out);
    }
}

/// ΓM for an involution Γ with ΓM Hermitian (e.g. γ₅-Hermitian Dirac operators)
pub struct GradedHermitianOperator<'a, M: ?Sized, G: ?Sized> {
    matrix: &'a M,
    grading: &'a G,
}

impl<'a, M: ?Sized, G: ?Sized> GradedHermitianOperator<'a, M, G> {
    pub fn new(matrix: &'a M, grading: &'a G) -> Self {
        Self { matrix, grading }
    }
}

impl<F, M, G> LinearOperator<F> for GradedHermitianOperator<'_, M, G>
where
    F: Field,
    M: SparseMatrix<F> + ?Sized,
    G: Involution<F> + ?Sized,
{
    fn op(&self, input: &F, out: &mut F) {
        let mut tmp = input.zeros_like();
        self.matrix.m(input, &mut tmp);
        self.grading.apply(&tmp, out);
    }

    fn adj_op(&self, input: &F, out: &mut F) {
        let mut tmp = input.zeros_like();
        self.grading.apply(input, &mut tmp);
        self.matrix.mdag(&tmp, out);
    }

    fn is_hermitian(&self) -> bool {
        true
    }
}

/// ⟨x, A y⟩ - ⟨A† x, y⟩, zero for a consistent (op, adj_op) pair
pub fn adjoint_defect<F, A>(op: &A, x: &F, y: &F) -> RealOf<F>
where
    F: Field,
    A: LinearOperator<F> + ?Sized,
{
    let mut ay = y.zeros_like();
    let mut adx = x.zeros_like();
    op.op(y, &mut ay);
    op.adj_op(x, &mut adx);
    (x.inner(&ay) - adx.inner(y)).norm()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SolverError;
    use crate::operators::DiagonalGrading;
    use crate::sparse::{CsrMatrix, laplacian_1d, wilson_2d};
    use approx::assert_relative_eq;
    use ndarray::{Array1, array};
    use num_complex::Complex64;

    fn test_vector(n: usize, phase: f64) -> Array1<Complex64> {
        Array1::from_shape_fn(n, |k| {
            Complex64::new((phase + k as f64).sin(), (0.3 * k as f64 - phase).cos())
        })
    }

    #[test]
    fn test_mdagm_norms() {
        let dense = array![[1.0_f64, 2.0], [0.0, 3.0]];
        let m = CsrMatrix::from_dense(&dense, 0.0);
        let op = MdagMLinearOperator::new(&m);
        let x = array![1.0, -1.0];
        let mut out = x.zeros_like();

        let (n1, n2) = op.herm_op_and_norm(&x, &mut out).unwrap();

        // M x = [-1, -3], M†M x = [-1, -11]
        assert_relative_eq!(out[0], -1.0);
        assert_relative_eq!(out[1], -11.0);
        assert_relative_eq!(n1, 10.0);
        assert_relative_eq!(n1, x.inner(&out));
        assert_relative_eq!(n2, 122.0);
    }

    #[test]
    fn test_shifted_mdagm_adds_shift() {
        let m: CsrMatrix<f64> = CsrMatrix::identity(3);
        let op = ShiftedMdagMLinearOperator::new(&m, 0.5);
        let x = array![1.0, 2.0, 3.0];
        let mut out = x.zeros_like();
        let (n1, _) = op.herm_op_and_norm(&x, &mut out).unwrap();
        assert_eq!(out, array![1.5_f64, 3.0, 4.5]);
        assert_relative_eq!(n1, 21.0);
    }

    #[test]
    fn test_non_hermitian_rejects_herm_op() {
        let m = wilson_2d(2, 2, 0.1, None).unwrap();
        let op = NonHermitianLinearOperator::new(&m);
        let x = test_vector(8, 0.0);
        let mut out = x.zeros_like();
        let result = op.herm_op(&x, &mut out);
        assert!(matches!(result, Err(SolverError::Unsupported(_))));
    }

    #[test]
    fn test_views_have_consistent_adjoints() {
        let m = wilson_2d(4, 2, 0.2, None).unwrap();
        let pv = wilson_2d(4, 2, 1.0, None).unwrap();
        let gamma = DiagonalGrading::new(vec![1, -1]).unwrap();
        let x = test_vector(16, 0.1);
        let y = test_vector(16, 1.3);

        assert!(adjoint_defect(&NonHermitianLinearOperator::new(&m), &x, &y) < 1e-12);
        assert!(adjoint_defect(&PVdagMLinearOperator::new(&m, &pv), &x, &y) < 1e-12);
        assert!(adjoint_defect(&MdagMLinearOperator::new(&m), &x, &y) < 1e-12);
        assert!(adjoint_defect(&GradedHermitianOperator::new(&m, &gamma), &x, &y) < 1e-12);
    }

    #[test]
    fn test_graded_operator_is_hermitian() {
        let m = wilson_2d(4, 2, 0.2, None).unwrap();
        let gamma = DiagonalGrading::new(vec![1, -1]).unwrap();
        let op = GradedHermitianOperator::new(&m, &gamma);
        let x = test_vector(16, 0.7);
        let y = test_vector(16, 2.1);

        let mut ax = x.zeros_like();
        let mut ay = y.zeros_like();
        op.herm_op(&x, &mut ax).unwrap();
        op.herm_op(&y, &mut ay).unwrap();
        assert_relative_eq!((x.inner(&ay) - ax.inner(&y)).norm(), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_hermitian_operator_on_laplacian() {
        let lap: CsrMatrix<f64> = laplacian_1d(5, 0.0).unwrap();
        let op = HermitianLinearOperator::new(&lap);
        let x = Array1::from_elem(5, 1.0);
        let mut out = x.zeros_like();
        let (n1, n2) = op.herm_op_and_norm(&x, &mut out).unwrap();
        assert_relative_eq!(n1, 2.0);
        assert_relative_eq!(n2, 2.0);
    }
}
