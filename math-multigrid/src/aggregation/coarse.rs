//! Galerkin coarse operator `P† A P` stored as a block stencil

use super::subspace::Aggregation;
use crate::blas_helpers::to_f64;
use crate::error::{Result, SolverError};
use crate::parallel::parallel_map_indexed;
use crate::traits::{ComplexField, LinearOperator, SparseMatrix};
use ndarray::{Array1, Array2};

/// Block-sparse coarse matrix
///
/// Row block `i` holds `(j, A_ij)` pairs sorted by `j`, with
/// `A_ij[l, k] = ⟨v_l restricted to i, A (v_k restricted to j)⟩`.
#[derive(Debug, Clone)]
pub struct CoarsenedMatrix<T: ComplexField> {
    nbasis: usize,
    stencil: Vec<Vec<(usize, Array2<T>)>>,
}

impl<T: ComplexField> CoarsenedMatrix<T> {
    /// Apply `op` to every basis vector restricted to every block
    pub fn coarsen<A>(op: &A, aggregation: &Aggregation<T>) -> Result<Self>
    where
        A: LinearOperator<Array1<T>> + ?Sized,
    {
        if !aggregation.is_orthonormal() {
            return Err(SolverError::SubspaceNotOrthonormal);
        }
        let map = aggregation.map();
        let nbasis = aggregation.nbasis();
        let subspace = aggregation.subspace();
        let num_blocks = map.num_blocks();

        // Column block j against every block it couples to
        let columns: Vec<Vec<(usize, Array2<T>)>> = parallel_map_indexed(num_blocks, |j| {
            let mut source = Array1::from_elem(map.fine_len(), T::zero());
            let mut image = source.clone();
            let mut touched: Vec<Option<Array2<T>>> = vec![None; num_blocks];

            for (k, v) in subspace.iter().enumerate() {
                source.fill(T::zero());
                for &s in map.block(j) {
                    source[s] = v[s];
                }
                op.op(&source, &mut image);

                for (s, value) in image.iter().enumerate() {
                    if !value.is_zero() {
                        touched[map.block_of(s)]
                            .get_or_insert_with(|| Array2::from_elem((nbasis, nbasis), T::zero()));
                    }
                }
                for (i, blk) in touched.iter_mut().enumerate() {
                    let Some(blk) = blk else { continue };
                    for (l, u) in subspace.iter().enumerate() {
                        let mut sum = T::zero();
                        for &s in map.block(i) {
                            sum += u[s].conj() * image[s];
                        }
                        blk[[l, k]] = sum;
                    }
                }
            }

            touched
                .into_iter()
                .enumerate()
                .filter_map(|(i, blk)| blk.map(|b| (i, b)))
                .collect()
        });

        let mut stencil = vec![Vec::new(); num_blocks];
        for (j, column) in columns.into_iter().enumerate() {
            for (i, blk) in column {
                stencil[i].push((j, blk));
            }
        }
        let links: usize = stencil.iter().map(Vec::len).sum();
        log::debug!(
            "coarse operator: {} blocks, nbasis {}, {} block links",
            num_blocks,
            nbasis,
            links
        );
        Ok(Self { nbasis, stencil })
    }

    pub fn nbasis(&self) -> usize {
        self.nbasis
    }

    pub fn num_blocks(&self) -> usize {
        self.stencil.len()
    }

    /// Coarse dimension
    pub fn len(&self) -> usize {
        self.nbasis * self.stencil.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stencil.is_empty()
    }

    /// Blocks coupling to row block `i`
    pub fn row(&self, i: usize) -> &[(usize, Array2<T>)] {
        &self.stencil[i]
    }

    pub fn to_dense(&self) -> Array2<T> {
        let nb = self.nbasis;
        let mut dense = Array2::from_elem((self.len(), self.len()), T::zero());
        for (i, row) in self.stencil.iter().enumerate() {
            for (j, blk) in row {
                for l in 0..nb {
                    for k in 0..nb {
                        dense[[i * nb + l, j * nb + k]] = blk[[l, k]];
                    }
                }
            }
        }
        dense
    }

    /// max |A_ab - conj(A_ba)|
    pub fn hermiticity_defect(&self) -> f64 {
        let dense = self.to_dense();
        let n = dense.nrows();
        let mut defect = 0.0_f64;
        for a in 0..n {
            for b in a..n {
                defect = defect.max(to_f64((dense[[a, b]] - dense[[b, a]].conj()).norm()));
            }
        }
        defect
    }
}

impl<T: ComplexField> SparseMatrix<Array1<T>> for CoarsenedMatrix<T> {
    fn m(&self, input: &Array1<T>, out: &mut Array1<T>) {
        let nb = self.nbasis;
        for (i, row) in self.stencil.iter().enumerate() {
            for l in 0..nb {
                let mut sum = T::zero();
                for (j, blk) in row {
                    for k in 0..nb {
                        sum += blk[[l, k]] * input[j * nb + k];
                    }
                }
                out[i * nb + l] = sum;
            }
        }
    }

    fn mdag(&self, input: &Array1<T>, out: &mut Array1<T>) {
        let nb = self.nbasis;
        out.fill(T::zero());
        for (i, row) in self.stencil.iter().enumerate() {
            for (j, blk) in row {
                for k in 0..nb {
                    let mut sum = T::zero();
                    for l in 0..nb {
                        sum += blk[[l, k]].conj() * input[i * nb + l];
                    }
                    out[j * nb + k] += sum;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregation::AggregateMap;
    use crate::operators::{
        DiagonalGrading, HermitianLinearOperator, MdagMLinearOperator, NonHermitianLinearOperator,
        adjoint_defect,
    };
    use crate::sparse::{laplacian_2d, random_links, wilson_2d};
    use crate::traits::Field;
    use num_complex::Complex64;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn wilson_aggregation(
        seed: u64,
        nbasis: usize,
    ) -> (crate::sparse::CsrMatrix<Complex64>, Aggregation<Complex64>) {
        let mut rng = StdRng::seed_from_u64(seed);
        let links = random_links(64, 0.5, &mut rng);
        let dirac = wilson_2d(8, 8, 0.1, Some(&links)).unwrap();
        let map = AggregateMap::cartesian(&[8, 8], &[4, 4], 2).unwrap();
        let mut agg = Aggregation::new(map, nbasis).unwrap();
        agg.create_subspace_random(&mut rng).unwrap();
        (dirac, agg)
    }

    #[test]
    fn test_coarse_matches_galerkin_product() {
        let (dirac, agg) = wilson_aggregation(11, 4);
        let op = NonHermitianLinearOperator::new(&dirac);
        let coarse = CoarsenedMatrix::coarsen(&op, &agg).unwrap();
        assert_eq!(coarse.len(), 16);
        let dense = coarse.to_dense();

        // Column c of P† A P from unit coarse vectors
        let mut fine = Array1::zeros(128);
        let mut afine = Array1::zeros(128);
        let mut column = Array1::zeros(16);
        for c in 0..16 {
            let mut unit = Array1::zeros(16);
            unit[c] = Complex64::new(1.0, 0.0);
            agg.promote(&unit, &mut fine);
            op.op(&fine, &mut afine);
            agg.project(&afine, &mut column);
            for r in 0..16 {
                assert!((dense[[r, c]] - column[r]).norm() < 1e-12);
            }
        }
    }

    #[test]
    fn test_coarse_adjoint_is_consistent() {
        let (dirac, agg) = wilson_aggregation(12, 4);
        let coarse = CoarsenedMatrix::coarsen(&NonHermitianLinearOperator::new(&dirac), &agg).unwrap();
        let op = NonHermitianLinearOperator::new(&coarse);
        let x = Array1::from_shape_fn(16, |k| Complex64::new(k as f64, 1.0));
        let y = Array1::from_shape_fn(16, |k| Complex64::new(1.0, -(k as f64).sin()));
        assert!(adjoint_defect(&op, &x, &y) < 1e-10);
    }

    #[test]
    fn test_hermitian_operator_gives_hermitian_coarse() {
        let lap = laplacian_2d::<Complex64>(8, 8, 0.1).unwrap();
        let op = HermitianLinearOperator::new(&lap);
        let map = AggregateMap::cartesian(&[8, 8], &[2, 4], 1).unwrap();
        let mut agg = Aggregation::new(map, 3).unwrap();
        let mut rng = StdRng::seed_from_u64(13);
        agg.create_subspace_random(&mut rng).unwrap();

        let coarse = CoarsenedMatrix::coarsen(&op, &agg).unwrap();
        assert!(coarse.hermiticity_defect() < 1e-12);
        // Nearest-neighbour blocks only, each row block couples to itself and four neighbours
        assert!(coarse.row(0).len() <= 5);
        assert!(coarse.row(0).iter().any(|(j, _)| *j == 0));
    }

    #[test]
    fn test_chirality_split_keeps_gamma5_hermiticity() {
        let (dirac, mut agg) = wilson_aggregation(14, 4);
        let gamma = DiagonalGrading::new(vec![1, -1]).unwrap();
        agg.split_chirality(&gamma).unwrap();

        let coarse = CoarsenedMatrix::coarsen(&NonHermitianLinearOperator::new(&dirac), &agg).unwrap();
        let gamma_c = agg.coarse_grading().unwrap();
        let graded = crate::operators::GradedHermitianOperator::new(&coarse, &gamma_c);

        let x = Array1::from_shape_fn(16, |k| Complex64::new((k as f64).cos(), 0.5));
        let y = Array1::from_shape_fn(16, |k| Complex64::new(-1.0, k as f64 * 0.25));
        let mut gy = y.zeros_like();
        let mut gx = x.zeros_like();
        graded.op(&y, &mut gy);
        graded.op(&x, &mut gx);
        // ⟨x, Γ A y⟩ = ⟨Γ A x, y⟩
        assert!((x.inner(&gy) - gx.inner(&y)).norm() < 1e-10);
    }

    #[test]
    fn test_hermitian_operator_over_chiral_basis_gives_hermitian_coarse() {
        let (dirac, mut agg) = wilson_aggregation(15, 4);
        let gamma = DiagonalGrading::new(vec![1, -1]).unwrap();
        agg.split_chirality(&gamma).unwrap();

        let mdagm = MdagMLinearOperator::new(&dirac);
        let coarse = CoarsenedMatrix::coarsen(&mdagm, &agg).unwrap();
        assert!(coarse.hermiticity_defect() < 1e-12);
    }

    #[test]
    fn test_failed_split_blocks_coarsening() {
        let (dirac, mut agg) = wilson_aggregation(16, 4);
        let trivial = DiagonalGrading::new(vec![1]).unwrap();
        assert!(agg.split_chirality(&trivial).is_err());
        let err = CoarsenedMatrix::coarsen(&NonHermitianLinearOperator::new(&dirac), &agg)
            .unwrap_err();
        assert!(matches!(err, SolverError::SubspaceNotOrthonormal));
    }

    #[test]
    fn test_requires_orthonormal_subspace() {
        let lap = laplacian_2d::<f64>(4, 4, 0.1).unwrap();
        let map = AggregateMap::contiguous(16, 4).unwrap();
        let agg = Aggregation::new(map, 2).unwrap();
        let err = CoarsenedMatrix::coarsen(&HermitianLinearOperator::new(&lap), &agg).unwrap_err();
        assert!(matches!(err, SolverError::SubspaceNotOrthonormal));
    }
}
