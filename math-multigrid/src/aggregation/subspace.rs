//! Near-null trial subspace restricted to aggregates
//!
//! The prolongator `P` maps coarse index `block * nbasis + i` to the part of
//! basis vector `i` supported on `block`. Once the subspace is block
//! orthonormal, `P†P = 1` and `project`/`promote` are exact adjoints.

use super::blocking::AggregateMap;
use crate::blas_helpers::{real, scalar};
use crate::chebyshev::Chebyshev;
use crate::error::{Result, SolverError};
use crate::operators::DiagonalGrading;
use crate::parallel::parallel_map_indexed;
use crate::traits::{ComplexField, Field, GridTransfer, Involution, LinearOperator};
use ndarray::Array1;
use num_traits::{Float, Zero};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Parameters of the filtered Chebyshev subspace construction
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubspaceParams {
    /// Upper spectral bound of the Hermitian operator
    pub hi: f64,
    /// Lower edge of the initial low-pass filter
    pub lo: f64,
    /// Order of the initial low-pass filter
    pub order_filter: usize,
    /// First order of the sequence kept as a basis vector
    pub order_min: usize,
    /// Order increment between kept vectors
    pub order_step: usize,
    /// Lower edge used for the sequence after filtering
    pub filter_lo: f64,
}

impl Default for SubspaceParams {
    fn default() -> Self {
        Self {
            hi: 60.0,
            lo: 0.02,
            order_filter: 500,
            order_min: 100,
            order_step: 100,
            filter_lo: 0.0,
        }
    }
}

impl SubspaceParams {
    fn validate(&self) -> Result<()> {
        if self.order_min < 2 || self.order_step == 0 {
            return Err(SolverError::invalid(format!(
                "subspace sequence needs order_min >= 2 and order_step >= 1, got {} and {}",
                self.order_min, self.order_step
            )));
        }
        if !(self.hi > self.filter_lo) {
            return Err(SolverError::invalid("subspace sequence needs filter_lo < hi"));
        }
        Ok(())
    }
}

/// Aggregation subspace: `nbasis` fine vectors cut into aggregates
#[derive(Debug, Clone)]
pub struct Aggregation<T: ComplexField> {
    map: AggregateMap,
    subspace: Vec<Array1<T>>,
    orthonormal: bool,
    chiral: bool,
}

impl<T: ComplexField> Aggregation<T> {
    pub fn new(map: AggregateMap, nbasis: usize) -> Result<Self> {
        if nbasis == 0 {
            return Err(SolverError::invalid("nbasis must be at least 1"));
        }
        if map.blocks().iter().any(|b| b.len() < nbasis) {
            return Err(SolverError::invalid(format!(
                "every aggregate needs at least nbasis = {nbasis} degrees of freedom"
            )));
        }
        let zero = Array1::from_elem(map.fine_len(), T::zero());
        Ok(Self {
            subspace: vec![zero; nbasis],
            map,
            orthonormal: false,
            chiral: false,
        })
    }

    pub fn map(&self) -> &AggregateMap {
        &self.map
    }

    pub fn nbasis(&self) -> usize {
        self.subspace.len()
    }

    pub fn fine_len(&self) -> usize {
        self.map.fine_len()
    }

    /// Dimension of the coarse space
    pub fn coarse_len(&self) -> usize {
        self.map.num_blocks() * self.nbasis()
    }

    pub fn subspace(&self) -> &[Array1<T>] {
        &self.subspace
    }

    pub fn is_orthonormal(&self) -> bool {
        self.orthonormal
    }

    /// Replace one basis vector; the subspace must be orthonormalised again
    pub fn set_vector(&mut self, index: usize, vector: Array1<T>) -> Result<()> {
        if index >= self.nbasis() {
            return Err(SolverError::invalid(format!(
                "basis index {index} out of range for nbasis = {}",
                self.nbasis()
            )));
        }
        if vector.len() != self.fine_len() {
            return Err(SolverError::DimensionMismatch {
                expected: self.fine_len(),
                got: vector.len(),
            });
        }
        self.invalidate();
        self.subspace[index] = vector;
        Ok(())
    }

    fn invalidate(&mut self) {
        self.orthonormal = false;
        self.chiral = false;
    }

    /// Fill the subspace with uniform random vectors and orthonormalise
    pub fn create_subspace_random<R: Rng>(&mut self, rng: &mut R) -> Result<()> {
        self.invalidate();
        for v in &mut self.subspace {
            *v = random_field(self.map.fine_len(), rng);
        }
        self.orthonormalise()
    }

    /// Fill the subspace by filtered Chebyshev power iteration on a Hermitian
    /// operator and orthonormalise
    pub fn create_subspace_chebyshev<A, R>(
        &mut self,
        rng: &mut R,
        hermop: &A,
        params: &SubspaceParams,
    ) -> Result<()>
    where
        A: LinearOperator<Array1<T>> + ?Sized,
        R: Rng,
    {
        let vectors = self.chebyshev_vectors(rng, hermop, params, self.nbasis())?;
        self.invalidate();
        for (slot, v) in self.subspace.iter_mut().zip(vectors) {
            *slot = v;
        }
        self.orthonormalise()
    }

    /// Chebyshev construction of the first half of the basis followed by the
    /// chirality split
    pub fn create_chiral_subspace_chebyshev<A, G, R>(
        &mut self,
        rng: &mut R,
        hermop: &A,
        params: &SubspaceParams,
        grading: &G,
    ) -> Result<()>
    where
        A: LinearOperator<Array1<T>> + ?Sized,
        G: Involution<Array1<T>> + ?Sized,
        R: Rng,
    {
        if self.nbasis() % 2 != 0 {
            return Err(SolverError::invalid("chirality split needs an even nbasis"));
        }
        let vectors = self.chebyshev_vectors(rng, hermop, params, self.nbasis() / 2)?;
        self.invalidate();
        for (slot, v) in self.subspace.iter_mut().zip(vectors) {
            *slot = v;
        }
        self.split_chirality(grading)
    }

    fn chebyshev_vectors<A, R>(
        &self,
        rng: &mut R,
        hermop: &A,
        params: &SubspaceParams,
        count: usize,
    ) -> Result<Vec<Array1<T>>>
    where
        A: LinearOperator<Array1<T>> + ?Sized,
        R: Rng,
    {
        params.validate()?;
        if !hermop.is_hermitian() {
            return Err(SolverError::Unsupported(
                "Chebyshev subspace of a non-Hermitian operator",
            ));
        }

        let filter = Chebyshev::new(params.lo, params.hi, params.order_filter)?;
        let noise = random_field::<T, R>(self.map.fine_len(), rng);
        let mut mn = noise.zeros_like();
        filter.apply(hermop, &noise, &mut mn)?;
        normalise(&mut mn)?;

        let mut vectors = Vec::with_capacity(count);
        log::debug!("subspace vector 0 from order {} filter", params.order_filter);
        vectors.push(mn.clone());
        if count == 1 {
            return Ok(vectors);
        }

        // T_n(y(A)) mn on [filter_lo, hi], keeping orders order_min + k * order_step
        let xscale: T = scalar(2.0 / (params.hi - params.filter_lo));
        let mscale: T = scalar(-(params.hi + params.filter_lo) / (params.hi - params.filter_lo));
        let two: T = scalar(2.0);

        let mut t0 = mn.clone();
        let mut t1 = mn.zeros_like();
        let mut y = mn.zeros_like();
        hermop.op(&t0, &mut y);
        t1.copy_from(&y);
        t1.scale(xscale);
        t1.axpy(mscale, &t0);

        let mut n = 1;
        while vectors.len() < count {
            hermop.op(&t1, &mut y);
            y.scale(xscale);
            y.axpy(mscale, &t1);
            // y <- 2 y(A) T_n - T_{n-1} = T_{n+1}
            y.scale(two);
            y.axpy(-T::one(), &t0);
            std::mem::swap(&mut t0, &mut t1);
            std::mem::swap(&mut t1, &mut y);
            n += 1;

            if n >= params.order_min && (n - params.order_min) % params.order_step == 0 {
                let mut v = t1.clone();
                normalise(&mut v)?;
                log::debug!("subspace vector {} from order {}", vectors.len(), n);
                vectors.push(v);
            }
        }
        Ok(vectors)
    }

    /// Replace `v_n` and `v_{n+nb/2}` by `v_n + Γ v_n` and `v_n - Γ v_n`, then
    /// orthonormalise
    pub fn split_chirality<G>(&mut self, grading: &G) -> Result<()>
    where
        G: Involution<Array1<T>> + ?Sized,
    {
        let nbasis = self.nbasis();
        if nbasis % 2 != 0 {
            return Err(SolverError::invalid("chirality split needs an even nbasis"));
        }
        let half = nbasis / 2;
        self.invalidate();
        for n in 0..half {
            let v = self.subspace[n].clone();
            let mut gv = v.zeros_like();
            grading.apply(&v, &mut gv);

            let mut minus = v.clone();
            minus.axpy(-T::one(), &gv);
            self.subspace[n].axpy(T::one(), &gv);
            self.subspace[n + half] = minus;
        }
        self.orthonormalise()?;
        self.chiral = true;
        Ok(())
    }

    /// Grading of the coarse space induced by a chirality split basis
    pub fn coarse_grading(&self) -> Result<DiagonalGrading> {
        if !self.chiral {
            return Err(SolverError::invalid("subspace has not been split by chirality"));
        }
        let half = self.nbasis() / 2;
        let pattern = (0..self.nbasis())
            .map(|i| if i < half { 1 } else { -1 })
            .collect();
        DiagonalGrading::new(pattern)
    }

    /// Block-wise Gram-Schmidt, two passes. On failure the basis is left as
    /// it was and marked non-orthonormal.
    pub fn orthonormalise(&mut self) -> Result<()> {
        self.orthonormal = false;
        let nbasis = self.nbasis();
        let map = &self.map;
        let subspace = &self.subspace;

        let locals: Vec<Result<Vec<Vec<T>>>> = parallel_map_indexed(map.num_blocks(), |b| {
            let sites = map.block(b);
            let mut local: Vec<Vec<T>> = subspace
                .iter()
                .map(|v| sites.iter().map(|&s| v[s]).collect())
                .collect();
            orthonormalise_block(&mut local, b)?;
            Ok(local)
        });
        let locals = locals.into_iter().collect::<Result<Vec<_>>>()?;

        for (b, local) in locals.into_iter().enumerate() {
            let sites = self.map.block(b);
            for (i, column) in local.iter().enumerate().take(nbasis) {
                for (&s, &value) in sites.iter().zip(column) {
                    self.subspace[i][s] = value;
                }
            }
        }
        self.orthonormal = true;
        Ok(())
    }

    /// Largest |⟨v_i, v_j⟩_block - δ_ij| over all blocks
    pub fn orthonormality_defect(&self) -> f64 {
        let mut defect = 0.0_f64;
        for b in 0..self.map.num_blocks() {
            let sites = self.map.block(b);
            for i in 0..self.nbasis() {
                for j in 0..self.nbasis() {
                    let mut dot = T::zero();
                    for &s in sites {
                        dot += self.subspace[i][s].conj() * self.subspace[j][s];
                    }
                    if i == j {
                        dot -= T::one();
                    }
                    defect = defect.max(crate::blas_helpers::to_f64(dot.norm()));
                }
            }
        }
        defect
    }

    /// coarse = P† fine
    pub fn project(&self, fine: &Array1<T>, coarse: &mut Array1<T>) {
        let nbasis = self.nbasis();
        for b in 0..self.map.num_blocks() {
            let sites = self.map.block(b);
            for (i, v) in self.subspace.iter().enumerate() {
                let mut sum = T::zero();
                for &s in sites {
                    sum += v[s].conj() * fine[s];
                }
                coarse[b * nbasis + i] = sum;
            }
        }
    }

    /// fine = P coarse
    pub fn promote(&self, coarse: &Array1<T>, fine: &mut Array1<T>) {
        let nbasis = self.nbasis();
        fine.fill(T::zero());
        for b in 0..self.map.num_blocks() {
            let sites = self.map.block(b);
            for (i, v) in self.subspace.iter().enumerate() {
                let c = coarse[b * nbasis + i];
                for &s in sites {
                    fine[s] += v[s] * c;
                }
            }
        }
    }
}

impl<T: ComplexField> GridTransfer<Array1<T>> for Aggregation<T> {
    type Coarse = Array1<T>;

    fn coarse_zeros(&self) -> Array1<T> {
        Array1::from_elem(self.coarse_len(), T::zero())
    }

    fn project(&self, fine: &Array1<T>, coarse: &mut Array1<T>) {
        Aggregation::project(self, fine, coarse);
    }

    fn promote(&self, coarse: &Array1<T>, fine: &mut Array1<T>) {
        Aggregation::promote(self, coarse, fine);
    }
}

fn random_field<T: ComplexField, R: Rng>(len: usize, rng: &mut R) -> Array1<T> {
    Array1::from_shape_fn(len, |_| {
        let re = 2.0 * rng.random::<f64>() - 1.0;
        let im = 2.0 * rng.random::<f64>() - 1.0;
        T::from_re_im(real(re), real(im))
    })
}

fn normalise<T: ComplexField>(v: &mut Array1<T>) -> Result<()> {
    let nrm = v.norm2();
    if !(nrm > T::Real::zero()) || !nrm.is_finite() {
        return Err(SolverError::invalid(
            "Chebyshev subspace vector vanished or overflowed; check lo/hi/order",
        ));
    }
    v.scale(T::from_real(nrm.sqrt().recip()));
    Ok(())
}

fn orthonormalise_block<T: ComplexField>(local: &mut [Vec<T>], block: usize) -> Result<()> {
    let threshold: T::Real = T::Real::epsilon() * real::<T::Real>(1e3);
    for i in 0..local.len() {
        let (done, rest) = local.split_at_mut(i);
        let v = &mut rest[0];
        let before: T::Real = v.iter().fold(T::Real::zero(), |acc, x| acc + x.norm_sqr());

        for _pass in 0..2 {
            for u in done.iter() {
                let mut dot = T::zero();
                for (a, b) in u.iter().zip(v.iter()) {
                    dot += a.conj() * *b;
                }
                for (a, b) in u.iter().zip(v.iter_mut()) {
                    *b -= *a * dot;
                }
            }
        }

        let after: T::Real = v.iter().fold(T::Real::zero(), |acc, x| acc + x.norm_sqr());
        if !(before > T::Real::zero()) || !(after.sqrt() > threshold * before.sqrt()) {
            return Err(SolverError::RankDeficient { block, vector: i });
        }
        let scale = T::from_real(after.sqrt().recip());
        for x in v.iter_mut() {
            *x *= scale;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operators::HermitianLinearOperator;
    use crate::sparse::{CsrMatrix, laplacian_1d};
    use approx::assert_relative_eq;
    use num_complex::Complex64;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn random_aggregation(fine_len: usize, block_len: usize, nbasis: usize) -> Aggregation<Complex64> {
        let map = AggregateMap::contiguous(fine_len, block_len).unwrap();
        let mut agg = Aggregation::new(map, nbasis).unwrap();
        let mut rng = StdRng::seed_from_u64(42);
        agg.create_subspace_random(&mut rng).unwrap();
        agg
    }

    #[test]
    fn test_random_subspace_is_block_orthonormal() {
        let agg = random_aggregation(64, 8, 4);
        assert!(agg.is_orthonormal());
        assert!(agg.orthonormality_defect() < 1e-12);
        assert_eq!(agg.coarse_len(), 32);
    }

    #[test]
    fn test_round_trip_exact_in_span() {
        let agg = random_aggregation(64, 8, 4);
        let coarse = Array1::from_shape_fn(32, |k| Complex64::new(k as f64, 1.0 - k as f64));
        let mut fine = Array1::zeros(64);
        let mut back = Array1::zeros(32);

        agg.promote(&coarse, &mut fine);
        agg.project(&fine, &mut back);

        for k in 0..32 {
            assert_relative_eq!((back[k] - coarse[k]).norm(), 0.0, epsilon = 1e-10);
        }
    }

    #[test]
    fn test_round_trip_error_is_projection_residual() {
        let agg = random_aggregation(64, 8, 4);
        let fine = Array1::from_shape_fn(64, |k| Complex64::new((k as f64).sin(), 0.3));
        let mut coarse = Array1::zeros(32);
        let mut back = Array1::zeros(64);

        agg.project(&fine, &mut coarse);
        agg.promote(&coarse, &mut back);

        // fine - P P† fine is orthogonal to the subspace
        let mut residual = fine.clone();
        residual.axpy(-Complex64::new(1.0, 0.0), &back);
        let mut leak = Array1::zeros(32);
        agg.project(&residual, &mut leak);
        assert!(leak.norm2() < 1e-20);
        assert_relative_eq!(fine.norm2(), back.norm2() + residual.norm2(), epsilon = 1e-10);
    }

    #[test]
    fn test_project_is_adjoint_of_promote() {
        let agg = random_aggregation(48, 6, 3);
        let x = Array1::from_shape_fn(48, |k| Complex64::new(1.0, k as f64 * 0.1));
        let c = Array1::from_shape_fn(24, |k| Complex64::new((k as f64).cos(), -1.0));
        let mut px = Array1::zeros(24);
        let mut pc = Array1::zeros(48);
        agg.project(&x, &mut px);
        agg.promote(&c, &mut pc);
        assert_relative_eq!((c.inner(&px) - pc.inner(&x)).norm(), 0.0, epsilon = 1e-10);
    }

    #[test]
    fn test_rank_deficiency_detected() {
        let map = AggregateMap::contiguous(8, 4).unwrap();
        let mut agg: Aggregation<f64> = Aggregation::new(map, 2).unwrap();
        let v = Array1::from_shape_fn(8, |k| k as f64 + 1.0);
        agg.set_vector(0, v.clone()).unwrap();
        agg.set_vector(1, v.mapv(|x| 2.0 * x)).unwrap();
        let err = agg.orthonormalise().unwrap_err();
        assert!(matches!(err, SolverError::RankDeficient { vector: 1, .. }));
        assert!(!agg.is_orthonormal());
    }

    #[test]
    fn test_chebyshev_subspace_targets_low_modes() {
        let lap: CsrMatrix<f64> = laplacian_1d(64, 0.0).unwrap();
        let op = HermitianLinearOperator::new(&lap);
        let map = AggregateMap::contiguous(64, 16).unwrap();
        let mut agg = Aggregation::new(map, 3).unwrap();
        let params = SubspaceParams {
            hi: 4.5,
            lo: 0.2,
            order_filter: 40,
            order_min: 6,
            order_step: 4,
            filter_lo: 0.0,
        };
        let mut rng = StdRng::seed_from_u64(7);
        agg.create_subspace_chebyshev(&mut rng, &op, &params).unwrap();
        assert!(agg.orthonormality_defect() < 1e-10);

        // Prolongating the smoothest coarse vector gives a low Rayleigh quotient
        let mut rng = StdRng::seed_from_u64(8);
        let random: Array1<f64> = random_field(64, &mut rng);
        let mut smooth = Array1::zeros(64);
        let mut coarse = Array1::zeros(12);
        agg.project(&random, &mut coarse);
        agg.promote(&coarse, &mut smooth);

        let rayleigh = |v: &Array1<f64>| v.inner(&lap.matvec(v)) / v.norm2();
        assert!(rayleigh(&smooth) < rayleigh(&random));
    }

    #[test]
    fn test_chirality_split() {
        let map = AggregateMap::contiguous(32, 8).unwrap();
        let mut agg: Aggregation<Complex64> = Aggregation::new(map, 4).unwrap();
        let mut rng = StdRng::seed_from_u64(9);
        agg.create_subspace_random(&mut rng).unwrap();
        assert!(agg.coarse_grading().is_err());

        let gamma = DiagonalGrading::new(vec![1, -1]).unwrap();
        agg.split_chirality(&gamma).unwrap();
        assert!(agg.orthonormality_defect() < 1e-12);

        // Upper half is +1 chirality, lower half -1
        for (i, v) in agg.subspace().iter().enumerate() {
            let mut gv = v.zeros_like();
            gamma.apply(v, &mut gv);
            let sign = if i < 2 { 1.0 } else { -1.0 };
            gv.axpy(Complex64::new(-sign, 0.0), v);
            assert!(gv.norm2() < 1e-20);
        }
        assert_eq!(agg.coarse_grading().unwrap().pattern(), &[1, 1, -1, -1]);
    }

    #[test]
    fn test_failed_chirality_split_clears_flags() {
        let map = AggregateMap::contiguous(32, 8).unwrap();
        let mut agg: Aggregation<Complex64> = Aggregation::new(map, 4).unwrap();
        let mut rng = StdRng::seed_from_u64(10);
        agg.create_subspace_random(&mut rng).unwrap();
        assert!(agg.is_orthonormal());
        let first = agg.subspace()[0].clone();

        // A trivial grading annihilates v - Γv
        let trivial = DiagonalGrading::new(vec![1]).unwrap();
        let err = agg.split_chirality(&trivial).unwrap_err();
        assert!(matches!(err, SolverError::RankDeficient { .. }));
        assert!(!agg.is_orthonormal());
        assert!(agg.coarse_grading().is_err());

        // Nothing was written back from the blocks that did orthonormalise
        let mut doubled = first.clone();
        doubled.scale(Complex64::new(2.0, 0.0));
        doubled.axpy(-Complex64::new(1.0, 0.0), &agg.subspace()[0]);
        assert!(doubled.norm2() < 1e-24);
        assert_eq!(agg.subspace()[2].norm2(), 0.0);
    }

    #[test]
    fn test_edit_clears_orthonormal_flag() {
        let mut agg = random_aggregation(32, 8, 2);
        assert!(agg.is_orthonormal());
        agg.set_vector(1, Array1::from_elem(32, Complex64::new(1.0, 0.0)))
            .unwrap();
        assert!(!agg.is_orthonormal());
        agg.orthonormalise().unwrap();
        assert!(agg.orthonormality_defect() < 1e-12);
    }

    #[test]
    fn test_rejects_bad_shapes() {
        let map = AggregateMap::contiguous(8, 2).unwrap();
        assert!(Aggregation::<f64>::new(map.clone(), 3).is_err());
        let mut agg = Aggregation::<f64>::new(map, 2).unwrap();
        assert!(agg.set_vector(2, Array1::zeros(8)).is_err());
        assert!(agg.set_vector(0, Array1::zeros(7)).is_err());
    }
}
