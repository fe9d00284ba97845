//! Compressed Sparse Row (CSR) matrix format
//!
//! CSR format stores:
//! - `values`: Non-zero entries in row-major order
//! - `col_indices`: Column index for each value
//! - `row_ptrs`: Index into values/col_indices where each row starts

use crate::error::{Result, SolverError};
use crate::traits::{ComplexField, SparseMatrix};
use ndarray::{Array1, Array2};
use num_traits::{Float, Zero};
use std::ops::Range;

#[cfg(feature = "rayon")]
use rayon::prelude::*;

/// Rows below which the parallel product is not worth the scheduling cost
#[cfg(feature = "rayon")]
const PARALLEL_ROWS: usize = 4096;

/// Compressed Sparse Row (CSR) matrix format
///
/// Implements [`SparseMatrix`] for `Array1<T>`, so it can be wrapped by any of
/// the operator views in [`crate::operators`].
#[derive(Debug, Clone)]
pub struct CsrMatrix<T: ComplexField> {
    /// Number of rows
    pub num_rows: usize,
    /// Number of columns
    pub num_cols: usize,
    /// Non-zero values in row-major order
    pub values: Vec<T>,
    /// Column indices for each value
    pub col_indices: Vec<usize>,
    /// Row pointers: row_ptrs[i] is the start index in values/col_indices for row i
    pub row_ptrs: Vec<usize>,
}

impl<T: ComplexField> CsrMatrix<T> {
    /// Create a CSR matrix from a dense matrix
    ///
    /// Only stores entries with magnitude > threshold
    pub fn from_dense(dense: &Array2<T>, threshold: T::Real) -> Self {
        let (num_rows, num_cols) = dense.dim();
        let mut values = Vec::new();
        let mut col_indices = Vec::new();
        let mut row_ptrs = Vec::with_capacity(num_rows + 1);
        row_ptrs.push(0);

        for row in dense.rows() {
            for (j, &val) in row.iter().enumerate() {
                if val.norm() > threshold {
                    values.push(val);
                    col_indices.push(j);
                }
            }
            row_ptrs.push(values.len());
        }

        Self {
            num_rows,
            num_cols,
            values,
            col_indices,
            row_ptrs,
        }
    }

    /// Create a CSR matrix from COO (Coordinate) format triplets
    ///
    /// Triplets are (row, col, value). Duplicate entries are summed.
    pub fn from_triplets(
        num_rows: usize,
        num_cols: usize,
        mut triplets: Vec<(usize, usize, T)>,
    ) -> Result<Self> {
        if let Some(&(row, col, _)) = triplets
            .iter()
            .find(|(row, col, _)| *row >= num_rows || *col >= num_cols)
        {
            return Err(SolverError::invalid(format!(
                "triplet ({row}, {col}) outside a {num_rows}x{num_cols} matrix"
            )));
        }

        triplets.sort_by_key(|&(row, col, _)| (row, col));

        let mut values: Vec<T> = Vec::with_capacity(triplets.len());
        let mut col_indices: Vec<usize> = Vec::with_capacity(triplets.len());
        let mut row_counts = vec![0usize; num_rows];
        let mut last: Option<(usize, usize)> = None;

        for (row, col, val) in triplets {
            if last == Some((row, col)) {
                if let Some(acc) = values.last_mut() {
                    *acc += val;
                }
                continue;
            }
            values.push(val);
            col_indices.push(col);
            row_counts[row] += 1;
            last = Some((row, col));
        }

        let mut row_ptrs = Vec::with_capacity(num_rows + 1);
        row_ptrs.push(0);
        for count in row_counts {
            let start = row_ptrs[row_ptrs.len() - 1];
            row_ptrs.push(start + count);
        }

        Ok(Self {
            num_rows,
            num_cols,
            values,
            col_indices,
            row_ptrs,
        })
    }

    /// Create identity matrix in CSR format
    pub fn identity(n: usize) -> Self {
        Self::from_diagonal(&Array1::from_elem(n, T::one()))
    }

    /// Create diagonal matrix from vector
    pub fn from_diagonal(diag: &Array1<T>) -> Self {
        let n = diag.len();
        Self {
            num_rows: n,
            num_cols: n,
            values: diag.to_vec(),
            col_indices: (0..n).collect(),
            row_ptrs: (0..=n).collect(),
        }
    }

    /// Number of non-zero entries
    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    /// Get the range of indices in values/col_indices for a given row
    pub fn row_range(&self, row: usize) -> Range<usize> {
        self.row_ptrs[row]..self.row_ptrs[row + 1]
    }

    /// Get the (col, value) pairs for a row
    pub fn row_entries(&self, row: usize) -> impl Iterator<Item = (usize, T)> + '_ {
        let range = self.row_range(row);
        self.col_indices[range.clone()]
            .iter()
            .copied()
            .zip(self.values[range].iter().copied())
    }

    /// Get element at (i, j), returns 0 if not stored
    pub fn get(&self, i: usize, j: usize) -> T {
        self.row_entries(i)
            .find(|&(col, _)| col == j)
            .map_or_else(T::zero, |(_, val)| val)
    }

    fn row_dot(&self, row: usize, x: &Array1<T>) -> T {
        let mut sum = T::zero();
        for idx in self.row_range(row) {
            sum += self.values[idx] * x[self.col_indices[idx]];
        }
        sum
    }

    /// Matrix-vector product into an existing vector: y = A * x
    pub fn matvec_into(&self, x: &Array1<T>, y: &mut Array1<T>) {
        debug_assert_eq!(x.len(), self.num_cols, "input vector size mismatch");
        debug_assert_eq!(y.len(), self.num_rows, "output vector size mismatch");

        #[cfg(feature = "rayon")]
        {
            if self.num_rows >= PARALLEL_ROWS {
                if let Some(out) = y.as_slice_mut() {
                    out.par_iter_mut()
                        .enumerate()
                        .for_each(|(i, yi)| *yi = self.row_dot(i, x));
                    return;
                }
            }
        }

        for (i, yi) in y.iter_mut().enumerate() {
            *yi = self.row_dot(i, x);
        }
    }

    /// Matrix-vector product: y = A * x
    pub fn matvec(&self, x: &Array1<T>) -> Array1<T> {
        let mut y = Array1::from_elem(self.num_rows, T::zero());
        self.matvec_into(x, &mut y);
        y
    }

    /// Hermitian (conjugate transpose) product into an existing vector: y = A^H * x
    pub fn matvec_adjoint_into(&self, x: &Array1<T>, y: &mut Array1<T>) {
        debug_assert_eq!(x.len(), self.num_rows, "input vector size mismatch");
        debug_assert_eq!(y.len(), self.num_cols, "output vector size mismatch");

        y.fill(T::zero());
        for i in 0..self.num_rows {
            let xi = x[i];
            for idx in self.row_range(i) {
                y[self.col_indices[idx]] += self.values[idx].conj() * xi;
            }
        }
    }

    /// Hermitian (conjugate transpose) matrix-vector product: y = A^H * x
    pub fn matvec_adjoint(&self, x: &Array1<T>) -> Array1<T> {
        let mut y = Array1::from_elem(self.num_cols, T::zero());
        self.matvec_adjoint_into(x, &mut y);
        y
    }

    /// Add a scalar to the diagonal, inserting missing diagonal entries
    pub fn add_diagonal(&self, shift: T) -> Result<Self> {
        let n = self.num_rows.min(self.num_cols);
        let mut triplets: Vec<(usize, usize, T)> = (0..self.num_rows)
            .flat_map(|i| self.row_entries(i).map(move |(j, v)| (i, j, v)))
            .collect();
        triplets.extend((0..n).map(|i| (i, i, shift)));
        Self::from_triplets(self.num_rows, self.num_cols, triplets)
    }

    /// Largest entry of A - A^H in magnitude
    pub fn hermiticity_defect(&self) -> T::Real {
        let mut defect = T::Real::zero();
        for i in 0..self.num_rows {
            for (j, val) in self.row_entries(i) {
                let mirrored = if j < self.num_rows { self.get(j, i) } else { T::zero() };
                defect = defect.max((val - mirrored.conj()).norm());
            }
        }
        defect
    }

    /// Convert to dense matrix (for debugging/small matrices)
    pub fn to_dense(&self) -> Array2<T> {
        let mut dense = Array2::from_elem((self.num_rows, self.num_cols), T::zero());
        for i in 0..self.num_rows {
            for (j, val) in self.row_entries(i) {
                dense[[i, j]] = val;
            }
        }
        dense
    }
}

impl<T: ComplexField> SparseMatrix<Array1<T>> for CsrMatrix<T> {
    fn m(&self, input: &Array1<T>, out: &mut Array1<T>) {
        self.matvec_into(input, out);
    }

    fn mdag(&self, input: &Array1<T>, out: &mut Array1<T>) {
        self.matvec_adjoint_into(input, out);
    }
}
