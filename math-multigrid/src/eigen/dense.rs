//! Cyclic Jacobi eigensolver for small real symmetric matrices
//!
//! Lanczos only ever diagonalises its projected matrix (tridiagonal, or arrow
//! plus tridiagonal after a thick restart), a few dozen rows at most.

use crate::error::{Result, SolverError};
use ndarray::Array2;

const MAX_SWEEPS: usize = 64;

/// Eigenvalues in ascending order and the matching orthonormal eigenvectors
/// as columns
pub fn symmetric_eigen(matrix: &Array2<f64>) -> Result<(Vec<f64>, Array2<f64>)> {
    let n = matrix.nrows();
    if n != matrix.ncols() {
        return Err(SolverError::DimensionMismatch {
            expected: n,
            got: matrix.ncols(),
        });
    }

    let mut a = matrix.clone();
    let mut v = Array2::<f64>::eye(n);
    let frobenius: f64 = a.iter().map(|x| x * x).sum();

    let mut sweep = 0;
    loop {
        let off: f64 = (0..n)
            .flat_map(|p| (p + 1..n).map(move |q| (p, q)))
            .map(|(p, q)| a[[p, q]] * a[[p, q]])
            .sum();
        if off <= f64::EPSILON * f64::EPSILON * frobenius {
            break;
        }
        if sweep == MAX_SWEEPS {
            return Err(SolverError::DidNotConverge {
                solver: "Jacobi".to_string(),
                iterations: sweep,
                residual: off.sqrt(),
                target: f64::EPSILON * frobenius.sqrt(),
            });
        }
        sweep += 1;

        for p in 0..n {
            for q in p + 1..n {
                let apq = a[[p, q]];
                if apq.abs() <= 0.5 * f64::EPSILON * (a[[p, p]].abs() + a[[q, q]].abs()) {
                    // below the rounding of the diagonal
                    a[[p, q]] = 0.0;
                    a[[q, p]] = 0.0;
                    continue;
                }
                let theta = (a[[q, q]] - a[[p, p]]) / (2.0 * apq);
                let sign = if theta >= 0.0 { 1.0 } else { -1.0 };
                let t = sign / (theta.abs() + (theta * theta + 1.0).sqrt());
                let c = 1.0 / (t * t + 1.0).sqrt();
                let s = t * c;

                for k in 0..n {
                    let (akp, akq) = (a[[k, p]], a[[k, q]]);
                    a[[k, p]] = c * akp - s * akq;
                    a[[k, q]] = s * akp + c * akq;
                }
                for k in 0..n {
                    let (apk, aqk) = (a[[p, k]], a[[q, k]]);
                    a[[p, k]] = c * apk - s * aqk;
                    a[[q, k]] = s * apk + c * aqk;
                }
                for k in 0..n {
                    let (vkp, vkq) = (v[[k, p]], v[[k, q]]);
                    v[[k, p]] = c * vkp - s * vkq;
                    v[[k, q]] = s * vkp + c * vkq;
                }
                a[[p, q]] = 0.0;
                a[[q, p]] = 0.0;
            }
        }
    }

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&i, &j| a[[i, i]].total_cmp(&a[[j, j]]));
    let values = order.iter().map(|&i| a[[i, i]]).collect();
    let vectors = Array2::from_shape_fn((n, n), |(row, col)| v[[row, order[col]]]);
    Ok((values, vectors))
}
