//! Diagonal gradings such as γ5

use crate::error::{Result, SolverError};
use crate::traits::{ComplexField, Involution};
use ndarray::Array1;

/// Diagonal ±1 involution repeating a per-site sign pattern
///
/// With the pattern `[1, -1]` and two components per site this is σ₃ acting
/// on every site.
#[derive(Debug, Clone)]
pub struct DiagonalGrading {
    chirality: Vec<i8>,
}

impl DiagonalGrading {
    pub fn new(chirality: Vec<i8>) -> Result<Self> {
        if chirality.is_empty() {
            return Err(SolverError::invalid("grading pattern must not be empty"));
        }
        if chirality.iter().any(|&s| s != 1 && s != -1) {
            return Err(SolverError::invalid("grading pattern entries must be +1 or -1"));
        }
        Ok(Self { chirality })
    }

    pub fn pattern(&self) -> &[i8] {
        &self.chirality
    }
}

impl<T: ComplexField> Involution<Array1<T>> for DiagonalGrading {
    fn apply(&self, input: &Array1<T>, out: &mut Array1<T>) {
        let period = self.chirality.len();
        for (k, (o, &x)) in out.iter_mut().zip(input.iter()).enumerate() {
            *o = if self.chirality[k % period] > 0 { x } else { -x };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_grading_squares_to_identity() {
        let gamma = DiagonalGrading::new(vec![1, -1]).unwrap();
        let x = array![1.0_f64, 2.0, 3.0, 4.0];
        let mut gx = x.clone();
        let mut ggx = x.clone();
        gamma.apply(&x, &mut gx);
        gamma.apply(&gx, &mut ggx);
        assert_eq!(gx, array![1.0_f64, -2.0, 3.0, -4.0]);
        assert_eq!(ggx, x);
    }

    #[test]
    fn test_grading_rejects_bad_pattern() {
        assert!(DiagonalGrading::new(vec![]).is_err());
        assert!(DiagonalGrading::new(vec![1, 0]).is_err());
    }
}
