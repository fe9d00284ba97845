//! Error type shared by every solver, coarsening and eigensolver entry point

use thiserror::Error;

/// Errors reported by the solvers and the multigrid setup
#[derive(Error, Debug)]
pub enum SolverError {
    /// Two fields (or a field and an operator) disagree on their length
    #[error("Dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    /// A Krylov or eigen iteration ran out of its iteration budget
    #[error(
        "{solver} did not converge after {iterations} iterations: residual {residual:.3e} > target {target:.3e}"
    )]
    DidNotConverge {
        solver: String,
        iterations: usize,
        residual: f64,
        target: f64,
    },

    /// A denominator of the recurrence vanished or became non-finite
    #[error("{solver} broke down at iteration {iteration}: {quantity} vanished")]
    Breakdown {
        solver: String,
        iteration: usize,
        quantity: &'static str,
    },

    /// A block of the trial subspace lost rank during orthonormalisation
    #[error("Subspace vector {vector} is linearly dependent in block {block}")]
    RankDeficient { block: usize, vector: usize },

    /// The Galerkin product was requested on a subspace that is not orthonormal
    #[error("Aggregation subspace must be orthonormalised before coarsening")]
    SubspaceNotOrthonormal,

    /// The operator does not provide the requested capability
    #[error("Operator does not support {0}")]
    Unsupported(&'static str),

    /// A parameter is outside of its admissible range
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Dense factorisation hit a zero pivot
    #[error("Matrix is singular or nearly singular")]
    SingularMatrix,

    #[error("Failed to parse configuration: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to read configuration: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias used across the crate
pub type Result<T> = std::result::Result<T, SolverError>;

impl SolverError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        SolverError::InvalidParameter(message.into())
    }

    /// True when the error only reports an exhausted iteration budget
    pub fn is_convergence_failure(&self) -> bool {
        matches!(self, SolverError::DidNotConverge { .. })
    }

    /// True when the call was rejected before any iteration ran
    pub fn is_precondition_violation(&self) -> bool {
        matches!(
            self,
            SolverError::DimensionMismatch { .. }
                | SolverError::RankDeficient { .. }
                | SolverError::SubspaceNotOrthonormal
                | SolverError::Unsupported(_)
                | SolverError::InvalidParameter(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        let stalled = SolverError::DidNotConverge {
            solver: "CG".to_string(),
            iterations: 10,
            residual: 1e-3,
            target: 1e-8,
        };
        assert!(stalled.is_convergence_failure());
        assert!(!stalled.is_precondition_violation());

        let rejected = SolverError::DimensionMismatch { expected: 4, got: 3 };
        assert!(rejected.is_precondition_violation());
        assert_eq!(rejected.to_string(), "Dimension mismatch: expected 4, got 3");

        let breakdown = SolverError::Breakdown {
            solver: "BiCGSTAB".to_string(),
            iteration: 2,
            quantity: "<r0, v>",
        };
        assert!(!breakdown.is_convergence_failure());
        assert!(!breakdown.is_precondition_violation());
    }
}
