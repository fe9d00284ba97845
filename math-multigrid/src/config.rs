//! JSON configuration of a two-level solve

use crate::aggregation::SubspaceParams;
use crate::chebyshev::ChebyshevParams;
use crate::eigen::LanczosConfig;
use crate::error::{Result, SolverError};
use crate::iterative::{GcrConfig, KrylovConfig};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Fine-grid smoother of the two-level cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SmootherConfig {
    /// Chebyshev approximation of (M†M)⁻¹ on `[lo, hi]`
    Chebyshev(ChebyshevParams),
    /// CG on `M†M + shift`
    Mirs {
        shift: f64,
        tolerance: f64,
        max_iterations: usize,
    },
    /// Fixed number of BiCGSTAB iterations
    Bicgstab { sweeps: usize },
}

impl Default for SmootherConfig {
    fn default() -> Self {
        SmootherConfig::Chebyshev(ChebyshevParams::default())
    }
}

/// Everything needed to build and run a two-level solve
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MultigridSetup {
    /// Block extents per lattice direction
    pub block: Vec<usize>,
    /// Basis vectors per aggregate
    pub nbasis: usize,
    /// Split the subspace by chirality (needs an even nbasis)
    pub chiral: bool,
    pub subspace: SubspaceParams,
    pub smoother: SmootherConfig,
    /// Inner CG of the coarse normal equations
    pub coarse_solver: KrylovConfig,
    /// Outer PGCR
    pub outer: GcrConfig,
    /// Coarse Lanczos run feeding the deflated coarse solve
    pub lanczos: LanczosConfig,
    /// Optional polynomial filter driving the coarse Lanczos run
    pub lanczos_filter: Option<ChebyshevParams>,
    pub seed: u64,
}

impl Default for MultigridSetup {
    fn default() -> Self {
        Self {
            block: vec![4, 4],
            nbasis: 8,
            chiral: true,
            subspace: SubspaceParams::default(),
            smoother: SmootherConfig::default(),
            coarse_solver: KrylovConfig::approximate(1e-6, 1000),
            outer: GcrConfig::default(),
            lanczos: LanczosConfig::default(),
            lanczos_filter: None,
            seed: 1234,
        }
    }
}

impl MultigridSetup {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let setup: Self = serde_json::from_str(json)?;
        setup.validate()?;
        Ok(setup)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        fs::write(path, self.to_json_string()?)?;
        Ok(())
    }

    /// Checks that do not depend on the operator
    pub fn validate(&self) -> Result<()> {
        if self.block.is_empty() || self.block.contains(&0) {
            return Err(SolverError::invalid("block extents must be positive"));
        }
        if self.nbasis == 0 {
            return Err(SolverError::invalid("nbasis must be at least 1"));
        }
        if self.chiral && self.nbasis % 2 != 0 {
            return Err(SolverError::invalid(format!(
                "chirality split needs an even nbasis, got {}",
                self.nbasis
            )));
        }
        if self.outer.mmax == 0 || self.outer.nstep == 0 {
            return Err(SolverError::invalid("outer PGCR needs mmax >= 1 and nstep >= 1"));
        }
        Ok(())
    }
}
