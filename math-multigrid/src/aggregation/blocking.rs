//! Aggregates of fine degrees of freedom
//!
//! A Cartesian lattice is cut into equal hypercubic blocks, keeping the
//! internal components of a site inside its block.

use crate::error::{Result, SolverError};

/// Partition of the fine degrees of freedom into aggregates (blocks)
///
/// Every fine index belongs to exactly one block and no block is empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregateMap {
    block_of: Vec<usize>,
    blocks: Vec<Vec<usize>>,
}

impl AggregateMap {
    /// Build from an explicit block index per fine degree of freedom
    pub fn from_assignment(block_of: Vec<usize>) -> Result<Self> {
        let num_blocks = block_of.iter().max().map_or(0, |&b| b + 1);
        let mut blocks = vec![Vec::new(); num_blocks];
        for (fine, &block) in block_of.iter().enumerate() {
            blocks[block].push(fine);
        }
        if let Some(empty) = blocks.iter().position(Vec::is_empty) {
            return Err(SolverError::invalid(format!("aggregate {empty} is empty")));
        }
        Ok(Self { block_of, blocks })
    }

    /// Consecutive runs of `block_len` fine degrees of freedom
    pub fn contiguous(fine_len: usize, block_len: usize) -> Result<Self> {
        if block_len == 0 || fine_len % block_len != 0 {
            return Err(SolverError::invalid(format!(
                "block length {block_len} does not divide {fine_len}"
            )));
        }
        Self::from_assignment((0..fine_len).map(|i| i / block_len).collect())
    }

    /// Hypercubic blocking of a lattice
    ///
    /// `dims` are the lattice extents, `block` the block extents per direction
    /// and `dofs_per_site` the number of components stored per site (site
    /// index runs slowest). Sites and blocks are ordered lexicographically with
    /// the first direction fastest.
    pub fn cartesian(dims: &[usize], block: &[usize], dofs_per_site: usize) -> Result<Self> {
        if dims.len() != block.len() {
            return Err(SolverError::DimensionMismatch {
                expected: dims.len(),
                got: block.len(),
            });
        }
        if dofs_per_site == 0 || dims.is_empty() {
            return Err(SolverError::invalid("lattice needs at least one direction and one component"));
        }
        for (d, (&n, &b)) in dims.iter().zip(block).enumerate() {
            if b == 0 || n % b != 0 {
                return Err(SolverError::invalid(format!(
                    "block extent {b} does not divide lattice extent {n} in direction {d}"
                )));
            }
        }

        let coarse: Vec<usize> = dims.iter().zip(block).map(|(n, b)| n / b).collect();
        let sites: usize = dims.iter().product();
        let mut block_of = Vec::with_capacity(sites * dofs_per_site);
        for site in 0..sites {
            let mut rest = site;
            let mut index = 0;
            let mut stride = 1;
            for d in 0..dims.len() {
                let x = rest % dims[d];
                rest /= dims[d];
                index += (x / block[d]) * stride;
                stride *= coarse[d];
            }
            block_of.extend(std::iter::repeat_n(index, dofs_per_site));
        }
        Self::from_assignment(block_of)
    }

    pub fn num_blocks(&self) -> usize {
        self.blocks.len()
    }

    pub fn fine_len(&self) -> usize {
        self.block_of.len()
    }

    pub fn block_of(&self, fine: usize) -> usize {
        self.block_of[fine]
    }

    /// Fine indices of a block, ascending
    pub fn block(&self, block: usize) -> &[usize] {
        &self.blocks[block]
    }

    pub fn blocks(&self) -> &[Vec<usize>] {
        &self.blocks
    }

    /// Size of the largest block
    pub fn max_block_len(&self) -> usize {
        self.blocks.iter().map(Vec::len).max().unwrap_or(0)
    }
}
