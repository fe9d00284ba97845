//! Sparse matrix structures (CSR format) and the lattice stencils built on them

mod csr;
pub mod stencil;

pub use csr::CsrMatrix;
pub use stencil::{laplacian_1d, laplacian_2d, random_links, wilson_2d};
