//! Aggregation-based coarsening
//!
//! An [`AggregateMap`] cuts the fine degrees of freedom into blocks, an
//! [`Aggregation`] holds the block-orthonormal trial subspace and acts as the
//! grid transfer, and [`CoarsenedMatrix`] is the Galerkin product `P† A P`.

mod blocking;
mod coarse;
mod subspace;

pub use blocking::AggregateMap;
pub use coarse::CoarsenedMatrix;
pub use subspace::{Aggregation, SubspaceParams};
