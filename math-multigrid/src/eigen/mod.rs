//! Eigensolvers
//!
//! [`ImplicitlyRestartedLanczos`] computes low (or filtered) modes of a
//! Hermitian operator; the resulting [`EigenpairSet`] feeds the
//! [`crate::guess::DeflatedGuesser`].

mod dense;
mod lanczos;

pub use dense::symmetric_eigen;
pub use lanczos::{Eigenpair, EigenpairSet, ImplicitlyRestartedLanczos, LanczosConfig, SpectrumEnd};
