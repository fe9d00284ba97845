//! Lattice operators used by the driver, the benches and the tests
//!
//! Sites are ordered lexicographically with x running fastest. The Wilson
//! operator carries two spin components per site, spin fastest.

use crate::error::Result;
use crate::sparse::CsrMatrix;
use crate::traits::ComplexField;
use num_complex::Complex64;
use rand::Rng;
use std::f64::consts::PI;

/// 1D Laplacian with Dirichlet boundaries plus a mass term
///
/// Eigenvalues are `mass + 2 - 2 cos(kπ/(n+1))`, k = 1..=n.
pub fn laplacian_1d<T: ComplexField>(n: usize, mass: f64) -> Result<CsrMatrix<T>> {
    let diag = T::from_real(crate::blas_helpers::real(2.0 + mass));
    let off = -T::one();
    let mut triplets = Vec::with_capacity(3 * n);
    for i in 0..n {
        triplets.push((i, i, diag));
        if i > 0 {
            triplets.push((i, i - 1, off));
        }
        if i + 1 < n {
            triplets.push((i, i + 1, off));
        }
    }
    CsrMatrix::from_triplets(n, n, triplets)
}

/// Periodic 2D Laplacian plus a mass term
pub fn laplacian_2d<T: ComplexField>(nx: usize, ny: usize, mass: f64) -> Result<CsrMatrix<T>> {
    let n = nx * ny;
    let diag = T::from_real(crate::blas_helpers::real(4.0 + mass));
    let off = -T::one();
    let mut triplets = Vec::with_capacity(5 * n);
    for y in 0..ny {
        for x in 0..nx {
            let site = x + nx * y;
            triplets.push((site, site, diag));
            for neighbour in [
                (x + 1) % nx + nx * y,
                (x + nx - 1) % nx + nx * y,
                x + nx * ((y + 1) % ny),
                x + nx * ((y + ny - 1) % ny),
            ] {
                triplets.push((site, neighbour, off));
            }
        }
    }
    CsrMatrix::from_triplets(n, n, triplets)
}

/// Random U(1) links, two per site (x then y direction)
///
/// Phases are uniform in `[-roughness π, roughness π]`; `roughness = 0` is the
/// free field.
pub fn random_links<R: Rng>(sites: usize, roughness: f64, rng: &mut R) -> Vec<Complex64> {
    (0..2 * sites)
        .map(|_| {
            let theta = roughness * PI * (2.0 * rng.random::<f64>() - 1.0);
            Complex64::from_polar(1.0, theta)
        })
        .collect()
}

/// Periodic 2D Wilson-Dirac operator with two spin components per site
///
/// `D = (m + 2) - ½ Σ_μ [(1 - σ_μ) U_μ(x) δ_{x+μ} + (1 + σ_μ) U_μ(x-μ)* δ_{x-μ}]`
/// with σ₁, σ₂ the Pauli matrices. The operator is not Hermitian but satisfies
/// `σ₃ D σ₃ = D†`. Without links the free field is used.
pub fn wilson_2d(
    nx: usize,
    ny: usize,
    mass: f64,
    links: Option<&[Complex64]>,
) -> Result<CsrMatrix<Complex64>> {
    let sites = nx * ny;
    if let Some(links) = links {
        if links.len() != 2 * sites {
            return Err(crate::error::SolverError::DimensionMismatch {
                expected: 2 * sites,
                got: links.len(),
            });
        }
    }
    let link = |site: usize, mu: usize| links.map_or(Complex64::new(1.0, 0.0), |u| u[2 * site + mu]);

    let i = Complex64::new(0.0, 1.0);
    let one = Complex64::new(1.0, 0.0);
    let zero = Complex64::new(0.0, 0.0);
    // Pauli matrices for the x and y hops
    let sigma = [[[zero, one], [one, zero]], [[zero, -i], [i, zero]]];

    let mut triplets = Vec::with_capacity(sites * 18);
    for y in 0..ny {
        for x in 0..nx {
            let site = x + nx * y;
            for s in 0..2 {
                triplets.push((2 * site + s, 2 * site + s, Complex64::new(mass + 2.0, 0.0)));
            }
            for (mu, sigma_mu) in sigma.iter().enumerate() {
                let forward = if mu == 0 {
                    (x + 1) % nx + nx * y
                } else {
                    x + nx * ((y + 1) % ny)
                };
                let backward = if mu == 0 {
                    (x + nx - 1) % nx + nx * y
                } else {
                    x + nx * ((y + ny - 1) % ny)
                };
                let u_forward = link(site, mu);
                let u_backward = link(backward, mu).conj();
                for s in 0..2 {
                    for t in 0..2 {
                        let delta = if s == t { one } else { zero };
                        let minus = (delta - sigma_mu[s][t]) * u_forward * -0.5;
                        let plus = (delta + sigma_mu[s][t]) * u_backward * -0.5;
                        triplets.push((2 * site + s, 2 * forward + t, minus));
                        triplets.push((2 * site + s, 2 * backward + t, plus));
                    }
                }
            }
        }
    }
    CsrMatrix::from_triplets(2 * sites, 2 * sites, triplets)
}
