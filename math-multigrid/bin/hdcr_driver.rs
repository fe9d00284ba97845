//! Two-level aggregation multigrid on a 2D Wilson-Dirac operator
//!
//! Builds a random-gauge Wilson operator, runs the fine-grid Krylov
//! baselines, constructs the aggregation subspace and Galerkin coarse
//! operator, deflates the coarse normal equations with Lanczos eigenpairs
//! and finally solves with PGCR preconditioned by the two-level cycle.
//!
//! Usage:
//!   cargo run --release --bin hdcr-driver -- --size 16 --mass 0.05
//!   cargo run --release --bin hdcr-driver -- --config setup.json
//!
//! Set `RUST_LOG=info` to follow solver iterations and cycle phases.

use anyhow::{Context, ensure};
use clap::Parser;
use math_audio_multigrid::operators::GradedHermitianOperator;
use math_audio_multigrid::sparse::{random_links, wilson_2d};
use math_audio_multigrid::{
    AggregateMap, Aggregation, BiCgstab, Chebyshev, ChebyshevSmoother, CoarsenedMatrix,
    ConjugateGradient, ConjugateResidual, CsrMatrix, DeflatedGuesser, DenseLu, DiagonalGrading,
    EigenpairSet, Field, FunctionHermOp, GcrConfig, ImplicitlyRestartedLanczos, Involution,
    KrylovConfig, LanczosConfig, LinearOperator, LogMonitor, MdagMLinearOperator, MirsSmoother,
    MultigridSetup, NonHermitianLinearOperator, NormalEquations, OperatorFunction, PlainHermOp,
    PrecGeneralisedConjugateResidual, Preconditioner, SmootherConfig, SolveStats, SolverMonitor,
    SolverWrapper, SpectrumEnd, TwoLevelPreconditioner, ZeroGuesser,
};
use ndarray::Array1;
use num_complex::Complex64;
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

type Vector = Array1<Complex64>;

#[derive(Parser, Debug)]
#[command(name = "hdcr-driver")]
#[command(about = "Two-level aggregation multigrid on a 2D Wilson-Dirac operator")]
struct Args {
    /// Path to JSON multigrid setup
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Lattice extent in both directions
    #[arg(short = 'L', long, default_value = "16")]
    size: usize,

    /// Bare mass of the Wilson operator
    #[arg(short, long, default_value_t = 0.05)]
    mass: f64,

    /// Gauge roughness in [0, 1] (0 = free field)
    #[arg(short, long, default_value_t = 0.3)]
    roughness: f64,

    /// Seed of the gauge field and the source (overrides the setup seed)
    #[arg(long)]
    seed: Option<u64>,

    /// Iteration cap of the fine-grid baselines
    #[arg(long, default_value = "2000")]
    baseline_iterations: usize,

    /// BiCGSTAB sweeps of the comparison smoother
    #[arg(long, default_value = "4")]
    sweeps: usize,

    /// Log solver progress every N iterations
    #[arg(long, default_value = "10")]
    print_interval: usize,

    /// Write the effective setup to this file
    #[arg(long)]
    dump_config: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let args = Args::parse();

    let mut setup = match &args.config {
        Some(path) => MultigridSetup::from_file(path)
            .with_context(|| format!("reading setup {}", path.display()))?,
        None => MultigridSetup::default(),
    };
    if let Some(seed) = args.seed {
        setup.seed = seed;
    }
    ensure!(
        setup.block.len() == 2,
        "the Wilson lattice is two dimensional, got {} block extents",
        setup.block.len()
    );
    if let Some(path) = &args.dump_config {
        setup.to_file(path)?;
        println!("Setup written to {}", path.display());
    }

    println!("=== Two-level aggregation multigrid ===");
    println!("Lattice: {0}x{0}, mass {1}, roughness {2}", args.size, args.mass, args.roughness);
    println!(
        "Blocks: {:?}, nbasis {}, chiral {}",
        setup.block, setup.nbasis, setup.chiral
    );

    let mut rng = StdRng::seed_from_u64(setup.seed);
    let sites = args.size * args.size;
    let links = random_links(sites, args.roughness, &mut rng);
    let dirac = wilson_2d(args.size, args.size, args.mass, Some(&links))?;
    let op = NonHermitianLinearOperator::new(&dirac);
    let gamma = DiagonalGrading::new(vec![1, -1])?;
    let monitor: Arc<dyn SolverMonitor> = Arc::new(LogMonitor {
        print_interval: args.print_interval,
    });

    let b: Vector = Array1::from_shape_fn(dirac.num_rows, |k| {
        Complex64::new((0.37 * k as f64).cos(), (0.11 * k as f64).sin())
    });
    println!("Unknowns: {}", b.len());

    run_baselines(&dirac, &gamma, &b, &args, &monitor)?;

    // Near-null space and coarse operator
    let start = Instant::now();
    let map = AggregateMap::cartesian(&[args.size, args.size], &setup.block, 2)?;
    let mut aggregation = Aggregation::new(map, setup.nbasis)?;
    let mdagm = MdagMLinearOperator::new(&dirac);
    if setup.chiral {
        aggregation.create_chiral_subspace_chebyshev(&mut rng, &mdagm, &setup.subspace, &gamma)?;
    } else {
        aggregation.create_subspace_chebyshev(&mut rng, &mdagm, &setup.subspace)?;
    }
    let coarse = CoarsenedMatrix::coarsen(&op, &aggregation)?;
    println!(
        "\nCoarse operator: {} blocks x {} = {} unknowns, hermiticity defect {:.3e} ({:.1} ms)",
        coarse.num_blocks(),
        coarse.nbasis(),
        coarse.len(),
        coarse.hermiticity_defect(),
        start.elapsed().as_secs_f64() * 1e3
    );

    let lu = DenseLu::from_coarse(&coarse)?;
    let deflation = coarse_deflation(&coarse, &setup, &monitor);
    run_coarse_solves(&coarse, &aggregation, &lu, &deflation, &setup, &b)?;

    // Two-level PGCR with the configured coarse solve
    let coarse_cg = ConjugateGradient::with_config(setup.coarse_solver.clone());
    let coarse_solver = NormalEquations::new(&coarse, &coarse_cg, &deflation);
    let outer = &setup.outer;

    println!("\n--- Two-level PGCR ---");
    match &setup.smoother {
        SmootherConfig::Chebyshev(params) => {
            let smoother = ChebyshevSmoother::new(&dirac, params)?;
            two_level(
                "chebyshev smoother",
                &op,
                &aggregation,
                smoother,
                &coarse_solver,
                outer,
                &b,
                &monitor,
            );
        }
        SmootherConfig::Mirs {
            shift,
            tolerance,
            max_iterations,
        } => {
            let smoother = MirsSmoother::new(&dirac, *shift, *tolerance, *max_iterations)?;
            two_level(
                "MIRS smoother",
                &op,
                &aggregation,
                smoother,
                &coarse_solver,
                outer,
                &b,
                &monitor,
            );
        }
        SmootherConfig::Bicgstab { sweeps } => {
            let sweeps = BiCgstab::with_config(KrylovConfig::smoother(*sweeps));
            let smoother = SolverWrapper::new(&op, &sweeps, &ZeroGuesser);
            two_level(
                "BiCGSTAB smoother",
                &op,
                &aggregation,
                smoother,
                &coarse_solver,
                outer,
                &b,
                &monitor,
            );
        }
    }

    // Smoother comparison: BiCGSTAB sweeps with an exact coarse solve
    if !matches!(setup.smoother, SmootherConfig::Bicgstab { .. }) {
        let sweeps = BiCgstab::with_config(KrylovConfig::smoother(args.sweeps));
        let smoother = SolverWrapper::new(&op, &sweeps, &ZeroGuesser);
        let label = format!("BiCGSTAB({}) smoother, LU coarse", args.sweeps);
        two_level(&label, &op, &aggregation, smoother, &lu, outer, &b, &monitor);
    }

    Ok(())
}

fn run_baselines(
    dirac: &CsrMatrix<Complex64>,
    gamma: &DiagonalGrading,
    b: &Vector,
    args: &Args,
    monitor: &Arc<dyn SolverMonitor>,
) -> anyhow::Result<()> {
    println!("\n--- Fine-grid baselines ---");
    let config = KrylovConfig::approximate(1e-8, args.baseline_iterations);

    // CG on the normal equations
    let mdag_b = dirac.matvec_adjoint(b);
    let cg = ConjugateGradient::with_config(config.clone()).with_monitor(monitor.clone());
    let mut x = b.zeros_like();
    let start = Instant::now();
    let stats = cg.solve(&MdagMLinearOperator::new(dirac), &mdag_b, &mut x)?;
    report("CG on D†D", &stats, start);

    let bicg = BiCgstab::with_config(config.clone()).with_monitor(monitor.clone());
    let mut x = b.zeros_like();
    let start = Instant::now();
    let stats = bicg.solve(&NonHermitianLinearOperator::new(dirac), b, &mut x)?;
    report("BiCGSTAB on D", &stats, start);

    // CR on the Hermitian indefinite γ5 D with source γ5 b
    let graded = GradedHermitianOperator::new(dirac, gamma);
    let mut gb = b.zeros_like();
    Involution::apply(gamma, b, &mut gb);
    let cr = ConjugateResidual::with_config(config).with_monitor(monitor.clone());
    let mut x = b.zeros_like();
    let start = Instant::now();
    let stats = cr.solve(&graded, &gb, &mut x)?;
    report("CR on γ5 D", &stats, start);

    Ok(())
}

/// Lowest eigenpairs of the coarse normal operator; empty on failure
fn coarse_deflation(
    coarse: &CoarsenedMatrix<Complex64>,
    setup: &MultigridSetup,
    monitor: &Arc<dyn SolverMonitor>,
) -> DeflatedGuesser<Vector> {
    println!("\n--- Coarse Lanczos ---");
    let empty = DeflatedGuesser::from_parts(Vec::new(), Vec::new());
    let coarse_mdagm = MdagMLinearOperator::new(coarse);
    let start_vector = Array1::from_elem(coarse.len(), Complex64::new(1.0, 0.0));
    let start = Instant::now();

    let result = match &setup.lanczos_filter {
        Some(params) => Chebyshev::from_params(params).and_then(|poly| {
            let drive = FunctionHermOp::new(&poly, &coarse_mdagm);
            let check = PlainHermOp::new(&coarse_mdagm);
            let config = LanczosConfig {
                target: SpectrumEnd::Largest,
                ..setup.lanczos.clone()
            };
            lanczos(&drive, &check, config, monitor, &start_vector)
        }),
        None => {
            let config = LanczosConfig {
                target: SpectrumEnd::Smallest,
                ..setup.lanczos.clone()
            };
            lanczos(&coarse_mdagm, &coarse_mdagm, config, monitor, &start_vector)
        }
    };

    match result {
        Ok(pairs) => {
            let values = pairs.values();
            println!(
                "{} of {} pairs converged after {} restarts ({:.1} ms)",
                pairs.converged_count(),
                pairs.len(),
                pairs.restarts(),
                start.elapsed().as_secs_f64() * 1e3
            );
            if let (Some(lo), Some(hi)) = (values.first(), values.last()) {
                println!("Eigenvalues of Dc†Dc in [{lo:.4e}, {hi:.4e}]");
            }
            DeflatedGuesser::new(&pairs)
        }
        Err(err) => {
            log::warn!("coarse Lanczos failed, solving without deflation: {}", err);
            empty
        }
    }
}

fn lanczos<A, B>(
    drive: &A,
    check: &B,
    config: LanczosConfig,
    monitor: &Arc<dyn SolverMonitor>,
    start: &Vector,
) -> math_audio_multigrid::Result<EigenpairSet<Vector>>
where
    A: LinearOperator<Vector>,
    B: LinearOperator<Vector>,
{
    ImplicitlyRestartedLanczos::new(drive, check, config)
        .with_monitor(monitor.clone())
        .compute(start)
}

fn run_coarse_solves(
    coarse: &CoarsenedMatrix<Complex64>,
    aggregation: &Aggregation<Complex64>,
    lu: &DenseLu<Complex64>,
    deflation: &DeflatedGuesser<Vector>,
    setup: &MultigridSetup,
    b: &Vector,
) -> anyhow::Result<()> {
    println!("\n--- Coarse solves ---");
    let mut coarse_b = Array1::zeros(aggregation.coarse_len());
    aggregation.project(b, &mut coarse_b);

    let start = Instant::now();
    let exact = lu.solve(&coarse_b)?;
    println!(
        "{:<28} |det| {:.3e} ({:.2} ms)",
        "dense LU",
        lu.abs_determinant(),
        start.elapsed().as_secs_f64() * 1e3
    );

    let cg = ConjugateGradient::with_config(setup.coarse_solver.clone());
    let plain = NormalEquations::new(coarse, &cg, &ZeroGuesser);
    let mut x = coarse_b.zeros_like();
    let start = Instant::now();
    let stats = plain.solve(&coarse_b, &mut x)?;
    report("CGNE", &stats, start);
    println!("{:<28} error vs LU {:.3e}", "", relative_error(&x, &exact));

    let deflated = NormalEquations::new(coarse, &cg, deflation);
    let mut x = coarse_b.zeros_like();
    let start = Instant::now();
    let stats = deflated.solve(&coarse_b, &mut x)?;
    report(&format!("CGNE deflated ({} vectors)", deflation.len()), &stats, start);
    println!("{:<28} error vs LU {:.3e}", "", relative_error(&x, &exact));

    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn two_level<A, S, C>(
    label: &str,
    op: &A,
    aggregation: &Aggregation<Complex64>,
    smoother: S,
    coarse_solver: C,
    outer: &GcrConfig,
    b: &Vector,
    monitor: &Arc<dyn SolverMonitor>,
) where
    A: LinearOperator<Vector>,
    S: Preconditioner<Vector>,
    C: Preconditioner<Vector>,
{
    let mg = TwoLevelPreconditioner::new(op, aggregation, smoother, coarse_solver)
        .with_level(1)
        .with_monitor(monitor.clone());
    let solver = match PrecGeneralisedConjugateResidual::non_hermitian(outer.clone(), &mg) {
        Ok(solver) => solver.with_monitor(monitor.clone()),
        Err(err) => {
            println!("{label:<28} invalid outer configuration: {err}");
            return;
        }
    };
    let mut x = b.zeros_like();
    let start = Instant::now();
    match solver.solve(op, b, &mut x) {
        Ok(stats) => report(label, &stats, start),
        Err(err) => println!("{label:<28} failed: {err}"),
    }
}

fn relative_error(x: &Vector, reference: &Vector) -> f64 {
    let diff = x - reference;
    (diff.norm2() / reference.norm2()).sqrt()
}

fn report(label: &str, stats: &SolveStats, start: Instant) {
    let status = if stats.converged { "converged" } else { "NOT converged" };
    println!(
        "{:<28} {:>5} iterations, residual {:.3e} (true {}) {} in {:.1} ms",
        label,
        stats.iterations,
        stats.residual,
        stats
            .true_residual
            .map_or_else(|| "-".to_string(), |r| format!("{r:.3e}")),
        status,
        start.elapsed().as_secs_f64() * 1e3
    );
}
