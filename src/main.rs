// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::info;

use hypcomp::geometry::Geometry;
use hypcomp::io;
use hypcomp::logging;
use hypcomp::orchestrator::{ComparisonOrchestrator, PhaseAliases, SweepProgress, SweepSpec};
use hypcomp::solver::SolverKind;

/// Aligned table of a single-scenario run, inside the output directory.
const SCENARIO_TABLE_FILE: &str = "aligned.csv";

#[derive(Parser)]
#[command(
    name = "hypcomp",
    about = "Compare travel times from TauP, HYPOMOD and TTLAYER for one geometry"
)]
struct Cli {
    /// Geometry of stations and earthquake (R, S and E records)
    #[arg(short = 'g', long, default_value = "geometry_setup.job")]
    geometry: PathBuf,

    /// Velocity model, one `depth,vp,vs[,marker]` line per sample (km, km/s)
    #[arg(short = 'v', long, default_value = "vel.csv")]
    vel: PathBuf,

    /// Output directory for generated files, tables and the log
    #[arg(short = 'o', long, default_value = "out")]
    out: PathBuf,

    /// File with the list of phases
    #[arg(long, default_value = "phases.dat")]
    phase_file: PathBuf,

    /// Solver to run: taup, hypomod or ttlayer (repeatable; default taup and hypomod)
    #[arg(long = "solver", num_args = 1)]
    solvers: Vec<String>,

    /// Timeout for every solver process, in seconds
    #[arg(long, default_value = "60")]
    timeout: f64,

    /// Relative tolerance between planar and ellipsoidal distances
    #[arg(short = 't', long, default_value = "1e-5")]
    tolerance: f64,

    /// Number of Rayon worker threads
    #[arg(long)]
    threads: Option<usize>,

    /// Phase alias `<solver>:<label>=<canonical>` (repeatable)
    #[arg(long, num_args = 1)]
    alias: Vec<String>,

    /// Distance sweep `<start>,<stop>,<step>` in km instead of a single scenario
    #[arg(long)]
    sweep: Option<String>,

    /// Sweep direction as a local `<x>,<y>` vector (used with --sweep)
    #[arg(long, default_value = "0,1", allow_hyphen_values = true)]
    direction: String,

    /// Name of the swept station (default: first station of the geometry)
    #[arg(long)]
    sweep_station: Option<String>,

    /// Give every sweep step its own step_NNN subdirectory
    #[arg(long)]
    isolate_steps: bool,

    /// Print sweep progress to stderr
    #[arg(long)]
    progress: bool,

    /// Log debug detail (overridden by RUST_LOG)
    #[arg(long)]
    verbose: bool,
}

fn parse_floats(s: &str, n: usize, what: &str) -> Result<Vec<f64>> {
    let parts: Vec<f64> = s
        .split(',')
        .map(|p| p.trim().parse::<f64>())
        .collect::<std::result::Result<Vec<_>, _>>()
        .with_context(|| format!("invalid {}: expected comma-separated floats", what))?;
    if parts.len() != n {
        bail!("{} has {} components, expected {}", what, parts.len(), n);
    }
    Ok(parts)
}

fn build_orchestrator(cli: &Cli) -> Result<ComparisonOrchestrator> {
    if !cli.timeout.is_finite() || cli.timeout <= 0.0 {
        bail!("--timeout must be positive, got {}", cli.timeout);
    }

    let kinds: Vec<SolverKind> = if cli.solvers.is_empty() {
        vec![SolverKind::Taup, SolverKind::Hypomod]
    } else {
        cli.solvers
            .iter()
            .map(|s| s.parse::<SolverKind>())
            .collect::<std::result::Result<Vec<_>, _>>()?
    };

    let mut aliases = PhaseAliases::new();
    for spec in &cli.alias {
        aliases.insert_spec(spec)?;
    }

    let timeout = Duration::try_from_secs_f64(cli.timeout)
        .with_context(|| format!("--timeout {} is out of range", cli.timeout))?;

    let mut orch = ComparisonOrchestrator::new(&cli.out, timeout)
        .with_phase_aliases(aliases)
        .isolate_steps(cli.isolate_steps);
    for kind in kinds {
        orch = orch.with_adapter(kind.adapter());
    }
    if let Some(threads) = cli.threads {
        orch = orch.with_threads(threads);
    }
    if cli.progress {
        orch = orch.with_progress(Box::new(|info: SweepProgress| {
            eprintln!(
                "[{:.1}s] step {}/{} distance={} km",
                info.elapsed.as_secs_f64(),
                info.step,
                info.total_steps,
                info.distance_km,
            );
        }));
    }
    Ok(orch)
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    for f in [&cli.geometry, &cli.vel, &cli.phase_file] {
        if !f.exists() {
            bail!("could not find input file: {}", f.display());
        }
    }
    fs::create_dir_all(&cli.out)
        .with_context(|| format!("could not create output directory {}", cli.out.display()))?;
    if !cli.out.is_dir() {
        bail!("output directory {} is not a directory", cli.out.display());
    }

    let _guard = logging::init_logging(&cli.out, cli.verbose)?;
    info!("output directory: {}", cli.out.display());

    let description = io::load_geometry_file(&cli.geometry)?;
    let velocity = io::load_velocity_file(&cli.vel)?;
    let phases = io::load_phase_list(&cli.phase_file)?;
    info!("phases: {}", phases.names().join(", "));

    let geometry = Geometry::setup_with_tolerance(
        description.reference,
        description.stations,
        description.earthquake,
        velocity,
        cli.tolerance,
    )
    .context("geometry setup failed")?;

    let orch = build_orchestrator(&cli)?;

    if let Some(sweep) = &cli.sweep {
        let range = parse_floats(sweep, 3, "--sweep")?;
        let direction = parse_floats(&cli.direction, 2, "--direction")?;
        let mut spec = SweepSpec::new(range[0], range[1], range[2])?
            .with_direction(direction[0], direction[1])?;
        if let Some(name) = &cli.sweep_station {
            spec = spec.with_station(name);
        }

        let table = orch.sweep(&geometry, &phases, &spec)?;
        info!(
            "sweep done: {} rows, {} unmatched phases",
            table.rows.len(),
            table.unmatched.len()
        );
        return Ok(());
    }

    let result = orch.run_scenario(&geometry, &phases)?;
    let failed = result.failed();
    if failed.len() == result.outcomes.len() {
        bail!("every solver failed: {}", failed.join(", "));
    }

    let table = orch.align_by_station_and_phase(&result);
    let path = cli.out.join(SCENARIO_TABLE_FILE);
    io::write_aligned_table(&path, &table)?;
    info!(
        "wrote {} ({} rows, {} unmatched phases)",
        path.display(),
        table.rows.len(),
        table.unmatched.len()
    );
    if !failed.is_empty() {
        info!("solvers that failed: {}", failed.join(", "));
    }

    Ok(())
}
