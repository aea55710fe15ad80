//! Vortex-lattice case runner
//!
//! Loads a case file (JSON or TOML), runs the wake relaxation loop and
//! writes the case report plus an optional status table.
//!
//! Usage:
//!   cargo run --release --bin vlm-solve -- wing.toml --output wing.json
//!   cargo run --release --bin vlm-solve -- --help

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use vortex_lattice::core::config::load_config;
use vortex_lattice::core::io::{save_panel_loads, save_span_loads, save_status};
use vortex_lattice::core::survey::line_of_points;
use vortex_lattice::{Vec3, VlmSolver};
use vortex_lattice_solvers::parallel::is_parallel_available;

#[derive(Parser, Debug)]
#[command(name = "vlm-solve")]
#[command(about = "Vortex-lattice aerodynamic solver", long_about = None)]
struct Args {
    /// Case file (.json or .toml)
    case: PathBuf,

    /// Output JSON report
    #[arg(short, long, default_value = "report.json")]
    output: PathBuf,

    /// Fixed-width convergence history
    #[arg(short, long)]
    status: Option<PathBuf>,

    /// Span load table, one block per sheet
    #[arg(long)]
    span_loads: Option<PathBuf>,

    /// Per-panel pressure load table
    #[arg(long)]
    panel_loads: Option<PathBuf>,

    /// Number of parallel threads (default: all cores)
    #[arg(short = 't', long)]
    threads: Option<usize>,

    /// Override the angle of attack in degrees
    #[arg(long)]
    alpha: Option<f64>,

    /// Override the Mach number
    #[arg(long)]
    mach: Option<f64>,

    /// Start from this restart file
    #[arg(long)]
    restart_from: Option<PathBuf>,

    /// Write a restart file when done
    #[arg(long)]
    save_restart: Option<PathBuf>,

    /// Velocity survey along a line: x0 y0 z0 x1 y1 z1
    #[arg(long, num_args = 6, value_names = ["X0", "Y0", "Z0", "X1", "Y1", "Z1"])]
    survey: Option<Vec<f64>>,

    /// Survey points along the line
    #[arg(long, default_value_t = 21)]
    survey_points: usize,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    Ok(std::env::current_dir()?.join(path))
}

fn main() -> Result<()> {
    let args = Args::parse();
    let level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let mut config = load_config(&args.case)
        .with_context(|| format!("loading case file {}", args.case.display()))?;
    if let Some(threads) = args.threads {
        if threads > 1 && !is_parallel_available() {
            log::warn!("Built without the native feature, running on one thread");
        }
        config.solver.threads = threads;
    }
    if let Some(alpha) = args.alpha {
        config.flight.alpha_deg = alpha;
    }
    if let Some(mach) = args.mach {
        config.flight.mach = mach;
    }
    if let Some(path) = &args.restart_from {
        config.restart.load = Some(absolute(path)?);
    }
    if let Some(path) = &args.save_restart {
        config.restart.save = Some(absolute(path)?);
    }

    let base_dir = args.case.parent().map(Path::to_path_buf).unwrap_or_default();
    let mut solver = VlmSolver::from_case_config(config, &base_dir).context("setting up the case")?;
    let report = solver.solve().context("running the case")?;

    println!("\n=== {} ===", report.header.case_id);
    println!("State: {}", report.final_state);
    println!(
        "CL {:.6}  CD {:.6}  CS {:.6}  CMx {:.6}  CMy {:.6}  CMz {:.6}",
        report.coefficients.cl,
        report.coefficients.cd,
        report.coefficients.cs,
        report.coefficients.cmx,
        report.coefficients.cmy,
        report.coefficients.cmz
    );
    if report.forces.cdo > 0.0 {
        println!("CDo {:.6}", report.forces.cdo);
    }

    report
        .save_json(&args.output)
        .with_context(|| format!("writing {}", args.output.display()))?;
    println!("Report written to {}", args.output.display());

    if let Some(path) = &args.status {
        save_status(path, &report.header, &report.history)
            .with_context(|| format!("writing {}", path.display()))?;
        println!("Status written to {}", path.display());
    }

    if let Some(path) = &args.span_loads {
        save_span_loads(path, &report.header, &report.forces.span_loads)
            .with_context(|| format!("writing {}", path.display()))?;
    }
    if let Some(path) = &args.panel_loads {
        let q = solver.config().flight.dynamic_pressure();
        save_panel_loads(path, &report.header, solver.model(), q)
            .with_context(|| format!("writing {}", path.display()))?;
    }
    if report.linear_diverged {
        log::warn!("A linear solve diverged during the run, see the history in {}", args.output.display());
    }

    if let Some(s) = &args.survey {
        let points = line_of_points(
            Vec3::new(s[0], s[1], s[2]),
            Vec3::new(s[3], s[4], s[5]),
            args.survey_points,
        );
        let velocities = solver.survey_velocities(&points);
        println!("\n{:>12} {:>12} {:>12} {:>12} {:>12} {:>12}", "x", "y", "z", "u", "v", "w");
        for (p, v) in points.iter().zip(&velocities) {
            println!(
                "{:>12.6} {:>12.6} {:>12.6} {:>12.6} {:>12.6} {:>12.6}",
                p.x, p.y, p.z, v.x, v.y, v.z
            );
        }
    }

    Ok(())
}
