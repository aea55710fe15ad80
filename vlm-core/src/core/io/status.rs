//! Case report (JSON) and status history (fixed-width text)

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use serde::Serialize;

use crate::core::config::{CaseConfig, ForceType, SolverMode};
use crate::core::error::Result;
use crate::core::forces::{ForceCoefficients, ForceReport};
use crate::core::types::{SymmetryPlane, Vec3};
use crate::core::wake::WakeState;

/// One outer-loop record
#[derive(Debug, Clone, Serialize)]
pub struct HistoryEntry {
    pub iteration: usize,
    pub state: WakeState,
    /// ‖b − AΓ‖₂ after the wake update
    pub l2_residual: f64,
    /// log10 residual reduction of the linear solve
    pub log_reduction: f64,
    pub linear_iterations: usize,
    pub linear_converged: bool,
    /// A multigrid cycle raised the residual and the solve was cut short
    pub linear_diverged: bool,
    /// Largest wake node displacement relative to the wake length
    pub wake_displacement: f64,
    pub coefficients: ForceCoefficients,
}

/// Run configuration written at the top of every report
#[derive(Debug, Clone, Serialize)]
pub struct CaseHeader {
    pub case_id: String,
    pub version: String,
    pub git_hash: String,
    pub mach: f64,
    pub alpha_deg: f64,
    pub beta_deg: f64,
    pub velocity: f64,
    pub density: f64,
    pub reynolds: f64,
    pub sref: f64,
    pub cref: f64,
    pub bref: f64,
    pub cg: Vec3,
    /// Rotation rates (p, q, r)
    pub rates: Vec3,
    pub symmetry: Option<SymmetryPlane>,
    pub solver_mode: String,
    pub multigrid_levels: usize,
    pub force_type: String,
}

impl CaseHeader {
    pub fn from_config(config: &CaseConfig) -> Self {
        let solver_mode = match config.solver.mode {
            SolverMode::Jacobi { relaxation } => format!("jacobi (relaxation {})", relaxation),
            SolverMode::Gmres {
                restart, max_outer, ..
            } => format!("gmres (restart {}, max outer {})", restart, max_outer),
        };
        let force_type = match config.forces.force_type {
            ForceType::Instantaneous { method } => format!("{:?}", method),
            ForceType::Averaged { method, steps } => format!("{:?} averaged over {}", method, steps),
        };
        Self {
            case_id: config.case_id.clone(),
            version: crate::VERSION.to_string(),
            git_hash: crate::GIT_HASH.to_string(),
            mach: config.flight.mach,
            alpha_deg: config.flight.alpha_deg,
            beta_deg: config.flight.beta_deg,
            velocity: config.flight.velocity,
            density: config.flight.density,
            reynolds: config.flight.reynolds,
            sref: config.reference.sref,
            cref: config.reference.cref,
            bref: config.reference.bref,
            cg: config.reference.cg,
            rates: config.rates.vector(),
            symmetry: config.symmetry,
            solver_mode,
            multigrid_levels: config.solver.multigrid_levels,
            force_type,
        }
    }
}

/// Assembly counts reported with the case
#[derive(Debug, Clone, Default, Serialize)]
pub struct AssemblySummary {
    pub loops: usize,
    pub trailing_lines: usize,
    pub multigrid_levels: usize,
    pub near_entries: usize,
    pub far_entries: usize,
    pub skipped_clusters: usize,
    pub excluded_coefficients: usize,
}

/// Complete result of one case
#[derive(Debug, Clone, Serialize)]
pub struct CaseReport {
    pub header: CaseHeader,
    pub final_state: WakeState,
    pub converged: bool,
    /// Some linear solve of the run diverged
    pub linear_diverged: bool,
    pub assembly: AssemblySummary,
    pub history: Vec<HistoryEntry>,
    /// Coefficients of the configured force type, averaged when requested
    pub coefficients: ForceCoefficients,
    pub forces: ForceReport,
}

impl CaseReport {
    /// Pretty JSON
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path.as_ref())?);
        serde_json::to_writer_pretty(&mut writer, self)?;
        writer.flush()?;
        Ok(())
    }
}

/// Fixed-width status table: header lines, then one row per history entry
pub fn write_status<W: Write>(writer: &mut W, header: &CaseHeader, history: &[HistoryEntry]) -> std::io::Result<()> {
    writeln!(writer, "# case {} (vortex-lattice {} {})", header.case_id, header.version, header.git_hash)?;
    writeln!(
        writer,
        "# Mach {:.4}  AoA {:.4}  Beta {:.4}  Sref {:.6}  Cref {:.6}  Bref {:.6}",
        header.mach, header.alpha_deg, header.beta_deg, header.sref, header.cref, header.bref
    )?;
    writeln!(
        writer,
        "# CG ({:.6}, {:.6}, {:.6})  solver {}  levels {}",
        header.cg.x, header.cg.y, header.cg.z, header.solver_mode, header.multigrid_levels
    )?;
    writeln!(
        writer,
        "{:>5} {:>22} {:>13} {:>9} {:>6} {:>4} {:>12} {:>12} {:>12} {:>12} {:>12}",
        "iter", "state", "l2_residual", "log_red", "lin_it", "lin", "CL", "CD", "CS", "CMy", "wake_dx"
    )?;
    for h in history {
        let linear = if h.linear_diverged {
            "div"
        } else if h.linear_converged {
            "ok"
        } else {
            "max"
        };
        writeln!(
            writer,
            "{:>5} {:>22} {:>13.6e} {:>9.3} {:>6} {:>4} {:>12.8} {:>12.8} {:>12.8} {:>12.8} {:>12.4e}",
            h.iteration,
            h.state.to_string(),
            h.l2_residual,
            h.log_reduction,
            h.linear_iterations,
            linear,
            h.coefficients.cl,
            h.coefficients.cd,
            h.coefficients.cs,
            h.coefficients.cmy,
            h.wake_displacement
        )?;
    }
    Ok(())
}

/// Write the status table to a file
pub fn save_status<P: AsRef<Path>>(path: P, header: &CaseHeader, history: &[HistoryEntry]) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path.as_ref())?);
    write_status(&mut writer, header, history)?;
    writer.flush()?;
    Ok(())
}
