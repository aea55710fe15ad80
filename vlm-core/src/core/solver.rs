//! Wake relaxation loop
//!
//! [`VlmSolver`] owns the model, the kernel geometry and the multigrid
//! coordinator, and drives them through the [`WakeState`] machine:
//!
//! 1. **Initializing**: build the model, lay the wake along the free stream,
//!    assemble every level, zero circulation
//! 2. **RigidWakeIteration**: solve on the fixed initial wake
//! 3. **RelaxingWake**: solve, align the wake with the local flow, commit the
//!    new wake at a barrier, rebuild the wake coefficients, measure the
//!    tangency residual
//! 4. **Converged** / **MaxIterationsReached**: the last circulation and wake
//!    are kept either way
//!
//! Loading a restart file skips the rigid stage.

use std::path::{Path, PathBuf};

use ndarray::Array1;
use vortex_lattice_solvers::LinearOperator;
use vortex_lattice_solvers::blas_helpers::vector_norm;
use vortex_lattice_solvers::parallel::with_thread_pool;

use crate::core::assembly::{InfluenceSettings, KernelGeometry, VelocityField};
use crate::core::config::{CaseConfig, load_config};
use crate::core::constants::prandtl_glauert_beta;
use crate::core::error::Result;
use crate::core::forces::{
    CoefficientWindow, ForceReport, apply_surface_loads, surface_loads, trefftz_plane,
};
use crate::core::io::restart::{RestartData, load_restart, save_restart};
use crate::core::io::status::{AssemblySummary, CaseHeader, CaseReport, HistoryEntry};
use crate::core::mesh::SurfaceMesh;
use crate::core::model::VortexLatticeModel;
use crate::core::multigrid::{LinearSolveReport, MultigridCoordinator};
use crate::core::onset::OnsetFlow;
use crate::core::survey::survey_velocities;
use crate::core::types::Vec3;
use crate::core::wake::{WakeState, initialize_wake, relax_wake};

/// Mutable state threaded through the pipeline stages
#[derive(Debug, Clone)]
pub struct SolverState {
    pub gamma: Array1<f64>,
    pub rhs: Array1<f64>,
    pub wake_state: WakeState,
    pub rigid_iterations: usize,
    /// Relaxation cycles performed, including those of a restart file
    pub wake_iterations: usize,
    pub l2_residual: f64,
    pub last_linear: Option<LinearSolveReport>,
    pub history: Vec<HistoryEntry>,
    pub window: CoefficientWindow,
}

/// Vortex-lattice solver for one case
#[derive(Debug, Clone)]
pub struct VlmSolver {
    config: CaseConfig,
    model: VortexLatticeModel,
    geometry: KernelGeometry,
    coordinator: MultigridCoordinator,
    settings: InfluenceSettings,
    onset: OnsetFlow,
    state: SolverState,
}

impl VlmSolver {
    /// Build everything needed before the first solve
    pub fn setup(config: CaseConfig, mesh: &SurfaceMesh) -> Result<Self> {
        config.validate()?;
        let mut model = VortexLatticeModel::from_mesh(mesh, config.symmetry, config.rotors.clone())?;
        initialize_wake(&mut model, config.flight.direction(), &config.wake)?;

        let beta = prandtl_glauert_beta(config.flight.mach);
        let core = config.influence.core_ratio * model.mean_edge_length;
        let settings = InfluenceSettings::from_config(&config.influence);
        let onset = OnsetFlow::from_config(&config);

        let (geometry, coordinator) = with_thread_pool(config.solver.threads, || {
            let geometry = KernelGeometry::new(&model, beta, core);
            let coordinator =
                MultigridCoordinator::new(&model, &geometry, config.solver.multigrid_levels, &settings);
            (geometry, coordinator)
        });
        let diagnostics = coordinator.fine().diagnostics();
        log::info!(
            "Assembled {} loops: {} near entries, {} far entries, {} skipped clusters, {} levels",
            model.num_loops(),
            diagnostics.near_entries,
            diagnostics.far_entries,
            diagnostics.skipped_clusters,
            coordinator.num_levels()
        );

        let n = model.num_loops();
        let state = SolverState {
            gamma: Array1::zeros(n),
            rhs: onset.rhs(&model),
            wake_state: WakeState::Initializing,
            rigid_iterations: 0,
            wake_iterations: 0,
            l2_residual: f64::INFINITY,
            last_linear: None,
            history: Vec::new(),
            window: CoefficientWindow::new(config.forces.force_type.window()),
        };

        let restart = config.restart.load.clone();
        let mut solver = Self {
            config,
            model,
            geometry,
            coordinator,
            settings,
            onset,
            state,
        };
        solver.state.wake_state = WakeState::RigidWakeIteration;
        if let Some(path) = restart {
            solver.load_restart(path)?;
        }
        Ok(solver)
    }

    /// Load a case file and its geometry; relative paths are resolved
    /// against the case file's directory
    pub fn from_case_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        let config = load_config(path)?;
        Self::from_case_config(config, &base_dir)
    }

    /// Build the mesh named by the configuration and set up the case
    pub fn from_case_config(mut config: CaseConfig, base_dir: &Path) -> Result<Self> {
        let resolve = |p: &PathBuf| if p.is_absolute() { p.clone() } else { base_dir.join(p) };
        config.restart.load = config.restart.load.as_ref().map(resolve);
        config.restart.save = config.restart.save.as_ref().map(resolve);
        let mesh = config.load_mesh(base_dir)?;
        Self::setup(config, &mesh)
    }

    pub fn config(&self) -> &CaseConfig {
        &self.config
    }

    pub fn model(&self) -> &VortexLatticeModel {
        &self.model
    }

    pub fn state(&self) -> &SolverState {
        &self.state
    }

    pub fn coordinator(&self) -> &MultigridCoordinator {
        &self.coordinator
    }

    pub fn geometry(&self) -> &KernelGeometry {
        &self.geometry
    }

    pub fn onset(&self) -> &OnsetFlow {
        &self.onset
    }

    /// ‖b − AΓ‖₂ for the current circulation and wake
    pub fn residual(&self) -> f64 {
        vector_norm(&self.coordinator.fine().residual(&self.state.gamma, &self.state.rhs))
    }

    /// Snapshot for a restart file
    pub fn restart_data(&self) -> RestartData {
        RestartData {
            case_id: self.config.case_id.clone(),
            circulation: self.state.gamma.to_vec(),
            wake: self.model.wake_positions(),
            wake_iteration: self.state.wake_iterations,
        }
    }

    /// Seed circulation and wake from a restart record
    pub fn apply_restart(&mut self, data: RestartData) -> Result<()> {
        data.check(&self.config.case_id, self.model.num_loops(), self.model.num_lines())?;
        self.model.set_wake_positions(data.wake)?;
        self.geometry.refresh_wake(&self.model);
        let geometry = &self.geometry;
        let coordinator = &mut self.coordinator;
        with_thread_pool(self.config.solver.threads, || coordinator.refresh_wake(geometry));

        let gamma = Array1::from_vec(data.circulation);
        self.model.set_circulation(&gamma)?;
        self.state.gamma = gamma;
        self.state.wake_iterations = data.wake_iteration;
        self.state.l2_residual = self.residual();
        self.state.wake_state = WakeState::RelaxingWake;
        Ok(())
    }

    pub fn load_restart<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let data = load_restart(path)?;
        self.apply_restart(data)
    }

    pub fn save_restart<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        save_restart(path, &self.restart_data())?;
        Ok(())
    }

    /// Run the state machine to a terminal state and report
    pub fn solve(&mut self) -> Result<CaseReport> {
        let threads = self.config.solver.threads;
        let report = with_thread_pool(threads, || -> Result<CaseReport> {
            while !self.state.wake_state.is_terminal() {
                self.step()?;
            }
            Ok(self.case_report())
        })?;
        if let Some(path) = self.config.restart.save.clone() {
            self.save_restart(path)?;
        }
        log::info!(
            "Case '{}' finished: {} after {} relaxation cycles, residual {:.3e}, CL {:.6}, CD {:.6}",
            self.config.case_id,
            self.state.wake_state,
            self.state.wake_iterations,
            self.state.l2_residual,
            report.coefficients.cl,
            report.coefficients.cd
        );
        Ok(report)
    }

    /// Advance the state machine by one transition
    pub fn step(&mut self) -> Result<WakeState> {
        match self.state.wake_state {
            WakeState::Initializing => {
                self.state.wake_state = WakeState::RigidWakeIteration;
            }
            WakeState::RigidWakeIteration => self.rigid_step()?,
            WakeState::RelaxingWake => self.relax_step()?,
            WakeState::Converged | WakeState::MaxIterationsReached => {}
        }
        Ok(self.state.wake_state)
    }

    fn rigid_step(&mut self) -> Result<()> {
        let report = self.linear_solve()?;
        self.state.rigid_iterations += 1;
        self.state.l2_residual = report.residual;
        self.record(WakeState::RigidWakeIteration, &report, 0.0);

        // The wake is frozen here, so once the solve converges further
        // rigid passes cannot change the circulation
        let wake = &self.config.wake;
        if report.converged || self.state.rigid_iterations >= wake.rigid_iterations {
            self.state.wake_state = if wake.relax_iterations > self.state.wake_iterations {
                WakeState::RelaxingWake
            } else if report.converged {
                WakeState::Converged
            } else {
                WakeState::MaxIterationsReached
            };
        }
        self.state.last_linear = Some(report);
        Ok(())
    }

    fn relax_step(&mut self) -> Result<()> {
        if self.state.wake_iterations >= self.config.wake.relax_iterations {
            self.state.wake_state = WakeState::MaxIterationsReached;
            return Ok(());
        }
        let report = self.linear_solve()?;

        let update = {
            let field = VelocityField::new(
                &self.geometry,
                self.coordinator.fine_loops(),
                self.coordinator.fine(),
                &self.state.gamma,
                self.settings.criterion,
            );
            let model = &self.model;
            let onset = &self.onset;
            relax_wake(model, |p| onset.total_at(model, p) + field.induced(p), self.config.wake.relaxation)
        };

        // Barrier: the whole wake moves before anything is reassembled
        self.model.set_wake_positions(update.positions)?;
        self.geometry.refresh_wake(&self.model);
        self.coordinator.refresh_wake(&self.geometry);

        self.state.wake_iterations += 1;
        self.state.l2_residual = self.residual();
        self.record(WakeState::RelaxingWake, &report, update.max_displacement);
        log::info!(
            "Wake cycle {}: residual {:.6e}, wake moved {:.3e}",
            self.state.wake_iterations,
            self.state.l2_residual,
            update.max_displacement
        );

        if self.state.l2_residual < self.config.wake.tolerance {
            self.state.wake_state = WakeState::Converged;
        } else if self.state.wake_iterations >= self.config.wake.relax_iterations {
            self.state.wake_state = WakeState::MaxIterationsReached;
        }
        self.state.last_linear = Some(report);
        Ok(())
    }

    /// Solve the tangency system on the current wake, warm started
    fn linear_solve(&mut self) -> Result<LinearSolveReport> {
        let report = self
            .coordinator
            .solve(&self.config.solver, &self.state.rhs, Some(&self.state.gamma))?;
        self.model.set_circulation(&report.gamma)?;
        self.state.gamma = report.gamma.clone();
        Ok(report)
    }

    fn record(&mut self, state: WakeState, linear: &LinearSolveReport, displacement: f64) {
        let forces = self.compute_forces();
        self.state.window.push(forces.selected);
        let entry = HistoryEntry {
            iteration: self.state.history.len() + 1,
            state,
            l2_residual: self.state.l2_residual,
            log_reduction: linear.log_reduction,
            linear_iterations: linear.iterations,
            linear_converged: linear.converged,
            linear_diverged: linear.diverged,
            wake_displacement: displacement,
            coefficients: self.state.window.mean(),
        };
        if self.config.solver.print_interval > 0 {
            log::info!(
                "Iteration {} ({}): residual {:.6e}, CL {:.6}, CD {:.6}",
                entry.iteration,
                state,
                entry.l2_residual,
                entry.coefficients.cl,
                entry.coefficients.cd
            );
        }
        self.state.history.push(entry);
    }

    /// Integrate forces for the current circulation and store surface
    /// results in the model
    pub fn compute_forces(&mut self) -> ForceReport {
        let field = VelocityField::new(
            &self.geometry,
            self.coordinator.fine_loops(),
            self.coordinator.fine(),
            &self.state.gamma,
            self.settings.criterion,
        );
        let flight = &self.config.flight;
        let loads = surface_loads(&self.model, &self.onset, &field, flight);
        let trefftz = trefftz_plane(&self.model, flight, self.config.reference.cg, self.geometry.core);
        let report = ForceReport::build(&self.model, &loads, &trefftz, &self.config);
        apply_surface_loads(&mut self.model, &loads);
        report
    }

    /// Total velocity at arbitrary points
    pub fn survey_velocities(&self, points: &[Vec3]) -> Vec<Vec3> {
        let field = VelocityField::new(
            &self.geometry,
            self.coordinator.fine_loops(),
            self.coordinator.fine(),
            &self.state.gamma,
            self.settings.criterion,
        );
        with_thread_pool(self.config.solver.threads, || {
            survey_velocities(&self.model, &self.onset, &field, points)
        })
    }

    fn assembly_summary(&self) -> AssemblySummary {
        let d = self.coordinator.fine().diagnostics();
        AssemblySummary {
            loops: self.model.num_loops(),
            trailing_lines: self.model.num_lines(),
            multigrid_levels: self.coordinator.num_levels(),
            near_entries: d.near_entries,
            far_entries: d.far_entries,
            skipped_clusters: d.skipped_clusters,
            excluded_coefficients: d.excluded.len() + d.excluded_wake.len(),
        }
    }

    /// Report for the current solution
    pub fn case_report(&mut self) -> CaseReport {
        let forces = self.compute_forces();
        let coefficients = if self.state.window.is_empty() {
            forces.selected
        } else {
            self.state.window.mean()
        };
        CaseReport {
            header: CaseHeader::from_config(&self.config),
            final_state: self.state.wake_state,
            converged: self.state.wake_state == WakeState::Converged,
            linear_diverged: self.state.history.iter().any(|h| h.linear_diverged),
            assembly: self.assembly_summary(),
            history: self.state.history.clone(),
            coefficients,
            forces,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::{FlightCondition, SolverMode, WakeConfig};
    use crate::core::mesh::{WingSpec, rectangular_wing};
    use approx::assert_relative_eq;

    fn config() -> CaseConfig {
        CaseConfig {
            flight: FlightCondition {
                alpha_deg: 5.0,
                ..Default::default()
            },
            wake: WakeConfig {
                trailing_nodes: 6,
                relax_iterations: 2,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn wing() -> SurfaceMesh {
        rectangular_wing(&WingSpec {
            n_chord: 3,
            n_span: 6,
            full_span: true,
            ..Default::default()
        })
    }

    #[test]
    fn test_state_machine() {
        let mut solver = VlmSolver::setup(config(), &wing()).unwrap();
        assert_eq!(solver.state().wake_state, WakeState::RigidWakeIteration);
        assert_eq!(solver.step().unwrap(), WakeState::RelaxingWake);
        assert_eq!(solver.step().unwrap(), WakeState::RelaxingWake);
        let last = solver.step().unwrap();
        assert!(last.is_terminal());
        assert_eq!(solver.state().wake_iterations, 2);
        assert_eq!(solver.state().history.len(), 3);
        // Terminal states are sticky
        assert_eq!(solver.step().unwrap(), last);
    }

    #[test]
    fn test_tangency_after_solve() {
        let mut solver = VlmSolver::setup(config(), &wing()).unwrap();
        let report = solver.solve().unwrap();
        let linear = solver.state().last_linear.as_ref().unwrap();
        assert!(linear.converged);
        assert!(report.coefficients.cl > 0.0);
        assert_eq!(report.history.len(), 3);
        let moved = solver.state().history.iter().map(|h| h.wake_displacement).fold(0.0, f64::max);
        assert!(moved > 0.0);
        for line in &solver.model().lines {
            assert!(line.points.iter().all(|p| p.x.is_finite() && p.z.is_finite()));
        }
    }

    #[test]
    fn test_rigid_only_run() {
        let mut cfg = config();
        cfg.wake.relax_iterations = 0;
        let mut solver = VlmSolver::setup(cfg, &wing()).unwrap();
        let report = solver.solve().unwrap();
        assert_eq!(report.final_state, WakeState::Converged);
        assert_eq!(report.history.len(), 1);
        let rhs_norm = vector_norm(&solver.state().rhs);
        assert!(solver.residual() < 1e-5 * rhs_norm);
    }

    #[test]
    fn test_restart_skips_rigid_stage() {
        let mut solver = VlmSolver::setup(config(), &wing()).unwrap();
        solver.step().unwrap();
        solver.step().unwrap();
        let data = solver.restart_data();
        assert_eq!(data.wake_iteration, 1);

        let mut resumed = VlmSolver::setup(config(), &wing()).unwrap();
        resumed.apply_restart(data.clone()).unwrap();
        assert_eq!(resumed.state().wake_state, WakeState::RelaxingWake);
        assert_eq!(resumed.model().wake_positions(), data.wake);
        for (a, b) in resumed.state().gamma.iter().zip(&data.circulation) {
            assert_eq!(a, b);
        }
        assert_relative_eq!(resumed.residual(), solver.residual(), max_relative = 1e-10);

        let mut wrong = data;
        wrong.case_id = "other".into();
        assert!(resumed.apply_restart(wrong).is_err());
    }

    #[test]
    fn test_rigid_stage_ends_at_first_converged_solve() {
        let mut cfg = config();
        cfg.wake.rigid_iterations = 5;
        cfg.wake.relax_iterations = 0;
        let mut solver = VlmSolver::setup(cfg, &wing()).unwrap();
        let report = solver.solve().unwrap();
        assert_eq!(report.final_state, WakeState::Converged);
        assert_eq!(solver.state().rigid_iterations, 1);
        assert_eq!(report.history.len(), 1);
    }

    #[test]
    fn test_diverged_linear_solve_is_reported() {
        let mut cfg = config();
        cfg.wake.relax_iterations = 0;
        cfg.solver.multigrid_levels = 2;
        cfg.solver.mode = SolverMode::Jacobi { relaxation: 0.8 };
        let mut solver = VlmSolver::setup(cfg, &wing()).unwrap();
        assert_eq!(solver.coordinator().num_levels(), 2);

        // Over-relaxed smoothing blows up the first cycle
        solver.config.solver.mode = SolverMode::Jacobi { relaxation: 3.0 };
        let report = solver.solve().unwrap();
        assert!(report.linear_diverged);
        assert!(!report.converged);
        assert_eq!(report.final_state, WakeState::MaxIterationsReached);
        assert!(report.history[0].linear_diverged);
        assert!(!report.history[0].linear_converged);
        assert!(solver.state().gamma.iter().all(|g| g.is_finite()));
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let mut cfg = config();
        cfg.flight.mach = 1.2;
        assert!(VlmSolver::setup(cfg, &wing()).is_err());
    }
}
