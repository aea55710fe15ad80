//! Multigrid coordinator
//!
//! Level 0 holds one unknown per model loop. Each coarser level merges up to
//! [`MAX_AGGLOMERATE`] edge-connected loops of the same Kelvin group into
//! one coarse ring: the children's segments are summed so shared edges
//! cancel, and their horseshoes are carried along. Every level gets its own
//! geometric influence operator. Residuals are restricted by area-weighted
//! averaging and corrections are injected back into the children.
//!
//! The coordinator exposes restriction, prolongation and the solve; the
//! cycle itself lives in `vortex_lattice_solvers::multigrid`.

use std::collections::HashMap;

use ndarray::Array1;
use vortex_lattice_solvers::blas_helpers::vector_norm;
use vortex_lattice_solvers::{
    Aggregation, CoarseSolver, DiagonalPreconditioner, GmresConfig, JacobiConfig, LinearOperator,
    MultigridConfig, MultigridHierarchy, MultigridPreconditioner, SolverError, gmres_preconditioned,
    jacobi, solve_multigrid,
};

use crate::core::assembly::{InfluenceOperator, InfluenceSettings, KernelGeometry, LevelLoop};
use crate::core::config::{SolverConfig, SolverMode};
use crate::core::constants::MAX_AGGLOMERATE;
use crate::core::model::VortexLatticeModel;
use crate::core::types::{NodeId, Vec3};

/// Loops of one level and the transfer to the next coarser one
#[derive(Debug, Clone)]
pub struct GridLevel {
    pub loops: Vec<LevelLoop>,
    pub to_coarse: Option<Aggregation<f64>>,
}

/// Outcome of one linear solve
#[derive(Debug, Clone)]
pub struct LinearSolveReport {
    pub gamma: Array1<f64>,
    /// Jacobi sweeps, multigrid cycles or GMRES inner iterations
    pub iterations: usize,
    /// ‖b − AΓ‖₂ before the solve
    pub initial_residual: f64,
    /// ‖b − AΓ‖₂ after the solve
    pub residual: f64,
    /// log10(residual / initial_residual)
    pub log_reduction: f64,
    pub converged: bool,
    /// A multigrid cycle increased the residual and was rolled back
    pub diverged: bool,
}

/// Merge neighbouring loops; `None` when nothing can be merged
pub fn agglomerate(loops: &[LevelLoop]) -> Option<(Vec<LevelLoop>, Aggregation<f64>)> {
    let mut by_segment: HashMap<(NodeId, NodeId), Vec<usize>> = HashMap::new();
    for (i, l) in loops.iter().enumerate() {
        for &(a, b, w) in &l.segments {
            if w != 0.0 {
                by_segment.entry((a.min(b), a.max(b))).or_default().push(i);
            }
        }
    }
    let neighbours: Vec<Vec<usize>> = loops
        .iter()
        .enumerate()
        .map(|(i, l)| {
            let mut n: Vec<usize> = l
                .segments
                .iter()
                .filter_map(|&(a, b, _)| by_segment.get(&(a.min(b), a.max(b))))
                .flatten()
                .copied()
                .filter(|&j| j != i && loops[j].kelvin_group == l.kelvin_group)
                .collect();
            n.sort_unstable();
            n.dedup();
            n
        })
        .collect();

    let mut parent = vec![usize::MAX; loops.len()];
    let mut groups: Vec<Vec<usize>> = Vec::new();
    for seed in 0..loops.len() {
        if parent[seed] != usize::MAX {
            continue;
        }
        let id = groups.len();
        let mut members = vec![seed];
        parent[seed] = id;
        let mut k = 0;
        while k < members.len() && members.len() < MAX_AGGLOMERATE {
            for &j in &neighbours[members[k]] {
                if members.len() >= MAX_AGGLOMERATE {
                    break;
                }
                if parent[j] == usize::MAX {
                    parent[j] = id;
                    members.push(j);
                }
            }
            k += 1;
        }
        groups.push(members);
    }
    if groups.len() == loops.len() {
        return None;
    }

    let coarse: Vec<LevelLoop> = groups.iter().map(|members| merge(loops, members)).collect();
    let weights = loops.iter().map(|l| l.area).collect();
    let aggregation = Aggregation::new(parent, weights).ok()?;
    Some((coarse, aggregation))
}

fn merge(loops: &[LevelLoop], members: &[usize]) -> LevelLoop {
    let mut order: Vec<(NodeId, NodeId)> = Vec::new();
    let mut weights: HashMap<(NodeId, NodeId), f64> = HashMap::new();
    let mut horseshoes = Vec::new();
    let mut area = 0.0;
    let mut vector_area = Vec3::zero();
    let mut weighted_cp = Vec3::zero();
    for &m in members {
        let l = &loops[m];
        for &(a, b, w) in &l.segments {
            let (key, w) = if a <= b { ((a, b), w) } else { ((b, a), -w) };
            let entry = weights.entry(key).or_insert_with(|| {
                order.push(key);
                0.0
            });
            *entry += w;
        }
        horseshoes.extend_from_slice(&l.horseshoes);
        area += l.area;
        vector_area += l.vector_area;
        weighted_cp += l.control_point * l.area;
    }
    let segments = order
        .into_iter()
        .filter_map(|key| {
            let w = weights.get(&key).copied().unwrap_or(0.0);
            (w.abs() > 1e-12).then_some((key.0, key.1, w))
        })
        .collect();

    let live: Vec<&LevelLoop> = members.iter().map(|&m| &loops[m]).filter(|l| !l.degenerate).collect();
    let control_point = if area > 0.0 {
        weighted_cp / area
    } else {
        members.iter().map(|&m| loops[m].control_point).sum::<Vec3>() / members.len() as f64
    };
    let normal = vector_area
        .normalize()
        .or_else(|| live.first().map(|l| l.normal))
        .unwrap_or(Vec3::new(0.0, 0.0, 1.0));

    LevelLoop {
        segments,
        horseshoes,
        control_point,
        normal,
        area,
        vector_area,
        kelvin_group: loops[members[0]].kelvin_group,
        degenerate: live.is_empty(),
        children: members.to_vec(),
    }
}

/// Level hierarchy with one influence operator per level
#[derive(Debug, Clone)]
pub struct MultigridCoordinator {
    levels: Vec<GridLevel>,
    operators: Vec<InfluenceOperator>,
}

impl MultigridCoordinator {
    /// Build up to `num_levels` levels; coarsening stops early when no
    /// loops can be merged
    pub fn new(
        model: &VortexLatticeModel,
        geometry: &KernelGeometry,
        num_levels: usize,
        settings: &InfluenceSettings,
    ) -> Self {
        let wakeless: Vec<bool> = model.kelvin_groups.iter().map(|g| !g.has_wake).collect();
        let mut levels = vec![GridLevel {
            loops: LevelLoop::from_model(model),
            to_coarse: None,
        }];
        while levels.len() < num_levels.max(1) {
            let Some(last) = levels.last_mut() else {
                break;
            };
            match agglomerate(&last.loops) {
                Some((coarse, aggregation)) => {
                    last.to_coarse = Some(aggregation);
                    levels.push(GridLevel {
                        loops: coarse,
                        to_coarse: None,
                    });
                }
                None => break,
            }
        }
        if levels.len() < num_levels {
            log::info!(
                "Multigrid coarsening stopped at {} of {} requested levels",
                levels.len(),
                num_levels
            );
        }

        let operators = levels
            .iter()
            .map(|level| InfluenceOperator::assemble(geometry, &level.loops, &wakeless, settings))
            .collect();
        for (i, level) in levels.iter().enumerate() {
            log::debug!("Multigrid level {}: {} loops", i, level.loops.len());
        }
        Self { levels, operators }
    }

    pub fn num_levels(&self) -> usize {
        self.levels.len()
    }

    pub fn level(&self, index: usize) -> &GridLevel {
        &self.levels[index]
    }

    pub fn operator(&self, index: usize) -> &InfluenceOperator {
        &self.operators[index]
    }

    /// Finest-level operator
    pub fn fine(&self) -> &InfluenceOperator {
        &self.operators[0]
    }

    pub fn fine_loops(&self) -> &[LevelLoop] {
        &self.levels[0].loops
    }

    /// Rebuild every level's wake coefficients
    pub fn refresh_wake(&mut self, geometry: &KernelGeometry) {
        for op in &mut self.operators {
            op.refresh_wake(geometry);
        }
    }

    fn transfer(&self, level: usize) -> Result<&Aggregation<f64>, SolverError> {
        self.levels
            .get(level)
            .and_then(|l| l.to_coarse.as_ref())
            .ok_or(SolverError::EmptyHierarchy)
    }

    /// Area-weighted restriction from `level` to `level + 1`
    pub fn restrict(&self, level: usize, fine: &Array1<f64>) -> Result<Array1<f64>, SolverError> {
        Ok(self.transfer(level)?.restrict(fine))
    }

    /// Injection from `level + 1` back to `level`
    pub fn prolongate(&self, level: usize, coarse: &Array1<f64>) -> Result<Array1<f64>, SolverError> {
        Ok(self.transfer(level)?.prolongate(coarse))
    }

    fn hierarchy(&self) -> Result<MultigridHierarchy<f64, &InfluenceOperator>, SolverError> {
        let operators = self
            .operators
            .iter()
            .map(|op| (op, op.diagonal().clone()))
            .collect();
        let transfers = self
            .levels
            .iter()
            .filter_map(|l| l.to_coarse.clone())
            .collect();
        MultigridHierarchy::new(operators, transfers)
    }

    /// Solve the fine system with the configured strategy
    pub fn solve(
        &self,
        config: &SolverConfig,
        rhs: &Array1<f64>,
        x0: Option<&Array1<f64>>,
    ) -> Result<LinearSolveReport, SolverError> {
        let fine = self.fine();
        let start = x0.cloned().unwrap_or_else(|| Array1::zeros(rhs.len()));
        let initial_residual = vector_norm(&fine.residual(&start, rhs));

        let (mut gamma, iterations, converged, diverged) = match config.mode {
            SolverMode::Jacobi { relaxation } if self.num_levels() == 1 => {
                let sol = jacobi(
                    fine,
                    fine.diagonal(),
                    rhs,
                    Some(&start),
                    &JacobiConfig {
                        max_iterations: config.max_iterations,
                        tolerance: config.tolerance,
                        relaxation,
                        print_interval: config.print_interval,
                    },
                )?;
                (sol.x, sol.iterations, sol.converged, false)
            }
            SolverMode::Jacobi { relaxation } => {
                let hierarchy = self.hierarchy()?;
                let mg = MultigridConfig {
                    pre_smooth: config.pre_smooth,
                    post_smooth: config.post_smooth,
                    relaxation,
                    coarse: CoarseSolver::Jacobi {
                        sweeps: config.max_iterations,
                        tolerance: config.tolerance,
                    },
                    max_cycles: config.max_iterations,
                    tolerance: config.tolerance,
                    print_interval: config.print_interval,
                };
                let result = solve_multigrid(&hierarchy, rhs, Some(&start), &mg)?;
                (result.x, result.cycles, result.converged, result.diverged)
            }
            SolverMode::Gmres {
                restart,
                max_outer,
                reduction,
            } => {
                let gmres_config = GmresConfig {
                    max_iterations: max_outer,
                    restart,
                    tolerance: config.tolerance,
                    reduction,
                    print_interval: config.print_interval,
                };
                let sol = if self.num_levels() == 1 {
                    let precond = DiagonalPreconditioner::from_diagonal(fine.diagonal());
                    gmres_preconditioned(fine, &precond, rhs, Some(&start), &gmres_config)?
                } else {
                    let hierarchy = self.hierarchy()?;
                    let precond = MultigridPreconditioner::new(
                        &hierarchy,
                        MultigridConfig {
                            pre_smooth: config.pre_smooth,
                            post_smooth: config.post_smooth,
                            relaxation: config.smoothing_relaxation,
                            coarse: CoarseSolver::Jacobi {
                                sweeps: config.coarse_sweeps,
                                tolerance: 0.0,
                            },
                            max_cycles: 1,
                            tolerance: 0.0,
                            print_interval: 0,
                        },
                    );
                    gmres_preconditioned(fine, &precond, rhs, Some(&start), &gmres_config)?
                };
                (sol.x, sol.iterations, sol.converged, false)
            }
        };

        fine.enforce_kelvin(&mut gamma);
        let residual = vector_norm(&fine.residual(&gamma, rhs));
        let log_reduction = if initial_residual > 0.0 && residual > 0.0 {
            (residual / initial_residual).log10()
        } else {
            0.0
        };
        if !converged {
            log::warn!(
                "Linear solve stopped after {} iterations with residual {:.3e}",
                iterations,
                residual
            );
        }

        Ok(LinearSolveReport {
            gamma,
            iterations,
            initial_residual,
            residual,
            log_reduction,
            converged,
            diverged,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::mesh::{WingSpec, closed_box, rectangular_wing};
    use approx::assert_relative_eq;

    fn wing(n_chord: usize, n_span: usize) -> (VortexLatticeModel, KernelGeometry) {
        let mesh = rectangular_wing(&WingSpec {
            n_chord,
            n_span,
            ..Default::default()
        });
        let mut model = VortexLatticeModel::from_mesh(&mesh, None, Vec::new()).unwrap();
        let positions = model
            .lines
            .iter()
            .map(|l| vec![l.points[0], l.points[0] + Vec3::new(10.0, 0.0, 0.0)])
            .collect();
        model.set_wake_positions(positions).unwrap();
        let geometry = KernelGeometry::new(&model, 1.0, 1e-4);
        (model, geometry)
    }

    #[test]
    fn test_agglomeration_cancels_interior_edges() {
        let (model, _) = wing(2, 2);
        let loops = LevelLoop::from_model(&model);
        let (coarse, aggregation) = agglomerate(&loops).unwrap();
        assert_eq!(coarse.len(), 1);
        assert_eq!(aggregation.num_coarse(), 1);
        // The 2x2 block keeps only its 8 perimeter segments
        assert_eq!(coarse[0].segments.len(), 8);
        assert_eq!(coarse[0].horseshoes.len(), 2);
        assert_relative_eq!(coarse[0].area, 0.5, epsilon = 1e-14);
        assert_relative_eq!(coarse[0].normal.z, 1.0);
        assert!(agglomerate(&coarse).is_none());
    }

    #[test]
    fn test_groups_are_not_mixed() {
        let mut mesh = closed_box(Vec3::new(0.0, 0.0, 0.0), 1.0, 1);
        let other = closed_box(Vec3::new(3.0, 0.0, 0.0), 1.0, 1);
        let offset = mesh.nodes.len();
        mesh.nodes.extend(other.nodes);
        for mut p in other.panels {
            p.nodes.iter_mut().for_each(|n| *n += offset);
            mesh.panels.push(p);
        }
        let model = VortexLatticeModel::from_mesh(&mesh, None, Vec::new()).unwrap();
        assert_eq!(model.kelvin_groups.len(), 2);
        let loops = LevelLoop::from_model(&model);
        let (coarse, _) = agglomerate(&loops).unwrap();
        for c in &coarse {
            let g = loops[c.children[0]].kelvin_group;
            assert!(c.children.iter().all(|&k| loops[k].kelvin_group == g));
        }
    }

    #[test]
    fn test_restrict_prolongate() {
        let (model, geometry) = wing(2, 4);
        let coordinator =
            MultigridCoordinator::new(&model, &geometry, 2, &InfluenceSettings::default());
        assert_eq!(coordinator.num_levels(), 2);
        let n = coordinator.fine_loops().len();
        let r = coordinator.restrict(0, &Array1::from_elem(n, 2.0)).unwrap();
        for &v in r.iter() {
            assert_relative_eq!(v, 2.0, epsilon = 1e-14);
        }
        let e = coordinator.prolongate(0, &Array1::from_elem(r.len(), 1.5)).unwrap();
        assert_eq!(e.len(), n);
        assert!(coordinator.restrict(1, &r).is_err());
    }

    fn tangency_rhs(model: &VortexLatticeModel) -> Array1<f64> {
        let v = Vec3::new(1.0, 0.0, 0.1);
        model.loops.iter().map(|l| -v.dot(&l.normal)).collect()
    }

    #[test]
    fn test_all_modes_agree() {
        let (model, geometry) = wing(4, 8);
        let rhs = tangency_rhs(&model);
        let settings = InfluenceSettings::default();
        let single = MultigridCoordinator::new(&model, &geometry, 1, &settings);
        let multi = MultigridCoordinator::new(&model, &geometry, 3, &settings);
        assert!(multi.num_levels() > 1);

        let gmres = SolverConfig::default();
        let reference = single.solve(&gmres, &rhs, None).unwrap();
        assert!(reference.converged);
        assert!(reference.residual < 1e-6);

        let mg_gmres = multi.solve(&gmres, &rhs, None).unwrap();
        assert!(mg_gmres.converged);

        let jacobi_config = SolverConfig {
            mode: SolverMode::Jacobi { relaxation: 0.8 },
            max_iterations: 2000,
            tolerance: 1e-9,
            ..Default::default()
        };
        let jac = single.solve(&jacobi_config, &rhs, None).unwrap();
        assert!(jac.converged);

        for i in 0..rhs.len() {
            assert_relative_eq!(mg_gmres.gamma[i], reference.gamma[i], epsilon = 1e-6);
            assert_relative_eq!(jac.gamma[i], reference.gamma[i], epsilon = 1e-6);
        }
    }

    #[test]
    fn test_reported_residual_is_that_of_projected_circulation() {
        let model = VortexLatticeModel::from_mesh(&closed_box(Vec3::zero(), 1.0, 2), None, Vec::new()).unwrap();
        let geometry = KernelGeometry::new(&model, 1.0, 1e-4);
        let coordinator = MultigridCoordinator::new(&model, &geometry, 1, &InfluenceSettings::default());
        let rhs = tangency_rhs(&model);
        let report = coordinator.solve(&SolverConfig::default(), &rhs, None).unwrap();

        let fine = coordinator.fine();
        for sum in fine.kelvin_sums(&report.gamma) {
            assert!(sum.abs() < 1e-12);
        }
        let residual = vector_norm(&fine.residual(&report.gamma, &rhs));
        assert_relative_eq!(report.residual, residual, max_relative = 1e-14);
    }

    #[test]
    fn test_multigrid_cycles_never_increase_residual() {
        let (model, geometry) = wing(4, 8);
        let rhs = tangency_rhs(&model);
        let multi = MultigridCoordinator::new(&model, &geometry, 2, &InfluenceSettings::default());
        let config = SolverConfig {
            mode: SolverMode::Jacobi { relaxation: 0.8 },
            max_iterations: 5,
            ..Default::default()
        };
        let report = multi.solve(&config, &rhs, None).unwrap();
        assert!(report.residual <= report.initial_residual);
    }
}
