//! Trailing wake geometry
//!
//! Trailing lines start on the free-stream direction with geometrically
//! growing segments and end in a semi-infinite tail. Relaxation turns each
//! segment towards the local velocity at its midpoint and blends the result
//! with the previous shape.

use serde::{Deserialize, Serialize};
use vortex_lattice_solvers::parallel::parallel_map_indexed;

use crate::core::config::WakeConfig;
use crate::core::mesh::MeshError;
use crate::core::model::VortexLatticeModel;
use crate::core::types::Vec3;

/// Outer loop state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WakeState {
    Initializing,
    RigidWakeIteration,
    RelaxingWake,
    Converged,
    MaxIterationsReached,
}

impl WakeState {
    pub fn is_terminal(self) -> bool {
        matches!(self, WakeState::Converged | WakeState::MaxIterationsReached)
    }
}

impl std::fmt::Display for WakeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            WakeState::Initializing => "initializing",
            WakeState::RigidWakeIteration => "rigid wake",
            WakeState::RelaxingWake => "relaxing wake",
            WakeState::Converged => "converged",
            WakeState::MaxIterationsReached => "max iterations reached",
        };
        f.write_str(name)
    }
}

/// Streamwise wake length
pub fn wake_length(model: &VortexLatticeModel, config: &WakeConfig) -> f64 {
    config
        .far_field_distance
        .unwrap_or(10.0 * model.reference_length())
}

/// Distances of `count` wake nodes from the trailing edge, from 0 to
/// `length`, each segment `ratio` times the previous one
pub fn node_distances(length: f64, count: usize, ratio: f64) -> Vec<f64> {
    let count = count.max(2);
    let segments = count - 1;
    let weights: Vec<f64> = (0..segments).map(|k| ratio.powi(k as i32)).collect();
    let total: f64 = weights.iter().sum();
    let mut distances = Vec::with_capacity(count);
    let mut s = 0.0;
    distances.push(s);
    for w in &weights {
        s += length * w / total;
        distances.push(s);
    }
    distances[segments] = length;
    distances
}

/// Place every trailing line along `direction`
pub fn initialize_wake(
    model: &mut VortexLatticeModel,
    direction: Vec3,
    config: &WakeConfig,
) -> Result<(), MeshError> {
    let direction = direction.normalize().unwrap_or(Vec3::new(1.0, 0.0, 0.0));
    let distances = node_distances(wake_length(model, config), config.trailing_nodes, config.stretch_ratio);
    let symmetry = model.symmetry;
    let positions = model
        .lines
        .iter()
        .map(|line| {
            let te = model.nodes[line.te_node.index()];
            distances
                .iter()
                .map(|&s| {
                    let p = te + direction * s;
                    match symmetry {
                        Some(plane) if line.on_symmetry_plane => plane.project(p),
                        _ => p,
                    }
                })
                .collect()
        })
        .collect();
    model.set_wake_positions(positions)?;
    model.set_wake_tail(direction);
    log::debug!(
        "Initialized {} trailing lines with {} nodes",
        model.num_lines(),
        distances.len()
    );
    Ok(())
}

/// Result of one relaxation step
#[derive(Debug, Clone)]
pub struct WakeUpdate {
    pub positions: Vec<Vec<Vec3>>,
    /// Largest node displacement relative to the wake length
    pub max_displacement: f64,
}

/// Align every wake segment with the local velocity
///
/// `velocity` returns the total velocity at a point. Positions are computed
/// from the current shape for all lines before anything is committed.
pub fn relax_wake<F>(model: &VortexLatticeModel, velocity: F, relaxation: f64) -> WakeUpdate
where
    F: Fn(Vec3) -> Vec3 + Sync,
{
    let symmetry = model.symmetry;
    let positions: Vec<(Vec<Vec3>, f64)> = parallel_map_indexed(model.num_lines(), |i| {
        let line = &model.lines[i];
        let old = &line.points;
        let mut aligned = Vec::with_capacity(old.len());
        aligned.push(old[0]);
        for pair in old.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            let length = a.distance(&b);
            let v = velocity((a + b) * 0.5);
            let dir = v.normalize().unwrap_or(line.tail);
            let last = aligned[aligned.len() - 1];
            aligned.push(last + dir * length);
        }
        let mut moved = 0.0_f64;
        let blended: Vec<Vec3> = old
            .iter()
            .zip(&aligned)
            .enumerate()
            .map(|(k, (&o, &n))| {
                if k == 0 {
                    return o;
                }
                let mut p = o * (1.0 - relaxation) + n * relaxation;
                if let Some(plane) = symmetry.filter(|_| line.on_symmetry_plane) {
                    p = plane.project(p);
                }
                moved = moved.max(p.distance(&o));
                p
            })
            .collect();
        (blended, moved)
    });

    let reference = model
        .lines
        .iter()
        .filter_map(|l| Some(l.points.first()?.distance(l.points.last()?)))
        .fold(0.0_f64, f64::max)
        .max(model.reference_length());
    let max_displacement = positions.iter().map(|(_, d)| *d).fold(0.0, f64::max) / reference;
    WakeUpdate {
        positions: positions.into_iter().map(|(p, _)| p).collect(),
        max_displacement,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::mesh::{WingSpec, rectangular_wing};
    use crate::core::types::SymmetryPlane;
    use approx::assert_relative_eq;

    fn model(symmetry: Option<SymmetryPlane>) -> VortexLatticeModel {
        let mesh = rectangular_wing(&WingSpec {
            n_chord: 2,
            n_span: 3,
            ..Default::default()
        });
        VortexLatticeModel::from_mesh(&mesh, symmetry, Vec::new()).unwrap()
    }

    #[test]
    fn test_node_distances() {
        let d = node_distances(10.0, 4, 2.0);
        assert_eq!(d.len(), 4);
        assert_relative_eq!(d[1], 10.0 / 7.0, epsilon = 1e-12);
        assert_relative_eq!(d[2] - d[1], 20.0 / 7.0, epsilon = 1e-12);
        assert_eq!(d[3], 10.0);
        assert_eq!(node_distances(5.0, 0, 1.0).len(), 2);
    }

    #[test]
    fn test_initial_wake_follows_freestream() {
        let mut m = model(None);
        let direction = Vec3::new(1.0, 0.0, 0.1);
        let config = WakeConfig {
            trailing_nodes: 5,
            far_field_distance: Some(20.0),
            ..Default::default()
        };
        initialize_wake(&mut m, direction, &config).unwrap();
        let unit = direction.normalize().unwrap();
        for line in &m.lines {
            assert_eq!(line.points.len(), 5);
            assert_eq!(line.points[0], m.nodes[line.te_node.index()]);
            let end = line.points[4] - line.points[0];
            assert_relative_eq!(end.length(), 20.0, epsilon = 1e-10);
            assert_relative_eq!(end.dot(&unit), 20.0, epsilon = 1e-10);
            assert_relative_eq!(line.tail.dot(&unit), 1.0, epsilon = 1e-14);
        }
    }

    #[test]
    fn test_relaxation_aligns_with_uniform_flow() {
        let mut m = model(None);
        let config = WakeConfig {
            trailing_nodes: 4,
            far_field_distance: Some(5.0),
            ..Default::default()
        };
        initialize_wake(&mut m, Vec3::new(1.0, 0.0, 0.0), &config).unwrap();

        // Already aligned: nothing moves
        let update = relax_wake(&m, |_| Vec3::new(2.0, 0.0, 0.0), 0.5);
        assert!(update.max_displacement < 1e-14);

        // Full relaxation rotates the line onto the new direction
        let v = Vec3::new(1.0, 0.0, 1.0);
        let update = relax_wake(&m, |_| v, 1.0);
        let unit = v.normalize().unwrap();
        for (line, pts) in m.lines.iter().zip(&update.positions) {
            let end = pts[3] - pts[0];
            assert_relative_eq!(end.length(), 5.0, epsilon = 1e-10);
            assert_relative_eq!(end.dot(&unit), 5.0, epsilon = 1e-10);
            assert_eq!(pts[0], line.points[0]);
        }
    }

    #[test]
    fn test_plane_lines_stay_on_plane() {
        let mut m = model(Some(SymmetryPlane::Y));
        let config = WakeConfig {
            trailing_nodes: 4,
            far_field_distance: Some(5.0),
            ..Default::default()
        };
        initialize_wake(&mut m, Vec3::new(1.0, 0.0, 0.0), &config).unwrap();
        let on_plane: Vec<usize> = (0..m.num_lines())
            .filter(|&i| m.lines[i].on_symmetry_plane)
            .collect();
        assert_eq!(on_plane.len(), 1);

        let update = relax_wake(&m, |_| Vec3::new(1.0, 0.5, 0.2), 0.5);
        for &i in &on_plane {
            for p in &update.positions[i] {
                assert_eq!(p.y, 0.0);
            }
        }
        assert!(update.max_displacement > 0.0);
    }
}
