//! Induced velocity of the complete vortex system at arbitrary points
//!
//! Used for wake advection, edge forces and velocity surveys. Rings are
//! evaluated through the same cluster tree as the operator; trailing-edge
//! segments and trailing lines are always exact.

use ndarray::Array1;

use super::geometry::{KernelGeometry, LevelLoop};
use super::influence::InfluenceOperator;
use super::interaction::{ClusterTree, SplitCriterion};
use crate::core::biot_savart::doublet_velocity;
use crate::core::types::Vec3;

/// Snapshot of the vortex system for a circulation vector
pub struct VelocityField<'a> {
    geometry: &'a KernelGeometry,
    loops: &'a [LevelLoop],
    tree: &'a ClusterTree,
    criterion: SplitCriterion,
    gamma: &'a Array1<f64>,
    cluster_moments: Vec<Vec3>,
    /// Circulation of each horseshoe's reversed trailing-edge segment
    bound_strengths: Vec<f64>,
    line_strengths: Vec<f64>,
}

impl<'a> VelocityField<'a> {
    /// `operator` must have been assembled from `loops` and `geometry`
    pub fn new(
        geometry: &'a KernelGeometry,
        loops: &'a [LevelLoop],
        operator: &'a InfluenceOperator,
        gamma: &'a Array1<f64>,
        criterion: SplitCriterion,
    ) -> Self {
        let tree = operator.cluster_tree();
        let moments: Vec<Vec3> = operator
            .source_areas()
            .iter()
            .zip(gamma.iter())
            .map(|(s, &g)| *s * g)
            .collect();
        let cluster_moments = tree.cluster_sums(&moments);

        let mut bound_strengths = vec![0.0; geometry.horseshoes.len()];
        let mut line_strengths = vec![0.0; geometry.lines.len()];
        for (j, l) in loops.iter().enumerate() {
            for &h in &l.horseshoes {
                let hs = &geometry.horseshoes[h];
                bound_strengths[h] += gamma[j];
                line_strengths[hs.line_a] += gamma[j];
                line_strengths[hs.line_b] -= gamma[j];
            }
        }

        Self {
            geometry,
            loops,
            tree,
            criterion,
            gamma,
            cluster_moments,
            bound_strengths,
            line_strengths,
        }
    }

    /// Net strength of every trailing line
    pub fn line_strengths(&self) -> &[f64] {
        &self.line_strengths
    }

    fn direct(&self, q: Vec3) -> Vec3 {
        let g = self.geometry;
        let list = self.tree.interactions(q, &self.criterion);
        let mut v = Vec3::zero();
        for j in list.near {
            if self.gamma[j] != 0.0 {
                v += g.ring_velocity(q, &self.loops[j]) * self.gamma[j];
            }
        }
        for c in list.far {
            v += doublet_velocity(q, self.tree.clusters[c].center, self.cluster_moments[c]);
        }
        for (h, &s) in self.bound_strengths.iter().enumerate() {
            if s != 0.0 {
                v += g.bound_reversed_velocity(q, h) * s;
            }
        }
        for (l, &s) in self.line_strengths.iter().enumerate() {
            if s != 0.0 {
                v += g.line_velocity(q, l) * s;
            }
        }
        v
    }

    /// Physical induced velocity at physical point `p`
    pub fn induced(&self, p: Vec3) -> Vec3 {
        let q = self.geometry.stretch(p);
        let v = self.geometry.with_image(q, |q| self.direct(q));
        self.geometry.physical_velocity(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::assembly::InfluenceSettings;
    use crate::core::mesh::{WingSpec, rectangular_wing};
    use crate::core::model::VortexLatticeModel;
    use approx::assert_relative_eq;
    use vortex_lattice_solvers::LinearOperator;

    #[test]
    fn test_field_matches_operator_at_control_points() {
        let mesh = rectangular_wing(&WingSpec {
            n_chord: 2,
            n_span: 4,
            ..Default::default()
        });
        let mut model = VortexLatticeModel::from_mesh(&mesh, None, Vec::new()).unwrap();
        let positions = model
            .lines
            .iter()
            .map(|l| vec![l.points[0], l.points[0] + Vec3::new(4.0, 0.0, 0.0)])
            .collect();
        model.set_wake_positions(positions).unwrap();

        let beta = 0.9;
        let geometry = KernelGeometry::new(&model, beta, 0.0);
        let loops = LevelLoop::from_model(&model);
        let settings = InfluenceSettings::default();
        let op = InfluenceOperator::assemble(&geometry, &loops, &[false], &settings);

        let gamma = Array1::from_iter((0..loops.len()).map(|i| 0.5 + 0.1 * i as f64));
        let y = op.apply(&gamma);
        let field = VelocityField::new(&geometry, &loops, &op, &gamma, settings.criterion);
        for (i, l) in loops.iter().enumerate() {
            let v = field.induced(l.control_point);
            assert_relative_eq!(v.dot(&l.normal), y[i], epsilon = 1e-10);
        }
        let total: f64 = field.line_strengths().iter().sum();
        assert_relative_eq!(total, 0.0, epsilon = 1e-12);
    }
}
