//! Velocity survey at arbitrary points

use vortex_lattice_solvers::parallel::parallel_map;

use crate::core::assembly::VelocityField;
use crate::core::model::VortexLatticeModel;
use crate::core::onset::OnsetFlow;
use crate::core::types::Vec3;

/// Total velocity (onset plus induced) at every point
pub fn survey_velocities(
    model: &VortexLatticeModel,
    onset: &OnsetFlow,
    field: &VelocityField<'_>,
    points: &[Vec3],
) -> Vec<Vec3> {
    parallel_map(points, |&p| onset.total_at(model, p) + field.induced(p))
}

/// `count` evenly spaced points from `a` to `b`
pub fn line_of_points(a: Vec3, b: Vec3, count: usize) -> Vec<Vec3> {
    match count {
        0 => Vec::new(),
        1 => vec![(a + b) * 0.5],
        n => (0..n)
            .map(|k| a + (b - a) * (k as f64 / (n - 1) as f64))
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::assembly::{InfluenceOperator, InfluenceSettings, KernelGeometry, LevelLoop};
    use crate::core::mesh::{WingSpec, rectangular_wing};
    use crate::core::wake::initialize_wake;
    use crate::core::config::WakeConfig;
    use approx::assert_relative_eq;
    use ndarray::Array1;

    #[test]
    fn test_line_of_points() {
        let pts = line_of_points(Vec3::zero(), Vec3::new(2.0, 0.0, 0.0), 3);
        assert_eq!(pts, vec![Vec3::zero(), Vec3::new(1.0, 0.0, 0.0), Vec3::new(2.0, 0.0, 0.0)]);
        assert_eq!(line_of_points(Vec3::zero(), Vec3::zero(), 0).len(), 0);
    }

    #[test]
    fn test_survey_without_circulation_is_onset() {
        let mesh = rectangular_wing(&WingSpec::default());
        let mut model = VortexLatticeModel::from_mesh(&mesh, None, Vec::new()).unwrap();
        initialize_wake(&mut model, Vec3::new(1.0, 0.0, 0.0), &WakeConfig::default()).unwrap();
        let geometry = KernelGeometry::new(&model, 1.0, 1e-4);
        let loops = LevelLoop::from_model(&model);
        let settings = InfluenceSettings::default();
        let operator = InfluenceOperator::assemble(&geometry, &loops, &[false], &settings);
        let gamma = Array1::zeros(model.num_loops());
        let field = VelocityField::new(&geometry, &loops, &operator, &gamma, settings.criterion);

        let onset = OnsetFlow {
            freestream: Vec3::new(1.0, 0.0, 0.05),
            rotation: Vec3::zero(),
            cg: Vec3::zero(),
        };
        let points = line_of_points(Vec3::new(-1.0, 0.2, 0.3), Vec3::new(2.0, 0.2, 0.3), 7);
        for v in survey_velocities(&model, &onset, &field, &points) {
            assert_relative_eq!(v.x, 1.0);
            assert_relative_eq!(v.z, 0.05);
        }
    }

    #[test]
    fn test_survey_sees_bound_vortex() {
        let mesh = rectangular_wing(&WingSpec {
            n_chord: 1,
            n_span: 1,
            ..Default::default()
        });
        let mut model = VortexLatticeModel::from_mesh(&mesh, None, Vec::new()).unwrap();
        initialize_wake(&mut model, Vec3::new(1.0, 0.0, 0.0), &WakeConfig::default()).unwrap();
        let geometry = KernelGeometry::new(&model, 1.0, 1e-4);
        let loops = LevelLoop::from_model(&model);
        let settings = InfluenceSettings::default();
        let operator = InfluenceOperator::assemble(&geometry, &loops, &[false], &settings);
        let gamma = Array1::from_elem(1, -1.0);
        let field = VelocityField::new(&geometry, &loops, &operator, &gamma, settings.criterion);
        let onset = OnsetFlow {
            freestream: Vec3::zero(),
            rotation: Vec3::zero(),
            cg: Vec3::zero(),
        };
        // Above the leading-edge vortex of a lifting (Γ < 0) panel the flow
        // is accelerated downstream
        let v = survey_velocities(&model, &onset, &field, &[Vec3::new(0.0, 0.25, 0.1)]);
        assert!(v[0].x > 0.0);
    }
}
