//! Onset flow: free stream, body rotation and rotor slipstreams

use ndarray::Array1;

use crate::core::config::CaseConfig;
use crate::core::model::VortexLatticeModel;
use crate::core::types::Vec3;

/// Velocity seen by the body without the vortex system
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OnsetFlow {
    pub freestream: Vec3,
    /// Body rotation rates (p, q, r)
    pub rotation: Vec3,
    /// Rotation centre
    pub cg: Vec3,
}

impl OnsetFlow {
    pub fn from_config(config: &CaseConfig) -> Self {
        Self {
            freestream: config.flight.freestream(),
            rotation: config.rates.vector(),
            cg: config.reference.cg,
        }
    }

    /// Free stream plus the relative velocity of a rotating body,
    /// `V_inf − Ω × (r − r_cg)`
    #[inline]
    pub fn velocity_at(&self, p: Vec3) -> Vec3 {
        self.freestream - self.rotation.cross(&(p - self.cg))
    }

    /// Onset velocity including rotor slipstreams
    #[inline]
    pub fn total_at(&self, model: &VortexLatticeModel, p: Vec3) -> Vec3 {
        self.velocity_at(p) + model.rotor_velocity(p)
    }

    /// Tangency right-hand side `−(V_onset + V_correction) · n` per loop;
    /// degenerate loops get zero
    pub fn rhs(&self, model: &VortexLatticeModel) -> Array1<f64> {
        model
            .loops
            .iter()
            .map(|l| {
                if l.degenerate {
                    0.0
                } else {
                    -(self.total_at(model, l.control_point) + l.onset_correction).dot(&l.normal)
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::FlightCondition;
    use crate::core::mesh::{WingSpec, rectangular_wing};
    use approx::assert_relative_eq;

    #[test]
    fn test_rotation_velocity() {
        let onset = OnsetFlow {
            freestream: Vec3::new(1.0, 0.0, 0.0),
            rotation: Vec3::new(0.0, 0.0, 0.5),
            cg: Vec3::zero(),
        };
        // Yaw rate: a point on +y sees the body moving backwards
        let v = onset.velocity_at(Vec3::new(0.0, 2.0, 0.0));
        assert_relative_eq!(v.x, 2.0);
        assert_relative_eq!(v.y, 0.0);
    }

    #[test]
    fn test_rhs_for_flat_wing() {
        let mesh = rectangular_wing(&WingSpec::default());
        let model = VortexLatticeModel::from_mesh(&mesh, None, Vec::new()).unwrap();
        let config = CaseConfig {
            flight: FlightCondition {
                alpha_deg: 5.0,
                ..Default::default()
            },
            ..Default::default()
        };
        let rhs = OnsetFlow::from_config(&config).rhs(&model);
        let expected = -(5.0_f64.to_radians().sin());
        for &b in rhs.iter() {
            assert_relative_eq!(b, expected, epsilon = 1e-14);
        }
    }
}
