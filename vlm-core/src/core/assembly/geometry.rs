//! Kernel geometry: the vortex system in Prandtl-Glauert stretched space
//!
//! The tangency system is evaluated with x scaled by 1/β. Induced
//! velocities computed here are in stretched space; the physical velocity
//! has its x component divided by β. Mirror images are evaluated by
//! reflecting the target point and the resulting velocity.

use crate::core::biot_savart::{polyline_velocity, segment_velocity};
use crate::core::model::VortexLatticeModel;
use crate::core::types::{NodeId, SymmetryPlane, Vec3};

/// Source description of one unknown at any multigrid level
#[derive(Debug, Clone)]
pub struct LevelLoop {
    /// Directed segments `(a, b, weight)`; the ring is Σ weight · (a → b)
    pub segments: Vec<(NodeId, NodeId, f64)>,
    /// Horseshoes carried with this unknown's circulation
    pub horseshoes: Vec<usize>,
    /// Physical control point
    pub control_point: Vec3,
    /// Physical unit normal
    pub normal: Vec3,
    pub area: f64,
    pub vector_area: Vec3,
    pub kelvin_group: usize,
    pub degenerate: bool,
    /// Loops of the next finer level merged into this one
    pub children: Vec<usize>,
}

impl LevelLoop {
    /// Finest-level loops, one per model loop
    pub fn from_model(model: &VortexLatticeModel) -> Vec<LevelLoop> {
        model
            .loops
            .iter()
            .map(|l| LevelLoop {
                segments: l
                    .edges
                    .iter()
                    .map(|&(e, sign)| {
                        let edge = model.edge(e);
                        (edge.nodes[0], edge.nodes[1], sign)
                    })
                    .collect(),
                horseshoes: l.horseshoes.clone(),
                control_point: l.control_point,
                normal: l.normal,
                area: l.area,
                vector_area: l.vector_area,
                kelvin_group: l.kelvin_group,
                degenerate: l.degenerate,
                children: Vec::new(),
            })
            .collect()
    }
}

/// Trailing-edge segment and line pair of one horseshoe, by index
#[derive(Debug, Clone, Copy)]
pub struct HorseshoePath {
    pub node_a: NodeId,
    pub node_b: NodeId,
    pub line_a: usize,
    pub line_b: usize,
}

/// Stretched trailing line
#[derive(Debug, Clone)]
pub struct LinePath {
    pub points: Vec<Vec3>,
    pub tail: Vec3,
}

/// Vortex geometry shared by every level's operator
#[derive(Debug, Clone)]
pub struct KernelGeometry {
    pub beta: f64,
    pub core: f64,
    pub symmetry: Option<SymmetryPlane>,
    /// Stretched node positions
    pub nodes: Vec<Vec3>,
    pub horseshoes: Vec<HorseshoePath>,
    pub lines: Vec<LinePath>,
}

impl KernelGeometry {
    pub fn new(model: &VortexLatticeModel, beta: f64, core: f64) -> Self {
        let inv_beta = 1.0 / beta;
        let mut geometry = Self {
            beta,
            core,
            symmetry: model.symmetry,
            nodes: model.nodes.iter().map(|p| p.stretch_x(inv_beta)).collect(),
            horseshoes: model
                .horseshoes
                .iter()
                .map(|h| HorseshoePath {
                    node_a: h.node_a,
                    node_b: h.node_b,
                    line_a: h.line_a.index(),
                    line_b: h.line_b.index(),
                })
                .collect(),
            lines: Vec::with_capacity(model.num_lines()),
        };
        geometry.refresh_wake(model);
        geometry
    }

    /// Re-read trailing line positions after the wake moved
    pub fn refresh_wake(&mut self, model: &VortexLatticeModel) {
        let inv_beta = 1.0 / self.beta;
        self.lines = model
            .lines
            .iter()
            .map(|l| LinePath {
                points: l.points.iter().map(|p| p.stretch_x(inv_beta)).collect(),
                tail: l
                    .tail
                    .stretch_x(inv_beta)
                    .normalize()
                    .unwrap_or(Vec3::new(1.0, 0.0, 0.0)),
            })
            .collect();
    }

    /// Physical point to stretched space
    #[inline]
    pub fn stretch(&self, p: Vec3) -> Vec3 {
        p.stretch_x(1.0 / self.beta)
    }

    /// Stretched-space velocity to physical velocity
    #[inline]
    pub fn physical_velocity(&self, v: Vec3) -> Vec3 {
        Vec3::new(v.x / self.beta, v.y, v.z)
    }

    /// Normal whose dot product with a stretched-space velocity gives the
    /// physical normal velocity
    #[inline]
    pub fn effective_normal(&self, n: Vec3) -> Vec3 {
        Vec3::new(n.x / self.beta, n.y, n.z)
    }

    /// Direct element plus its mirror image (reflected, negated strength)
    #[inline]
    pub fn with_image<F: Fn(Vec3) -> Vec3>(&self, q: Vec3, f: F) -> Vec3 {
        match self.symmetry {
            Some(plane) => f(q) + plane.reflect(f(plane.reflect(q))),
            None => f(q),
        }
    }

    /// Unit-circulation ring velocity at stretched `q`, direct element only
    pub fn ring_velocity(&self, q: Vec3, l: &LevelLoop) -> Vec3 {
        let mut v = Vec3::zero();
        for &(a, b, w) in &l.segments {
            v += segment_velocity(q, self.nodes[a.index()], self.nodes[b.index()], self.core) * w;
        }
        v
    }

    /// Unit-strength trailing line velocity at stretched `q`
    pub fn line_velocity(&self, q: Vec3, line: usize) -> Vec3 {
        let path = &self.lines[line];
        polyline_velocity(q, &path.points, path.tail, self.core)
    }

    /// Reversed trailing-edge segment of a horseshoe
    pub fn bound_reversed_velocity(&self, q: Vec3, h: usize) -> Vec3 {
        let hs = &self.horseshoes[h];
        segment_velocity(
            q,
            self.nodes[hs.node_b.index()],
            self.nodes[hs.node_a.index()],
            self.core,
        )
    }

    /// Unit-circulation horseshoe velocity given precomputed line velocities
    pub fn horseshoe_velocity(&self, q: Vec3, h: usize, line_velocities: &[Vec3]) -> Vec3 {
        let hs = &self.horseshoes[h];
        self.bound_reversed_velocity(q, h) + line_velocities[hs.line_a]
            - line_velocities[hs.line_b]
    }

    /// Stretched vector area of a level loop, ½ Σ w (a × b)
    pub fn stretched_vector_area(&self, l: &LevelLoop) -> Vec3 {
        l.segments
            .iter()
            .map(|&(a, b, w)| self.nodes[a.index()].cross(&self.nodes[b.index()]) * w)
            .sum::<Vec3>()
            * 0.5
    }

    /// Largest distance from the stretched control point to a segment node
    pub fn loop_radius(&self, l: &LevelLoop) -> f64 {
        let c = self.stretch(l.control_point);
        l.segments
            .iter()
            .flat_map(|&(a, b, _)| [a, b])
            .map(|n| self.nodes[n.index()].distance(&c))
            .fold(0.0, f64::max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::mesh::{WingSpec, rectangular_wing};
    use approx::assert_relative_eq;

    #[test]
    fn test_stretched_vector_area_matches_physical_at_low_mach() {
        let mesh = rectangular_wing(&WingSpec::default());
        let model = VortexLatticeModel::from_mesh(&mesh, None, Vec::new()).unwrap();
        let loops = LevelLoop::from_model(&model);
        let geometry = KernelGeometry::new(&model, 1.0, 0.0);
        for l in &loops {
            let s = geometry.stretched_vector_area(l);
            assert_relative_eq!(s.z, l.vector_area.z, epsilon = 1e-14);
        }

        let beta = 0.8;
        let stretched = KernelGeometry::new(&model, beta, 0.0);
        let s = stretched.stretched_vector_area(&loops[0]);
        assert_relative_eq!(s.z, loops[0].area / beta, epsilon = 1e-14);
    }

    #[test]
    fn test_mirror_image_of_symmetric_ring_doubles_normal_velocity() {
        let mesh = rectangular_wing(&WingSpec {
            n_chord: 1,
            n_span: 1,
            ..Default::default()
        });
        let model = VortexLatticeModel::from_mesh(&mesh, Some(SymmetryPlane::Y), Vec::new()).unwrap();
        let loops = LevelLoop::from_model(&model);
        let geometry = KernelGeometry::new(&model, 1.0, 0.0);
        // Point on the plane sees direct and image contributions equally
        let q = Vec3::new(0.5, 0.0, 0.3);
        let direct = geometry.ring_velocity(q, &loops[0]);
        let total = geometry.with_image(q, |p| geometry.ring_velocity(p, &loops[0]));
        assert_relative_eq!(total.z, 2.0 * direct.z, epsilon = 1e-14);
        assert_relative_eq!(total.y, 0.0, epsilon = 1e-14);
    }
}
