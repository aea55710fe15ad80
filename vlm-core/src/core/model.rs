//! Vortex lattice model
//!
//! Index-stable arenas of loops, edges, trailing lines and sheets built once
//! from a [`SurfaceMesh`]. Cross references are handles, never pointers.
//!
//! Sign conventions:
//! - a loop's normal follows the right-hand rule on its corner order, and a
//!   positive circulation induces velocity along it at the control point
//! - an edge is stored from its lower to its higher node id; each adjacent
//!   loop records `+1` when it traverses the edge in that direction
//! - every trailing-edge loop owns a [`Horseshoe`]: the trailing-edge segment
//!   reversed plus two trailing lines, carrying the loop's circulation, so the
//!   net bound strength on a trailing edge is zero

use std::collections::HashMap;

use ndarray::Array1;
use serde::{Deserialize, Serialize};

use crate::core::constants::EPSY;
use crate::core::mesh::{MeshError, SurfaceMesh};
use crate::core::types::{Aabb, EdgeId, LineId, LoopId, NodeId, SheetId, SymmetryPlane, Vec3};

/// Relative distance under which a node counts as lying on the symmetry plane
const PLANE_TOLERANCE: f64 = 1e-9;

// ============================================================================
// Entities
// ============================================================================

/// Bound vortex segment shared by one or two loops
#[derive(Debug, Clone)]
pub struct VortexEdge {
    /// End nodes, lower id first
    pub nodes: [NodeId; 2],
    /// Adjacent loops with their traversal sign
    pub loops: Vec<(LoopId, f64)>,
    pub length: f64,
    /// Unit direction from `nodes[0]` to `nodes[1]`
    pub direction: Vec3,
    pub midpoint: Vec3,
    /// Part of a surface trailing-edge chain
    pub trailing_edge: bool,
    /// Both end nodes lie on the symmetry plane
    pub on_symmetry_plane: bool,
    /// Net circulation along `direction`
    pub strength: f64,
}

/// A panel carrying one circulation unknown
#[derive(Debug, Clone)]
pub struct VortexLoop {
    /// Corner nodes in circulation order
    pub nodes: Vec<NodeId>,
    /// Bounding edges with the loop's traversal sign
    pub edges: Vec<(EdgeId, f64)>,
    pub control_point: Vec3,
    pub normal: Vec3,
    pub area: f64,
    /// Half the sum of corner cross products, `area * normal`
    pub vector_area: Vec3,
    pub surface: usize,
    pub kelvin_group: usize,
    pub base_region: bool,
    /// Every corner lies on the symmetry plane
    pub on_symmetry_plane: bool,
    /// Zero-area panel; its unknown is pinned to zero
    pub degenerate: bool,
    /// Horseshoes shed by this loop, indices into [`VortexLatticeModel::horseshoes`]
    pub horseshoes: Vec<usize>,
    /// Precomputed onset velocity correction
    pub onset_correction: Vec3,
    pub circulation: f64,
    /// Local total velocity at the control point
    pub velocity: Vec3,
    /// Mean pressure coefficient from the local velocity
    pub cp: f64,
    /// Loading coefficient, lower minus upper surface
    pub delta_cp: f64,
    pub cp_upper: f64,
    pub cp_lower: f64,
}

/// Wake attachment of one trailing-edge loop
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Horseshoe {
    pub owner: LoopId,
    pub edge: EdgeId,
    /// Trailing-edge nodes in the owner's traversal order (a then b)
    pub node_a: NodeId,
    pub node_b: NodeId,
    /// Line at `node_a`, carrying +Γ downstream
    pub line_a: LineId,
    /// Line at `node_b`, carrying -Γ downstream
    pub line_b: LineId,
}

/// Trailing vortex filament shed from one trailing-edge node
#[derive(Debug, Clone)]
pub struct TrailingVortexLine {
    pub te_node: NodeId,
    pub sheet: SheetId,
    /// Node positions, `points[0]` is the fixed trailing-edge node
    pub points: Vec<Vec3>,
    /// Unit direction of the semi-infinite tail after the last point
    pub tail: Vec3,
    /// Loops whose circulation this line carries, with weights
    pub contributions: Vec<(LoopId, f64)>,
    pub on_symmetry_plane: bool,
    /// Net circulation along the downstream direction
    pub strength: f64,
}

/// Ordered wake of one lifting surface
#[derive(Debug, Clone)]
pub struct VortexSheet {
    pub surface: usize,
    pub name: String,
    /// Lines in trailing-edge chain order
    pub lines: Vec<LineId>,
    /// Trailing-edge edges between consecutive lines
    pub te_edges: Vec<EdgeId>,
    /// Unit vector from the first to the last trailing-edge node
    pub span_axis: Vec3,
}

/// Loops connected through shared edges
#[derive(Debug, Clone)]
pub struct KelvinGroup {
    pub loops: Vec<LoopId>,
    /// At least one member sheds a wake; groups without one keep zero net
    /// circulation
    pub has_wake: bool,
}

/// Actuator disk adding an axial slipstream increment
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RotorDisk {
    pub center: Vec3,
    /// Slipstream direction
    pub axis: Vec3,
    pub radius: f64,
    /// Axial induced velocity at the disk plane
    pub induced_velocity: f64,
}

impl RotorDisk {
    /// Momentum-theory increment inside the disk cylinder; grows from
    /// zero far upstream to twice the disk value far downstream
    pub fn velocity_at(&self, p: Vec3) -> Vec3 {
        let Some(axis) = self.axis.normalize() else {
            return Vec3::zero();
        };
        let r = p - self.center;
        let t = r.dot(&axis);
        let radial = (r - axis * t).length();
        if radial > self.radius || self.radius <= 0.0 {
            return Vec3::zero();
        }
        let growth = 1.0 + t / (t * t + self.radius * self.radius).sqrt();
        axis * (self.induced_velocity * growth)
    }
}

// ============================================================================
// Model
// ============================================================================

/// Arena holding the whole vortex system
#[derive(Debug, Clone)]
pub struct VortexLatticeModel {
    pub nodes: Vec<Vec3>,
    pub edges: Vec<VortexEdge>,
    pub loops: Vec<VortexLoop>,
    pub horseshoes: Vec<Horseshoe>,
    pub lines: Vec<TrailingVortexLine>,
    pub sheets: Vec<VortexSheet>,
    pub kelvin_groups: Vec<KelvinGroup>,
    pub rotors: Vec<RotorDisk>,
    pub symmetry: Option<SymmetryPlane>,
    pub bounds: Aabb,
    pub mean_edge_length: f64,
}

fn polygon_vector_area(points: &[Vec3]) -> Vec3 {
    let n = points.len();
    (0..n)
        .map(|k| points[k].cross(&points[(k + 1) % n]))
        .sum::<Vec3>()
        * 0.5
}

struct UnionFind {
    parent: Vec<usize>,
}

impl UnionFind {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
        }
    }

    fn find(&mut self, mut i: usize) -> usize {
        while self.parent[i] != i {
            self.parent[i] = self.parent[self.parent[i]];
            i = self.parent[i];
        }
        i
    }

    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra != rb {
            self.parent[ra.max(rb)] = ra.min(rb);
        }
    }
}

impl VortexLatticeModel {
    /// Build the arenas from a validated mesh
    pub fn from_mesh(
        mesh: &SurfaceMesh,
        symmetry: Option<SymmetryPlane>,
        rotors: Vec<RotorDisk>,
    ) -> Result<Self, MeshError> {
        mesh.validate()?;
        let nodes = mesh.deformed_nodes();
        let bounds = Aabb::from_points(nodes.iter());
        let plane_tol = PLANE_TOLERANCE * bounds.max_extent().max(1.0);
        let on_plane = |p: &Vec3| symmetry.is_some_and(|s| s.coordinate(p).abs() <= plane_tol);

        // Edges
        let mut edge_index: HashMap<(usize, usize), EdgeId> = HashMap::new();
        let mut edges: Vec<VortexEdge> = Vec::new();
        let mut loop_edges: Vec<Vec<(EdgeId, f64)>> = Vec::with_capacity(mesh.num_panels());
        for (pi, panel) in mesh.panels.iter().enumerate() {
            let count = panel.nodes.len();
            let mut own = Vec::with_capacity(count);
            for k in 0..count {
                let a = panel.nodes[k];
                let b = panel.nodes[(k + 1) % count];
                if a == b {
                    continue;
                }
                let key = (a.min(b), a.max(b));
                let id = *edge_index.entry(key).or_insert_with(|| {
                    let (p, q) = (nodes[key.0], nodes[key.1]);
                    let length = p.distance(&q);
                    edges.push(VortexEdge {
                        nodes: [NodeId(key.0), NodeId(key.1)],
                        loops: Vec::with_capacity(2),
                        length,
                        direction: (q - p).normalize().unwrap_or_default(),
                        midpoint: (p + q) * 0.5,
                        trailing_edge: false,
                        on_symmetry_plane: on_plane(&p) && on_plane(&q),
                        strength: 0.0,
                    });
                    EdgeId(edges.len() - 1)
                });
                let sign = if a < b { 1.0 } else { -1.0 };
                edges[id.index()].loops.push((LoopId(pi), sign));
                own.push((id, sign));
            }
            loop_edges.push(own);
        }

        // A mirrored half model averages over the edges of the full body:
        // off-plane edges count twice, edges on the plane once
        let mirrored = matches!(symmetry, Some(SymmetryPlane::X | SymmetryPlane::Y));
        let (total, count) = edges
            .iter()
            .filter(|e| e.length > 0.0)
            .fold((0.0, 0.0), |(total, count), e| {
                let weight = if mirrored && !e.on_symmetry_plane { 2.0 } else { 1.0 };
                (total + weight * e.length, count + weight)
            });
        let mean_edge_length = if count > 0.0 { total / count } else { 1.0 };
        let degenerate_area = EPSY * mean_edge_length * mean_edge_length;

        // Loops
        let mut loops: Vec<VortexLoop> = Vec::with_capacity(mesh.num_panels());
        for (pi, (panel, own)) in mesh.panels.iter().zip(loop_edges).enumerate() {
            let corners: Vec<Vec3> = panel.nodes.iter().map(|&n| nodes[n]).collect();
            let vector_area = polygon_vector_area(&corners);
            let area = vector_area.length();
            let degenerate = area <= degenerate_area;
            if degenerate {
                log::warn!("Panel {} has zero area and is pinned to zero circulation", pi);
            }
            let normal = if degenerate {
                Vec3::new(0.0, 0.0, 1.0)
            } else {
                vector_area / area
            };
            let control_point = corners.iter().copied().sum::<Vec3>() / corners.len() as f64;
            loops.push(VortexLoop {
                nodes: panel.nodes.iter().map(|&n| NodeId(n)).collect(),
                edges: own,
                control_point,
                normal,
                area,
                vector_area: if degenerate { Vec3::zero() } else { vector_area },
                surface: panel.surface,
                kelvin_group: 0,
                base_region: panel.base_region,
                on_symmetry_plane: corners.iter().all(|p| on_plane(p)),
                degenerate,
                horseshoes: Vec::new(),
                onset_correction: mesh
                    .panel_velocity
                    .as_ref()
                    .map(|v| v[pi])
                    .unwrap_or_default(),
                circulation: 0.0,
                velocity: Vec3::zero(),
                cp: 0.0,
                delta_cp: 0.0,
                cp_upper: 0.0,
                cp_lower: 0.0,
            });
        }

        // Sheets, trailing lines and horseshoes
        let mut sheets = Vec::new();
        let mut lines: Vec<TrailingVortexLine> = Vec::new();
        let mut horseshoes = Vec::new();
        for (si, surface) in mesh.surfaces.iter().enumerate() {
            if surface.trailing_edge.len() < 2 {
                continue;
            }
            let sheet = SheetId(sheets.len());
            let first_line = lines.len();
            for &n in &surface.trailing_edge {
                lines.push(TrailingVortexLine {
                    te_node: NodeId(n),
                    sheet,
                    points: vec![nodes[n]],
                    tail: Vec3::new(1.0, 0.0, 0.0),
                    contributions: Vec::new(),
                    on_symmetry_plane: on_plane(&nodes[n]),
                    strength: 0.0,
                });
            }
            let line_of = |k: usize| LineId(first_line + k);

            let mut te_edges = Vec::with_capacity(surface.trailing_edge.len() - 1);
            for (k, pair) in surface.trailing_edge.windows(2).enumerate() {
                let key = (pair[0].min(pair[1]), pair[0].max(pair[1]));
                let edge_id = edge_index
                    .get(&key)
                    .copied()
                    .ok_or_else(|| MeshError::BrokenTrailingEdge {
                        surface: surface.name.clone(),
                        a: pair[0],
                        b: pair[1],
                    })?;
                te_edges.push(edge_id);
                let edge = &mut edges[edge_id.index()];
                edge.trailing_edge = true;
                for &(owner, sign) in &edge.loops {
                    if loops[owner.index()].surface != si {
                        continue;
                    }
                    // Traversal order of the owner loop along this edge
                    let (a, b) = if sign > 0.0 {
                        (edge.nodes[0], edge.nodes[1])
                    } else {
                        (edge.nodes[1], edge.nodes[0])
                    };
                    let (line_a, line_b) = if a.index() == pair[0] {
                        (line_of(k), line_of(k + 1))
                    } else {
                        (line_of(k + 1), line_of(k))
                    };
                    lines[line_a.index()].contributions.push((owner, 1.0));
                    lines[line_b.index()].contributions.push((owner, -1.0));
                    loops[owner.index()].horseshoes.push(horseshoes.len());
                    horseshoes.push(Horseshoe {
                        owner,
                        edge: edge_id,
                        node_a: a,
                        node_b: b,
                        line_a,
                        line_b,
                    });
                }
            }

            let start = nodes[surface.trailing_edge[0]];
            let end = nodes[surface.trailing_edge[surface.trailing_edge.len() - 1]];
            sheets.push(VortexSheet {
                surface: si,
                name: surface.name.clone(),
                lines: (0..surface.trailing_edge.len()).map(line_of).collect(),
                te_edges,
                span_axis: (end - start).normalize().unwrap_or(Vec3::new(0.0, 1.0, 0.0)),
            });
        }

        let kelvin_groups = Self::build_kelvin_groups(mesh, &edges, &mut loops)?;

        log::info!(
            "Vortex lattice: {} loops, {} edges, {} trailing lines, {} sheets, {} Kelvin groups",
            loops.len(),
            edges.len(),
            lines.len(),
            sheets.len(),
            kelvin_groups.len()
        );

        Ok(Self {
            nodes,
            edges,
            loops,
            horseshoes,
            lines,
            sheets,
            kelvin_groups,
            rotors,
            symmetry,
            bounds,
            mean_edge_length,
        })
    }

    fn build_kelvin_groups(
        mesh: &SurfaceMesh,
        edges: &[VortexEdge],
        loops: &mut [VortexLoop],
    ) -> Result<Vec<KelvinGroup>, MeshError> {
        let explicit = mesh.panels.iter().filter(|p| p.kelvin_group.is_some()).count();
        let assignment: Vec<usize> = if explicit == 0 {
            let mut uf = UnionFind::new(loops.len());
            for edge in edges {
                if let [(a, _), (b, _)] = edge.loops[..] {
                    uf.union(a.index(), b.index());
                }
            }
            let mut renumber: HashMap<usize, usize> = HashMap::new();
            (0..loops.len())
                .map(|i| {
                    let root = uf.find(i);
                    let next = renumber.len();
                    *renumber.entry(root).or_insert(next)
                })
                .collect()
        } else {
            if explicit != mesh.panels.len() {
                return Err(MeshError::KelvinGroup(format!(
                    "{} of {} panels have an explicit group",
                    explicit,
                    mesh.panels.len()
                )));
            }
            let ids: Vec<usize> = mesh.panels.iter().filter_map(|p| p.kelvin_group).collect();
            let count = ids.iter().max().map_or(0, |m| m + 1);
            let mut used = vec![false; count];
            for &g in &ids {
                used[g] = true;
            }
            if let Some(gap) = used.iter().position(|&u| !u) {
                return Err(MeshError::KelvinGroup(format!("group {} has no panels", gap)));
            }
            for edge in edges {
                if let [(a, _), (b, _)] = edge.loops[..] {
                    if ids[a.index()] != ids[b.index()] {
                        return Err(MeshError::KelvinGroup(format!(
                            "panels {} and {} share an edge but belong to groups {} and {}",
                            a.index(),
                            b.index(),
                            ids[a.index()],
                            ids[b.index()]
                        )));
                    }
                }
            }
            ids
        };

        let count = assignment.iter().max().map_or(0, |m| m + 1);
        let mut groups: Vec<KelvinGroup> = (0..count)
            .map(|_| KelvinGroup {
                loops: Vec::new(),
                has_wake: false,
            })
            .collect();
        for (i, &g) in assignment.iter().enumerate() {
            loops[i].kelvin_group = g;
            groups[g].loops.push(LoopId(i));
            groups[g].has_wake |= !loops[i].horseshoes.is_empty();
        }
        Ok(groups)
    }

    pub fn num_loops(&self) -> usize {
        self.loops.len()
    }

    pub fn num_lines(&self) -> usize {
        self.lines.len()
    }

    pub fn edge(&self, id: EdgeId) -> &VortexEdge {
        &self.edges[id.index()]
    }

    pub fn line(&self, id: LineId) -> &TrailingVortexLine {
        &self.lines[id.index()]
    }

    pub fn sheet(&self, id: SheetId) -> &VortexSheet {
        &self.sheets[id.index()]
    }

    pub fn node(&self, id: NodeId) -> Vec3 {
        self.nodes[id.index()]
    }

    /// Largest side of the geometry bounding box
    pub fn reference_length(&self) -> f64 {
        self.bounds.max_extent().max(self.mean_edge_length)
    }

    /// Loops contributing to integrated loads
    pub fn is_loaded(&self, id: LoopId) -> bool {
        let l = &self.loops[id.index()];
        !(l.base_region || l.on_symmetry_plane || l.degenerate)
    }

    /// Planform area of all loaded loops (one side of the symmetry plane)
    pub fn wetted_area(&self) -> f64 {
        (0..self.loops.len())
            .filter(|&i| self.is_loaded(LoopId(i)))
            .map(|i| self.loops[i].area)
            .sum()
    }

    /// Current circulation vector
    pub fn circulation(&self) -> Array1<f64> {
        self.loops.iter().map(|l| l.circulation).collect()
    }

    /// Store loop circulation and derive edge and trailing-line strengths
    pub fn set_circulation(&mut self, gamma: &Array1<f64>) -> Result<(), MeshError> {
        if gamma.len() != self.loops.len() {
            return Err(MeshError::LengthMismatch {
                what: "circulation",
                expected: self.loops.len(),
                found: gamma.len(),
            });
        }
        for (l, &g) in self.loops.iter_mut().zip(gamma.iter()) {
            l.circulation = g;
        }
        for edge in &mut self.edges {
            edge.strength = edge.loops.iter().map(|&(l, s)| s * gamma[l.index()]).sum();
        }
        for hs in &self.horseshoes {
            let sign = self.edges[hs.edge.index()]
                .loops
                .iter()
                .find(|(l, _)| *l == hs.owner)
                .map_or(0.0, |&(_, s)| s);
            self.edges[hs.edge.index()].strength -= sign * gamma[hs.owner.index()];
        }
        for line in &mut self.lines {
            line.strength = line
                .contributions
                .iter()
                .map(|&(l, w)| w * gamma[l.index()])
                .sum();
        }
        Ok(())
    }

    /// Wake node positions per line
    pub fn wake_positions(&self) -> Vec<Vec<Vec3>> {
        self.lines.iter().map(|l| l.points.clone()).collect()
    }

    /// Replace wake node positions; line count and trailing-edge nodes
    /// must match the model
    pub fn set_wake_positions(&mut self, positions: Vec<Vec<Vec3>>) -> Result<(), MeshError> {
        if positions.len() != self.lines.len() {
            return Err(MeshError::LengthMismatch {
                what: "trailing lines",
                expected: self.lines.len(),
                found: positions.len(),
            });
        }
        for (line, points) in self.lines.iter_mut().zip(positions) {
            if points.is_empty() {
                return Err(MeshError::Empty("trailing line nodes"));
            }
            if let Some(i) = points.iter().position(|p| !p.is_finite()) {
                return Err(MeshError::NonFinite(i));
            }
            line.points = points;
            // First node stays fixed at the trailing edge
            line.points[0] = self.nodes[line.te_node.index()];
        }
        Ok(())
    }

    /// Set the tail direction of every trailing line
    pub fn set_wake_tail(&mut self, direction: Vec3) {
        for line in &mut self.lines {
            line.tail = direction;
        }
    }

    /// Velocity increment of all rotor disks at a point
    pub fn rotor_velocity(&self, p: Vec3) -> Vec3 {
        self.rotors.iter().map(|r| r.velocity_at(p)).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::mesh::{Panel, Surface, WingSpec, closed_box, rectangular_wing};
    use approx::assert_relative_eq;
    use ndarray::Array1;

    fn wing() -> VortexLatticeModel {
        let mesh = rectangular_wing(&WingSpec {
            n_chord: 2,
            n_span: 3,
            ..Default::default()
        });
        VortexLatticeModel::from_mesh(&mesh, Some(SymmetryPlane::Y), Vec::new()).unwrap()
    }

    #[test]
    fn test_wing_topology() {
        let model = wing();
        assert_eq!(model.num_loops(), 6);
        // 9 spanwise + 8 chordwise edges
        assert_eq!(model.edges.len(), 17);
        assert_eq!(model.num_lines(), 4);
        assert_eq!(model.horseshoes.len(), 3);
        assert_eq!(model.kelvin_groups.len(), 1);
        assert!(model.kelvin_groups[0].has_wake);
        for l in &model.loops {
            assert_relative_eq!(l.normal.z, 1.0);
            assert_relative_eq!(l.area, 0.5 / 3.0 * 0.5, epsilon = 1e-14);
        }
        assert!(model.lines[0].on_symmetry_plane);
        assert!(!model.lines[3].on_symmetry_plane);
        assert_eq!(model.edges.iter().filter(|e| e.on_symmetry_plane).count(), 2);
    }

    #[test]
    fn test_mean_edge_length_of_mirrored_model() {
        let half = rectangular_wing(&WingSpec {
            semi_span: 1.0,
            n_chord: 3,
            n_span: 6,
            ..Default::default()
        });
        let full = rectangular_wing(&WingSpec {
            semi_span: 1.0,
            n_chord: 3,
            n_span: 12,
            full_span: true,
            ..Default::default()
        });
        let half = VortexLatticeModel::from_mesh(&half, Some(SymmetryPlane::Y), Vec::new()).unwrap();
        let full = VortexLatticeModel::from_mesh(&full, None, Vec::new()).unwrap();
        assert_eq!(half.edges.len(), 45);
        assert_eq!(full.edges.len(), 87);
        assert_eq!(half.edges.iter().filter(|e| e.on_symmetry_plane).count(), 3);
        assert_relative_eq!(half.mean_edge_length, full.mean_edge_length, max_relative = 1e-14);
    }

    #[test]
    fn test_trailing_edge_strength_cancels() {
        let mut model = wing();
        let gamma = Array1::from_vec(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        model.set_circulation(&gamma).unwrap();
        for e in model.edges.iter().filter(|e| e.trailing_edge) {
            assert_relative_eq!(e.strength, 0.0);
        }
        // Root line carries the first strip, tip line the last with opposite sign
        let root: f64 = model.lines[0].strength;
        let tip: f64 = model.lines[3].strength;
        let owners: Vec<f64> = model.horseshoes.iter().map(|h| gamma[h.owner.index()]).collect();
        assert_relative_eq!(root.abs(), owners[0].abs());
        assert_relative_eq!(tip.abs(), owners[2].abs());
        assert_relative_eq!(root.signum(), -tip.signum());
        let total: f64 = model.lines.iter().map(|l| l.strength).sum();
        assert_relative_eq!(total, 0.0, epsilon = 1e-14);
    }

    #[test]
    fn test_closed_box_has_no_wake() {
        let mesh = closed_box(Vec3::zero(), 1.0, 2);
        let model = VortexLatticeModel::from_mesh(&mesh, None, Vec::new()).unwrap();
        assert_eq!(model.kelvin_groups.len(), 1);
        assert!(!model.kelvin_groups[0].has_wake);
        for e in &model.edges {
            assert_eq!(e.loops.len(), 2);
            assert_relative_eq!(e.loops[0].1, -e.loops[1].1);
        }
    }

    #[test]
    fn test_inconsistent_kelvin_groups() {
        let mut mesh = rectangular_wing(&WingSpec {
            n_chord: 1,
            n_span: 2,
            ..Default::default()
        });
        mesh.panels[0].kelvin_group = Some(0);
        mesh.panels[1].kelvin_group = Some(1);
        let err = VortexLatticeModel::from_mesh(&mesh, None, Vec::new());
        assert!(matches!(err, Err(MeshError::KelvinGroup(_))));

        mesh.panels[1].kelvin_group = None;
        let err = VortexLatticeModel::from_mesh(&mesh, None, Vec::new());
        assert!(matches!(err, Err(MeshError::KelvinGroup(_))));
    }

    #[test]
    fn test_degenerate_panel_flagged() {
        let mesh = SurfaceMesh {
            nodes: vec![
                Vec3::new(0.0, 0.0, 0.0),
                Vec3::new(1.0, 0.0, 0.0),
                Vec3::new(1.0, 1.0, 0.0),
                Vec3::new(0.0, 1.0, 0.0),
                Vec3::new(2.0, 0.0, 0.0),
            ],
            panels: vec![Panel::new(vec![0, 1, 2, 3], 0), Panel::new(vec![0, 1, 4], 0)],
            surfaces: vec![Surface {
                name: "plate".into(),
                trailing_edge: Vec::new(),
            }],
            ..Default::default()
        };
        let model = VortexLatticeModel::from_mesh(&mesh, None, Vec::new()).unwrap();
        assert!(!model.loops[0].degenerate);
        assert!(model.loops[1].degenerate);
        assert!(!model.is_loaded(LoopId(1)));
    }

    #[test]
    fn test_rotor_disk_increment() {
        let rotor = RotorDisk {
            center: Vec3::zero(),
            axis: Vec3::new(1.0, 0.0, 0.0),
            radius: 1.0,
            induced_velocity: 2.0,
        };
        assert_relative_eq!(rotor.velocity_at(Vec3::zero()).x, 2.0);
        assert!(rotor.velocity_at(Vec3::new(1e6, 0.0, 0.0)).x > 3.99);
        assert_eq!(rotor.velocity_at(Vec3::new(1.0, 2.0, 0.0)), Vec3::zero());
    }

    #[test]
    fn test_wake_positions_keep_trailing_edge() {
        let mut model = wing();
        let mut positions = model.wake_positions();
        for p in positions.iter_mut() {
            p[0] = p[0] + Vec3::new(0.3, 0.0, 0.0);
            p.push(p[0] + Vec3::new(1.0, 0.0, 0.0));
        }
        model.set_wake_positions(positions).unwrap();
        assert_relative_eq!(model.lines[1].points[0].x, 1.0);
        assert_eq!(model.lines[1].points.len(), 2);
        assert!(model.set_wake_positions(Vec::new()).is_err());
    }
}
