//! Mesh adapter
//!
//! A [`SurfaceMesh`] is the already-built panel description the solver
//! consumes: node coordinates, panels given as 3 or 4 corner node ids in
//! circulation order, and per-surface trailing-edge node chains. Loading is
//! abstracted behind [`MeshSource`]; [`JsonMeshLoader`] reads the serde form.
//!
//! Panel normals follow the right-hand rule on the corner order, and a
//! positive loop circulation induces velocity along that normal at the
//! panel centre.

pub mod generators;

use crate::core::constants::MAX_PANEL_NODES;
use crate::core::types::Vec3;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use thiserror::Error;

pub use generators::{WingSpec, closed_box, rectangular_wing};

/// Geometry errors, all fatal and reported before any solve
#[derive(Error, Debug)]
pub enum MeshError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Mesh parse error: {0}")]
    Parse(String),

    #[error("Mesh has no {0}")]
    Empty(&'static str),

    #[error("Panel {panel} references node {node} but the mesh has {num_nodes} nodes")]
    NodeOutOfRange {
        panel: usize,
        node: usize,
        num_nodes: usize,
    },

    #[error("Panel {panel} has {count} corners (expected 3 or 4)")]
    BadPanel { panel: usize, count: usize },

    #[error("Node {0} has a non-finite coordinate")]
    NonFinite(usize),

    #[error("Panel {panel} references surface {surface} but {num_surfaces} surfaces are defined")]
    SurfaceOutOfRange {
        panel: usize,
        surface: usize,
        num_surfaces: usize,
    },

    #[error("Edge ({0}, {1}) is shared by more than two panels")]
    NonManifoldEdge(usize, usize),

    #[error("Trailing edge of surface '{surface}' jumps between nodes {a} and {b}, which share no panel edge")]
    BrokenTrailingEdge { surface: String, a: usize, b: usize },

    #[error("{what} has {found} entries, expected {expected}")]
    LengthMismatch {
        what: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("Inconsistent Kelvin grouping: {0}")]
    KelvinGroup(String),
}

/// One panel of the surface mesh
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Panel {
    /// Corner node ids in circulation order
    pub nodes: Vec<usize>,
    /// Owning surface index
    #[serde(default)]
    pub surface: usize,
    /// Explicit Kelvin group; detected from connectivity when absent
    #[serde(default)]
    pub kelvin_group: Option<usize>,
    /// Base region panels carry circulation but no integrated load
    #[serde(default)]
    pub base_region: bool,
}

impl Panel {
    pub fn new(nodes: Vec<usize>, surface: usize) -> Self {
        Self {
            nodes,
            surface,
            kelvin_group: None,
            base_region: false,
        }
    }
}

/// A named surface, optionally shedding a wake
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Surface {
    pub name: String,
    /// Ordered trailing-edge node chain, empty for non-lifting bodies
    #[serde(default)]
    pub trailing_edge: Vec<usize>,
}

/// Panelled surface geometry
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SurfaceMesh {
    pub nodes: Vec<Vec3>,
    pub panels: Vec<Panel>,
    #[serde(default)]
    pub surfaces: Vec<Surface>,
    /// Per-node displacement added when the model is built
    #[serde(default)]
    pub deformation: Option<Vec<Vec3>>,
    /// Per-panel onset velocity corrections (rotor wash, deformation rates)
    #[serde(default)]
    pub panel_velocity: Option<Vec<Vec3>>,
}

impl SurfaceMesh {
    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn num_panels(&self) -> usize {
        self.panels.len()
    }

    /// Node positions with deformation applied
    pub fn deformed_nodes(&self) -> Vec<Vec3> {
        match &self.deformation {
            Some(d) => self
                .nodes
                .iter()
                .zip(d.iter())
                .map(|(p, dp)| *p + *dp)
                .collect(),
            None => self.nodes.clone(),
        }
    }

    /// Check indices, counts and connectivity
    pub fn validate(&self) -> Result<(), MeshError> {
        if self.nodes.is_empty() {
            return Err(MeshError::Empty("nodes"));
        }
        if self.panels.is_empty() {
            return Err(MeshError::Empty("panels"));
        }
        if let Some(i) = self.nodes.iter().position(|p| !p.is_finite()) {
            return Err(MeshError::NonFinite(i));
        }
        if let Some(d) = &self.deformation {
            if d.len() != self.nodes.len() {
                return Err(MeshError::LengthMismatch {
                    what: "deformation",
                    expected: self.nodes.len(),
                    found: d.len(),
                });
            }
            if let Some(i) = d.iter().position(|p| !p.is_finite()) {
                return Err(MeshError::NonFinite(i));
            }
        }
        if let Some(v) = &self.panel_velocity {
            if v.len() != self.panels.len() {
                return Err(MeshError::LengthMismatch {
                    what: "panel_velocity",
                    expected: self.panels.len(),
                    found: v.len(),
                });
            }
        }

        let num_surfaces = self.surfaces.len().max(1);
        let mut edge_use: HashMap<(usize, usize), usize> = HashMap::new();
        for (pi, panel) in self.panels.iter().enumerate() {
            let count = panel.nodes.len();
            if !(3..=MAX_PANEL_NODES).contains(&count) {
                return Err(MeshError::BadPanel { panel: pi, count });
            }
            if let Some(&node) = panel.nodes.iter().find(|&&n| n >= self.nodes.len()) {
                return Err(MeshError::NodeOutOfRange {
                    panel: pi,
                    node,
                    num_nodes: self.nodes.len(),
                });
            }
            if panel.surface >= num_surfaces {
                return Err(MeshError::SurfaceOutOfRange {
                    panel: pi,
                    surface: panel.surface,
                    num_surfaces,
                });
            }
            for k in 0..count {
                let a = panel.nodes[k];
                let b = panel.nodes[(k + 1) % count];
                if a == b {
                    continue;
                }
                let used = edge_use.entry((a.min(b), a.max(b))).or_insert(0);
                *used += 1;
                if *used > 2 {
                    return Err(MeshError::NonManifoldEdge(a.min(b), a.max(b)));
                }
            }
        }

        for surface in &self.surfaces {
            for pair in surface.trailing_edge.windows(2) {
                let (a, b) = (pair[0], pair[1]);
                if a >= self.nodes.len() || b >= self.nodes.len() {
                    return Err(MeshError::NodeOutOfRange {
                        panel: usize::MAX,
                        node: a.max(b),
                        num_nodes: self.nodes.len(),
                    });
                }
                if !edge_use.contains_key(&(a.min(b), a.max(b))) {
                    return Err(MeshError::BrokenTrailingEdge {
                        surface: surface.name.clone(),
                        a,
                        b,
                    });
                }
            }
        }
        Ok(())
    }
}

/// Source of panel geometry
pub trait MeshSource {
    /// Load and validate a mesh
    fn load_geometry(&self, path: &Path) -> Result<SurfaceMesh, MeshError>;
}

/// Reads the JSON serialization of [`SurfaceMesh`]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonMeshLoader;

impl MeshSource for JsonMeshLoader {
    fn load_geometry(&self, path: &Path) -> Result<SurfaceMesh, MeshError> {
        let content = fs::read_to_string(path)?;
        let mesh: SurfaceMesh =
            serde_json::from_str(&content).map_err(|e| MeshError::Parse(e.to_string()))?;
        mesh.validate()?;
        log::info!(
            "Loaded mesh {}: {} nodes, {} panels, {} surfaces",
            path.display(),
            mesh.num_nodes(),
            mesh.num_panels(),
            mesh.surfaces.len()
        );
        Ok(mesh)
    }
}

/// Write a mesh as pretty JSON
pub fn save_mesh_json(mesh: &SurfaceMesh, path: &Path) -> Result<(), MeshError> {
    let content =
        serde_json::to_string_pretty(mesh).map_err(|e| MeshError::Parse(e.to_string()))?;
    fs::write(path, content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single_quad() -> SurfaceMesh {
        SurfaceMesh {
            nodes: vec![
                Vec3::new(0.0, 0.0, 0.0),
                Vec3::new(1.0, 0.0, 0.0),
                Vec3::new(1.0, 1.0, 0.0),
                Vec3::new(0.0, 1.0, 0.0),
            ],
            panels: vec![Panel::new(vec![0, 1, 2, 3], 0)],
            surfaces: vec![Surface {
                name: "plate".into(),
                trailing_edge: vec![1, 2],
            }],
            ..Default::default()
        }
    }

    #[test]
    fn test_valid_mesh() {
        assert!(single_quad().validate().is_ok());
    }

    #[test]
    fn test_node_out_of_range() {
        let mut mesh = single_quad();
        mesh.panels[0].nodes[2] = 9;
        assert!(matches!(
            mesh.validate(),
            Err(MeshError::NodeOutOfRange { node: 9, .. })
        ));
    }

    #[test]
    fn test_broken_trailing_edge() {
        let mut mesh = single_quad();
        mesh.surfaces[0].trailing_edge = vec![0, 2];
        assert!(matches!(
            mesh.validate(),
            Err(MeshError::BrokenTrailingEdge { .. })
        ));
    }

    #[test]
    fn test_non_manifold_edge() {
        let mut mesh = single_quad();
        mesh.nodes.push(Vec3::new(0.5, 0.5, 1.0));
        mesh.nodes.push(Vec3::new(0.5, 0.5, -1.0));
        mesh.panels.push(Panel::new(vec![1, 0, 4], 0));
        mesh.panels.push(Panel::new(vec![0, 1, 5], 0));
        assert!(matches!(
            mesh.validate(),
            Err(MeshError::NonManifoldEdge(0, 1))
        ));
    }

    #[test]
    fn test_deformation_applied() {
        let mut mesh = single_quad();
        mesh.deformation = Some(vec![Vec3::new(0.0, 0.0, 0.1); 4]);
        assert_eq!(mesh.deformed_nodes()[2], Vec3::new(1.0, 1.0, 0.1));
    }

    #[test]
    fn test_json_loader_roundtrip() {
        let dir = std::env::temp_dir().join("vlm_mesh_loader_test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("quad.json");
        save_mesh_json(&single_quad(), &path).unwrap();
        let loaded = JsonMeshLoader.load_geometry(&path).unwrap();
        assert_eq!(loaded, single_quad());
    }
}
