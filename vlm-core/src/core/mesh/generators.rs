//! Mesh generators for validation geometries
//!
//! - [`rectangular_wing`]: flat untwisted planform in the z = 0 plane
//! - [`closed_box`]: closed non-lifting body with outward normals

use super::{Panel, Surface, SurfaceMesh};
use crate::core::types::Vec3;
use std::collections::HashMap;
use std::f64::consts::PI;

/// Rectangular wing parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WingSpec {
    /// Chord length (x direction)
    pub chord: f64,
    /// Tip y coordinate; the full span is twice this
    pub semi_span: f64,
    /// Chordwise panels
    pub n_chord: usize,
    /// Spanwise panels on the generated part
    pub n_span: usize,
    /// Mesh both halves instead of y >= 0 only
    pub full_span: bool,
    /// Cosine spanwise spacing clustering panels at the tips
    pub cosine_span: bool,
}

impl Default for WingSpec {
    fn default() -> Self {
        Self {
            chord: 1.0,
            semi_span: 0.5,
            n_chord: 4,
            n_span: 8,
            full_span: false,
            cosine_span: false,
        }
    }
}

fn span_stations(spec: &WingSpec) -> Vec<f64> {
    let n = spec.n_span;
    let (lo, hi) = if spec.full_span {
        (-spec.semi_span, spec.semi_span)
    } else {
        (0.0, spec.semi_span)
    };
    (0..=n)
        .map(|j| {
            let t = j as f64 / n as f64;
            let s = if spec.cosine_span {
                if spec.full_span {
                    0.5 * (1.0 - (PI * t).cos())
                } else {
                    (0.5 * PI * t).sin()
                }
            } else {
                t
            };
            lo + (hi - lo) * s
        })
        .collect()
}

/// Generate a flat rectangular wing with its trailing edge at x = chord.
///
/// Panels are ordered so the normal is +z and the trailing-edge chain runs
/// in increasing y.
///
/// # Example
/// ```ignore
/// let mesh = rectangular_wing(&WingSpec { n_span: 16, ..Default::default() });
/// ```
pub fn rectangular_wing(spec: &WingSpec) -> SurfaceMesh {
    let nc = spec.n_chord.max(1);
    let ns = spec.n_span.max(1);
    let spec = WingSpec {
        n_chord: nc,
        n_span: ns,
        ..*spec
    };
    let ys = span_stations(&spec);
    let node = |i: usize, j: usize| i * (ns + 1) + j;

    let mut nodes = Vec::with_capacity((nc + 1) * (ns + 1));
    for i in 0..=nc {
        let x = spec.chord * i as f64 / nc as f64;
        for &y in &ys {
            nodes.push(Vec3::new(x, y, 0.0));
        }
    }

    let mut panels = Vec::with_capacity(nc * ns);
    for i in 0..nc {
        for j in 0..ns {
            panels.push(Panel::new(
                vec![node(i, j), node(i + 1, j), node(i + 1, j + 1), node(i, j + 1)],
                0,
            ));
        }
    }

    SurfaceMesh {
        nodes,
        panels,
        surfaces: vec![Surface {
            name: "wing".to_string(),
            trailing_edge: (0..=ns).map(|j| node(nc, j)).collect(),
        }],
        deformation: None,
        panel_velocity: None,
    }
}

/// Generate a closed cube of side `size` centred at `center`, `n` panels per
/// face edge, normals pointing out of the body.
pub fn closed_box(center: Vec3, size: f64, n: usize) -> SurfaceMesh {
    let n = n.max(1);
    let mut index: HashMap<[usize; 3], usize> = HashMap::new();
    let mut nodes = Vec::new();
    let mut node_at = |ijk: [usize; 3]| -> usize {
        *index.entry(ijk).or_insert_with(|| {
            let p = Vec3::new(
                size * (ijk[0] as f64 / n as f64 - 0.5),
                size * (ijk[1] as f64 / n as f64 - 0.5),
                size * (ijk[2] as f64 / n as f64 - 0.5),
            );
            nodes.push(center + p);
            nodes.len() - 1
        })
    };

    let mut panels = Vec::with_capacity(6 * n * n);
    for a in 0..3 {
        let b = (a + 1) % 3;
        let c = (a + 2) % 3;
        for side in [0, n] {
            for u in 0..n {
                for v in 0..n {
                    let corner = |du: usize, dv: usize| {
                        let mut ijk = [0; 3];
                        ijk[a] = side;
                        ijk[b] = u + du;
                        ijk[c] = v + dv;
                        ijk
                    };
                    let mut quad = vec![
                        node_at(corner(0, 0)),
                        node_at(corner(1, 0)),
                        node_at(corner(1, 1)),
                        node_at(corner(0, 1)),
                    ];
                    // e_b x e_c = e_a, so the low face is reversed
                    if side == 0 {
                        quad.reverse();
                    }
                    panels.push(Panel::new(quad, 0));
                }
            }
        }
    }

    SurfaceMesh {
        nodes,
        panels,
        surfaces: vec![Surface {
            name: "box".to_string(),
            trailing_edge: Vec::new(),
        }],
        deformation: None,
        panel_velocity: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_half_wing_counts() {
        let mesh = rectangular_wing(&WingSpec::default());
        assert_eq!(mesh.num_panels(), 32);
        assert_eq!(mesh.num_nodes(), 45);
        assert_eq!(mesh.surfaces[0].trailing_edge.len(), 9);
        assert!(mesh.validate().is_ok());
        assert_relative_eq!(mesh.nodes[0].y, 0.0);
    }

    #[test]
    fn test_full_wing_is_symmetric() {
        let mesh = rectangular_wing(&WingSpec {
            full_span: true,
            cosine_span: true,
            n_span: 10,
            ..Default::default()
        });
        let ys: Vec<f64> = mesh.nodes[..11].iter().map(|p| p.y).collect();
        for k in 0..11 {
            assert_relative_eq!(ys[k], -ys[10 - k], epsilon = 1e-14);
        }
    }

    #[test]
    fn test_box_is_closed() {
        let mesh = closed_box(Vec3::zero(), 2.0, 2);
        assert_eq!(mesh.num_panels(), 24);
        // 26 surface nodes of a 3x3x3 grid
        assert_eq!(mesh.num_nodes(), 26);
        assert!(mesh.validate().is_ok());
    }
}
