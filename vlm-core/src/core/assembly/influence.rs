//! Influence operator
//!
//! Maps loop circulations to the physical normal velocity at every control
//! point. The operator is never formed densely for the bound vortices:
//!
//! - near loops: exact ring coefficients in a CSR matrix, direct and mirror
//!   image summed per column
//! - far clusters: one precomputed gradient per (row, cluster) dotted with
//!   the cluster's doublet moment Σ Γ_j S_j, aggregated every product
//! - wake: dense horseshoe coefficients, rebuilt whenever the wake moves
//! - wake-less Kelvin groups: rank-one penalty w_g Σ_{j∈g} Γ_j on every
//!   member row, fixing the otherwise free constant circulation mode
//!
//! Degenerate loops get identity rows so their circulation stays zero.

use ndarray::{Array1, Array2};
use vortex_lattice_solvers::LinearOperator;
use vortex_lattice_solvers::blas_helpers::ordered_sum;
use vortex_lattice_solvers::parallel::parallel_map_indexed;
use vortex_lattice_solvers::sparse::CsrMatrix;

use super::geometry::{KernelGeometry, LevelLoop};
use super::interaction::{ClusterTree, SourceExtent, build_cluster_tree};
use super::InfluenceSettings;
use crate::core::biot_savart::doublet_velocity;
use crate::core::types::Vec3;

/// Counts and exclusions collected during assembly
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AssemblyDiagnostics {
    pub near_entries: usize,
    pub far_entries: usize,
    pub skipped_clusters: usize,
    /// `(row, loop)` ring coefficients excluded as non-finite
    pub excluded: Vec<(usize, usize)>,
    /// `(row, horseshoe)` wake coefficients excluded as non-finite
    pub excluded_wake: Vec<(usize, usize)>,
}

/// Target data of one row
#[derive(Debug, Clone, Copy)]
struct RowTarget {
    /// Stretched control point
    point: Vec3,
    normal: Vec3,
    pinned: bool,
}

struct RowAssembly {
    near: Vec<(usize, f64)>,
    far: Vec<(usize, Vec3)>,
    skipped: usize,
    excluded: Vec<usize>,
}

/// Induced normal-velocity operator of one grid level
#[derive(Debug, Clone)]
pub struct InfluenceOperator {
    size: usize,
    targets: Vec<RowTarget>,
    near: CsrMatrix<f64>,
    far: Vec<Vec<(usize, Vec3)>>,
    tree: ClusterTree,
    /// Stretched vector area per source loop
    source_areas: Vec<Vec3>,
    /// Global horseshoe index and owning column of each wake column
    wake_columns: Vec<(usize, usize)>,
    wake: Array2<f64>,
    penalties: Vec<(Vec<usize>, f64)>,
    near_diagonal: Array1<f64>,
    diagonal: Array1<f64>,
    diagnostics: AssemblyDiagnostics,
}

impl InfluenceOperator {
    /// Assemble the operator for `loops`
    ///
    /// `wakeless_groups[g]` is true for Kelvin groups that shed no wake.
    pub fn assemble(
        geometry: &KernelGeometry,
        loops: &[LevelLoop],
        wakeless_groups: &[bool],
        settings: &InfluenceSettings,
    ) -> Self {
        let size = loops.len();
        let mirror = geometry.symmetry;
        let targets: Vec<RowTarget> = loops
            .iter()
            .map(|l| RowTarget {
                point: geometry.stretch(l.control_point),
                normal: geometry.effective_normal(l.normal),
                pinned: l.degenerate,
            })
            .collect();

        let source_areas: Vec<Vec3> = loops
            .iter()
            .map(|l| {
                if l.degenerate {
                    Vec3::zero()
                } else {
                    geometry.stretched_vector_area(l)
                }
            })
            .collect();
        let extents: Vec<SourceExtent> = loops
            .iter()
            .zip(&source_areas)
            .zip(&targets)
            .map(|((l, s), t)| SourceExtent {
                center: t.point,
                radius: geometry.loop_radius(l),
                area: s.length(),
            })
            .collect();
        let tree = build_cluster_tree(&extents, settings.leaf_size);

        let rows: Vec<RowAssembly> = parallel_map_indexed(size, |i| {
            let target = targets[i];
            if target.pinned {
                return RowAssembly {
                    near: vec![(i, 1.0)],
                    far: Vec::new(),
                    skipped: 0,
                    excluded: Vec::new(),
                };
            }
            let mut near = Vec::new();
            let mut far = Vec::new();
            let mut skipped = 0;
            let mut excluded = Vec::new();

            let mut images = vec![(target.point, target.normal)];
            if let Some(plane) = mirror {
                images.push((plane.reflect(target.point), plane.reflect(target.normal)));
            }
            for (q, n) in images {
                let list = tree.interactions(q, &settings.criterion);
                skipped += list.skipped;
                for j in list.near {
                    let c = geometry.ring_velocity(q, &loops[j]).dot(&n);
                    if c.is_finite() {
                        near.push((j, c));
                    } else {
                        excluded.push(j);
                    }
                }
                for c in list.far {
                    far.push((c, doublet_velocity(q, tree.clusters[c].center, n)));
                }
            }
            RowAssembly {
                near,
                far,
                skipped,
                excluded,
            }
        });

        let mut diagnostics = AssemblyDiagnostics::default();
        let mut near_rows = Vec::with_capacity(size);
        let mut far_rows = Vec::with_capacity(size);
        for (i, row) in rows.into_iter().enumerate() {
            diagnostics.far_entries += row.far.len();
            diagnostics.skipped_clusters += row.skipped;
            diagnostics
                .excluded
                .extend(row.excluded.into_iter().map(|j| (i, j)));
            near_rows.push(row.near);
            far_rows.push(row.far);
        }
        let near = CsrMatrix::from_row_entries(size, near_rows);
        diagnostics.near_entries = near.nnz();
        if !diagnostics.excluded.is_empty() {
            log::warn!(
                "Excluded {} non-finite ring coefficients (first: row {}, loop {})",
                diagnostics.excluded.len(),
                diagnostics.excluded[0].0,
                diagnostics.excluded[0].1
            );
        }

        let near_diagonal = near.diagonal();
        let penalties = wakeless_penalties(loops, wakeless_groups, &near_diagonal);

        let wake_columns: Vec<(usize, usize)> = loops
            .iter()
            .enumerate()
            .flat_map(|(j, l)| l.horseshoes.iter().map(move |&h| (h, j)))
            .collect();

        let mut operator = Self {
            size,
            targets,
            near,
            far: far_rows,
            tree,
            source_areas,
            wake_columns,
            wake: Array2::zeros((size, 0)),
            penalties,
            near_diagonal: near_diagonal.clone(),
            diagonal: near_diagonal,
            diagnostics,
        };
        operator.refresh_wake(geometry);

        log::debug!(
            "Assembled {}x{} influence operator: {} near, {} far, {} wake columns",
            size,
            size,
            operator.diagnostics.near_entries,
            operator.diagnostics.far_entries,
            operator.wake_columns.len()
        );
        operator
    }

    /// Rebuild the dense wake coefficients after the wake geometry changed
    pub fn refresh_wake(&mut self, geometry: &KernelGeometry) {
        let n_wake = self.wake_columns.len();
        let num_lines = geometry.lines.len();
        let targets = &self.targets;
        let columns = &self.wake_columns;

        let rows: Vec<(Vec<f64>, Vec<usize>)> = parallel_map_indexed(self.size, |i| {
            let target = targets[i];
            let mut coefficients = vec![0.0; n_wake];
            let mut excluded = Vec::new();
            if target.pinned || n_wake == 0 {
                return (coefficients, excluded);
            }
            let mut images = vec![(target.point, target.normal)];
            if let Some(plane) = geometry.symmetry {
                images.push((plane.reflect(target.point), plane.reflect(target.normal)));
            }
            for (q, n) in images {
                let line_velocities: Vec<Vec3> =
                    (0..num_lines).map(|l| geometry.line_velocity(q, l)).collect();
                for (k, &(h, _)) in columns.iter().enumerate() {
                    let c = geometry.horseshoe_velocity(q, h, &line_velocities).dot(&n);
                    if c.is_finite() {
                        coefficients[k] += c;
                    } else {
                        excluded.push(k);
                    }
                }
            }
            for &k in &excluded {
                coefficients[k] = 0.0;
            }
            (coefficients, excluded)
        });

        let mut flat = Vec::with_capacity(self.size * n_wake);
        self.diagnostics.excluded_wake.clear();
        for (i, (row, excluded)) in rows.into_iter().enumerate() {
            flat.extend(row);
            self.diagnostics
                .excluded_wake
                .extend(excluded.into_iter().map(|k| (i, columns[k].0)));
        }
        if !self.diagnostics.excluded_wake.is_empty() {
            log::warn!(
                "Excluded {} non-finite wake coefficients",
                self.diagnostics.excluded_wake.len()
            );
        }
        self.wake = Array2::from_shape_vec((self.size, n_wake), flat)
            .unwrap_or_else(|_| Array2::zeros((self.size, n_wake)));

        let mut diagonal = self.near_diagonal.clone();
        for (k, &(_, owner)) in self.wake_columns.iter().enumerate() {
            if !self.targets[owner].pinned {
                diagonal[owner] += self.wake[[owner, k]];
            }
        }
        for (members, weight) in &self.penalties {
            for &i in members {
                diagonal[i] += *weight;
            }
        }
        self.diagonal = diagonal;
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Self-influence coefficients including wake and penalty terms
    pub fn diagonal(&self) -> &Array1<f64> {
        &self.diagonal
    }

    pub fn diagnostics(&self) -> &AssemblyDiagnostics {
        &self.diagnostics
    }

    pub fn cluster_tree(&self) -> &ClusterTree {
        &self.tree
    }

    /// Stretched vector areas of the source loops
    pub fn source_areas(&self) -> &[Vec3] {
        &self.source_areas
    }

    /// Remove the mean circulation of every wake-less Kelvin group
    pub fn enforce_kelvin(&self, x: &mut Array1<f64>) {
        for (members, _) in &self.penalties {
            if members.is_empty() {
                continue;
            }
            let values: Vec<f64> = members.iter().map(|&i| x[i]).collect();
            let mean = ordered_sum(&values) / members.len() as f64;
            for &i in members {
                x[i] -= mean;
            }
        }
    }

    /// Net circulation per wake-less Kelvin group
    pub fn kelvin_sums(&self, x: &Array1<f64>) -> Vec<f64> {
        self.penalties
            .iter()
            .map(|(members, _)| {
                let values: Vec<f64> = members.iter().map(|&i| x[i]).collect();
                ordered_sum(&values)
            })
            .collect()
    }
}

fn wakeless_penalties(
    loops: &[LevelLoop],
    wakeless_groups: &[bool],
    near_diagonal: &Array1<f64>,
) -> Vec<(Vec<usize>, f64)> {
    let mut members: Vec<Vec<usize>> = vec![Vec::new(); wakeless_groups.len()];
    for (i, l) in loops.iter().enumerate() {
        if !l.degenerate && wakeless_groups.get(l.kelvin_group).copied().unwrap_or(false) {
            members[l.kelvin_group].push(i);
        }
    }
    members
        .into_iter()
        .filter(|m| !m.is_empty())
        .map(|m| {
            let diag: Vec<f64> = m.iter().map(|&i| near_diagonal[i].abs()).collect();
            let mean = ordered_sum(&diag) / m.len() as f64;
            let weight = mean / m.len() as f64;
            (m, weight)
        })
        .collect()
}

impl LinearOperator<f64> for InfluenceOperator {
    fn num_rows(&self) -> usize {
        self.size
    }

    fn num_cols(&self) -> usize {
        self.size
    }

    fn apply(&self, x: &Array1<f64>) -> Array1<f64> {
        let moments: Vec<Vec3> = self
            .source_areas
            .iter()
            .zip(x.iter())
            .map(|(s, &g)| *s * g)
            .collect();
        let cluster_moments = self.tree.cluster_sums(&moments);
        let wake_strengths: Vec<f64> = self.wake_columns.iter().map(|&(_, j)| x[j]).collect();

        let mut y = Array1::from_vec(parallel_map_indexed(self.size, |i| {
            let mut sum = 0.0;
            for (j, a) in self.near.row_entries(i) {
                sum += a * x[j];
            }
            for &(c, g) in &self.far[i] {
                sum += g.dot(&cluster_moments[c]);
            }
            if !self.targets[i].pinned {
                for (k, &s) in wake_strengths.iter().enumerate() {
                    sum += self.wake[[i, k]] * s;
                }
            }
            sum
        }));

        for (members, weight) in &self.penalties {
            let values: Vec<f64> = members.iter().map(|&i| x[i]).collect();
            let total = weight * ordered_sum(&values);
            for &i in members {
                y[i] += total;
            }
        }
        y
    }
}
