//! Cluster tree and interaction lists
//!
//! Loops are clustered by recursive bisection of their stretched control
//! points along the longest box axis. For a target point the tree is walked
//! from the root: a cluster is far when its centre is more than
//! `far_field_ratio` radii away, leaves that are not far are near, and
//! everything else is opened.

use crate::core::types::{Aabb, Vec3};

/// One node of the cluster tree
#[derive(Debug, Clone)]
pub struct Cluster {
    /// Loop indices in this cluster
    pub loop_indices: Vec<usize>,
    /// Area-weighted centre
    pub center: Vec3,
    /// Bounding sphere radius about `center`, including loop extents
    pub radius: f64,
    /// Sum of member loop areas
    pub area: f64,
    /// Child clusters, empty for leaves
    pub children: Vec<usize>,
}

impl Cluster {
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

/// Near/far split parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SplitCriterion {
    /// 0 or infinity evaluates everything exactly
    pub far_field_ratio: f64,
    /// Far clusters with `area / distance³` below this are skipped
    pub negligible_influence: f64,
}

impl SplitCriterion {
    fn is_exact(&self) -> bool {
        self.far_field_ratio <= 0.0 || !self.far_field_ratio.is_finite()
    }
}

/// Interactions of one target point
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InteractionList {
    /// Loops evaluated exactly
    pub near: Vec<usize>,
    /// Clusters replaced by an aggregate doublet
    pub far: Vec<usize>,
    /// Far clusters dropped as negligible
    pub skipped: usize,
}

/// Binary cluster tree; index 0 is the root and children always have
/// larger indices than their parent
#[derive(Debug, Clone)]
pub struct ClusterTree {
    pub clusters: Vec<Cluster>,
}

/// Geometry of one source loop as seen by the tree
#[derive(Debug, Clone, Copy)]
pub struct SourceExtent {
    pub center: Vec3,
    pub radius: f64,
    pub area: f64,
}

/// Build the cluster tree over `sources`
pub fn build_cluster_tree(sources: &[SourceExtent], leaf_size: usize) -> ClusterTree {
    let leaf_size = leaf_size.max(1);
    let mut clusters = Vec::new();
    if !sources.is_empty() {
        subdivide(&mut clusters, sources, (0..sources.len()).collect(), leaf_size);
    }
    ClusterTree { clusters }
}

fn make_cluster(sources: &[SourceExtent], indices: Vec<usize>) -> Cluster {
    let area: f64 = indices.iter().map(|&i| sources[i].area).sum();
    let center = if area > 0.0 {
        indices
            .iter()
            .map(|&i| sources[i].center * sources[i].area)
            .sum::<Vec3>()
            / area
    } else {
        indices.iter().map(|&i| sources[i].center).sum::<Vec3>() / indices.len() as f64
    };
    let radius = indices
        .iter()
        .map(|&i| sources[i].center.distance(&center) + sources[i].radius)
        .fold(0.0, f64::max);
    Cluster {
        loop_indices: indices,
        center,
        radius,
        area,
        children: Vec::new(),
    }
}

/// Recursively split, returning the new cluster's index
fn subdivide(
    clusters: &mut Vec<Cluster>,
    sources: &[SourceExtent],
    mut indices: Vec<usize>,
    leaf_size: usize,
) -> usize {
    let id = clusters.len();
    clusters.push(make_cluster(sources, indices.clone()));
    if indices.len() <= leaf_size {
        return id;
    }

    let bb = Aabb::from_points(indices.iter().map(|&i| &sources[i].center));
    let axis = bb.longest_axis();
    indices.sort_by(|&a, &b| {
        sources[a]
            .center
            .component(axis)
            .total_cmp(&sources[b].center.component(axis))
            .then(a.cmp(&b))
    });
    let upper = indices.split_off(indices.len() / 2);
    let left = subdivide(clusters, sources, indices, leaf_size);
    let right = subdivide(clusters, sources, upper, leaf_size);
    clusters[id].children = vec![left, right];
    id
}

impl ClusterTree {
    /// Classify all sources for a target point
    pub fn interactions(&self, target: Vec3, criterion: &SplitCriterion) -> InteractionList {
        let mut list = InteractionList::default();
        if self.clusters.is_empty() {
            return list;
        }
        if criterion.is_exact() {
            let mut near = self.clusters[0].loop_indices.clone();
            near.sort_unstable();
            list.near = near;
            return list;
        }

        let mut stack = vec![0];
        while let Some(c) = stack.pop() {
            let cluster = &self.clusters[c];
            let distance = target.distance(&cluster.center);
            if distance > criterion.far_field_ratio * cluster.radius {
                if cluster.area < criterion.negligible_influence * distance.powi(3) {
                    list.skipped += 1;
                } else {
                    list.far.push(c);
                }
            } else if cluster.is_leaf() {
                list.near.extend_from_slice(&cluster.loop_indices);
            } else {
                // Right pushed first so the left child is visited first
                stack.extend(cluster.children.iter().rev());
            }
        }
        list.near.sort_unstable();
        list
    }

    /// Aggregate per-cluster sums of a per-loop vector quantity
    pub fn cluster_sums(&self, values: &[Vec3]) -> Vec<Vec3> {
        let mut sums = vec![Vec3::zero(); self.clusters.len()];
        for c in (0..self.clusters.len()).rev() {
            let cluster = &self.clusters[c];
            sums[c] = if cluster.is_leaf() {
                cluster.loop_indices.iter().map(|&i| values[i]).sum()
            } else {
                cluster.children.iter().map(|&k| sums[k]).sum()
            };
        }
        sums
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn line_of_sources(n: usize) -> Vec<SourceExtent> {
        (0..n)
            .map(|i| SourceExtent {
                center: Vec3::new(0.0, i as f64, 0.0),
                radius: 0.5,
                area: 1.0,
            })
            .collect()
    }

    #[test]
    fn test_tree_partitions_sources() {
        let tree = build_cluster_tree(&line_of_sources(37), 4);
        let mut seen: Vec<usize> = tree
            .clusters
            .iter()
            .filter(|c| c.is_leaf())
            .flat_map(|c| c.loop_indices.clone())
            .collect();
        seen.sort();
        assert_eq!(seen, (0..37).collect::<Vec<_>>());
        assert!(tree.clusters.iter().filter(|c| c.is_leaf()).all(|c| c.loop_indices.len() <= 4));
        assert_relative_eq!(tree.clusters[0].area, 37.0);
    }

    #[test]
    fn test_every_source_appears_once_per_target() {
        let sources = line_of_sources(64);
        let tree = build_cluster_tree(&sources, 4);
        let criterion = SplitCriterion {
            far_field_ratio: 3.0,
            negligible_influence: 0.0,
        };
        let list = tree.interactions(Vec3::new(0.0, 0.0, 0.2), &criterion);
        let mut covered = list.near.clone();
        for &c in &list.far {
            covered.extend_from_slice(&tree.clusters[c].loop_indices);
        }
        covered.sort();
        assert_eq!(covered, (0..64).collect::<Vec<_>>());
        assert!(!list.far.is_empty());
        assert!(list.near.contains(&0));
    }

    #[test]
    fn test_exact_mode_has_no_far_clusters() {
        let tree = build_cluster_tree(&line_of_sources(20), 2);
        let criterion = SplitCriterion {
            far_field_ratio: 0.0,
            negligible_influence: 0.0,
        };
        let list = tree.interactions(Vec3::new(100.0, 0.0, 0.0), &criterion);
        assert_eq!(list.near.len(), 20);
        assert!(list.far.is_empty());
    }

    #[test]
    fn test_negligible_clusters_skipped() {
        let tree = build_cluster_tree(&line_of_sources(8), 2);
        let criterion = SplitCriterion {
            far_field_ratio: 2.0,
            negligible_influence: 1.0,
        };
        let list = tree.interactions(Vec3::new(1000.0, 0.0, 0.0), &criterion);
        assert!(list.near.is_empty());
        assert!(list.far.is_empty());
        assert_eq!(list.skipped, 1);
    }

    #[test]
    fn test_cluster_sums() {
        let tree = build_cluster_tree(&line_of_sources(10), 3);
        let values: Vec<Vec3> = (0..10).map(|i| Vec3::new(i as f64, 1.0, 0.0)).collect();
        let sums = tree.cluster_sums(&values);
        assert_relative_eq!(sums[0].x, 45.0);
        assert_relative_eq!(sums[0].y, 10.0);
    }
}
