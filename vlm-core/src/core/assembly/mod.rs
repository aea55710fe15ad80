//! Influence engine
//!
//! - [`geometry`]: the vortex system in Prandtl-Glauert stretched space
//! - [`interaction`]: cluster tree and near/far interaction lists
//! - [`influence`]: the circulation to normal-velocity operator
//! - [`velocity`]: induced velocity at arbitrary points

pub mod geometry;
pub mod influence;
pub mod interaction;
pub mod velocity;

pub use geometry::{KernelGeometry, LevelLoop};
pub use influence::{AssemblyDiagnostics, InfluenceOperator};
pub use interaction::{ClusterTree, InteractionList, SplitCriterion, build_cluster_tree};
pub use velocity::VelocityField;

use crate::core::config::InfluenceConfig;

/// Near/far split and tree parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InfluenceSettings {
    pub criterion: SplitCriterion,
    pub leaf_size: usize,
}

impl InfluenceSettings {
    pub fn from_config(config: &InfluenceConfig) -> Self {
        Self {
            criterion: SplitCriterion {
                far_field_ratio: config.far_field_ratio,
                negligible_influence: config.negligible_influence,
            },
            leaf_size: config.leaf_size,
        }
    }
}

impl Default for InfluenceSettings {
    fn default() -> Self {
        Self::from_config(&InfluenceConfig::default())
    }
}
