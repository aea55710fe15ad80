//! # Vortex Lattice: Potential-Flow Aerodynamics Library
//!
//! Vortex-lattice solver for lifting surfaces and closed bodies at subsonic
//! speeds.
//!
//! ## Features
//!
//! - Vortex rings per panel with trailing horseshoes and a relaxable wake
//! - Near/far split of the influence matrix through a cluster tree
//! - Agglomeration multigrid over Jacobi or GMRES
//! - Parallel execution with Rayon
//! - Surface, Kutta-Joukowski and Trefftz-plane loads with span loading
//! - Binary restart files and JSON case reports
//!

#![warn(clippy::all)]
#![allow(clippy::too_many_arguments)] // Scientific code often has many parameters

pub mod core;

pub use crate::core::{
    CaseConfig, CaseReport, SurfaceMesh, SymmetryPlane, Vec3, VlmError, VlmSolver, WakeState,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Git commit hash (set during build)
pub const GIT_HASH: &str = env!("GIT_HASH");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
