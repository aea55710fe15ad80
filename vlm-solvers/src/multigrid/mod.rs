//! Aggregation multigrid
//!
//! Each coarse unknown is the agglomerate of one or more fine unknowns.
//! Restriction averages fine values with caller-supplied weights (panel
//! areas for a vortex lattice) and prolongation injects the coarse value into
//! every child. Coarse operators are supplied by the caller, so geometric
//! coarsening (rebuilding the physical operator on merged panels) and
//! algebraic Galerkin coarsening both fit.

mod aggregation;
mod cycle;

pub use aggregation::Aggregation;
pub use cycle::{
    CoarseSolver, MultigridConfig, MultigridHierarchy, MultigridLevel, MultigridPreconditioner,
    MultigridResult, solve_multigrid, v_cycle,
};
