//! Iterative linear solvers for vortex-lattice and other potential-flow systems
//!
//! This crate provides the linear-algebra layer the aerodynamic solver sits on:
//! operator traits, sparse and dense operators, relaxation and Krylov solvers,
//! and an aggregation multigrid hierarchy.
//!
//! # Features
//!
//! - **Iterative Solvers**: damped Jacobi, restarted left-preconditioned GMRES
//! - **Preconditioners**: diagonal, identity, multigrid V-cycle
//! - **Multigrid**: aggregation transfer (area-weighted restriction, injection)
//! - **Sparse Matrices**: CSR format with row-parallel matrix-vector products
//! - **Deterministic reductions**: dot products and norms are summed in fixed
//!   chunks so results do not depend on the number of worker threads
//! - **Generic Scalar Types**: works with f64 and f32
//!
//! # Example
//!
//! ```ignore
//! use vortex_lattice_solvers::{gmres_preconditioned, CsrMatrix, DiagonalPreconditioner, GmresConfig};
//!
//! let matrix = CsrMatrix::from_triplets(n, n, triplets);
//! let precond = DiagonalPreconditioner::from_diagonal(&matrix.diagonal());
//! let solution = gmres_preconditioned(&matrix, &precond, &rhs, None, &GmresConfig::default())?;
//! println!("log10 reduction: {}", solution.log_reduction);
//! ```

pub mod blas_helpers;
pub mod dense;
pub mod error;
pub mod iterative;
pub mod multigrid;
pub mod parallel;
pub mod preconditioners;
pub mod sparse;
pub mod traits;

pub use dense::DenseOperator;
pub use error::SolverError;
pub use sparse::CsrMatrix;
pub use traits::{LinearOperator, Preconditioner, Scalar};

pub use iterative::{
    GmresConfig, GmresSolution, JacobiConfig, JacobiSolution, gmres, gmres_preconditioned, jacobi,
    jacobi_sweeps,
};

pub use multigrid::{
    Aggregation, CoarseSolver, MultigridConfig, MultigridHierarchy, MultigridLevel,
    MultigridPreconditioner, MultigridResult, solve_multigrid, v_cycle,
};

pub use preconditioners::{DiagonalPreconditioner, IdentityPreconditioner};
