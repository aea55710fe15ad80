//! Iterative solvers
//!
//! - [`jacobi`]: damped point relaxation with the operator diagonal
//! - [`gmres`] / [`gmres_preconditioned`]: restarted GMRES with Givens rotations

mod gmres;
mod jacobi;

pub use gmres::{GmresConfig, GmresSolution, gmres, gmres_preconditioned};
pub use jacobi::{JacobiConfig, JacobiSolution, jacobi, jacobi_sweeps};
