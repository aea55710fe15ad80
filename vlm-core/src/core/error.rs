//! Top-level error type
//!
//! Only configuration problems are errors. Numerical non-convergence is
//! reported through status values on the solve results.

use thiserror::Error;
use vortex_lattice_solvers::SolverError;

use crate::core::config::ConfigError;
use crate::core::io::restart::RestartError;
use crate::core::mesh::MeshError;

/// Errors raised while setting up or running a case
#[derive(Error, Debug)]
pub enum VlmError {
    #[error("Invalid geometry: {0}")]
    Mesh(#[from] MeshError),

    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Restart file: {0}")]
    Restart(#[from] RestartError),

    #[error("Linear solver: {0}")]
    Solver(#[from] SolverError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Report serialization: {0}")]
    Report(#[from] serde_json::Error),
}

/// Result alias for solver setup and I/O
pub type Result<T> = std::result::Result<T, VlmError>;
