//! Vortex-lattice solver
//!
//! ## Architecture
//!
//! - `types`: vectors, bounding boxes and symmetry planes
//! - `constants`: numerical and physical constants
//! - `config`: case configuration (JSON/TOML)
//! - `mesh`: surface meshes, loaders and generators
//! - `model`: vortex loops, edges, horseshoes and trailing lines
//! - `biot_savart`: segment and line kernels
//! - `assembly`: kernel geometry, cluster tree, influence operator, velocity field
//! - `multigrid`: agglomerated levels and the linear solve
//! - `onset`: free stream, rotation and rotor onset velocities
//! - `wake`: wake layout, relaxation and the outer state machine
//! - `forces`: surface loads, Trefftz plane and coefficients
//! - `span_load`: span stations and the section lift limit
//! - `survey`: velocities at arbitrary points
//! - `io`: restart files, case reports and status history
//! - `solver`: high-level case driver

pub mod assembly;
pub mod biot_savart;
pub mod config;
pub mod constants;
pub mod error;
pub mod forces;
pub mod io;
pub mod mesh;
pub mod model;
pub mod multigrid;
pub mod onset;
pub mod solver;
pub mod span_load;
pub mod survey;
pub mod types;
pub mod wake;

// Re-exports for convenience
pub use config::{CaseConfig, ForceMethod, ForceType, SolverMode, load_config};
pub use error::{Result, VlmError};
pub use forces::{ForceCoefficients, ForceReport};
pub use io::{CaseReport, RestartData};
pub use mesh::{MeshError, SurfaceMesh};
pub use model::VortexLatticeModel;
pub use solver::{SolverState, VlmSolver};
pub use span_load::{ClmaxResult, SpanLoad, SpanStation};
pub use types::*;
pub use wake::WakeState;
