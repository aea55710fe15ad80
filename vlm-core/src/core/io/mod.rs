//! Restart files, case reports, status output and load tables

pub mod loads;
pub mod restart;
pub mod status;

pub use loads::*;
pub use restart::*;
pub use status::*;
