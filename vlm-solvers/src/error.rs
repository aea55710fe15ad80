//! Error types for the solver layer
//!
//! Only structural problems are errors here. A solver that runs out of
//! iterations returns its best iterate with `converged == false`.

use thiserror::Error;

/// Errors raised before an iteration starts
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SolverError {
    #[error("dimension mismatch in {context}: expected {expected}, found {found}")]
    DimensionMismatch {
        context: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("operator is not square: {rows} x {cols}")]
    NotSquare { rows: usize, cols: usize },

    #[error("empty system")]
    EmptySystem,

    #[error("invalid aggregation: {0}")]
    InvalidAggregation(String),

    #[error("multigrid hierarchy has no levels")]
    EmptyHierarchy,
}

/// Check that `found == expected`
pub(crate) fn check_len(
    context: &'static str,
    expected: usize,
    found: usize,
) -> Result<(), SolverError> {
    if expected == found {
        Ok(())
    } else {
        Err(SolverError::DimensionMismatch {
            context,
            expected,
            found,
        })
    }
}
