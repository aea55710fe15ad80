//! Preconditioners for iterative solvers

mod diagonal;

pub use diagonal::DiagonalPreconditioner;

use crate::traits::{Preconditioner, Scalar};
use ndarray::Array1;

/// Identity preconditioner (no preconditioning)
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityPreconditioner;

impl<T: Scalar> Preconditioner<T> for IdentityPreconditioner {
    fn apply(&self, r: &Array1<T>) -> Array1<T> {
        r.clone()
    }
}
