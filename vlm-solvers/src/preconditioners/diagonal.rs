//! Diagonal (Jacobi) preconditioner
//!
//! Scales by the inverse of the operator diagonal. For a vortex lattice the
//! diagonal is the self-influence of each ring at its own control point.

use crate::parallel::parallel_map_indexed;
use crate::traits::{Preconditioner, Scalar};
use ndarray::Array1;

/// Vectors shorter than this are scaled sequentially
const PARALLEL_THRESHOLD: usize = 1000;

/// Diagonal (Jacobi) preconditioner
///
/// M = diag(A), so M^(-1) scales each component by 1/A_ii
#[derive(Debug, Clone)]
pub struct DiagonalPreconditioner<T: Scalar> {
    /// Inverse diagonal elements
    inv_diag: Array1<T>,
}

impl<T: Scalar> DiagonalPreconditioner<T> {
    /// Create from a diagonal vector; vanishing entries map to 1
    pub fn from_diagonal(diag: &Array1<T>) -> Self {
        let tiny = T::from_real(1e-30);
        let inv_diag = diag.mapv(|d| {
            if d.abs() > tiny && d.is_finite() {
                T::one() / d
            } else {
                T::one()
            }
        });
        Self { inv_diag }
    }

    /// Inverse diagonal
    pub fn inverse_diagonal(&self) -> &Array1<T> {
        &self.inv_diag
    }

    pub fn len(&self) -> usize {
        self.inv_diag.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inv_diag.is_empty()
    }
}

impl<T: Scalar> Preconditioner<T> for DiagonalPreconditioner<T> {
    fn apply(&self, r: &Array1<T>) -> Array1<T> {
        assert_eq!(r.len(), self.inv_diag.len(), "Preconditioner size mismatch");
        if r.len() >= PARALLEL_THRESHOLD {
            Array1::from_vec(parallel_map_indexed(r.len(), |i| r[i] * self.inv_diag[i]))
        } else {
            r.iter()
                .zip(self.inv_diag.iter())
                .map(|(&ri, &di)| ri * di)
                .collect()
        }
    }
}
