//! Core traits for linear algebra operations
//!
//! This module defines the fundamental abstractions used throughout the solver library:
//! - [`Scalar`]: Trait for real floating point types
//! - [`LinearOperator`]: Trait for matrix-like objects that can perform matrix-vector products
//! - [`Preconditioner`]: Trait for preconditioning operations

use ndarray::Array1;
use num_traits::{Float, NumAssign};
use std::fmt::Debug;

/// Trait for real scalar types used by the solvers.
///
/// Conversion from `f64` is infallible so solver constants can be written
/// without unwrapping.
///
/// # Implementations
///
/// Provided for:
/// - `f64` (default for aerodynamic problems)
/// - `f32` (for memory-constrained applications)
pub trait Scalar: Float + NumAssign + Send + Sync + Debug + 'static {
    /// Convert from f64, rounding if needed
    fn from_real(r: f64) -> Self;

    /// Convert to f64
    fn to_real(self) -> f64;

    /// Check if this is approximately zero
    fn is_zero_approx(&self, tol: Self) -> bool {
        self.abs() < tol
    }
}

impl Scalar for f64 {
    #[inline]
    fn from_real(r: f64) -> Self {
        r
    }

    #[inline]
    fn to_real(self) -> f64 {
        self
    }
}

impl Scalar for f32 {
    #[inline]
    fn from_real(r: f64) -> Self {
        r as f32
    }

    #[inline]
    fn to_real(self) -> f64 {
        self as f64
    }
}

/// Trait for linear operators (matrices or matrix-free operators)
///
/// This abstraction allows solvers to work with both explicit matrices
/// and implicit operators such as the vortex-lattice influence operator,
/// which combines a sparse near field with an approximated far field.
pub trait LinearOperator<T: Scalar>: Send + Sync {
    /// Number of rows in the operator
    fn num_rows(&self) -> usize;

    /// Number of columns in the operator
    fn num_cols(&self) -> usize;

    /// Apply the operator: y = A * x
    fn apply(&self, x: &Array1<T>) -> Array1<T>;

    /// Check if the operator is square
    fn is_square(&self) -> bool {
        self.num_rows() == self.num_cols()
    }

    /// Residual r = b - A * x
    fn residual(&self, x: &Array1<T>, b: &Array1<T>) -> Array1<T> {
        let ax = self.apply(x);
        b - &ax
    }
}

/// Trait for preconditioners
///
/// A preconditioner approximates M⁻¹ where M ≈ A.
pub trait Preconditioner<T: Scalar>: Send + Sync {
    /// Apply the preconditioner: y = M⁻¹ * r
    fn apply(&self, r: &Array1<T>) -> Array1<T>;
}

impl<T: Scalar, A: LinearOperator<T>> LinearOperator<T> for &A {
    fn num_rows(&self) -> usize {
        (**self).num_rows()
    }

    fn num_cols(&self) -> usize {
        (**self).num_cols()
    }

    fn apply(&self, x: &Array1<T>) -> Array1<T> {
        (**self).apply(x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_scalar_conversions() {
        assert_relative_eq!(f64::from_real(0.25), 0.25);
        assert_relative_eq!(f32::from_real(0.25), 0.25f32);
        assert_relative_eq!(1.5f32.to_real(), 1.5);
    }

    #[test]
    fn test_is_zero_approx() {
        assert!(1e-12f64.is_zero_approx(1e-10));
        assert!(!(-1e-3f64).is_zero_approx(1e-10));
    }
}
