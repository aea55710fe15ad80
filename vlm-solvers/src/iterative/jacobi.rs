//! Damped Jacobi relaxation
//!
//! x ← x + ω (b − A x) / diag(A)
//!
//! Divergence is not detected: the residual history is returned and the
//! caller decides what to do with a growing residual.

use crate::blas_helpers::{axpy, vector_norm};
use crate::error::{SolverError, check_len};
use crate::preconditioners::DiagonalPreconditioner;
use crate::traits::{LinearOperator, Preconditioner, Scalar};
use ndarray::Array1;

/// Jacobi solver configuration
#[derive(Debug, Clone)]
pub struct JacobiConfig<T> {
    /// Maximum number of sweeps
    pub max_iterations: usize,
    /// Absolute L2 residual tolerance
    pub tolerance: T,
    /// Relaxation factor ω
    pub relaxation: T,
    /// Print progress every N iterations (0 = no output)
    pub print_interval: usize,
}

impl<T: Scalar> Default for JacobiConfig<T> {
    fn default() -> Self {
        Self {
            max_iterations: 500,
            tolerance: T::from_real(1e-8),
            relaxation: T::from_real(0.8),
            print_interval: 0,
        }
    }
}

/// Jacobi solver result
#[derive(Debug, Clone)]
pub struct JacobiSolution<T> {
    /// Final iterate
    pub x: Array1<T>,
    /// Sweeps performed
    pub iterations: usize,
    /// Final absolute L2 residual
    pub residual: T,
    /// Residual before each sweep, then the final residual
    pub residual_history: Vec<T>,
    /// Whether the tolerance was reached
    pub converged: bool,
}

/// Apply a fixed number of damped Jacobi sweeps in place
pub fn jacobi_sweeps<T, A>(
    operator: &A,
    precond: &DiagonalPreconditioner<T>,
    b: &Array1<T>,
    x: &mut Array1<T>,
    sweeps: usize,
    relaxation: T,
) where
    T: Scalar,
    A: LinearOperator<T>,
{
    for _ in 0..sweeps {
        let r = operator.residual(x, b);
        let dx = precond.apply(&r);
        axpy(relaxation, &dx, x);
    }
}

/// Solve Ax = b by damped Jacobi iteration
pub fn jacobi<T, A>(
    operator: &A,
    diagonal: &Array1<T>,
    b: &Array1<T>,
    x0: Option<&Array1<T>>,
    config: &JacobiConfig<T>,
) -> Result<JacobiSolution<T>, SolverError>
where
    T: Scalar,
    A: LinearOperator<T>,
{
    let n = b.len();
    if !operator.is_square() {
        return Err(SolverError::NotSquare {
            rows: operator.num_rows(),
            cols: operator.num_cols(),
        });
    }
    check_len("jacobi rhs", operator.num_rows(), n)?;
    check_len("jacobi diagonal", n, diagonal.len())?;

    let mut x = match x0 {
        Some(x0) => {
            check_len("jacobi initial guess", n, x0.len())?;
            x0.clone()
        }
        None => Array1::from_elem(n, T::zero()),
    };
    let precond = DiagonalPreconditioner::from_diagonal(diagonal);

    let mut history = Vec::with_capacity(config.max_iterations + 1);
    let mut r = operator.residual(&x, b);
    let mut norm = vector_norm(&r);
    history.push(norm);

    let mut iterations = 0;
    while iterations < config.max_iterations && norm >= config.tolerance {
        let dx = precond.apply(&r);
        axpy(config.relaxation, &dx, &mut x);
        iterations += 1;

        r = operator.residual(&x, b);
        norm = vector_norm(&r);
        history.push(norm);

        if config.print_interval > 0 && iterations % config.print_interval == 0 {
            log::info!(
                "Jacobi iteration {}: residual = {:.6e}",
                iterations,
                norm.to_real()
            );
        }
    }

    Ok(JacobiSolution {
        x,
        iterations,
        residual: norm,
        residual_history: history,
        converged: norm < config.tolerance,
    })
}
