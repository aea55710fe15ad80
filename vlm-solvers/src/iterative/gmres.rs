//! GMRES (Generalized Minimal Residual) solver
//!
//! Restarted GMRES (Saad & Schultz, 1986) with left preconditioning and an
//! incremental Givens-rotation least-squares solve of the Hessenberg system.
//!
//! Two stopping criteria are checked after every inner iteration: an
//! absolute tolerance on the preconditioned residual and a reduction factor
//! relative to the initial residual. Whichever triggers first ends the
//! solve. Running out of iterations is not an error: the iterate with the
//! smallest observed residual is returned with `converged == false`.

use crate::blas_helpers::{axpy, inner_product, scale_inplace, vector_norm};
use crate::error::{SolverError, check_len};
use crate::preconditioners::IdentityPreconditioner;
use crate::traits::{LinearOperator, Preconditioner, Scalar};
use ndarray::{Array1, Array2};

/// GMRES solver configuration
#[derive(Debug, Clone)]
pub struct GmresConfig<T> {
    /// Maximum number of outer iterations (restart cycles)
    pub max_iterations: usize,
    /// Restart parameter (number of inner iterations before restart)
    pub restart: usize,
    /// Absolute tolerance on the preconditioned residual
    pub tolerance: T,
    /// Stop once the residual has dropped by this factor
    pub reduction: T,
    /// Print progress every N iterations (0 = no output)
    pub print_interval: usize,
}

impl<T: Scalar> Default for GmresConfig<T> {
    fn default() -> Self {
        Self {
            max_iterations: 20,
            restart: 30,
            tolerance: T::from_real(1e-10),
            reduction: T::from_real(1e-6),
            print_interval: 0,
        }
    }
}

/// GMRES solver result
#[derive(Debug, Clone)]
pub struct GmresSolution<T> {
    /// Solution vector (best iterate seen)
    pub x: Array1<T>,
    /// Total number of inner iterations (operator applications)
    pub iterations: usize,
    /// Number of restart cycles beyond the first
    pub restarts: usize,
    /// Initial preconditioned residual norm
    pub initial_residual: T,
    /// Final preconditioned residual norm
    pub residual: T,
    /// log10(final / initial), 0 when the initial residual vanishes
    pub log_reduction: f64,
    /// Residual estimates per restart cycle: the cycle's starting residual
    /// followed by one value per inner iteration
    pub residual_history: Vec<Vec<T>>,
    /// Whether a stopping criterion was met
    pub converged: bool,
}

/// Solve Ax = b using restarted GMRES without preconditioning
pub fn gmres<T, A>(
    operator: &A,
    b: &Array1<T>,
    x0: Option<&Array1<T>>,
    config: &GmresConfig<T>,
) -> Result<GmresSolution<T>, SolverError>
where
    T: Scalar,
    A: LinearOperator<T>,
{
    gmres_preconditioned(operator, &IdentityPreconditioner, b, x0, config)
}

/// GMRES solver with preconditioner
///
/// Solves Ax = b using left preconditioning: M⁻¹Ax = M⁻¹b
pub fn gmres_preconditioned<T, A, P>(
    operator: &A,
    precond: &P,
    b: &Array1<T>,
    x0: Option<&Array1<T>>,
    config: &GmresConfig<T>,
) -> Result<GmresSolution<T>, SolverError>
where
    T: Scalar,
    A: LinearOperator<T>,
    P: Preconditioner<T>,
{
    let n = b.len();
    if n == 0 {
        return Err(SolverError::EmptySystem);
    }
    if !operator.is_square() {
        return Err(SolverError::NotSquare {
            rows: operator.num_rows(),
            cols: operator.num_cols(),
        });
    }
    check_len("gmres rhs", operator.num_rows(), n)?;

    let m = config.restart.max(1);
    let mut x = match x0 {
        Some(x0) => {
            check_len("gmres initial guess", n, x0.len())?;
            x0.clone()
        }
        None => Array1::from_elem(n, T::zero()),
    };

    let mut r = precond.apply(&operator.residual(&x, b));
    let mut beta = vector_norm(&r);
    let initial = beta;
    let threshold = config.tolerance.max(config.reduction * initial);
    let breakdown_tol = T::from_real(1e-14) * initial.max(T::min_positive_value());

    let mut best_x = x.clone();
    let mut best_residual = beta;
    let mut history = Vec::new();
    let mut total_iterations = 0;
    let mut cycles: usize = 0;
    let mut converged = beta <= threshold;

    for _outer in 0..config.max_iterations {
        if converged {
            break;
        }
        cycles += 1;

        let mut cycle_history = Vec::with_capacity(m + 1);
        cycle_history.push(beta);

        // Krylov basis
        let mut v: Vec<Array1<T>> = Vec::with_capacity(m + 1);
        scale_inplace(&mut r, T::one() / beta);
        v.push(r);

        // Upper Hessenberg matrix H
        let mut h: Array2<T> = Array2::from_elem((m + 1, m), T::zero());

        // Givens rotation coefficients
        let mut cs: Vec<T> = Vec::with_capacity(m);
        let mut sn: Vec<T> = Vec::with_capacity(m);

        // Right-hand side of least squares problem
        let mut g: Array1<T> = Array1::from_elem(m + 1, T::zero());
        g[0] = beta;

        let mut k = 0;
        for j in 0..m {
            total_iterations += 1;

            let mut w = precond.apply(&operator.apply(&v[j]));

            // Modified Gram-Schmidt orthogonalization
            for i in 0..=j {
                let h_ij = inner_product(&v[i], &w);
                h[[i, j]] = h_ij;
                axpy(-h_ij, &v[i], &mut w);
            }
            let w_norm = vector_norm(&w);
            h[[j + 1, j]] = w_norm;

            // Apply previous Givens rotations to new column of H
            for i in 0..j {
                let temp = cs[i] * h[[i, j]] + sn[i] * h[[i + 1, j]];
                h[[i + 1, j]] = -sn[i] * h[[i, j]] + cs[i] * h[[i + 1, j]];
                h[[i, j]] = temp;
            }

            let (c, s) = givens_rotation(h[[j, j]], h[[j + 1, j]]);
            cs.push(c);
            sn.push(s);

            h[[j, j]] = c * h[[j, j]] + s * h[[j + 1, j]];
            h[[j + 1, j]] = T::zero();
            g[j + 1] = -s * g[j];
            g[j] *= c;

            k = j + 1;
            let estimate = g[j + 1].abs();
            cycle_history.push(estimate);

            if config.print_interval > 0 && total_iterations % config.print_interval == 0 {
                log::info!(
                    "GMRES iteration {} (cycle {}): residual = {:.6e}",
                    total_iterations,
                    cycles,
                    estimate.to_real()
                );
            }

            if estimate <= threshold {
                converged = true;
                break;
            }
            if w_norm <= breakdown_tol {
                break;
            }

            scale_inplace(&mut w, T::one() / w_norm);
            v.push(w);
        }

        let y = solve_upper_triangular(&h, &g, k);
        for (i, &yi) in y.iter().enumerate() {
            axpy(yi, &v[i], &mut x);
        }
        history.push(cycle_history);

        r = precond.apply(&operator.residual(&x, b));
        beta = vector_norm(&r);
        if beta < best_residual {
            best_residual = beta;
            best_x.assign(&x);
        }
        converged = converged || beta <= threshold;
    }

    if !converged {
        log::debug!(
            "GMRES stopped after {} iterations with residual {:.6e}",
            total_iterations,
            best_residual.to_real()
        );
    }

    let log_reduction = if initial > T::zero() && best_residual > T::zero() {
        (best_residual / initial).to_real().log10()
    } else {
        0.0
    };

    Ok(GmresSolution {
        x: best_x,
        iterations: total_iterations,
        restarts: cycles.saturating_sub(1),
        initial_residual: initial,
        residual: best_residual,
        log_reduction,
        residual_history: history,
        converged,
    })
}

/// Compute a Givens rotation (c, s) that zeroes b in [a; b]
#[inline]
fn givens_rotation<T: Scalar>(a: T, b: T) -> (T, T) {
    if b == T::zero() {
        return (T::one(), T::zero());
    }
    let r = a.hypot(b);
    (a / r, b / r)
}

/// Back substitution on the leading k×k block of H
fn solve_upper_triangular<T: Scalar>(h: &Array2<T>, g: &Array1<T>, k: usize) -> Vec<T> {
    let mut y = vec![T::zero(); k];
    for i in (0..k).rev() {
        let mut sum = g[i];
        for j in (i + 1)..k {
            sum -= h[[i, j]] * y[j];
        }
        let diag = h[[i, i]];
        y[i] = if diag.abs() > T::min_positive_value() {
            sum / diag
        } else {
            T::zero()
        };
    }
    y
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dense::DenseOperator;
    use crate::preconditioners::DiagonalPreconditioner;
    use crate::sparse::CsrMatrix;
    use approx::assert_relative_eq;
    use ndarray::array;

    fn convection_diffusion(n: usize) -> CsrMatrix<f64> {
        let mut triplets = Vec::new();
        for i in 0..n {
            triplets.push((i, i, 3.0 + 0.1 * i as f64));
            if i > 0 {
                triplets.push((i, i - 1, -1.6));
            }
            if i + 1 < n {
                triplets.push((i, i + 1, -0.4));
            }
        }
        CsrMatrix::from_triplets(n, n, triplets)
    }

    #[test]
    fn test_gmres_small_dense() {
        let a = DenseOperator::new(array![[4.0, 1.0], [2.0, 3.0]]);
        let b = array![1.0, 2.0];
        let sol = gmres(&a, &b, None, &GmresConfig::default()).unwrap();
        assert!(sol.converged);
        assert_relative_eq!(sol.x[0], 0.1, epsilon = 1e-8);
        assert_relative_eq!(sol.x[1], 0.6, epsilon = 1e-8);
    }

    #[test]
    fn test_gmres_preconditioned_nonsymmetric() {
        let a = convection_diffusion(60);
        let b = Array1::from_iter((0..60).map(|i| (i as f64 * 0.2).cos()));
        let precond = DiagonalPreconditioner::from_diagonal(&a.diagonal());
        let config = GmresConfig {
            restart: 10,
            max_iterations: 50,
            tolerance: 1e-12,
            reduction: 1e-10,
            print_interval: 0,
        };
        let sol = gmres_preconditioned(&a, &precond, &b, None, &config).unwrap();
        assert!(sol.converged);
        let r = a.residual(&sol.x, &b);
        assert!(vector_norm(&r) < 1e-8);
        assert!(sol.log_reduction < -9.0);
    }

    #[test]
    fn test_residual_history_non_increasing_within_cycle() {
        let a = convection_diffusion(80);
        let b = Array1::from_elem(80, 1.0);
        let config = GmresConfig {
            restart: 8,
            max_iterations: 6,
            tolerance: 1e-14,
            reduction: 1e-14,
            print_interval: 0,
        };
        let sol = gmres(&a, &b, None, &config).unwrap();
        assert!(!sol.residual_history.is_empty());
        for cycle in &sol.residual_history {
            for pair in cycle.windows(2) {
                assert!(pair[1] <= pair[0] * (1.0 + 1e-12));
            }
        }
    }

    #[test]
    fn test_iteration_budget_returns_best() {
        let a = convection_diffusion(100);
        let b = Array1::from_elem(100, 1.0);
        let config = GmresConfig {
            restart: 2,
            max_iterations: 2,
            tolerance: 1e-14,
            reduction: 1e-14,
            print_interval: 0,
        };
        let sol = gmres(&a, &b, None, &config).unwrap();
        assert!(!sol.converged);
        assert_eq!(sol.iterations, 4);
        assert!(sol.residual < sol.initial_residual);
        assert!(sol.log_reduction < 0.0);
    }

    #[test]
    fn test_reduction_criterion_stops_early() {
        let a = convection_diffusion(50);
        let b = Array1::from_elem(50, 1.0);
        let config = GmresConfig {
            restart: 50,
            max_iterations: 1,
            tolerance: 0.0,
            reduction: 1e-2,
            print_interval: 0,
        };
        let sol = gmres(&a, &b, None, &config).unwrap();
        assert!(sol.converged);
        assert!(sol.log_reduction < -1.9);
        assert!(sol.iterations < 50);
    }

    #[test]
    fn test_zero_rhs() {
        let a = convection_diffusion(5);
        let sol = gmres(&a, &Array1::zeros(5), None, &GmresConfig::default()).unwrap();
        assert!(sol.converged);
        assert_eq!(sol.iterations, 0);
        assert!(sol.x.iter().all(|&v| v == 0.0));
    }
}
