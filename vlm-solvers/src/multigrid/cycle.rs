//! Multigrid hierarchy and V-cycle
//!
//! The cycle descends with damped Jacobi pre-smoothing, solves the coarsest
//! level, and ascends adding injected corrections followed by post-smoothing.
//! [`solve_multigrid`] repeats cycles and stops as soon as a cycle fails to
//! reduce the fine residual, restoring the previous iterate.

use super::aggregation::Aggregation;
use crate::blas_helpers::vector_norm;
use crate::error::{SolverError, check_len};
use crate::iterative::{GmresConfig, gmres_preconditioned, jacobi_sweeps};
use crate::preconditioners::DiagonalPreconditioner;
use crate::traits::{LinearOperator, Preconditioner, Scalar};
use ndarray::Array1;

/// Coarsest-level solver
#[derive(Debug, Clone)]
pub enum CoarseSolver<T> {
    /// Damped Jacobi, at most `sweeps`, stopping early below `tolerance`.
    /// A zero tolerance gives a fixed sweep count and a linear cycle.
    Jacobi { sweeps: usize, tolerance: T },
    /// Diagonally preconditioned GMRES
    Gmres(GmresConfig<T>),
}

/// Multigrid configuration
#[derive(Debug, Clone)]
pub struct MultigridConfig<T> {
    /// Pre-smoothing sweeps per level
    pub pre_smooth: usize,
    /// Post-smoothing sweeps per level
    pub post_smooth: usize,
    /// Jacobi damping factor
    pub relaxation: T,
    /// Coarsest-level solver
    pub coarse: CoarseSolver<T>,
    /// Maximum number of cycles in [`solve_multigrid`]
    pub max_cycles: usize,
    /// Absolute L2 residual tolerance
    pub tolerance: T,
    /// Print progress every N cycles (0 = no output)
    pub print_interval: usize,
}

impl<T: Scalar> Default for MultigridConfig<T> {
    fn default() -> Self {
        Self {
            pre_smooth: 2,
            post_smooth: 2,
            relaxation: T::from_real(2.0 / 3.0),
            coarse: CoarseSolver::Jacobi {
                sweeps: 20,
                tolerance: T::zero(),
            },
            max_cycles: 50,
            tolerance: T::from_real(1e-8),
            print_interval: 0,
        }
    }
}

/// One level: operator, its smoother, and the transfer to the next coarser level
#[derive(Debug, Clone)]
pub struct MultigridLevel<T: Scalar, A> {
    pub operator: A,
    pub smoother: DiagonalPreconditioner<T>,
    pub to_coarse: Option<Aggregation<T>>,
}

/// Levels ordered finest (0) to coarsest
#[derive(Debug, Clone)]
pub struct MultigridHierarchy<T: Scalar, A> {
    levels: Vec<MultigridLevel<T, A>>,
}

impl<T: Scalar, A: LinearOperator<T>> MultigridHierarchy<T, A> {
    /// Build from `(operator, diagonal)` per level and one transfer per
    /// adjacent pair of levels.
    pub fn new(
        operators: Vec<(A, Array1<T>)>,
        transfers: Vec<Aggregation<T>>,
    ) -> Result<Self, SolverError> {
        if operators.is_empty() {
            return Err(SolverError::EmptyHierarchy);
        }
        check_len("multigrid transfers", operators.len() - 1, transfers.len())?;

        let mut transfers = transfers.into_iter();
        let num_levels = operators.len();
        let mut levels = Vec::with_capacity(num_levels);
        for (i, (operator, diagonal)) in operators.into_iter().enumerate() {
            if !operator.is_square() {
                return Err(SolverError::NotSquare {
                    rows: operator.num_rows(),
                    cols: operator.num_cols(),
                });
            }
            check_len("multigrid diagonal", operator.num_rows(), diagonal.len())?;
            let to_coarse = if i + 1 < num_levels {
                transfers.next()
            } else {
                None
            };
            if let Some(t) = &to_coarse {
                check_len("multigrid fine size", operator.num_rows(), t.num_fine())?;
            }
            levels.push(MultigridLevel {
                operator,
                smoother: DiagonalPreconditioner::from_diagonal(&diagonal),
                to_coarse,
            });
        }
        for pair in levels.windows(2) {
            if let Some(t) = &pair[0].to_coarse {
                check_len("multigrid coarse size", pair[1].operator.num_rows(), t.num_coarse())?;
            }
        }

        Ok(Self { levels })
    }

    pub fn num_levels(&self) -> usize {
        self.levels.len()
    }

    pub fn level(&self, index: usize) -> &MultigridLevel<T, A> {
        &self.levels[index]
    }

    /// Finest-level operator
    pub fn fine_operator(&self) -> &A {
        &self.levels[0].operator
    }
}

/// Multigrid solver result
#[derive(Debug, Clone)]
pub struct MultigridResult<T> {
    /// Final iterate
    pub x: Array1<T>,
    /// Accepted cycles
    pub cycles: usize,
    /// Final fine-level residual norm
    pub residual: T,
    /// Residual before the first cycle and after each accepted cycle
    pub residual_history: Vec<T>,
    /// Residual below tolerance
    pub converged: bool,
    /// A cycle increased the residual and was rolled back
    pub diverged: bool,
}

fn coarse_solve<T, A>(
    level: &MultigridLevel<T, A>,
    x: &mut Array1<T>,
    b: &Array1<T>,
    config: &MultigridConfig<T>,
) -> Result<(), SolverError>
where
    T: Scalar,
    A: LinearOperator<T>,
{
    match &config.coarse {
        CoarseSolver::Jacobi { sweeps, tolerance } => {
            if *tolerance <= T::zero() {
                jacobi_sweeps(
                    &level.operator,
                    &level.smoother,
                    b,
                    x,
                    *sweeps,
                    config.relaxation,
                );
            } else {
                for _ in 0..*sweeps {
                    let r = level.operator.residual(x, b);
                    if vector_norm(&r) < *tolerance {
                        break;
                    }
                    let dx = level.smoother.apply(&r);
                    crate::blas_helpers::axpy(config.relaxation, &dx, x);
                }
            }
        }
        CoarseSolver::Gmres(gmres_config) => {
            let sol = gmres_preconditioned(&level.operator, &level.smoother, b, Some(x), gmres_config)?;
            *x = sol.x;
        }
    }
    Ok(())
}

/// One V-cycle starting at `level`, updating `x` in place
pub fn v_cycle<T, A>(
    hierarchy: &MultigridHierarchy<T, A>,
    level: usize,
    x: &mut Array1<T>,
    b: &Array1<T>,
    config: &MultigridConfig<T>,
) -> Result<(), SolverError>
where
    T: Scalar,
    A: LinearOperator<T>,
{
    let current = &hierarchy.levels[level];
    let transfer = match &current.to_coarse {
        Some(t) => t,
        None => return coarse_solve(current, x, b, config),
    };

    jacobi_sweeps(
        &current.operator,
        &current.smoother,
        b,
        x,
        config.pre_smooth,
        config.relaxation,
    );

    let r = current.operator.residual(x, b);
    let r_coarse = transfer.restrict(&r);
    let mut e_coarse = Array1::from_elem(transfer.num_coarse(), T::zero());
    v_cycle(hierarchy, level + 1, &mut e_coarse, &r_coarse, config)?;
    *x += &transfer.prolongate(&e_coarse);

    jacobi_sweeps(
        &current.operator,
        &current.smoother,
        b,
        x,
        config.post_smooth,
        config.relaxation,
    );
    Ok(())
}

/// Solve with repeated V-cycles on the finest level
pub fn solve_multigrid<T, A>(
    hierarchy: &MultigridHierarchy<T, A>,
    b: &Array1<T>,
    x0: Option<&Array1<T>>,
    config: &MultigridConfig<T>,
) -> Result<MultigridResult<T>, SolverError>
where
    T: Scalar,
    A: LinearOperator<T>,
{
    let fine = hierarchy.fine_operator();
    check_len("multigrid rhs", fine.num_rows(), b.len())?;
    let mut x = match x0 {
        Some(x0) => {
            check_len("multigrid initial guess", b.len(), x0.len())?;
            x0.clone()
        }
        None => Array1::from_elem(b.len(), T::zero()),
    };

    let mut norm = vector_norm(&fine.residual(&x, b));
    let mut history = vec![norm];
    let mut cycles = 0;
    let mut diverged = false;

    while cycles < config.max_cycles && norm >= config.tolerance {
        let previous = x.clone();
        v_cycle(hierarchy, 0, &mut x, b, config)?;
        let new_norm = vector_norm(&fine.residual(&x, b));

        if !new_norm.is_finite() || new_norm > norm {
            log::warn!(
                "Multigrid cycle {} increased the residual ({:.6e} -> {:.6e}), keeping previous iterate",
                cycles + 1,
                norm.to_real(),
                new_norm.to_real()
            );
            x = previous;
            diverged = true;
            break;
        }

        norm = new_norm;
        history.push(norm);
        cycles += 1;

        if config.print_interval > 0 && cycles % config.print_interval == 0 {
            log::info!("Multigrid cycle {}: residual = {:.6e}", cycles, norm.to_real());
        }
    }

    Ok(MultigridResult {
        x,
        cycles,
        residual: norm,
        residual_history: history,
        converged: norm < config.tolerance,
        diverged,
    })
}

/// One V-cycle from a zero guess, used as M⁻¹ inside Krylov solvers.
///
/// With a fixed-sweep coarse solver the cycle is a linear map.
pub struct MultigridPreconditioner<'a, T: Scalar, A> {
    hierarchy: &'a MultigridHierarchy<T, A>,
    config: MultigridConfig<T>,
}

impl<'a, T: Scalar, A: LinearOperator<T>> MultigridPreconditioner<'a, T, A> {
    pub fn new(hierarchy: &'a MultigridHierarchy<T, A>, config: MultigridConfig<T>) -> Self {
        Self { hierarchy, config }
    }
}

impl<T: Scalar, A: LinearOperator<T>> Preconditioner<T> for MultigridPreconditioner<'_, T, A> {
    fn apply(&self, r: &Array1<T>) -> Array1<T> {
        let mut z = Array1::from_elem(r.len(), T::zero());
        match v_cycle(self.hierarchy, 0, &mut z, r, &self.config) {
            Ok(()) => z,
            Err(e) => {
                log::warn!("Multigrid preconditioner failed ({e}), falling back to diagonal scaling");
                self.hierarchy.levels[0].smoother.apply(r)
            }
        }
    }
}
