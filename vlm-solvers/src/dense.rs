//! Dense operator wrapper and Galerkin coarsening for small systems

use crate::multigrid::Aggregation;
use crate::parallel::parallel_map_indexed;
use crate::traits::{LinearOperator, Scalar};
use ndarray::{Array1, Array2};

/// Row-major dense matrix usable as a [`LinearOperator`]
#[derive(Debug, Clone)]
pub struct DenseOperator<T: Scalar> {
    matrix: Array2<T>,
}

impl<T: Scalar> DenseOperator<T> {
    pub fn new(matrix: Array2<T>) -> Self {
        Self { matrix }
    }

    /// Access the wrapped matrix
    pub fn matrix(&self) -> &Array2<T> {
        &self.matrix
    }

    /// Diagonal entries
    pub fn diagonal(&self) -> Array1<T> {
        self.matrix.diag().to_owned()
    }

    /// Galerkin product R A P for an aggregation transfer
    pub fn galerkin(&self, agg: &Aggregation<T>) -> DenseOperator<T> {
        let nc = agg.num_coarse();
        let mut coarse = Array2::from_elem((nc, nc), T::zero());
        for (i, row) in self.matrix.outer_iter().enumerate() {
            let ci = agg.parent(i);
            let wi = agg.restriction_weight(i);
            for (j, &a) in row.iter().enumerate() {
                coarse[[ci, agg.parent(j)]] += wi * a;
            }
        }
        DenseOperator::new(coarse)
    }
}

impl<T: Scalar> LinearOperator<T> for DenseOperator<T> {
    fn num_rows(&self) -> usize {
        self.matrix.nrows()
    }

    fn num_cols(&self) -> usize {
        self.matrix.ncols()
    }

    fn apply(&self, x: &Array1<T>) -> Array1<T> {
        assert_eq!(x.len(), self.matrix.ncols(), "Input vector size mismatch");
        Array1::from_vec(parallel_map_indexed(self.matrix.nrows(), |i| {
            let mut sum = T::zero();
            for (a, xj) in self.matrix.row(i).iter().zip(x.iter()) {
                sum += *a * *xj;
            }
            sum
        }))
    }
}
