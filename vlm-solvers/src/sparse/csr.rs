//! Compressed Sparse Row (CSR) matrix format
//!
//! CSR format stores:
//! - `values`: Non-zero entries in row-major order
//! - `col_indices`: Column index for each value
//! - `row_ptrs`: Index into values/col_indices where each row starts
//!
//! The near-field influence coefficients of a vortex lattice are assembled
//! row by row (one row per control point) and stored here.

use crate::parallel::parallel_map_indexed;
use crate::traits::{LinearOperator, Scalar};
use ndarray::Array1;
use std::ops::Range;

/// Rows below this count are multiplied sequentially
const PARALLEL_ROW_THRESHOLD: usize = 256;

/// Compressed Sparse Row (CSR) matrix format
#[derive(Debug, Clone)]
pub struct CsrMatrix<T: Scalar> {
    /// Number of rows
    pub num_rows: usize,
    /// Number of columns
    pub num_cols: usize,
    /// Non-zero values in row-major order
    pub values: Vec<T>,
    /// Column indices for each value
    pub col_indices: Vec<usize>,
    /// Row pointers: row_ptrs[i] is the start index of row i, row_ptrs[num_rows] = nnz
    pub row_ptrs: Vec<usize>,
}

impl<T: Scalar> CsrMatrix<T> {
    /// Create a new empty CSR matrix
    pub fn new(num_rows: usize, num_cols: usize) -> Self {
        Self {
            num_rows,
            num_cols,
            values: Vec::new(),
            col_indices: Vec::new(),
            row_ptrs: vec![0; num_rows + 1],
        }
    }

    /// Create from COO triplets; duplicates are summed
    pub fn from_triplets(num_rows: usize, num_cols: usize, triplets: Vec<(usize, usize, T)>) -> Self {
        let mut rows: Vec<Vec<(usize, T)>> = vec![Vec::new(); num_rows];
        for (i, j, v) in triplets {
            debug_assert!(i < num_rows && j < num_cols);
            rows[i].push((j, v));
        }
        Self::from_row_entries(num_cols, rows)
    }

    /// Create from per-row `(column, value)` lists.
    ///
    /// Entries in each row are sorted by column and duplicates summed in
    /// their original order, so assembly in parallel per row stays
    /// deterministic.
    pub fn from_row_entries(num_cols: usize, rows: Vec<Vec<(usize, T)>>) -> Self {
        let num_rows = rows.len();
        let nnz_estimate: usize = rows.iter().map(|r| r.len()).sum();
        let mut values = Vec::with_capacity(nnz_estimate);
        let mut col_indices = Vec::with_capacity(nnz_estimate);
        let mut row_ptrs = Vec::with_capacity(num_rows + 1);
        row_ptrs.push(0);

        for mut row in rows {
            row.sort_by_key(|&(col, _)| col);
            let mut last_col = usize::MAX;
            for (col, val) in row {
                if col == last_col {
                    if let Some(v) = values.last_mut() {
                        *v += val;
                    }
                } else {
                    col_indices.push(col);
                    values.push(val);
                    last_col = col;
                }
            }
            row_ptrs.push(values.len());
        }

        Self {
            num_rows,
            num_cols,
            values,
            col_indices,
            row_ptrs,
        }
    }

    /// Number of stored entries
    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    /// Range of value indices for a row
    pub fn row_range(&self, row: usize) -> Range<usize> {
        self.row_ptrs[row]..self.row_ptrs[row + 1]
    }

    /// Iterate `(column, value)` pairs of a row
    pub fn row_entries(&self, row: usize) -> impl Iterator<Item = (usize, T)> + '_ {
        let range = self.row_range(row);
        self.col_indices[range.clone()]
            .iter()
            .copied()
            .zip(self.values[range].iter().copied())
    }

    fn row_dot(&self, row: usize, x: &Array1<T>) -> T {
        let mut sum = T::zero();
        for idx in self.row_range(row) {
            sum += self.values[idx] * x[self.col_indices[idx]];
        }
        sum
    }

    /// Matrix-vector product y = A x
    pub fn matvec(&self, x: &Array1<T>) -> Array1<T> {
        assert_eq!(x.len(), self.num_cols, "Input vector size mismatch");
        if self.num_rows >= PARALLEL_ROW_THRESHOLD {
            Array1::from_vec(parallel_map_indexed(self.num_rows, |i| self.row_dot(i, x)))
        } else {
            Array1::from_iter((0..self.num_rows).map(|i| self.row_dot(i, x)))
        }
    }

    /// Get entry (i, j), zero when not stored
    pub fn get(&self, i: usize, j: usize) -> T {
        self.row_entries(i)
            .find(|&(col, _)| col == j)
            .map(|(_, v)| v)
            .unwrap_or_else(T::zero)
    }

    /// Extract the diagonal
    pub fn diagonal(&self) -> Array1<T> {
        let n = self.num_rows.min(self.num_cols);
        Array1::from_iter((0..n).map(|i| self.get(i, i)))
    }
}

impl<T: Scalar> LinearOperator<T> for CsrMatrix<T> {
    fn num_rows(&self) -> usize {
        self.num_rows
    }

    fn num_cols(&self) -> usize {
        self.num_cols
    }

    fn apply(&self, x: &Array1<T>) -> Array1<T> {
        self.matvec(x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn sample() -> CsrMatrix<f64> {
        CsrMatrix::from_triplets(
            3,
            3,
            vec![
                (0, 0, 4.0),
                (0, 1, -1.0),
                (1, 0, -1.0),
                (1, 1, 4.0),
                (1, 1, 0.5),
                (2, 2, 3.0),
                (1, 2, -1.0),
            ],
        )
    }

    #[test]
    fn test_duplicates_are_summed() {
        let m = sample();
        assert_eq!(m.nnz(), 6);
        assert_relative_eq!(m.get(1, 1), 4.5);
        assert_relative_eq!(m.get(2, 0), 0.0);
    }

    #[test]
    fn test_columns_sorted() {
        let m = sample();
        let cols: Vec<usize> = m.row_entries(1).map(|(c, _)| c).collect();
        assert_eq!(cols, vec![0, 1, 2]);
    }

    #[test]
    fn test_matvec() {
        let m = sample();
        let y = m.apply(&Array1::from_vec(vec![1.0, 2.0, 3.0]));
        assert_relative_eq!(y[0], 2.0);
        assert_relative_eq!(y[1], -1.0 + 9.0 - 3.0);
        assert_relative_eq!(y[2], 9.0);
    }

    #[test]
    fn test_diagonal() {
        let d = sample().diagonal();
        assert_relative_eq!(d[0], 4.0);
        assert_relative_eq!(d[1], 4.5);
        assert_relative_eq!(d[2], 3.0);
    }

    #[test]
    fn test_large_matvec_parallel_path() {
        let n = 2 * PARALLEL_ROW_THRESHOLD;
        let triplets = (0..n).map(|i| (i, i, 2.0_f64)).collect();
        let m = CsrMatrix::from_triplets(n, n, triplets);
        let y = m.apply(&Array1::from_elem(n, 1.5));
        assert!(y.iter().all(|&v| (v - 3.0_f64).abs() < 1e-15));
    }
}
