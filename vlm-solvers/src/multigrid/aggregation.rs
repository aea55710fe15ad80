//! Aggregation transfer operators
//!
//! r_coarse[c] = Σ_{f ∈ c} w_f r_fine[f] / Σ_{f ∈ c} w_f
//! u_fine[f]   = u_coarse[parent(f)]

use crate::error::SolverError;
use crate::traits::Scalar;
use ndarray::Array1;

/// Fine-to-coarse grouping with normalized restriction weights
#[derive(Debug, Clone)]
pub struct Aggregation<T: Scalar> {
    parent: Vec<usize>,
    restriction: Vec<T>,
    num_coarse: usize,
}

impl<T: Scalar> Aggregation<T> {
    /// Build from a parent index per fine unknown and a positive weight per
    /// fine unknown. Coarse ids must be contiguous from zero.
    pub fn new(parent: Vec<usize>, weights: Vec<T>) -> Result<Self, SolverError> {
        if parent.is_empty() {
            return Err(SolverError::EmptySystem);
        }
        if parent.len() != weights.len() {
            return Err(SolverError::DimensionMismatch {
                context: "aggregation weights",
                expected: parent.len(),
                found: weights.len(),
            });
        }

        let num_coarse = parent.iter().copied().max().map_or(0, |m| m + 1);
        let mut totals = vec![T::zero(); num_coarse];
        let mut counts = vec![0usize; num_coarse];
        for (&p, &w) in parent.iter().zip(weights.iter()) {
            if w.is_nan() || w < T::zero() {
                return Err(SolverError::InvalidAggregation(format!(
                    "negative or NaN weight for coarse unknown {p}"
                )));
            }
            totals[p] += w;
            counts[p] += 1;
        }
        if let Some(empty) = counts.iter().position(|&c| c == 0) {
            return Err(SolverError::InvalidAggregation(format!(
                "coarse unknown {empty} has no children"
            )));
        }

        // zero-weight aggregates fall back to a plain average
        let restriction = parent
            .iter()
            .zip(weights.iter())
            .map(|(&p, &w)| {
                if totals[p] > T::zero() {
                    w / totals[p]
                } else {
                    T::one() / T::from_real(counts[p] as f64)
                }
            })
            .collect();

        Ok(Self {
            parent,
            restriction,
            num_coarse,
        })
    }

    /// Equal weights within each aggregate
    pub fn uniform(parent: Vec<usize>) -> Result<Self, SolverError> {
        let weights = vec![T::one(); parent.len()];
        Self::new(parent, weights)
    }

    pub fn num_fine(&self) -> usize {
        self.parent.len()
    }

    pub fn num_coarse(&self) -> usize {
        self.num_coarse
    }

    /// Coarse unknown owning fine unknown `fine`
    pub fn parent(&self, fine: usize) -> usize {
        self.parent[fine]
    }

    /// Normalized restriction weight of fine unknown `fine`
    pub fn restriction_weight(&self, fine: usize) -> T {
        self.restriction[fine]
    }

    /// Weighted average of fine values per aggregate
    pub fn restrict(&self, fine: &Array1<T>) -> Array1<T> {
        assert_eq!(fine.len(), self.parent.len(), "restriction size mismatch");
        let mut coarse = Array1::from_elem(self.num_coarse, T::zero());
        for (f, &p) in self.parent.iter().enumerate() {
            coarse[p] += self.restriction[f] * fine[f];
        }
        coarse
    }

    /// Inject coarse values into their children
    pub fn prolongate(&self, coarse: &Array1<T>) -> Array1<T> {
        assert_eq!(coarse.len(), self.num_coarse, "prolongation size mismatch");
        self.parent.iter().map(|&p| coarse[p]).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn test_weighted_restriction() {
        let agg = Aggregation::new(vec![0, 0, 1], vec![1.0, 3.0, 2.0]).unwrap();
        let coarse = agg.restrict(&array![4.0, 8.0, 5.0]);
        assert_relative_eq!(coarse[0], 7.0);
        assert_relative_eq!(coarse[1], 5.0);
    }

    #[test]
    fn test_injection() {
        let agg = Aggregation::<f64>::uniform(vec![1, 0, 1]).unwrap();
        let fine = agg.prolongate(&array![2.0, -1.0]);
        assert_eq!(fine.to_vec(), vec![-1.0, 2.0, -1.0]);
    }

    #[test]
    fn test_restrict_of_prolongated_is_identity() {
        let agg = Aggregation::new(vec![0, 1, 1, 2, 2, 2], vec![1.0, 0.5, 1.5, 2.0, 1.0, 1.0])
            .unwrap();
        let coarse = array![1.0, -2.0, 3.5];
        let back = agg.restrict(&agg.prolongate(&coarse));
        for (a, b) in back.iter().zip(coarse.iter()) {
            assert_relative_eq!(*a, *b, epsilon = 1e-14);
        }
    }

    #[test]
    fn test_gap_in_coarse_ids_rejected() {
        let err = Aggregation::<f64>::uniform(vec![0, 2]);
        assert!(matches!(err, Err(SolverError::InvalidAggregation(_))));
    }
}
