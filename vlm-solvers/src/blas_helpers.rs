//! Deterministic vector kernels
//!
//! Reductions are split into fixed-size chunks whose partial sums are
//! computed in parallel and then added in chunk order. The summation order
//! therefore depends only on the vector length, never on the thread count,
//! and a residual compared against a tolerance is reproducible run to run.

use crate::parallel::parallel_map_indexed;
use crate::traits::Scalar;
use ndarray::Array1;

/// Elements per partial sum
pub const REDUCTION_CHUNK: usize = 512;

fn chunked_sum<T, F>(len: usize, term: F) -> T
where
    T: Scalar,
    F: Fn(usize) -> T + Sync + Send,
{
    if len <= REDUCTION_CHUNK {
        let mut sum = T::zero();
        for i in 0..len {
            sum += term(i);
        }
        return sum;
    }
    let num_chunks = len.div_ceil(REDUCTION_CHUNK);
    let partials = parallel_map_indexed(num_chunks, |c| {
        let start = c * REDUCTION_CHUNK;
        let end = (start + REDUCTION_CHUNK).min(len);
        let mut sum = T::zero();
        for i in start..end {
            sum += term(i);
        }
        sum
    });
    partials.into_iter().fold(T::zero(), |acc, p| acc + p)
}

/// Compute inner product (x, y) = Σ x_i * y_i
#[inline]
pub fn inner_product<T: Scalar>(x: &Array1<T>, y: &Array1<T>) -> T {
    assert_eq!(
        x.len(),
        y.len(),
        "Vector lengths must match for inner product"
    );
    chunked_sum(x.len(), |i| x[i] * y[i])
}

/// Compute vector 2-norm: ||x||_2 = sqrt(Σ x_i^2)
#[inline]
pub fn vector_norm<T: Scalar>(x: &Array1<T>) -> T {
    vector_norm_sqr(x).sqrt()
}

/// Compute vector norm squared: ||x||_2^2 = Σ x_i^2
#[inline]
pub fn vector_norm_sqr<T: Scalar>(x: &Array1<T>) -> T {
    chunked_sum(x.len(), |i| x[i] * x[i])
}

/// Sum of a slice in fixed chunk order
pub fn ordered_sum<T: Scalar>(values: &[T]) -> T {
    chunked_sum(values.len(), |i| values[i])
}

/// Compute axpy: y = α * x + y
#[inline]
pub fn axpy<T: Scalar>(alpha: T, x: &Array1<T>, y: &mut Array1<T>) {
    for (xi, yi) in x.iter().zip(y.iter_mut()) {
        *yi += alpha * *xi;
    }
}

/// Compute vector scale in-place: x = α * x
#[inline]
pub fn scale_inplace<T: Scalar>(x: &mut Array1<T>, alpha: T) {
    for xi in x.iter_mut() {
        *xi *= alpha;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_inner_product() {
        let x = Array1::from_vec(vec![1.0, 2.0, 3.0]);
        let y = Array1::from_vec(vec![4.0, 5.0, 6.0]);
        assert_relative_eq!(inner_product(&x, &y), 32.0);
    }

    #[test]
    fn test_vector_norm() {
        let x = Array1::from_vec(vec![3.0, 4.0]);
        assert_relative_eq!(vector_norm(&x), 5.0);
    }

    #[test]
    fn test_chunked_norm_matches_sequential() {
        let n = 5 * REDUCTION_CHUNK + 17;
        let x = Array1::from_iter((0..n).map(|i| ((i as f64) * 0.37).sin()));
        let reference: f64 = x.iter().map(|v| v * v).sum();
        assert_relative_eq!(vector_norm_sqr(&x), reference, epsilon = 1e-10);
    }

    #[test]
    fn test_ordered_sum_is_repeatable() {
        let values: Vec<f64> = (0..10_000).map(|i| 1.0 / (1.0 + i as f64)).collect();
        let a = ordered_sum(&values);
        let b = ordered_sum(&values);
        assert_eq!(a.to_bits(), b.to_bits());
    }

    #[test]
    fn test_axpy_and_scale() {
        let x = Array1::from_vec(vec![1.0, 2.0]);
        let mut y = Array1::from_vec(vec![1.0, 1.0]);
        axpy(2.0, &x, &mut y);
        scale_inplace(&mut y, 0.5);
        assert_relative_eq!(y[0], 1.5);
        assert_relative_eq!(y[1], 2.5);
    }
}
