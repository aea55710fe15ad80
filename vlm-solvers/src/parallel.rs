//! Parallel utilities with feature-gated implementations
//!
//! Provides parallel abstractions backed by rayon when the `native` feature is
//! enabled, with sequential fallbacks otherwise. Every helper preserves input
//! order in its output so callers can combine results deterministically.

/// Check if parallel processing is available
#[cfg(feature = "native")]
pub fn is_parallel_available() -> bool {
    true
}

/// Check if parallel processing is available
#[cfg(not(feature = "native"))]
pub fn is_parallel_available() -> bool {
    false
}

/// Number of worker threads in the current pool
#[cfg(feature = "native")]
pub fn current_num_threads() -> usize {
    rayon::current_num_threads()
}

/// Number of worker threads (always 1 without `native`)
#[cfg(not(feature = "native"))]
pub fn current_num_threads() -> usize {
    1
}

/// Parallel map over a slice
#[cfg(feature = "native")]
pub fn parallel_map<T, U, F>(data: &[T], f: F) -> Vec<U>
where
    T: Sync,
    U: Send,
    F: Fn(&T) -> U + Sync + Send,
{
    use rayon::prelude::*;
    data.par_iter().map(f).collect()
}

/// Sequential map (fallback when parallel is not available)
#[cfg(not(feature = "native"))]
pub fn parallel_map<T, U, F>(data: &[T], f: F) -> Vec<U>
where
    F: Fn(&T) -> U,
{
    data.iter().map(f).collect()
}

/// Parallel map with index
#[cfg(feature = "native")]
pub fn parallel_map_indexed<U, F>(count: usize, f: F) -> Vec<U>
where
    U: Send,
    F: Fn(usize) -> U + Sync + Send,
{
    use rayon::prelude::*;
    (0..count).into_par_iter().map(f).collect()
}

/// Sequential map with index (fallback)
#[cfg(not(feature = "native"))]
pub fn parallel_map_indexed<U, F>(count: usize, f: F) -> Vec<U>
where
    F: Fn(usize) -> U,
{
    (0..count).map(f).collect()
}

/// Parallel in-place update, one element per task
#[cfg(feature = "native")]
pub fn parallel_update<T, F>(data: &mut [T], f: F)
where
    T: Send,
    F: Fn(usize, &mut T) + Sync + Send,
{
    use rayon::prelude::*;
    data.par_iter_mut().enumerate().for_each(|(i, x)| f(i, x));
}

/// Sequential in-place update (fallback)
#[cfg(not(feature = "native"))]
pub fn parallel_update<T, F>(data: &mut [T], f: F)
where
    F: Fn(usize, &mut T),
{
    data.iter_mut().enumerate().for_each(|(i, x)| f(i, x));
}

/// Run `f` inside a dedicated pool of `num_threads` workers.
///
/// `num_threads == 0` uses the global pool. If the pool cannot be created the
/// closure runs on the global pool and a warning is logged.
#[cfg(feature = "native")]
pub fn with_thread_pool<R, F>(num_threads: usize, f: F) -> R
where
    R: Send,
    F: FnOnce() -> R + Send,
{
    if num_threads == 0 {
        return f();
    }
    match rayon::ThreadPoolBuilder::new()
        .num_threads(num_threads)
        .build()
    {
        Ok(pool) => pool.install(f),
        Err(e) => {
            log::warn!("Could not build a {num_threads}-thread pool ({e}), using the global pool");
            f()
        }
    }
}

/// Run `f` on the calling thread (fallback)
#[cfg(not(feature = "native"))]
pub fn with_thread_pool<R, F>(_num_threads: usize, f: F) -> R
where
    F: FnOnce() -> R,
{
    f()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parallel_map_preserves_order() {
        let data: Vec<usize> = (0..1000).collect();
        let doubled = parallel_map(&data, |x| 2 * x);
        assert!(doubled.iter().enumerate().all(|(i, &v)| v == 2 * i));
    }

    #[test]
    fn test_parallel_update() {
        let mut data = vec![0usize; 64];
        parallel_update(&mut data, |i, x| *x = i * i);
        assert_eq!(data[7], 49);
    }

    #[test]
    fn test_with_thread_pool_single() {
        let n = with_thread_pool(1, current_num_threads);
        assert_eq!(n, 1);
    }
}
