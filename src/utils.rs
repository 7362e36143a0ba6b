//! Common utilities used across the crate.
//!
//! This module provides parallelism configuration and iterator helpers used
//! by the inference engine.

use rayon::prelude::*;

// =============================================================================
// Parallelism Configuration
// =============================================================================

/// Whether parallel execution is allowed.
///
/// This is a simple boolean flag passed through inference components.
/// When `true`, components may use `rayon` parallel iterators.
/// When `false`, components must use sequential iteration.
///
/// The actual thread pool is set up at the API level via `n_threads`.
/// Components don't manage thread pools - they just respect this flag.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Parallelism {
    Sequential,
    Parallel,
}

impl Parallelism {
    /// Create from thread count semantics.
    ///
    /// - 0 = auto (parallel if rayon pool has multiple threads, sequential otherwise)
    /// - 1 = sequential
    /// - >1 = parallel
    #[inline]
    pub fn from_threads(n_threads: usize) -> Self {
        if n_threads == 1 || (n_threads == 0 && rayon::current_num_threads() == 1) {
            Parallelism::Sequential
        } else {
            Parallelism::Parallel
        }
    }

    /// Returns `true` if parallel execution is allowed.
    #[inline]
    pub fn is_parallel(self) -> bool {
        matches!(self, Parallelism::Parallel)
    }

    /// Dispatch `for_each` over a plain iterator, bridging to rayon when parallel.
    ///
    /// This is ideal for iterators that don't implement `IntoParallelIterator`
    /// (like a zip of `chunks_mut` and `axis_iter`).
    #[inline]
    pub fn maybe_par_bridge_for_each<T, I, F>(self, iter: I, f: F)
    where
        T: Send,
        I: Iterator<Item = T> + Send,
        F: Fn(T) + Sync + Send,
    {
        if self.is_parallel() {
            iter.par_bridge().for_each(f);
        } else {
            iter.for_each(f);
        }
    }
}

// =============================================================================
// Thread Pool Setup
// =============================================================================

/// Run a closure with the appropriate thread pool.
///
/// Thread count semantics:
/// - `0` = auto (use all available cores)
/// - `1` = sequential (no thread pool)
/// - `n > 1` = use exactly `n` threads
///
/// # Example
///
/// ```ignore
/// use arbors::run_with_threads;
///
/// // Auto-detect threads
/// let result = run_with_threads(0, |p| predictor.predict(x.view(), p));
///
/// // Sequential
/// let result = run_with_threads(1, |p| predictor.predict(x.view(), p));
/// ```
#[inline]
pub fn run_with_threads<T: Send>(n_threads: usize, f: impl FnOnce(Parallelism) -> T + Send) -> T {
    let parallelism = Parallelism::from_threads(n_threads);

    match parallelism {
        Parallelism::Sequential => f(Parallelism::Sequential),
        Parallelism::Parallel => {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(n_threads)
                .build()
                .expect("Failed to create thread pool");
            pool.install(|| f(Parallelism::Parallel))
        }
    }
}
