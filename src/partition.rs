//! Test partitioning for parallel execution
//!
//! This module divides the parallel lane into contiguous batches, one per
//! worker.

/// Partition tests into contiguous batches for parallel execution
///
/// Each batch holds at most `ceil(len / workers)` tests, so no more than
/// `workers` batches are produced and their sizes differ by at most one
/// batch's remainder. Batches preserve input order, so for sorted input the
/// assignment is the same on every run.
///
/// # Arguments
///
/// * `tests` - Tests to partition, already sorted by path
/// * `workers` - Number of parallel workers available
///
/// # Returns
///
/// Vector of batches. With no workers available every test lands in a single
/// batch; with no tests there are no batches.
pub fn partition_tests<T: Clone>(tests: &[T], workers: usize) -> Vec<Vec<T>> {
    if tests.is_empty() {
        return vec![];
    }

    if workers <= 1 {
        return vec![tests.to_vec()];
    }

    let batch_size = tests.len().div_ceil(workers);
    tests.chunks(batch_size).map(<[T]>::to_vec).collect()
}
