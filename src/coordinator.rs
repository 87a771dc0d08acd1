//! Worker topology for a run
//!
//! One thread per parallel batch plus a single thread for the sequential
//! lane, all running at the same time. Workers share nothing but the console
//! and the [`SharedAggregate`]; there is no cancellation between them.

use crate::aggregate::SharedAggregate;
use crate::discovery::TestCase;
use crate::error::{Error, Result};
use crate::executor::TestExecutor;
use crate::partition::partition_tests;
use crate::ui::ConsoleLock;
use std::thread;
use tracing::{debug, info};

/// Run every batch and the sequential lane, returning once all have finished
///
/// `workers` is the number of threads available for parallel batches; the
/// sequential lane always gets its own additional thread and runs its tests
/// strictly one after another.
pub fn run_lanes(
    executor: &TestExecutor<'_>,
    parallel: &[TestCase],
    sequential: &[TestCase],
    workers: usize,
    console: &ConsoleLock<'_>,
    aggregate: &SharedAggregate,
) -> Result<()> {
    let batches = partition_tests(parallel, workers);
    info!(
        "Running {} parallel tests in {} batches and {} sequential tests",
        parallel.len(),
        batches.len(),
        sequential.len()
    );

    thread::scope(|scope| {
        let mut handles = Vec::with_capacity(batches.len() + 1);

        for (worker_id, batch) in batches.iter().enumerate() {
            debug!("Worker {}: {} tests", worker_id, batch.len());
            let handle = scope.spawn(move || run_batch(executor, batch, console, aggregate));
            handles.push((format!("worker {}", worker_id), handle));
        }

        let handle = scope.spawn(move || run_batch(executor, sequential, console, aggregate));
        handles.push(("sequential lane".to_string(), handle));

        let panicked: Vec<String> = handles
            .into_iter()
            .filter_map(|(name, handle)| handle.join().err().map(|_| name))
            .collect();

        if panicked.is_empty() {
            Ok(())
        } else {
            Err(Error::Other(format!("{} panicked", panicked.join(", "))))
        }
    })
}

/// Run one worker's tests in order, one child process at a time
fn run_batch(
    executor: &TestExecutor<'_>,
    tests: &[TestCase],
    console: &ConsoleLock<'_>,
    aggregate: &SharedAggregate,
) {
    for case in tests {
        executor.run_and_record(case, console, aggregate);
    }
}
