//! Run-wide result counters shared between workers
//!
//! Workers only ever increment a counter or append a failing path. Each of
//! those mutations is synchronized on its own, so a lock is never held for
//! the length of a test execution.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

/// Which counter an outcome contributes to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Counter {
    Success,
    Fail,
    Skip,
}

/// Accumulated state of a run, written concurrently by all workers
#[derive(Debug, Default)]
pub struct SharedAggregate {
    success: AtomicUsize,
    fail: AtomicUsize,
    skip: AtomicUsize,
    failed: Mutex<Vec<String>>,
    skipped: Mutex<Vec<String>>,
}

impl SharedAggregate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment one counter by one
    pub fn increment(&self, counter: Counter) {
        let cell = match counter {
            Counter::Success => &self.success,
            Counter::Fail => &self.fail,
            Counter::Skip => &self.skip,
        };
        cell.fetch_add(1, Ordering::SeqCst);
    }

    /// Record a passing test
    pub fn record_success(&self) {
        self.increment(Counter::Success);
    }

    /// Record a failing or timed-out test
    pub fn record_failure(&self, path: &str) {
        self.failed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(path.to_string());
        self.increment(Counter::Fail);
    }

    /// Record a test that was never executed
    pub fn record_skip(&self, path: &str) {
        self.skipped
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(path.to_string());
        self.increment(Counter::Skip);
    }

    /// Take the final values once every worker has joined
    ///
    /// Consuming the aggregate guarantees no further mutation can happen.
    pub fn into_snapshot(self) -> AggregateSnapshot {
        let mut failed = self
            .failed
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner);
        let mut skipped = self
            .skipped
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner);
        failed.sort();
        skipped.sort();

        AggregateSnapshot {
            success: self.success.into_inner(),
            fail: self.fail.into_inner(),
            skip: self.skip.into_inner(),
            failed,
            skipped,
        }
    }
}

/// Immutable copy of the aggregate, with the path lists sorted
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AggregateSnapshot {
    pub success: usize,
    pub fail: usize,
    pub skip: usize,
    pub failed: Vec<String>,
    pub skipped: Vec<String>,
}

impl AggregateSnapshot {
    /// Number of tests accounted for, whether run or skipped
    pub fn accounted(&self) -> usize {
        self.success + self.fail + self.skip
    }
}
