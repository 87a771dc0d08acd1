//! jstester - parallel runner for standalone JavaScript test programs
//!
//! Each test is a single source file run by an external executable (for
//! example a JavaScript engine). A test passes when the executable exits with
//! status 0.
//!
//! # Overview
//!
//! A run discovers the test files of one or more test folders, classifies
//! them, and executes them in child processes:
//!
//! - tests named in the skip list, or not matching any name filter, are
//!   counted as skipped and never started;
//! - tests named in the sequential list run one at a time on a dedicated
//!   lane, each with a freshly emptied scratch directory;
//! - every other test is placed in a contiguous batch, one batch per worker
//!   thread, and batches run concurrently with each other and with the
//!   sequential lane.
//!
//! Every test gets a wall-clock timeout; a test that exceeds it is killed and
//! counted as failed. After all workers have joined, the skip list, the fail
//! list and the totals are printed, and the exit status is 1 if anything
//! failed.
//!
//! # Architecture
//!
//! - [`config`]: `.jstester.conf` parsing and [`config::RunConfiguration`]
//! - [`testlist`]: skip-list and sequential-list files
//! - [`discovery`]: finding and classifying tests
//! - [`partition`]: splitting the parallel lane into batches
//! - [`executor`]: running one test under a timeout
//! - [`coordinator`]: the worker threads of a run
//! - [`aggregate`]: counters shared by the workers
//! - [`report`]: the final summary and exit status
//! - [`commands`]: user-facing commands (run, list-tests)
//! - [`ui`]: output abstraction
//! - [`error`]: error types and Result alias
//!
//! # Example
//!
//! ```no_run
//! use jstester::commands::{Command, RunCommand};
//! use jstester::config::RunOptions;
//! use jstester::ui::CliUI;
//! use std::path::PathBuf;
//!
//! # fn main() -> jstester::error::Result<()> {
//! let options = RunOptions {
//!     project_root: PathBuf::from("."),
//!     filters: vec!["http".to_string()],
//!     ..Default::default()
//! };
//!
//! let mut ui = CliUI::new();
//! let exit_code = RunCommand::new(options).execute(&mut ui)?;
//! std::process::exit(exit_code);
//! # }
//! ```

pub mod aggregate;
pub mod commands;
pub mod config;
pub mod coordinator;
pub mod discovery;
pub mod error;
pub mod executor;
pub mod partition;
pub mod report;
pub mod testlist;
pub mod ui;

pub use error::{Error, Result};
