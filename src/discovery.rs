//! Test discovery and classification
//!
//! Lists the test files of each requested folder and sorts every one of them
//! into exactly one lane: parallel, sequential, or skipped. Nothing runs here.

use crate::config::RunConfiguration;
use crate::error::{Error, Result};
use std::fmt;
use std::fs;
use tracing::debug;

/// Lane a test is assigned to during discovery
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Classification {
    Parallel,
    Sequential,
    Skipped,
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Classification::Parallel => "parallel",
            Classification::Sequential => "sequential",
            Classification::Skipped => "skipped",
        };
        f.pad(name)
    }
}

/// A single test program, identified by its path relative to the project root
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TestCase {
    path: String,
    classification: Classification,
}

impl TestCase {
    pub fn new(path: impl Into<String>, classification: Classification) -> Self {
        TestCase {
            path: path.into(),
            classification,
        }
    }

    /// Project-relative path, with `/` separators
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn classification(&self) -> Classification {
        self.classification
    }

    pub fn is_sequential(&self) -> bool {
        self.classification == Classification::Sequential
    }
}

impl fmt::Display for TestCase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path)
    }
}

/// Result of discovery: the three lanes plus the full inventory
///
/// Every lane is sorted by path. `inventory` holds every considered file,
/// whatever its classification, and is what the final accounting is checked
/// against.
#[derive(Debug, Clone, Default)]
pub struct Discovery {
    pub parallel: Vec<TestCase>,
    pub sequential: Vec<TestCase>,
    pub skipped: Vec<TestCase>,
    pub inventory: Vec<String>,
}

impl Discovery {
    /// Number of tests considered, whatever their lane
    pub fn total(&self) -> usize {
        self.inventory.len()
    }

    fn record(&mut self, case: TestCase) {
        self.inventory.push(case.path.clone());
        match case.classification {
            Classification::Parallel => self.parallel.push(case),
            Classification::Sequential => self.sequential.push(case),
            Classification::Skipped => self.skipped.push(case),
        }
    }

    fn sort(&mut self) {
        self.parallel.sort();
        self.sequential.sort();
        self.skipped.sort();
        self.inventory.sort();
    }
}

/// Classify one test path
///
/// Rules apply in order: the skip list (ignored when running everything),
/// then the name filters, then the sequential list.
pub fn classify(path: &str, config: &RunConfiguration) -> Classification {
    if !config.run_all {
        if config.skip_list.contains(path) {
            return Classification::Skipped;
        }

        if !config.filters.is_empty() && !config.filters.iter().any(|f| path.contains(f.as_str()))
        {
            return Classification::Skipped;
        }
    }

    if config.sequential_list.contains(path) {
        Classification::Sequential
    } else {
        Classification::Parallel
    }
}

/// Discover and classify every test in the configured folders
///
/// Folders are scanned non-recursively; only regular files carrying the
/// configured extension are considered.
pub fn discover(config: &RunConfiguration) -> Result<Discovery> {
    let mut discovery = Discovery::default();

    for module in &config.modules {
        let relative_dir = format!("{}/{}", config.test_dir, module);
        let dir = config.project_root.join(&relative_dir);
        if !dir.is_dir() {
            return Err(Error::TestFolderNotFound(dir));
        }

        let mut found = 0usize;
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let file_name = entry.file_name();
            let Some(file_name) = file_name.to_str() else {
                debug!("Ignoring non UTF-8 file name {:?}", entry.path());
                continue;
            };
            if !file_name.ends_with(config.extension.as_str()) {
                continue;
            }

            let path = format!("{}/{}", relative_dir, file_name);
            let classification = classify(&path, config);
            discovery.record(TestCase::new(path, classification));
            found += 1;
        }
        debug!("Found {} test files in {}", found, relative_dir);
    }

    discovery.sort();
    Ok(discovery)
}
