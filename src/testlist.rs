//! Handling of flat test lists - the skip list and the sequential list.

use crate::error::{Error, Result};
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

/// Set of project-relative test paths loaded from a list file
pub type TestSet = BTreeSet<String>;

/// Parse a test list file into a set of relative test paths
///
/// The file should contain one path per line. Empty lines and leading/trailing
/// whitespace are ignored. A missing file is a configuration failure.
pub fn parse_list_file(path: &Path) -> Result<TestSet> {
    if !path.exists() {
        return Err(Error::ListFileNotFound(path.to_path_buf()));
    }

    let content = fs::read_to_string(path)?;
    Ok(parse_list(&content))
}

/// Parse a test list from a string
pub fn parse_list(content: &str) -> TestSet {
    content
        .lines()
        .map(|line| line.trim())
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}
