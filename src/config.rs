//! Configuration file (.jstester.conf) parsing and run configuration
//!
//! The .jstester.conf file uses INI format with a [DEFAULT] section. Every key
//! is optional; command-line options take precedence over the file, and the
//! file takes precedence over built-in defaults. The result of resolution is a
//! [`RunConfiguration`], which stays read-only for the whole run.

use crate::error::{Error, Result};
use crate::testlist::{self, TestSet};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Name of the configuration file looked up in the project root
pub const CONFIG_FILE_NAME: &str = ".jstester.conf";

pub const DEFAULT_EXECUTABLE: &str = "node";
pub const DEFAULT_TEST_DIR: &str = "test";
pub const DEFAULT_TEMP_DIR: &str = "test/tmp";
pub const DEFAULT_SKIP_LIST: &str = "test/skip_list.txt";
pub const DEFAULT_SEQUENTIAL_LIST: &str = "test/sequential_list.txt";
pub const DEFAULT_EXTENSION: &str = ".js";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_PROCESS_COUNT: usize = 7;
pub const DEFAULT_SEQUENTIAL_DELAY_MS: u64 = 1000;
pub const DEFAULT_MODULE: &str = "parallel";

/// Configuration loaded from .jstester.conf
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JsTesterConfig {
    /// Executable under test, relative to the project root unless absolute
    pub executable: Option<String>,

    /// Directory holding the test folders
    pub test_dir: Option<String>,

    /// Shared scratch directory recreated before each sequential test
    pub temp_dir: Option<String>,

    /// File listing tests that must not run
    pub skip_list: Option<String>,

    /// File listing tests that must run one at a time
    pub sequential_list: Option<String>,

    /// Extension of test source files
    pub extension: Option<String>,

    /// Per-test timeout in seconds
    pub timeout: Option<u64>,

    /// Total number of workers, including the sequential lane
    pub process: Option<usize>,

    /// Pause before each sequential test, in milliseconds
    pub sequential_delay_ms: Option<u64>,
}

impl JsTesterConfig {
    /// Load configuration from a .jstester.conf file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;

        Self::parse(&contents)
    }

    /// Parse configuration from a string
    pub fn parse(contents: &str) -> Result<Self> {
        let ini: HashMap<String, HashMap<String, String>> = serde_ini::from_str(contents)
            .map_err(|e| Error::Config(format!("Failed to parse {}: {}", CONFIG_FILE_NAME, e)))?;

        let default = ini.get("DEFAULT").ok_or_else(|| {
            Error::Config(format!("No [DEFAULT] section in {}", CONFIG_FILE_NAME))
        })?;

        let text = |key: &str| {
            default
                .get(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        Ok(JsTesterConfig {
            executable: text("executable"),
            test_dir: text("test_dir"),
            temp_dir: text("temp_dir"),
            skip_list: text("skip_list"),
            sequential_list: text("sequential_list"),
            extension: text("extension"),
            timeout: parse_number(default, "timeout")?,
            process: parse_number(default, "process")?,
            sequential_delay_ms: parse_number(default, "sequential_delay_ms")?,
        })
    }
}

fn parse_number<T: std::str::FromStr>(
    section: &HashMap<String, String>,
    key: &str,
) -> Result<Option<T>>
where
    T::Err: std::fmt::Display,
{
    let Some(raw) = section.get(key).map(|v| v.trim()) else {
        return Ok(None);
    };
    if raw.is_empty() {
        return Ok(None);
    }
    raw.parse::<T>()
        .map(Some)
        .map_err(|e| Error::Config(format!("Invalid value '{}' for {}: {}", raw, key, e)))
}

/// Options collected from the command line before resolution
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub project_root: PathBuf,
    pub config_file: Option<PathBuf>,
    pub executable: Option<PathBuf>,
    pub skip_list: Option<PathBuf>,
    pub sequential_list: Option<PathBuf>,
    pub timeout: Option<u64>,
    pub process: Option<usize>,
    pub filters: Vec<String>,
    pub modules: Vec<String>,
    pub run_all: bool,
}

/// Everything a run needs, resolved once before any test starts
#[derive(Debug, Clone)]
pub struct RunConfiguration {
    pub project_root: PathBuf,
    pub executable: PathBuf,
    /// Test directory relative to the project root, with `/` separators
    pub test_dir: String,
    pub temp_dir: PathBuf,
    pub extension: String,
    pub modules: Vec<String>,
    pub timeout: Duration,
    pub process: usize,
    pub sequential_delay: Duration,
    /// Derived filter substrings (`test-<name>-`)
    pub filters: Vec<String>,
    pub run_all: bool,
    pub skip_list: TestSet,
    pub sequential_list: TestSet,
}

impl RunConfiguration {
    /// Resolve command-line options, the config file and defaults
    ///
    /// Fails before anything runs if the executable under test or either
    /// list file is missing.
    pub fn resolve(options: RunOptions) -> Result<Self> {
        let root = options.project_root.clone();

        let file_config = match options.config_file {
            Some(ref path) => JsTesterConfig::load_from_file(path)?,
            None => {
                let implicit = root.join(CONFIG_FILE_NAME);
                if implicit.exists() {
                    JsTesterConfig::load_from_file(&implicit)?
                } else {
                    JsTesterConfig::default()
                }
            }
        };
        debug!("Loaded configuration: {:?}", file_config);

        let executable = options
            .executable
            .clone()
            .or_else(|| file_config.executable.as_ref().map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_EXECUTABLE));
        let executable = root.join(executable);
        if !executable.is_file() {
            return Err(Error::ExecutableNotFound(executable));
        }

        let skip_list_path = root.join(
            options
                .skip_list
                .clone()
                .or_else(|| file_config.skip_list.as_ref().map(PathBuf::from))
                .unwrap_or_else(|| PathBuf::from(DEFAULT_SKIP_LIST)),
        );
        let sequential_list_path = root.join(
            options
                .sequential_list
                .clone()
                .or_else(|| file_config.sequential_list.as_ref().map(PathBuf::from))
                .unwrap_or_else(|| PathBuf::from(DEFAULT_SEQUENTIAL_LIST)),
        );
        let skip_list = testlist::parse_list_file(&skip_list_path)?;
        let sequential_list = testlist::parse_list_file(&sequential_list_path)?;

        let timeout = options
            .timeout
            .or(file_config.timeout)
            .unwrap_or(DEFAULT_TIMEOUT_SECS);
        if timeout == 0 {
            return Err(Error::Config("timeout must be greater than 0".to_string()));
        }

        let process = options
            .process
            .or(file_config.process)
            .unwrap_or(DEFAULT_PROCESS_COUNT);
        if process == 0 {
            return Err(Error::Config("process must be greater than 0".to_string()));
        }

        let test_dir = file_config
            .test_dir
            .unwrap_or_else(|| DEFAULT_TEST_DIR.to_string())
            .trim_end_matches('/')
            .to_string();
        let temp_dir = root.join(
            file_config
                .temp_dir
                .unwrap_or_else(|| DEFAULT_TEMP_DIR.to_string()),
        );

        let modules = if options.modules.is_empty() {
            vec![DEFAULT_MODULE.to_string()]
        } else {
            options.modules
        };

        Ok(RunConfiguration {
            project_root: root,
            executable,
            test_dir,
            temp_dir,
            extension: file_config
                .extension
                .unwrap_or_else(|| DEFAULT_EXTENSION.to_string()),
            modules,
            timeout: Duration::from_secs(timeout),
            process,
            sequential_delay: Duration::from_millis(
                file_config
                    .sequential_delay_ms
                    .unwrap_or(DEFAULT_SEQUENTIAL_DELAY_MS),
            ),
            filters: derive_filters(&options.filters),
            run_all: options.run_all,
            skip_list,
            sequential_list,
        })
    }

    /// Number of workers available for parallel batches
    ///
    /// One of the configured workers is always reserved for the sequential
    /// lane.
    pub fn parallel_workers(&self) -> usize {
        self.process.saturating_sub(1)
    }
}

/// Turn user-facing filter names into the substrings matched against paths
///
/// `http` becomes `test-http-`, so it selects `test-http-basic.js` without
/// also selecting `test-https-agent.js`.
pub fn derive_filters(names: &[String]) -> Vec<String> {
    names
        .iter()
        .map(|name| name.trim())
        .filter(|name| !name.is_empty())
        .map(|name| format!("test-{}-", name))
        .collect()
}
