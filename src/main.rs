//! jstester - Command-line runner for JavaScript test folders

use clap::Parser;
use jstester::commands::{Command, ListTestsCommand, RunCommand};
use jstester::config::RunOptions;
use jstester::ui::{CliUI, UI};
use std::io::Write;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "jstester")]
#[command(about = "Run JavaScript test files in parallel against an executable", long_about = None)]
struct Cli {
    /// Project root; test paths are relative to it
    #[arg(short = 'C', long, default_value = ".")]
    project_root: PathBuf,

    /// Configuration file (defaults to <project-root>/.jstester.conf)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Executable under test
    #[arg(long, env = "JSTESTER_EXECUTABLE")]
    executable: Option<PathBuf>,

    /// File listing tests to skip
    #[arg(long)]
    skip_list: Option<PathBuf>,

    /// File listing tests that must run one at a time
    #[arg(long)]
    sequential_list: Option<PathBuf>,

    /// Per-test timeout in seconds [default: 30]
    #[arg(long, value_name = "SEC")]
    timeout: Option<u64>,

    /// Number of workers, including the sequential lane [default: 7]
    #[arg(long)]
    process: Option<usize>,

    /// Test names to run (e.g. "-f buffer http")
    #[arg(short, long, num_args = 1..)]
    filter: Vec<String>,

    /// Test folder names (e.g. "-m parallel")
    #[arg(short, long, num_args = 1..)]
    module: Vec<String>,

    /// Run every test, ignoring the skip list and filters
    #[arg(short, long)]
    all: bool,

    /// List the tests and their lanes without running them
    #[arg(long)]
    list: bool,

    /// Show debug logging (RUST_LOG takes precedence)
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let options = RunOptions {
        project_root: cli.project_root,
        config_file: cli.config,
        executable: cli.executable,
        skip_list: cli.skip_list,
        sequential_list: cli.sequential_list,
        timeout: cli.timeout,
        process: cli.process,
        filters: cli.filter,
        modules: cli.module,
        run_all: cli.all,
    };

    let mut ui = CliUI::new();

    let result = if cli.list {
        ListTestsCommand::new(options).execute(&mut ui)
    } else {
        RunCommand::new(options).execute(&mut ui)
    };

    match result {
        Ok(exit_code) => std::process::exit(exit_code),
        Err(e) => {
            if ui.error(&e.to_string()).is_err() {
                let _ = writeln!(std::io::stderr(), "Error: {}", e);
            }
            std::process::exit(1);
        }
    }
}
