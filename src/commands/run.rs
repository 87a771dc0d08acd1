//! Run the discovered tests and report the results

use crate::aggregate::SharedAggregate;
use crate::commands::Command;
use crate::config::{RunConfiguration, RunOptions};
use crate::coordinator::run_lanes;
use crate::discovery::discover;
use crate::error::Result;
use crate::executor::TestExecutor;
use crate::report::RunSummary;
use crate::ui::{ConsoleLock, UI};
use tracing::info;

pub struct RunCommand {
    options: RunOptions,
}

impl RunCommand {
    pub fn new(options: RunOptions) -> Self {
        RunCommand { options }
    }

    /// Run with an already resolved configuration
    pub fn run_with_config(config: &RunConfiguration, ui: &mut dyn UI) -> Result<RunSummary> {
        let discovery = discover(config)?;
        info!(
            "Discovered {} tests: {} parallel, {} sequential, {} skipped",
            discovery.total(),
            discovery.parallel.len(),
            discovery.sequential.len(),
            discovery.skipped.len()
        );

        let aggregate = SharedAggregate::new();
        for case in &discovery.skipped {
            aggregate.record_skip(case.path());
        }

        let executor = TestExecutor::new(config)?;
        let console = ConsoleLock::new(ui);
        run_lanes(
            &executor,
            &discovery.parallel,
            &discovery.sequential,
            config.parallel_workers(),
            &console,
            &aggregate,
        )?;
        let ui = console.into_inner();

        let summary = RunSummary::new(aggregate.into_snapshot(), discovery.total());
        summary.verify()?;
        summary.render(ui)?;
        Ok(summary)
    }
}

impl Command for RunCommand {
    fn execute(&self, ui: &mut dyn UI) -> Result<i32> {
        let config = RunConfiguration::resolve(self.options.clone())?;
        let summary = Self::run_with_config(&config, ui)?;
        Ok(summary.exit_code())
    }

    fn name(&self) -> &str {
        "run"
    }

    fn help(&self) -> &str {
        "Run the tests and report the results"
    }
}
