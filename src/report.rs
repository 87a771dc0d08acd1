//! Final report and exit status

use crate::aggregate::AggregateSnapshot;
use crate::error::{Error, Result};
use crate::ui::UI;
use console::style;

/// Outcome of a whole run, built after every worker has joined
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    snapshot: AggregateSnapshot,
    discovered: usize,
}

impl RunSummary {
    pub fn new(snapshot: AggregateSnapshot, discovered: usize) -> Self {
        RunSummary {
            snapshot,
            discovered,
        }
    }

    pub fn success(&self) -> usize {
        self.snapshot.success
    }

    pub fn fail(&self) -> usize {
        self.snapshot.fail
    }

    pub fn skip(&self) -> usize {
        self.snapshot.skip
    }

    /// Sorted paths of failed and timed-out tests
    pub fn failed(&self) -> &[String] {
        &self.snapshot.failed
    }

    /// Sorted paths of tests that were never executed
    pub fn skipped(&self) -> &[String] {
        &self.snapshot.skipped
    }

    /// Check that every discovered test was counted exactly once
    pub fn verify(&self) -> Result<()> {
        let actual = self.snapshot.accounted();
        if actual != self.discovered {
            return Err(Error::AccountingMismatch {
                expected: self.discovered,
                actual,
            });
        }
        Ok(())
    }

    /// Share of executed tests that passed, 0 when nothing ran
    pub fn pass_percentage(&self) -> f64 {
        let executed = self.success() + self.fail();
        if executed == 0 {
            return 0.0;
        }
        self.success() as f64 / executed as f64 * 100.0
    }

    /// Process exit code: 1 if anything failed
    pub fn exit_code(&self) -> i32 {
        if self.fail() > 0 {
            1
        } else {
            0
        }
    }

    /// Print the skip list, the fail list, then the totals
    pub fn render(&self, ui: &mut dyn UI) -> Result<()> {
        ui.output("")?;

        if !self.skipped().is_empty() {
            ui.output(&style("<<Skip Test List>>").on_red().bold().to_string())?;
            for path in self.skipped() {
                ui.output(path)?;
            }
            ui.output("")?;
        }

        if !self.failed().is_empty() {
            ui.output(&style("<<Failed Test List>>").on_red().bold().to_string())?;
            for path in self.failed() {
                ui.output(path)?;
            }
            ui.output("")?;
        }

        ui.output(&style("<<Test Result>>").on_cyan().bold().to_string())?;
        ui.output(&format!(" Total: {:4}", self.snapshot.accounted()))?;
        ui.output(
            &style(format!(
                " PASS: {:4} ({:.2}%)",
                self.success(),
                self.pass_percentage()
            ))
            .green()
            .to_string(),
        )?;
        ui.output(&style(format!(" FAIL: {:4}", self.fail())).red().to_string())?;
        ui.output(&style(format!(" SKIP: {:4}", self.skip())).yellow().to_string())?;
        ui.output("")?;
        Ok(())
    }
}
