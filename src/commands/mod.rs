//! Command system for jstester
//!
//! Commands are executed through the Command trait.

use crate::error::Result;
use crate::ui::UI;

pub mod run;

pub use list_tests::ListTestsCommand;
pub use run::RunCommand;

/// Trait that all commands must implement
pub trait Command {
    /// Execute the command, returning the process exit code
    fn execute(&self, ui: &mut dyn UI) -> Result<i32>;

    /// Get the command name
    fn name(&self) -> &str;

    /// Get command help text
    fn help(&self) -> &str;
}
