//! User interface abstraction
//!
//! This module provides the UI trait for command output, and [`ConsoleLock`],
//! which lets concurrent workers share one UI without interleaving lines.

use crate::error::Result;
use std::io::{self, Write};
use std::sync::{Mutex, PoisonError};

#[cfg(test)]
pub mod test_ui;

/// Abstract UI trait for command interaction
pub trait UI: Send {
    /// Output a message to the user
    fn output(&mut self, message: &str) -> Result<()>;

    /// Output an error message
    fn error(&mut self, message: &str) -> Result<()>;

    /// Output raw bytes (e.g., captured test output)
    fn output_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        // Default implementation: write to stdout
        io::stdout().write_all(bytes)?;
        Ok(())
    }
}

/// Command-line UI implementation
pub struct CliUI {
    stdout: Box<dyn Write + Send>,
    stderr: Box<dyn Write + Send>,
}

impl CliUI {
    /// Creates a new command-line UI instance using stdout and stderr.
    pub fn new() -> Self {
        CliUI {
            stdout: Box::new(io::stdout()),
            stderr: Box::new(io::stderr()),
        }
    }
}

impl Default for CliUI {
    fn default() -> Self {
        Self::new()
    }
}

impl UI for CliUI {
    fn output(&mut self, message: &str) -> Result<()> {
        writeln!(self.stdout, "{}", message)?;
        Ok(())
    }

    fn error(&mut self, message: &str) -> Result<()> {
        writeln!(self.stderr, "Error: {}", message)?;
        Ok(())
    }

    fn output_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.stdout.write_all(bytes)?;
        self.stdout.flush()?;
        Ok(())
    }
}

/// A UI shared between worker threads
///
/// Every call takes the lock for the duration of that call only, so a
/// multi-line block passed to [`ConsoleLock::block`] is printed contiguously
/// while unrelated workers keep running.
pub struct ConsoleLock<'a> {
    ui: Mutex<&'a mut dyn UI>,
}

impl<'a> ConsoleLock<'a> {
    pub fn new(ui: &'a mut dyn UI) -> Self {
        ConsoleLock { ui: Mutex::new(ui) }
    }

    /// Print one line
    pub fn output(&self, message: &str) -> Result<()> {
        self.block(|ui| ui.output(message))
    }

    /// Run several UI calls without letting other workers print in between
    pub fn block<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce(&mut dyn UI) -> Result<()>,
    {
        let mut guard = self.ui.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut **guard)
    }

    /// Give the UI back once no worker holds a reference any more
    pub fn into_inner(self) -> &'a mut dyn UI {
        self.ui.into_inner().unwrap_or_else(PoisonError::into_inner)
    }
}
