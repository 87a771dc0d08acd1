//! Capturing UI used by unit tests

use crate::error::Result;
use crate::ui::UI;

/// A UI implementation for testing that captures output in vectors
#[derive(Debug, Default)]
pub struct TestUI {
    pub output: Vec<String>,
    pub errors: Vec<String>,
    pub bytes_output: Vec<Vec<u8>>,
}

impl TestUI {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of output lines containing `needle`
    pub fn count_containing(&self, needle: &str) -> usize {
        self.output.iter().filter(|line| line.contains(needle)).count()
    }

    /// Everything written through `output_bytes`, decoded lossily
    pub fn captured_text(&self) -> String {
        self.bytes_output
            .iter()
            .map(|chunk| String::from_utf8_lossy(chunk).into_owned())
            .collect()
    }
}

impl UI for TestUI {
    fn output(&mut self, message: &str) -> Result<()> {
        self.output.push(message.to_string());
        Ok(())
    }

    fn error(&mut self, message: &str) -> Result<()> {
        self.errors.push(message.to_string());
        Ok(())
    }

    fn output_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.bytes_output.push(bytes.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_count_containing() {
        let mut ui = TestUI::new();
        ui.output("[PASS]: a.js").unwrap();
        ui.output("[FAIL]: b.js").unwrap();
        ui.output("[PASS]: c.js").unwrap();
        assert_eq!(ui.count_containing("[PASS]"), 2);
    }

    #[test]
    fn test_captured_text() {
        let mut ui = TestUI::new();
        ui.output_bytes(b"stdout ").unwrap();
        ui.output_bytes(b"stderr").unwrap();
        assert_eq!(ui.captured_text(), "stdout stderr");
    }
}
