//! [`TextDetector`] backed by the `tesseract` command-line tool.

use std::path::Path;

use async_trait::async_trait;
use tokio::process::Command;

use crate::collaborators::TextDetector;
use crate::error::PipelineError;
use crate::process::run_tool;

#[derive(Debug, Clone)]
pub struct TesseractCli {
    bin: String,
}

impl Default for TesseractCli {
    fn default() -> Self {
        Self::new("tesseract")
    }
}

impl TesseractCli {
    #[must_use]
    pub fn new(bin: impl Into<String>) -> Self {
        Self { bin: bin.into() }
    }
}

#[async_trait]
impl TextDetector for TesseractCli {
    async fn detect_text(&self, image: &Path) -> Result<String, PipelineError> {
        // --psm 6: treat the frame as a single uniform block of text.
        let output = run_tool(
            "tesseract",
            Command::new(&self.bin)
                .arg(image)
                .arg("stdout")
                .args(["--psm", "6"]),
        )
        .await?;
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}
