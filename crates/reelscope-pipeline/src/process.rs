//! Running external tools.

use std::process::Output;

use tokio::process::Command;

use crate::error::PipelineError;

/// Longest stderr excerpt carried in an error.
const STDERR_TAIL: usize = 2_000;

/// Runs `command` to completion and returns its output.
///
/// A missing binary maps to [`PipelineError::ToolNotFound`]; a non-zero exit
/// maps to [`PipelineError::ToolFailed`] with the tail of stderr.
pub(crate) async fn run_tool(tool: &str, command: &mut Command) -> Result<Output, PipelineError> {
    command.kill_on_drop(true);
    tracing::debug!(tool, command = ?command.as_std(), "running external tool");

    let output = match command.output().await {
        Ok(output) => output,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(PipelineError::ToolNotFound {
                tool: tool.to_string(),
            });
        }
        Err(e) => return Err(PipelineError::io(tool, e)),
    };

    if output.status.success() {
        Ok(output)
    } else {
        Err(PipelineError::ToolFailed {
            tool: tool.to_string(),
            status: output.status.to_string(),
            stderr: stderr_tail(&output.stderr),
        })
    }
}

fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let trimmed = text.trim();
    let start = trimmed
        .char_indices()
        .rev()
        .nth(STDERR_TAIL)
        .map_or(0, |(i, _)| i);
    trimmed[start..].to_string()
}
