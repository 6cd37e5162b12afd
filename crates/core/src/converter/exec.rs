//! Subprocess plumbing shared by the tool-backed converters.

use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tokio::time::{timeout, Duration};

use super::error::ConverterError;

/// How much tool stderr to keep for diagnostics.
const STDERR_TAIL_BYTES: usize = 4096;

/// Runs an external tool to completion with a wall-clock timeout.
///
/// Stdout is discarded, stderr is captured for diagnostics. A missing
/// binary maps to `ToolNotFound`, a non-zero exit to `ConversionFailed`
/// with the stderr tail attached, and a timeout kills the process.
pub(super) async fn run_tool(
    tool: &str,
    binary: &Path,
    args: &[String],
    timeout_secs: u64,
) -> Result<(), ConverterError> {
    let child = Command::new(binary)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConverterError::ToolNotFound {
                    tool: tool.to_string(),
                    path: binary.to_path_buf(),
                }
            } else {
                ConverterError::Io(e)
            }
        })?;

    let result = timeout(Duration::from_secs(timeout_secs), child.wait_with_output()).await;

    match result {
        Ok(Ok(output)) => {
            if output.status.success() {
                Ok(())
            } else {
                let stderr = String::from_utf8_lossy(&output.stderr);
                let tail = stderr
                    .char_indices()
                    .rev()
                    .take(STDERR_TAIL_BYTES)
                    .last()
                    .map(|(i, _)| &stderr[i..])
                    .unwrap_or("");
                Err(ConverterError::conversion_failed(
                    format!("{} exited with code {:?}", tool, output.status.code()),
                    if tail.is_empty() {
                        None
                    } else {
                        Some(tail.to_string())
                    },
                ))
            }
        }
        Ok(Err(e)) => Err(ConverterError::Io(e)),
        Err(_) => Err(ConverterError::Timeout { timeout_secs }),
    }
}

/// Checks that a binary exists by invoking it with a probe argument.
pub(super) async fn probe_tool(
    tool: &str,
    binary: &Path,
    probe_arg: &str,
) -> Result<(), ConverterError> {
    let result = Command::new(binary)
        .arg(probe_arg)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await;

    match result {
        Ok(_) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(ConverterError::ToolNotFound {
            tool: tool.to_string(),
            path: binary.to_path_buf(),
        }),
        Err(e) => Err(ConverterError::Io(e)),
    }
}

/// Verifies the tool produced a non-empty output file.
pub(super) async fn verify_output(path: &Path) -> Result<(), ConverterError> {
    match tokio::fs::metadata(path).await {
        Ok(meta) if meta.len() > 0 => Ok(()),
        _ => Err(ConverterError::EmptyOutput {
            path: path.to_path_buf(),
        }),
    }
}
