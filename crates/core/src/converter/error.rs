//! Error types for the converter module.

use std::path::PathBuf;
use thiserror::Error;

use crate::format::Format;

/// Errors that can occur during conversion.
#[derive(Debug, Error)]
pub enum ConverterError {
    /// Input file not found.
    #[error("Input file not found: {path}")]
    InputNotFound { path: PathBuf },

    /// A required external tool is not installed or not on the configured
    /// path; the capability is unavailable until it is.
    #[error("Converter capability unavailable: {tool} not found at {path}")]
    ToolNotFound { tool: String, path: PathBuf },

    /// The converter was handed a route it does not implement.
    #[error("Converter does not handle {from} to {target}")]
    UnsupportedRoute { from: Format, target: Format },

    /// The underlying transform failed.
    #[error("Conversion failed: {reason}")]
    ConversionFailed {
        reason: String,
        stderr: Option<String>,
    },

    /// The converter produced no output file, or an empty one.
    #[error("Converter produced no output: {path}")]
    EmptyOutput { path: PathBuf },

    /// Conversion exceeded the tool timeout.
    #[error("Conversion timed out after {timeout_secs} seconds")]
    Timeout { timeout_secs: u64 },

    /// I/O error during conversion.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ConverterError {
    /// Creates a new conversion failed error with optional stderr output.
    pub fn conversion_failed(reason: impl Into<String>, stderr: Option<String>) -> Self {
        Self::ConversionFailed {
            reason: reason.into(),
            stderr,
        }
    }

    /// Diagnostic detail (tool stderr) retained server-side only.
    pub fn stderr(&self) -> Option<&str> {
        match self {
            Self::ConversionFailed { stderr, .. } => stderr.as_deref(),
            _ => None,
        }
    }
}
