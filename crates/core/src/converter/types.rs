//! Shared converter types.

use std::path::PathBuf;

use crate::format::Format;

/// One conversion request handed to a converter.
#[derive(Debug, Clone)]
pub struct ConvertRequest {
    /// Job id, for logging only.
    pub job_id: String,
    /// Path of the source file to convert.
    pub input_path: PathBuf,
    pub source_format: Format,
    pub target_format: Format,
    /// Scratch directory the converter may write into. The returned output
    /// path must live under this directory; the caller owns cleanup.
    pub output_dir: PathBuf,
}

impl ConvertRequest {
    /// Default output path for converters that choose their own filename.
    pub fn default_output_path(&self) -> PathBuf {
        self.output_dir
            .join(format!("output.{}", self.target_format))
    }
}
