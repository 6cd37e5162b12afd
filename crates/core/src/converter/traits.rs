//! Trait definition for converter capabilities.

use async_trait::async_trait;
use std::path::PathBuf;

use super::error::ConverterError;
use super::types::ConvertRequest;

/// A converter capability that can perform some set of format transforms.
#[async_trait]
pub trait Converter: Send + Sync {
    /// Returns the name of this converter implementation.
    fn name(&self) -> &str;

    /// Converts the source file to the target format.
    ///
    /// Returns the path of the produced output file, which lives under the
    /// request's `output_dir`. Implementations must not touch anything
    /// outside that directory.
    async fn convert(&self, request: ConvertRequest) -> Result<PathBuf, ConverterError>;

    /// Validates that the converter is properly configured and ready, e.g.
    /// that its external tools exist.
    async fn validate(&self) -> Result<(), ConverterError>;
}
