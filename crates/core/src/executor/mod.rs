//! Conversion execution.
//!
//! The executor turns one job into one stored output artifact (or a typed
//! error). It owns route resolution, converter dispatch, output
//! verification, checksumming and the atomic handoff into artifact
//! storage. It never touches job status; committing the result is the
//! scheduler's business.

mod executor;

pub use executor::{ConversionExecutor, ConvertedArtifact, ExecuteError};
