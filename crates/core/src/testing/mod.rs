//! Test doubles for the converter boundary.
//!
//! Exposed as a normal module so integration tests and downstream crates
//! can drive the scheduler without any real conversion tooling installed.

mod mock_converter;

pub use mock_converter::{MockConverter, RecordedConversion};
