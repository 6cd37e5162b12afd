//! Boundary operations exposed to the HTTP layer.
//!
//! [`ConversionService`] is the one entry point callers go through:
//! submission (with synchronous validation), status reads, artifact
//! download, listing, deletion and progress subscription. Everything
//! asynchronous happens behind it in the scheduler.

mod service;
mod types;

pub use service::ConversionService;
pub use types::{ServiceError, SubmitRequest};
