//! Progress publication.
//!
//! State transitions are broadcast to subscribers keyed by job id.
//! Publication is fire-and-forget: a send with no listeners, or to a
//! lagging listener, never affects the job itself. Events are ephemeral;
//! a late subscriber only sees events emitted after it joined.

mod publisher;
mod types;

pub use publisher::ProgressPublisher;
pub use types::ProgressEvent;
