//! HTTP/WebSocket surface of the morpho conversion service.
//!
//! Exposed as a library so integration tests can build the router
//! in-process; the `morpho` binary wires the same pieces to a listener.

pub mod api;
pub mod metrics;
pub mod state;
