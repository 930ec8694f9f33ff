//! AlephTX - Socket client library
//! Topic-multiplexed exchange socket with single-shot request/response

// Public modules
pub mod core;
pub mod transport;
pub mod client;

// Re-exports
pub use crate::core::{Config, EmitBody, Error, OrderPost, Outcome, Result};
pub use crate::client::{Connection, Correlator, OutcomeCell, PendingRequest, RequestHandle};
