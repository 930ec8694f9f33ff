//! Client - connection handle, request emitter and reply correlation

pub mod connection;
pub mod emitter;
pub mod outcome;
pub mod correlator;

pub use connection::Connection;
pub use outcome::OutcomeCell;
pub use correlator::{Correlator, PendingRequest, RequestHandle};
